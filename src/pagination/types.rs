//! Pagination types and traits
//!
//! Defines the core pagination abstractions used by all strategies.

use crate::error::Result;
use crate::http::HttpResponse;
use crate::slice::Record;
use crate::types::JsonValue;
use std::fmt;

/// Decides whether another page exists and which token requests it.
///
/// A strategy is stateful: `next_page_token` advances it, and `reset` must be
/// called at every partition boundary.
pub trait PaginationStrategy: Send + Sync + fmt::Debug {
    /// Token for the first request of a partition, if any
    fn initial_token(&self) -> Option<JsonValue>;

    /// Compute the token for the next page from the page just fetched.
    ///
    /// `None` means there are no further pages.
    fn next_page_token(
        &mut self,
        response: &HttpResponse,
        last_page_size: usize,
        last_record: Option<&Record>,
    ) -> Result<Option<JsonValue>>;

    /// Restart pagination, optionally from an explicit value
    fn reset(&mut self, value: Option<JsonValue>) -> Result<()>;

    /// Number of records requested per page, if the strategy has one
    fn page_size(&self) -> Option<i64>;
}

/// Where a partition's pagination stands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PaginationState {
    /// No page fetched yet for this partition
    #[default]
    AwaitingFirstPage,
    /// The last page produced a token for another page
    HasNext,
    /// No further pages for this partition
    Exhausted,
}

/// Per-partition pagination progress: state, current token and page count
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PaginationCursor {
    state: PaginationState,
    token: Option<JsonValue>,
    pages_fetched: usize,
}

impl PaginationCursor {
    /// Start a partition with the strategy's initial token
    pub fn new(initial_token: Option<JsonValue>) -> Self {
        Self {
            state: PaginationState::AwaitingFirstPage,
            token: initial_token,
            pages_fetched: 0,
        }
    }

    /// Current state
    pub fn state(&self) -> PaginationState {
        self.state
    }

    /// Token to send with the next request
    pub fn token(&self) -> Option<&JsonValue> {
        self.token.as_ref()
    }

    /// Pages fetched so far in this partition
    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }

    /// Whether another page should be fetched
    pub fn has_more(&self) -> bool {
        self.state != PaginationState::Exhausted
    }

    /// Record a fetched page and the token it produced
    pub fn advance(&mut self, next_token: Option<JsonValue>) {
        self.pages_fetched += 1;
        match next_token {
            Some(token) => {
                self.token = Some(token);
                self.state = PaginationState::HasNext;
            }
            None => self.exhaust(),
        }
    }

    /// Stop paginating this partition
    pub fn exhaust(&mut self) {
        self.token = None;
        self.state = PaginationState::Exhausted;
    }
}

/// How the page token is placed on the request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageTokenOption {
    /// Inject as a parameter, header or body field
    RequestOption(crate::request_option::RequestOption),
    /// Use the token as the request path (or full URL)
    RequestPath,
}
