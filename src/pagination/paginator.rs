//! Paginators
//!
//! A paginator wraps a strategy and knows how the strategy's tokens and page
//! size are placed on the outbound request.

use super::strategies::Pagination;
use super::types::{PageTokenOption, PaginationStrategy};
use crate::error::Result;
use crate::http::HttpResponse;
use crate::request_option::{InjectInto, RequestOption};
use crate::slice::Record;
use crate::types::{value_to_string, Config, JsonObject, JsonValue};

/// Core trait for paginators driven by a retriever
pub trait Paginator: Send + Sync + std::fmt::Debug {
    /// Token for the first request of a partition
    fn initial_token(&self) -> Option<JsonValue>;

    /// Token for the next page, or `None` when done
    fn next_page_token(
        &mut self,
        response: &HttpResponse,
        last_page_size: usize,
        last_record: Option<&Record>,
    ) -> Result<Option<JsonValue>>;

    /// Restart at a partition boundary
    fn reset(&mut self, value: Option<JsonValue>) -> Result<()>;

    /// Path (or full URL) replacing the requester's path, if the token carries one
    fn request_path(&self, token: Option<&JsonValue>) -> Option<String>;

    /// Parameters, headers or body fields contributed for this token
    fn request_options(&self, location: InjectInto, token: Option<&JsonValue>) -> Result<JsonObject>;
}

// ============================================================================
// No Pagination
// ============================================================================

/// Single page per partition
#[derive(Debug, Clone, Default)]
pub struct NoPagination;

impl Paginator for NoPagination {
    fn initial_token(&self) -> Option<JsonValue> {
        None
    }

    fn next_page_token(
        &mut self,
        _response: &HttpResponse,
        _last_page_size: usize,
        _last_record: Option<&Record>,
    ) -> Result<Option<JsonValue>> {
        Ok(None)
    }

    fn reset(&mut self, _value: Option<JsonValue>) -> Result<()> {
        Ok(())
    }

    fn request_path(&self, _token: Option<&JsonValue>) -> Option<String> {
        None
    }

    fn request_options(&self, _location: InjectInto, _token: Option<&JsonValue>) -> Result<JsonObject> {
        Ok(JsonObject::new())
    }
}

// ============================================================================
// Default Paginator
// ============================================================================

/// Strategy plus token and page size injection
#[derive(Debug, Clone)]
pub struct DefaultPaginator {
    strategy: Pagination,
    page_token_option: Option<PageTokenOption>,
    page_size_option: Option<RequestOption>,
    config: Config,
}

impl DefaultPaginator {
    /// Create a paginator around a strategy
    pub fn new(strategy: Pagination, config: Config) -> Self {
        Self {
            strategy,
            page_token_option: None,
            page_size_option: None,
            config,
        }
    }

    /// Where the page token goes
    #[must_use]
    pub fn with_page_token_option(mut self, option: PageTokenOption) -> Self {
        self.page_token_option = Some(option);
        self
    }

    /// Where the page size goes
    #[must_use]
    pub fn with_page_size_option(mut self, option: RequestOption) -> Self {
        self.page_size_option = Some(option);
        self
    }

    /// The wrapped strategy
    pub fn strategy(&self) -> &Pagination {
        &self.strategy
    }
}

impl Paginator for DefaultPaginator {
    fn initial_token(&self) -> Option<JsonValue> {
        self.strategy.initial_token()
    }

    fn next_page_token(
        &mut self,
        response: &HttpResponse,
        last_page_size: usize,
        last_record: Option<&Record>,
    ) -> Result<Option<JsonValue>> {
        self.strategy
            .next_page_token(response, last_page_size, last_record)
    }

    fn reset(&mut self, value: Option<JsonValue>) -> Result<()> {
        self.strategy.reset(value)
    }

    fn request_path(&self, token: Option<&JsonValue>) -> Option<String> {
        match (&self.page_token_option, token) {
            (Some(PageTokenOption::RequestPath), Some(token)) => Some(value_to_string(token)),
            _ => None,
        }
    }

    fn request_options(&self, location: InjectInto, token: Option<&JsonValue>) -> Result<JsonObject> {
        let mut options = JsonObject::new();

        if let (Some(PageTokenOption::RequestOption(option)), Some(token)) =
            (&self.page_token_option, token)
        {
            option.inject(location, token, &self.config, &mut options)?;
        }

        if let (Some(option), Some(page_size)) = (&self.page_size_option, self.strategy.page_size()) {
            option.inject(location, &JsonValue::from(page_size), &self.config, &mut options)?;
        }

        Ok(options)
    }
}
