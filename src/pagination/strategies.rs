//! Pagination strategy implementations
//!
//! Each strategy handles a specific pagination pattern.

use super::types::PaginationStrategy;
use crate::error::{Error, Result};
use crate::http::HttpResponse;
use crate::interpolation::{
    kind_name, InterpolatedBoolean, InterpolatedString, InterpolationContext, ValueKind,
};
use crate::slice::Record;
use crate::types::{as_integer, Config, JsonValue};
use tracing::debug;

/// Resolve a page size that may be a number or a template.
///
/// Anything that does not resolve to an integer is a configuration error.
fn resolve_page_size(raw: Option<&JsonValue>, config: &Config) -> Result<Option<i64>> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let value = match raw {
        JsonValue::String(template) => InterpolatedString::new(template.as_str())
            .eval_as(&InterpolationContext::new(config), &[ValueKind::Integer])?,
        other => other.clone(),
    };
    as_integer(&value).map(Some).ok_or_else(|| {
        Error::invalid_value(
            "page_size",
            format!("{value} is of type {}, expected integer", kind_name(&value)),
        )
    })
}

/// Whether an evaluated cursor means "no next page".
///
/// Falsy literal strings such as `"false"` are real cursor values.
fn is_empty_cursor(token: &JsonValue) -> bool {
    match token {
        JsonValue::Null => true,
        JsonValue::Bool(b) => !b,
        JsonValue::Number(n) => n.as_f64() == Some(0.0),
        JsonValue::String(s) => s.is_empty(),
        JsonValue::Array(items) => items.is_empty(),
        JsonValue::Object(map) => map.is_empty(),
    }
}

/// Resolve a reset value to an integer position
fn reset_position(value: &JsonValue, strategy: &str) -> Result<i64> {
    as_integer(value).ok_or_else(|| {
        Error::pagination(format!(
            "Reset value {value} for {strategy} pagination strategy was not an integer"
        ))
    })
}

/// Page-size based end-of-data check shared by the counter strategies
fn is_last_page(page_size: Option<i64>, last_page_size: usize) -> bool {
    let short = page_size.is_some_and(|size| {
        size > 0 && i64::try_from(last_page_size).map_or(false, |n| n < size)
    });
    short || last_page_size == 0
}

// ============================================================================
// Cursor Pagination
// ============================================================================

/// Cursor-based pagination (e.g., Stripe, Slack, link headers)
///
/// The next token is a template evaluated against the decoded response,
/// the response headers (with the parsed `Link` header under `link`), the
/// last record and the last page size.
#[derive(Debug, Clone)]
pub struct CursorPaginationStrategy {
    cursor_value: InterpolatedString,
    stop_condition: Option<InterpolatedBoolean>,
    page_size: Option<i64>,
    config: Config,
    initial_cursor: Option<JsonValue>,
}

impl CursorPaginationStrategy {
    /// Create from a cursor template
    pub fn new(cursor_value: impl Into<InterpolatedString>, config: Config) -> Self {
        Self {
            cursor_value: cursor_value.into(),
            stop_condition: None,
            page_size: None,
            config,
            initial_cursor: None,
        }
    }

    /// Stop paginating when this condition is true
    #[must_use]
    pub fn with_stop_condition(mut self, condition: InterpolatedBoolean) -> Self {
        self.stop_condition = Some(condition);
        self
    }

    /// Set the page size
    #[must_use]
    pub fn with_page_size(mut self, page_size: i64) -> Self {
        self.page_size = Some(page_size);
        self
    }
}

impl PaginationStrategy for CursorPaginationStrategy {
    fn initial_token(&self) -> Option<JsonValue> {
        self.initial_cursor.clone()
    }

    fn next_page_token(
        &mut self,
        response: &HttpResponse,
        last_page_size: usize,
        last_record: Option<&Record>,
    ) -> Result<Option<JsonValue>> {
        let decoded = response.json_or_empty()?;
        let ctx = InterpolationContext::new(&self.config)
            .with("response", decoded)
            .with("headers", response.headers_with_links())
            .with(
                "last_record",
                last_record.map_or(JsonValue::Null, Record::to_value),
            )
            .with("last_page_size", JsonValue::from(last_page_size));

        if let Some(condition) = &self.stop_condition {
            if condition.eval(&ctx)? {
                debug!("Stop condition met, pagination complete");
                return Ok(None);
            }
        }

        let token = self.cursor_value.eval(&ctx)?;
        if is_empty_cursor(&token) {
            return Ok(None);
        }
        Ok(Some(token))
    }

    fn reset(&mut self, value: Option<JsonValue>) -> Result<()> {
        self.initial_cursor = value;
        Ok(())
    }

    fn page_size(&self) -> Option<i64> {
        self.page_size
    }
}

// ============================================================================
// Page Increment
// ============================================================================

/// Page number pagination (e.g., `?page=2&per_page=50`)
///
/// Stops when a page comes back empty or shorter than the page size.
#[derive(Debug, Clone)]
pub struct PageIncrementStrategy {
    start_from_page: i64,
    page_size: Option<i64>,
    inject_on_first_request: bool,
    page: i64,
}

impl PageIncrementStrategy {
    /// Create with a literal page size
    pub fn new(start_from_page: i64, page_size: Option<i64>) -> Self {
        Self {
            start_from_page,
            page_size,
            inject_on_first_request: false,
            page: start_from_page,
        }
    }

    /// Create with a page size that may be a template, resolved now
    pub fn from_config(
        start_from_page: i64,
        page_size: Option<&JsonValue>,
        config: &Config,
    ) -> Result<Self> {
        Ok(Self::new(start_from_page, resolve_page_size(page_size, config)?))
    }

    /// Send the starting page with the first request
    #[must_use]
    pub fn inject_on_first_request(mut self, inject: bool) -> Self {
        self.inject_on_first_request = inject;
        self
    }
}

impl PaginationStrategy for PageIncrementStrategy {
    fn initial_token(&self) -> Option<JsonValue> {
        self.inject_on_first_request
            .then(|| JsonValue::from(self.page))
    }

    fn next_page_token(
        &mut self,
        _response: &HttpResponse,
        last_page_size: usize,
        _last_record: Option<&Record>,
    ) -> Result<Option<JsonValue>> {
        if is_last_page(self.page_size, last_page_size) {
            return Ok(None);
        }
        self.page += 1;
        Ok(Some(JsonValue::from(self.page)))
    }

    fn reset(&mut self, value: Option<JsonValue>) -> Result<()> {
        self.page = match value {
            None => self.start_from_page,
            Some(value) => reset_position(&value, "PageIncrement")?,
        };
        Ok(())
    }

    fn page_size(&self) -> Option<i64> {
        self.page_size
    }
}

// ============================================================================
// Offset Increment
// ============================================================================

/// Offset-based pagination (e.g., `?offset=100&limit=50`)
///
/// The offset advances by the number of records in the last page.
#[derive(Debug, Clone)]
pub struct OffsetIncrementStrategy {
    page_size: Option<i64>,
    inject_on_first_request: bool,
    offset: i64,
}

impl OffsetIncrementStrategy {
    /// Create with a literal page size
    pub fn new(page_size: Option<i64>) -> Self {
        Self {
            page_size,
            inject_on_first_request: false,
            offset: 0,
        }
    }

    /// Create with a page size that may be a template, resolved now
    pub fn from_config(page_size: Option<&JsonValue>, config: &Config) -> Result<Self> {
        Ok(Self::new(resolve_page_size(page_size, config)?))
    }

    /// Send offset 0 with the first request
    #[must_use]
    pub fn inject_on_first_request(mut self, inject: bool) -> Self {
        self.inject_on_first_request = inject;
        self
    }
}

impl PaginationStrategy for OffsetIncrementStrategy {
    fn initial_token(&self) -> Option<JsonValue> {
        self.inject_on_first_request
            .then(|| JsonValue::from(self.offset))
    }

    fn next_page_token(
        &mut self,
        _response: &HttpResponse,
        last_page_size: usize,
        _last_record: Option<&Record>,
    ) -> Result<Option<JsonValue>> {
        if is_last_page(self.page_size, last_page_size) {
            return Ok(None);
        }
        self.offset += i64::try_from(last_page_size).unwrap_or(i64::MAX);
        Ok(Some(JsonValue::from(self.offset)))
    }

    fn reset(&mut self, value: Option<JsonValue>) -> Result<()> {
        self.offset = match value {
            None => 0,
            Some(value) => reset_position(&value, "OffsetIncrement")?,
        };
        Ok(())
    }

    fn page_size(&self) -> Option<i64> {
        self.page_size
    }
}

// ============================================================================
// Resolved variants
// ============================================================================

/// A pagination strategy selected from the manifest
#[derive(Debug, Clone)]
pub enum Pagination {
    Cursor(CursorPaginationStrategy),
    PageIncrement(PageIncrementStrategy),
    OffsetIncrement(OffsetIncrementStrategy),
}

impl Pagination {
    fn strategy(&self) -> &dyn PaginationStrategy {
        match self {
            Pagination::Cursor(s) => s,
            Pagination::PageIncrement(s) => s,
            Pagination::OffsetIncrement(s) => s,
        }
    }

    fn strategy_mut(&mut self) -> &mut dyn PaginationStrategy {
        match self {
            Pagination::Cursor(s) => s,
            Pagination::PageIncrement(s) => s,
            Pagination::OffsetIncrement(s) => s,
        }
    }
}

impl PaginationStrategy for Pagination {
    fn initial_token(&self) -> Option<JsonValue> {
        self.strategy().initial_token()
    }

    fn next_page_token(
        &mut self,
        response: &HttpResponse,
        last_page_size: usize,
        last_record: Option<&Record>,
    ) -> Result<Option<JsonValue>> {
        self.strategy_mut()
            .next_page_token(response, last_page_size, last_record)
    }

    fn reset(&mut self, value: Option<JsonValue>) -> Result<()> {
        self.strategy_mut().reset(value)
    }

    fn page_size(&self) -> Option<i64> {
        self.strategy().page_size()
    }
}
