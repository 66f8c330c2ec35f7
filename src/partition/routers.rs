//! Partition router implementations
//!
//! Each router handles a specific partitioning strategy.

use super::types::PartitionRouter;
use crate::error::{Error, Result};
use crate::interpolation::{InterpolatedString, InterpolationContext};
use crate::request_option::{InjectInto, RequestOption};
use crate::slice::StreamSlice;
use crate::types::{Config, JsonObject, JsonValue, StreamState};

// ============================================================================
// Single Partition Router
// ============================================================================

/// No partitioning: one empty slice and no request contributions.
///
/// Used whenever a stream declares no router.
#[derive(Debug, Clone, Copy, Default)]
pub struct SinglePartitionRouter;

impl PartitionRouter for SinglePartitionRouter {
    fn stream_slices(&self) -> Result<Vec<StreamSlice>> {
        Ok(vec![StreamSlice::empty()])
    }

    fn request_options(
        &self,
        _location: InjectInto,
        _stream_state: Option<&StreamState>,
        _stream_slice: &StreamSlice,
        _next_page_token: Option<&JsonValue>,
    ) -> Result<JsonObject> {
        Ok(JsonObject::new())
    }

    fn set_initial_state(&mut self, _stream_state: StreamState) {}

    fn get_stream_state(&self) -> Option<StreamState> {
        None
    }
}

// ============================================================================
// List Partition Router
// ============================================================================

/// List-based partition router
///
/// Creates one slice per value, keyed by the cursor field. The values may be
/// given literally or as a template that evaluates to a list.
#[derive(Debug, Clone)]
pub struct ListPartitionRouter {
    /// Partition values
    values: Vec<JsonValue>,
    /// Slice key holding the value
    cursor_field: String,
    /// Optionally send the value with each request
    request_option: Option<RequestOption>,
    config: Config,
}

impl ListPartitionRouter {
    /// Create a router over literal values
    pub fn new(values: Vec<JsonValue>, cursor_field: impl Into<String>, config: Config) -> Self {
        Self {
            values,
            cursor_field: cursor_field.into(),
            request_option: None,
            config,
        }
    }

    /// Create from manifest values: a list, or a template evaluating to one.
    ///
    /// The cursor field may also be a template.
    pub fn from_config(values: &JsonValue, cursor_field: &str, config: &Config) -> Result<Self> {
        let ctx = InterpolationContext::new(config);
        let resolved = match values {
            JsonValue::String(template) => InterpolatedString::new(template.as_str()).eval(&ctx)?,
            other => other.clone(),
        };
        let values = match resolved {
            JsonValue::Array(items) => items,
            // A template rendering Python-style list text
            JsonValue::String(text) => serde_json::from_str::<Vec<JsonValue>>(&text.replace('\'', "\""))
                .map_err(|_| {
                    Error::invalid_value("values", format!("'{text}' does not evaluate to a list"))
                })?,
            other => {
                return Err(Error::invalid_value(
                    "values",
                    format!("{other} does not evaluate to a list"),
                ))
            }
        };
        let cursor_field = InterpolatedString::new(cursor_field).eval_string(&ctx)?;
        if cursor_field.is_empty() {
            return Err(Error::missing_field("cursor_field"));
        }
        Ok(Self::new(values, cursor_field, config.clone()))
    }

    /// Send the slice value with each request
    #[must_use]
    pub fn with_request_option(mut self, option: RequestOption) -> Self {
        self.request_option = Some(option);
        self
    }

    /// Slice key holding the value
    pub fn cursor_field(&self) -> &str {
        &self.cursor_field
    }
}

impl PartitionRouter for ListPartitionRouter {
    fn stream_slices(&self) -> Result<Vec<StreamSlice>> {
        Ok(self
            .values
            .iter()
            .map(|value| {
                let mut partition = JsonObject::new();
                partition.insert(self.cursor_field.clone(), value.clone());
                StreamSlice::from_partition(partition)
            })
            .collect())
    }

    fn request_options(
        &self,
        location: InjectInto,
        _stream_state: Option<&StreamState>,
        stream_slice: &StreamSlice,
        _next_page_token: Option<&JsonValue>,
    ) -> Result<JsonObject> {
        let mut options = JsonObject::new();
        if let (Some(option), Some(value)) = (
            &self.request_option,
            stream_slice.partition().get(&self.cursor_field),
        ) {
            option.inject(location, value, &self.config, &mut options)?;
        }
        Ok(options)
    }

    fn set_initial_state(&mut self, _stream_state: StreamState) {}

    fn get_stream_state(&self) -> Option<StreamState> {
        None
    }
}

// ============================================================================
// Resolved variants
// ============================================================================

/// A partition router selected from the manifest
#[derive(Debug, Clone)]
pub enum Router {
    Single(SinglePartitionRouter),
    List(ListPartitionRouter),
}

impl Default for Router {
    fn default() -> Self {
        Router::Single(SinglePartitionRouter)
    }
}

impl Router {
    fn router(&self) -> &dyn PartitionRouter {
        match self {
            Router::Single(r) => r,
            Router::List(r) => r,
        }
    }
}

impl PartitionRouter for Router {
    fn stream_slices(&self) -> Result<Vec<StreamSlice>> {
        self.router().stream_slices()
    }

    fn request_options(
        &self,
        location: InjectInto,
        stream_state: Option<&StreamState>,
        stream_slice: &StreamSlice,
        next_page_token: Option<&JsonValue>,
    ) -> Result<JsonObject> {
        self.router()
            .request_options(location, stream_state, stream_slice, next_page_token)
    }

    fn set_initial_state(&mut self, stream_state: StreamState) {
        match self {
            Router::Single(r) => r.set_initial_state(stream_state),
            Router::List(r) => r.set_initial_state(stream_state),
        }
    }

    fn get_stream_state(&self) -> Option<StreamState> {
        self.router().get_stream_state()
    }
}
