//! Partition types and traits
//!
//! Defines the core partition abstractions.

use crate::error::Result;
use crate::request_option::InjectInto;
use crate::slice::StreamSlice;
use crate::types::{JsonObject, JsonValue, StreamState};

/// Trait for partition routers
///
/// A router enumerates the slices a stream is read over and contributes
/// per-slice request parameters, headers and body fields.
pub trait PartitionRouter: Send + Sync + std::fmt::Debug {
    /// Generate the slices to read, in order
    fn stream_slices(&self) -> Result<Vec<StreamSlice>>;

    /// Contribution to one part of the request for this slice
    fn request_options(
        &self,
        location: InjectInto,
        stream_state: Option<&StreamState>,
        stream_slice: &StreamSlice,
        next_page_token: Option<&JsonValue>,
    ) -> Result<JsonObject>;

    /// Seed router state (parent stream cursors) before reading
    fn set_initial_state(&mut self, stream_state: StreamState);

    /// Router state to persist, if the router tracks any
    fn get_stream_state(&self) -> Option<StreamState>;

    /// Query parameters for this slice
    fn get_request_params(
        &self,
        stream_state: Option<&StreamState>,
        stream_slice: &StreamSlice,
        next_page_token: Option<&JsonValue>,
    ) -> Result<JsonObject> {
        self.request_options(
            InjectInto::RequestParameter,
            stream_state,
            stream_slice,
            next_page_token,
        )
    }

    /// Headers for this slice
    fn get_request_headers(
        &self,
        stream_state: Option<&StreamState>,
        stream_slice: &StreamSlice,
        next_page_token: Option<&JsonValue>,
    ) -> Result<JsonObject> {
        self.request_options(InjectInto::Header, stream_state, stream_slice, next_page_token)
    }

    /// Form body fields for this slice
    fn get_request_body_data(
        &self,
        stream_state: Option<&StreamState>,
        stream_slice: &StreamSlice,
        next_page_token: Option<&JsonValue>,
    ) -> Result<JsonObject> {
        self.request_options(InjectInto::BodyData, stream_state, stream_slice, next_page_token)
    }

    /// JSON body fields for this slice
    fn get_request_body_json(
        &self,
        stream_state: Option<&StreamState>,
        stream_slice: &StreamSlice,
        next_page_token: Option<&JsonValue>,
    ) -> Result<JsonObject> {
        self.request_options(InjectInto::BodyJson, stream_state, stream_slice, next_page_token)
    }
}
