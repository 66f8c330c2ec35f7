//! Retriever types and traits

use crate::error::Result;
use crate::http::{HttpRequest, HttpResponse};
use crate::pagination::PaginationCursor;
use crate::slice::{Record, StreamSlice};
use crate::types::StreamState;
use async_trait::async_trait;
use std::sync::Arc;

/// One fetched page
#[derive(Debug, Clone)]
pub struct PageFetch {
    /// Records extracted from the page
    pub records: Vec<Record>,
    /// The request as sent
    pub request: HttpRequest,
    /// The response received
    pub response: HttpResponse,
}

/// Fetches a stream one page at a time, one slice at a time
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Stream name
    fn name(&self) -> &str;

    /// Slices to read, in order
    fn stream_slices(&self) -> Result<Vec<StreamSlice>>;

    /// Reset pagination for a new slice and return its cursor
    fn start_slice(&mut self, slice: &StreamSlice) -> Result<PaginationCursor>;

    /// Fetch the page the cursor points at and advance the cursor.
    ///
    /// Errors carry the request (and response, when one was received).
    async fn fetch_next_page(
        &mut self,
        slice: &Arc<StreamSlice>,
        cursor: &mut PaginationCursor,
    ) -> Result<PageFetch>;

    /// Current stream state, if any is tracked
    fn stream_state(&self) -> Option<StreamState>;

    /// Stop using the response cache
    fn disable_cache(&self);
}
