//! Retriever decorator enforcing test read ceilings

use super::types::TestReadLimits;
use crate::error::Result;
use crate::pagination::PaginationCursor;
use crate::retriever::{PageFetch, Retriever};
use crate::slice::StreamSlice;
use crate::types::StreamState;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Wraps a retriever so that at most `max_slices` partitions are listed
/// and at most `max_pages_per_slice` pages are fetched per partition.
///
/// The wrapped retriever's response cache is disabled on construction.
pub struct LimitedRetriever<R> {
    inner: R,
    max_slices: usize,
    max_pages_per_slice: usize,
}

impl<R: Retriever> LimitedRetriever<R> {
    /// Wrap `inner` under `limits`
    pub fn new(inner: R, limits: &TestReadLimits) -> Self {
        inner.disable_cache();
        Self {
            inner,
            max_slices: limits.max_slices,
            max_pages_per_slice: limits.max_pages_per_slice,
        }
    }

    /// The wrapped retriever
    pub fn into_inner(self) -> R {
        self.inner
    }
}

#[async_trait]
impl<R: Retriever> Retriever for LimitedRetriever<R> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn stream_slices(&self) -> Result<Vec<StreamSlice>> {
        let mut slices = self.inner.stream_slices()?;
        if slices.len() > self.max_slices {
            debug!(
                stream = %self.inner.name(),
                available = slices.len(),
                max_slices = self.max_slices,
                "Truncating slices"
            );
            slices.truncate(self.max_slices);
        }
        Ok(slices)
    }

    fn start_slice(&mut self, slice: &StreamSlice) -> Result<PaginationCursor> {
        self.inner.start_slice(slice)
    }

    async fn fetch_next_page(
        &mut self,
        slice: &Arc<StreamSlice>,
        cursor: &mut PaginationCursor,
    ) -> Result<PageFetch> {
        let page = self.inner.fetch_next_page(slice, cursor).await?;
        if cursor.has_more() && cursor.pages_fetched() >= self.max_pages_per_slice {
            debug!(
                stream = %self.inner.name(),
                pages = cursor.pages_fetched(),
                "Page limit reached for slice"
            );
            cursor.exhaust();
        }
        Ok(page)
    }

    fn stream_state(&self) -> Option<StreamState> {
        self.inner.stream_state()
    }

    fn disable_cache(&self) {
        self.inner.disable_cache();
    }
}
