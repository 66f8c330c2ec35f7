//! Simple retriever
//!
//! Reads a stream slice by slice, page by page: renders the request,
//! sends it, selects records and asks the paginator for the next token.

use super::requester::{RequestParts, Requester};
use super::selector::RecordSelector;
use super::types::{PageFetch, Retriever};
use crate::error::Result;
use crate::http::HttpClient;
use crate::interpolation::InterpolationContext;
use crate::pagination::{PaginationCursor, Paginator};
use crate::partition::PartitionRouter;
use crate::request_option::InjectInto;
use crate::slice::StreamSlice;
use crate::types::{Config, JsonObject, JsonValue, StreamState};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Retriever composing a requester, router, paginator and selector
pub struct SimpleRetriever {
    name: String,
    requester: Requester,
    router: Box<dyn PartitionRouter>,
    paginator: Box<dyn Paginator>,
    selector: RecordSelector,
    client: Arc<HttpClient>,
    config: Config,
    stream_state: StreamState,
}

impl SimpleRetriever {
    /// Create a retriever
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: impl Into<String>,
        requester: Requester,
        router: Box<dyn PartitionRouter>,
        paginator: Box<dyn Paginator>,
        selector: RecordSelector,
        client: Arc<HttpClient>,
        config: Config,
    ) -> Self {
        Self {
            name: name.into(),
            requester,
            router,
            paginator,
            selector,
            client,
            config,
            stream_state: StreamState::new(),
        }
    }

    /// Seed the stream state before reading
    pub fn set_initial_state(&mut self, state: StreamState) {
        self.router.set_initial_state(state.clone());
        self.stream_state = state;
    }

    /// The HTTP client
    pub fn client(&self) -> &Arc<HttpClient> {
        &self.client
    }

    fn page_context(&self, slice: &StreamSlice, token: Option<&JsonValue>) -> InterpolationContext<'_> {
        let next_page_token = match token {
            Some(token) => {
                let mut wrapped = JsonObject::new();
                wrapped.insert("next_page_token".to_string(), token.clone());
                JsonValue::Object(wrapped)
            }
            None => JsonValue::Object(JsonObject::new()),
        };
        InterpolationContext::new(&self.config)
            .with("stream_slice", slice.to_value())
            .with("stream_partition", JsonValue::Object(slice.partition().clone()))
            .with("stream_interval", JsonValue::Object(slice.cursor_slice().clone()))
            .with("stream_state", JsonValue::Object(self.stream_state.clone()))
            .with("next_page_token", next_page_token)
    }

    fn request_parts(&self, slice: &StreamSlice, token: Option<&JsonValue>) -> Result<RequestParts> {
        let state = Some(&self.stream_state);
        let mut parts = RequestParts {
            params: self.router.get_request_params(state, slice, token)?,
            headers: self.router.get_request_headers(state, slice, token)?,
            body_data: self.router.get_request_body_data(state, slice, token)?,
            body_json: self.router.get_request_body_json(state, slice, token)?,
        };
        parts.merge(RequestParts {
            params: self
                .paginator
                .request_options(InjectInto::RequestParameter, token)?,
            headers: self.paginator.request_options(InjectInto::Header, token)?,
            body_data: self.paginator.request_options(InjectInto::BodyData, token)?,
            body_json: self.paginator.request_options(InjectInto::BodyJson, token)?,
        });
        Ok(parts)
    }
}

impl std::fmt::Debug for SimpleRetriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimpleRetriever")
            .field("name", &self.name)
            .field("requester", &self.requester)
            .field("router", &self.router)
            .field("paginator", &self.paginator)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Retriever for SimpleRetriever {
    fn name(&self) -> &str {
        &self.name
    }

    fn stream_slices(&self) -> Result<Vec<StreamSlice>> {
        self.router.stream_slices()
    }

    fn start_slice(&mut self, slice: &StreamSlice) -> Result<PaginationCursor> {
        debug!(stream = %self.name, slice = %slice.to_value(), "Starting slice");
        self.paginator.reset(None)?;
        Ok(PaginationCursor::new(self.paginator.initial_token()))
    }

    async fn fetch_next_page(
        &mut self,
        slice: &Arc<StreamSlice>,
        cursor: &mut PaginationCursor,
    ) -> Result<PageFetch> {
        let token = cursor.token().cloned();
        let request = {
            let ctx = self.page_context(slice, token.as_ref());
            let parts = self.request_parts(slice, token.as_ref())?;
            let path = self.paginator.request_path(token.as_ref());
            self.requester.build_request(&ctx, path.as_deref(), parts)?
        };

        let exchange = self.client.send(request).await?;

        let records = {
            let ctx = self.page_context(slice, token.as_ref());
            self.selector
                .select(&exchange.response, &ctx, slice)
                .map_err(|e| e.with_exchange(exchange.request.clone(), exchange.response.clone()))?
        };

        let next = self
            .paginator
            .next_page_token(&exchange.response, records.len(), records.last())
            .map_err(|e| e.with_exchange(exchange.request.clone(), exchange.response.clone()))?;

        debug!(
            stream = %self.name,
            page = cursor.pages_fetched() + 1,
            records = records.len(),
            has_next = next.is_some(),
            "Fetched page"
        );
        cursor.advance(next);

        Ok(PageFetch {
            records,
            request: exchange.request,
            response: exchange.response,
        })
    }

    fn stream_state(&self) -> Option<StreamState> {
        self.router.get_stream_state()
    }

    fn disable_cache(&self) {
        self.client.disable_cache();
    }
}
