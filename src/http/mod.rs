//! HTTP transport module
//!
//! Provides the HTTP client with retry, backoff and caching, plus the
//! request/response snapshot types recorded in test read reports.
//!
//! # Features
//!
//! - **Automatic Retries**: 429, 5xx and transport failures are retried
//! - **Backoff Strategies**: waits come from a pluggable `BackoffStrategy`
//! - **Authentication**: Integration with auth module
//! - **Side channel**: token refreshes land in an `ExchangeObserver`

mod client;
mod observer;
mod types;

pub use client::{execute, Exchange, HttpClient, HttpClientConfig, HttpClientConfigBuilder};
pub use observer::{AuxiliaryRequest, ExchangeObserver};
pub use types::{join_url, parse_link_header, HttpRequest, HttpResponse};

#[cfg(test)]
mod tests;
