//! HTTP client with retry and response caching
//!
//! Provides an HTTP client that handles:
//! - Automatic retries driven by a pluggable backoff strategy
//! - Authentication of every outbound request
//! - An in-memory response cache that exploratory reads switch off
//! - Error classification for retry decisions

use super::types::{HttpRequest, HttpResponse};
use crate::auth::Authenticator;
use crate::backoff::{BackoffChain, BackoffStrategy, Outcome};
use crate::error::{is_retryable_status, Error, Result};
use reqwest::Client;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, warn};

/// Configuration for the HTTP client
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Request timeout
    pub timeout: Duration,
    /// Maximum number of retries after the first attempt
    pub max_retries: u32,
    /// Default headers for all requests
    pub default_headers: BTreeMap<String, String>,
    /// User agent string
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_retries: 5,
            default_headers: BTreeMap::new(),
            user_agent: format!("solidafy-builder/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl HttpClientConfig {
    /// Create a new config builder
    pub fn builder() -> HttpClientConfigBuilder {
        HttpClientConfigBuilder::default()
    }
}

/// Builder for HTTP client config
#[derive(Default)]
pub struct HttpClientConfigBuilder {
    config: HttpClientConfig,
}

impl HttpClientConfigBuilder {
    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set max retries
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.max_retries = retries;
        self
    }

    /// Add a default header
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.default_headers.insert(key.into(), value.into());
        self
    }

    /// Set user agent
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.config.user_agent = agent.into();
        self
    }

    /// Build the config
    pub fn build(self) -> HttpClientConfig {
        self.config
    }
}

/// A completed request/response pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    /// The request as finally sent, credentials applied
    pub request: HttpRequest,
    /// The successful response
    pub response: HttpResponse,
}

/// HTTP client with retry and caching
pub struct HttpClient {
    client: Client,
    config: HttpClientConfig,
    backoff: Arc<dyn BackoffStrategy>,
    authenticator: Option<Arc<Authenticator>>,
    cache: Mutex<HashMap<String, HttpResponse>>,
    cache_enabled: AtomicBool,
}

impl HttpClient {
    /// Create a new HTTP client with default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(HttpClientConfig::default())
    }

    /// Create a new HTTP client with custom configuration
    pub fn with_config(config: HttpClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()?;

        Ok(Self {
            client,
            config,
            backoff: Arc::new(BackoffChain::default()),
            authenticator: None,
            cache: Mutex::new(HashMap::new()),
            cache_enabled: AtomicBool::new(true),
        })
    }

    /// Set the backoff strategy used between retries
    #[must_use]
    pub fn with_backoff(mut self, backoff: Arc<dyn BackoffStrategy>) -> Self {
        self.backoff = backoff;
        self
    }

    /// Set the authenticator
    #[must_use]
    pub fn with_authenticator(mut self, authenticator: Arc<Authenticator>) -> Self {
        self.authenticator = Some(authenticator);
        self
    }

    /// Get the underlying reqwest client
    pub fn inner(&self) -> &Client {
        &self.client
    }

    /// Maximum retries after the first attempt
    pub fn max_retries(&self) -> u32 {
        self.config.max_retries
    }

    /// Stop serving and storing cached responses
    pub fn disable_cache(&self) {
        self.cache_enabled.store(false, Ordering::SeqCst);
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Whether the response cache is in use
    pub fn cache_enabled(&self) -> bool {
        self.cache_enabled.load(Ordering::SeqCst)
    }

    /// Send a request, retrying retryable failures.
    ///
    /// Every error returned carries the final request snapshot.
    pub async fn send(&self, request: HttpRequest) -> Result<Exchange> {
        let mut request = request;
        for (key, value) in &self.config.default_headers {
            request
                .headers
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }

        let request = match &self.authenticator {
            Some(auth) => {
                let snapshot = request.clone();
                auth.apply(request)
                    .await
                    .map_err(|e| e.with_request(snapshot))?
            }
            None => request,
        };

        let cache_key = request.cache_key();
        if self.cache_enabled() {
            let cached = self
                .cache
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .get(&cache_key)
                .cloned();
            if let Some(response) = cached {
                debug!(url = %request.url, "Serving response from cache");
                return Ok(Exchange { request, response });
            }
        }

        let response = self
            .send_with_retries(&request)
            .await
            .map_err(|e| e.with_request(request.clone()))?;

        if self.cache_enabled() {
            self.cache
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(cache_key, response.clone());
        }
        Ok(Exchange { request, response })
    }

    /// Errors that follow a received response carry that response.
    async fn send_with_retries(&self, request: &HttpRequest) -> Result<HttpResponse> {
        let max_retries = self.config.max_retries;
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            let result = execute(&self.client, request, self.config.timeout).await;

            let last_error = match &result {
                Ok(response) if response.is_success() => {
                    debug!(method = %request.method, url = %request.url, status = response.status, "Request succeeded");
                    return result;
                }
                Ok(response) if !is_retryable_status(response.status) => {
                    return Err(Error::http_status(response.status, response.body.clone())
                        .with_exchange(request.clone(), response.clone()));
                }
                Ok(response) => format!("HTTP {}: {}", response.status, response.body),
                Err(e) if e.is_retryable() => e.to_string(),
                Err(_) => return result,
            };
            let received = result.as_ref().ok();
            let fail = |error: Error| match received {
                Some(response) => error.with_exchange(request.clone(), response.clone()),
                None => error,
            };

            if attempt > max_retries {
                return Err(fail(Error::MaxRetriesExceeded {
                    max_retries,
                    last_error,
                }));
            }

            let outcome = match &result {
                Ok(response) => Outcome::Response(response),
                Err(e) => Outcome::Error(e),
            };
            let wait = self
                .backoff
                .backoff_time(Some(outcome), attempt)
                .map_err(&fail)?;
            let Some(wait) = wait else {
                return Err(fail(Error::BackoffGaveUp {
                    attempts: attempt,
                    last_error,
                }));
            };

            warn!(
                url = %request.url,
                attempt,
                max_attempts = max_retries + 1,
                ?wait,
                "Retryable failure: {last_error}"
            );
            tokio::time::sleep(wait).await;
        }
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("config", &self.config)
            .field("backoff", &self.backoff)
            .field("has_authenticator", &self.authenticator.is_some())
            .field("cache_enabled", &self.cache_enabled())
            .finish_non_exhaustive()
    }
}

/// Send one request without retries and snapshot the response
pub async fn execute(client: &Client, request: &HttpRequest, timeout: Duration) -> Result<HttpResponse> {
    let mut builder = client
        .request(request.method.into(), request.url.as_str())
        .timeout(timeout);
    for (key, value) in &request.headers {
        builder = builder.header(key.as_str(), value.as_str());
    }
    if let Some(body) = &request.body {
        builder = builder.body(body.clone());
    }

    let response = builder.send().await?;
    let status = response.status().as_u16();

    let mut headers: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in response.headers() {
        let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
        headers
            .entry(name.as_str().to_ascii_lowercase())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert(value);
    }

    let body = response.text().await?;
    Ok(HttpResponse {
        status,
        headers,
        body,
    })
}
