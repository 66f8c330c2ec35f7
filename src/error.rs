//! Error types for Solidafy Builder
//!
//! This module defines the error hierarchy for the entire crate.
//! All public APIs return `Result<T, Error>` where Error is defined here.

use crate::http::{HttpRequest, HttpResponse};
use thiserror::Error;

/// The main error type for Solidafy Builder
#[derive(Error, Debug)]
pub enum Error {
    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Missing required config field: {field}")]
    MissingConfigField { field: String },

    #[error("Invalid config value for '{field}': {message}")]
    InvalidConfigValue { field: String, message: String },

    #[error("Invalid stream slice: {message}")]
    InvalidSlice { message: String },

    #[error("Stream slice nesting exceeds the maximum depth of {max_depth}")]
    SliceNestingTooDeep { max_depth: usize },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    // ============================================================================
    // Interpolation Errors
    // ============================================================================
    #[error("Template error: {message}")]
    Template { message: String },

    #[error("Type mismatch: {value} is of type {actual}, expected {expected}")]
    TypeMismatch {
        value: String,
        actual: String,
        expected: String,
    },

    // ============================================================================
    // Pagination Errors
    // ============================================================================
    #[error("Pagination error: {message}")]
    Pagination { message: String },

    // ============================================================================
    // Authentication Errors
    // ============================================================================
    #[error("Authentication failed: {message}")]
    Auth { message: String },

    #[error("Token refresh failed: {message}")]
    TokenRefresh { message: String },

    // ============================================================================
    // HTTP Errors
    // ============================================================================
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("Max retries ({max_retries}) exceeded, last error: {last_error}")]
    MaxRetriesExceeded { max_retries: u32, last_error: String },

    #[error("Backoff strategy gave up after {attempts} attempt(s): {last_error}")]
    BackoffGaveUp { attempts: u32, last_error: String },

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// A failure with the exchange that caused it attached, so the
    /// orchestrator can still report what was sent and received.
    #[error("{source}")]
    Request {
        request: Box<HttpRequest>,
        response: Option<Box<HttpResponse>>,
        #[source]
        source: Box<Error>,
    },

    // ============================================================================
    // Data Processing Errors
    // ============================================================================
    #[error("Failed to extract records from path '{path}': {message}")]
    RecordExtraction { path: String, message: String },

    #[error("Failed to decode response: {message}")]
    Decode { message: String },

    // ============================================================================
    // Invocation Errors
    // ============================================================================
    #[error("Unsupported command: '{command}'")]
    UnsupportedCommand { command: String },

    #[error("Stream '{stream}' not found in manifest")]
    StreamNotFound { stream: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("File not found: {path}")]
    FileNotFound { path: String },

    // ============================================================================
    // Generic Errors
    // ============================================================================
    #[error("{0}")]
    Other(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl Error {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a missing field error
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingConfigField {
            field: field.into(),
        }
    }

    /// Create an invalid config value error
    pub fn invalid_value(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfigValue {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create an invalid slice error
    pub fn invalid_slice(message: impl Into<String>) -> Self {
        Self::InvalidSlice {
            message: message.into(),
        }
    }

    /// Create a template error
    pub fn template(message: impl Into<String>) -> Self {
        Self::Template {
            message: message.into(),
        }
    }

    /// Create a type mismatch error
    pub fn type_mismatch(
        value: impl Into<String>,
        actual: impl Into<String>,
        expected: impl Into<String>,
    ) -> Self {
        Self::TypeMismatch {
            value: value.into(),
            actual: actual.into(),
            expected: expected.into(),
        }
    }

    /// Create a pagination error
    pub fn pagination(message: impl Into<String>) -> Self {
        Self::Pagination {
            message: message.into(),
        }
    }

    /// Create an auth error
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth {
            message: message.into(),
        }
    }

    /// Create an HTTP status error
    pub fn http_status(status: u16, body: impl Into<String>) -> Self {
        Self::HttpStatus {
            status,
            body: body.into(),
        }
    }

    /// Create a decode error
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Attach the outbound request to an error
    pub fn with_request(self, request: HttpRequest) -> Self {
        match self {
            Self::Request { .. } => self,
            other => Self::Request {
                request: Box::new(request),
                response: None,
                source: Box::new(other),
            },
        }
    }

    /// Attach a completed exchange to an error
    pub fn with_exchange(self, request: HttpRequest, response: HttpResponse) -> Self {
        match self {
            Self::Request { .. } => self,
            other => Self::Request {
                request: Box::new(request),
                response: Some(Box::new(response)),
                source: Box::new(other),
            },
        }
    }

    /// The outbound request attached to this error, if any
    pub fn request(&self) -> Option<&HttpRequest> {
        match self {
            Self::Request { request, .. } => Some(request),
            _ => None,
        }
    }

    /// The response attached to this error, if any
    pub fn response(&self) -> Option<&HttpResponse> {
        match self {
            Self::Request { response, .. } => response.as_deref(),
            _ => None,
        }
    }

    /// The error with any attached request stripped off
    pub fn inner(&self) -> &Error {
        match self {
            Self::Request { source, .. } => source.inner(),
            other => other,
        }
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self.inner() {
            Error::Http(e) => e.is_timeout() || e.is_connect(),
            Error::HttpStatus { status, .. } => is_retryable_status(*status),
            _ => false,
        }
    }

    /// Check if this error comes from a malformed component definition.
    ///
    /// Configuration errors abandon the affected partition during a test read.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self.inner(),
            Error::Config { .. }
                | Error::MissingConfigField { .. }
                | Error::InvalidConfigValue { .. }
                | Error::InvalidSlice { .. }
                | Error::SliceNestingTooDeep { .. }
                | Error::Template { .. }
                | Error::TypeMismatch { .. }
                | Error::Pagination { .. }
        )
    }
}

/// Check if an HTTP status code is retryable
pub(crate) fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

/// Result type alias for Solidafy Builder
pub type Result<T> = std::result::Result<T, Error>;

/// Extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, message: impl Into<String>) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", message.into(), inner))
        })
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", f(), inner))
        })
    }
}
