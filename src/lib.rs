// Allow common clippy pedantic lints that aren't critical for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::ref_option)]
#![allow(clippy::unused_self)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::needless_pass_by_value)]

//! # Solidafy Builder
//!
//! Declarative connector manifests, and bounded test reads to develop them.
//!
//! A manifest describes how to fetch a stream: requester, authenticator,
//! record selector, paginator and partition router, with `{{ ... }}`
//! templates resolved against the user config. The builder runs a
//! manifest under strict limits and reports every request, response and
//! record it saw, with secrets masked.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use solidafy_builder::builder::{get_limits, read_stream};
//! use solidafy_builder::manifest::load_manifest;
//! use solidafy_builder::secrets::SecretRegistry;
//!
//! #[tokio::main]
//! async fn main() -> solidafy_builder::Result<()> {
//!     let manifest = load_manifest("manifests/tickets.yaml")?;
//!     let config = serde_json::json!({ "api_token": "..." });
//!
//!     let limits = get_limits(&config)?;
//!     let message = read_stream(&manifest, &config, "tickets", None, limits, &SecretRegistry::new()).await?;
//!     println!("{}", serde_json::to_string(&message)?);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                Builder (bounded test read)                      │
//! │  handle_request → TestReader → LimitedRetriever → StreamRead    │
//! └─────────────────────────────────────────────────────────────────┘
//!                                │
//! ┌──────────┬───────────┬───────┴───────┬───────────┬─────────────┐
//! │   Auth   │   HTTP    │   Paginate    │ Partition │  Inference  │
//! ├──────────┼───────────┼───────────────┼───────────┼─────────────┤
//! │ API Key  │ Retry     │ Cursor        │ Single    │ Schema      │
//! │ Bearer   │ Backoff   │ Page Incr.    │ List      │ Datetime    │
//! │ Basic    │ Cache     │ Offset Incr.  │           │             │
//! │ OAuth2   │           │               │           │             │
//! └──────────┴───────────┴───────────────┴───────────┴─────────────┘
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types
pub mod error;

/// Common types and type aliases
pub mod types;

/// Template interpolation
pub mod interpolation;

/// Stream slices and records
pub mod slice;

/// Request option injection
pub mod request_option;

/// Secret discovery and masking
pub mod secrets;

/// Authentication implementations
pub mod auth;

/// Backoff strategies
pub mod backoff;

/// HTTP client with retry and backoff
pub mod http;

/// Pagination strategies
pub mod pagination;

/// Partition routing
pub mod partition;

/// Request building and record selection
pub mod retriever;

/// Manifest model and component factory
pub mod manifest;

/// Schema and datetime format inference
pub mod schema;

/// Bounded test reads
pub mod builder;

/// Command-line interface
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, Result};
pub use types::*;

pub use builder::{handle_request, StreamRead, TestReadLimits, TestReader};
pub use manifest::{load_manifest, load_manifest_from_str, DeclarativeManifest};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
