//! Authentication module
//!
//! Supports: API Key, Basic, Bearer, OAuth2 (refresh token with optional
//! rotation, client credentials)
//!
//! The `Authenticator` applies credentials to outbound request snapshots and
//! manages token caching for OAuth2. Token endpoint calls are recorded as
//! auxiliary requests, and rotated tokens are written back into a config copy
//! that is published as the latest config update.

mod authenticator;
mod types;

pub use authenticator::Authenticator;
pub use types::{
    AuthConfig, CachedToken, GrantType, Location, OAuth2Config, RefreshTokenUpdater,
};
