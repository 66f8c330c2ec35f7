//! Authenticator implementation
//!
//! Handles applying authentication to requests and managing token refresh.

use super::types::{AuthConfig, CachedToken, GrantType, Location, OAuth2Config};
use crate::error::{Error, Result};
use crate::http::{execute, AuxiliaryRequest, ExchangeObserver, HttpRequest, HttpResponse};
use crate::secrets::SecretRegistry;
use crate::types::{JsonValue, Method};
use base64::Engine;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Client;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Timeout for token endpoint calls
const TOKEN_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Default)]
struct TokenState {
    cached: Option<CachedToken>,
    /// Current refresh token; replaced when the endpoint rotates it
    refresh_token: Option<String>,
}

/// Authenticator handles applying authentication to HTTP requests
pub struct Authenticator {
    /// Auth configuration
    config: AuthConfig,
    /// Token state for OAuth2 auth
    state: Arc<RwLock<TokenState>>,
    /// HTTP client for token requests
    http_client: Client,
    /// Receives token requests and config updates
    observer: Option<ExchangeObserver>,
    /// Receives newly issued tokens
    secrets: Option<SecretRegistry>,
}

impl Authenticator {
    /// Create a new authenticator with the given config
    pub fn new(config: AuthConfig) -> Self {
        Self::with_client(config, Client::new())
    }

    /// Create an authenticator with a custom HTTP client
    pub fn with_client(config: AuthConfig, http_client: Client) -> Self {
        let state = initial_token_state(&config);
        Self {
            config,
            state: Arc::new(RwLock::new(state)),
            http_client,
            observer: None,
            secrets: None,
        }
    }

    /// Record token requests and config updates on this observer
    #[must_use]
    pub fn with_observer(mut self, observer: ExchangeObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Register newly issued tokens as secrets
    #[must_use]
    pub fn with_secrets(mut self, secrets: SecretRegistry) -> Self {
        self.secrets = Some(secrets);
        self
    }

    /// Apply authentication to a request
    pub async fn apply(&self, request: HttpRequest) -> Result<HttpRequest> {
        match &self.config {
            AuthConfig::None => Ok(request),

            AuthConfig::ApiKey {
                location,
                name,
                prefix,
                value,
            } => {
                let val = format!("{}{}", prefix.as_deref().unwrap_or(""), value);
                match location {
                    Location::Header => Ok(request.with_header(name.as_str(), val)),
                    Location::Query => request.with_query([(name.as_str(), val.as_str())]),
                }
            }

            AuthConfig::Basic { username, password } => {
                let encoded = base64::engine::general_purpose::STANDARD
                    .encode(format!("{username}:{password}"));
                Ok(request.with_header("Authorization", format!("Basic {encoded}")))
            }

            AuthConfig::Bearer { token } => {
                Ok(request.with_header("Authorization", format!("Bearer {token}")))
            }

            AuthConfig::OAuth2(oauth) => {
                let token = self.get_or_refresh_token(oauth).await?;
                Ok(request.with_header("Authorization", format!("Bearer {token}")))
            }
        }
    }

    /// Get a valid token, refreshing if necessary
    async fn get_or_refresh_token(&self, oauth: &OAuth2Config) -> Result<String> {
        // Check if we have a valid cached token
        {
            let state = self.state.read().await;
            if let Some(token) = state.cached.as_ref() {
                if !token.is_expired() {
                    return Ok(token.token.clone());
                }
            }
        }

        // Need to refresh - acquire write lock
        let mut state = self.state.write().await;

        // Double-check after acquiring write lock
        if let Some(token) = state.cached.as_ref() {
            if !token.is_expired() {
                return Ok(token.token.clone());
            }
        }

        let new_token = self.refresh(oauth, &mut state).await?;
        let token_str = new_token.token.clone();
        state.cached = Some(new_token);

        Ok(token_str)
    }

    /// Call the token endpoint and apply rotation
    async fn refresh(&self, oauth: &OAuth2Config, state: &mut TokenState) -> Result<CachedToken> {
        let mut form = BTreeMap::new();
        match &oauth.grant_type {
            GrantType::RefreshToken { .. } => {
                form.insert("grant_type".to_string(), "refresh_token".to_string());
                form.insert(
                    "refresh_token".to_string(),
                    state.refresh_token.clone().unwrap_or_default(),
                );
            }
            GrantType::ClientCredentials => {
                form.insert("grant_type".to_string(), "client_credentials".to_string());
            }
        }
        form.insert("client_id".to_string(), oauth.client_id.clone());
        form.insert("client_secret".to_string(), oauth.client_secret.clone());
        if !oauth.scopes.is_empty() {
            form.insert("scope".to_string(), oauth.scopes.join(" "));
        }
        for (key, value) in &oauth.refresh_request_body {
            form.insert(key.clone(), value.clone());
        }

        let request = HttpRequest::new(Method::POST, oauth.token_url.as_str()).with_form_body(&form);
        debug!(url = %oauth.token_url, "Requesting access token");
        let outcome = execute(&self.http_client, &request, TOKEN_REQUEST_TIMEOUT).await;

        if let Some(observer) = &self.observer {
            observer.record_auxiliary(AuxiliaryRequest {
                title: "Refresh token".to_string(),
                description: "Obtains access token".to_string(),
                request: request.clone(),
                response: outcome.as_ref().ok().cloned(),
            });
        }

        let response = outcome.map_err(|e| {
            Error::TokenRefresh {
                message: format!("Token request failed: {e}"),
            }
            .with_request(request.clone())
        })?;

        if !response.is_success() {
            return Err(Error::TokenRefresh {
                message: format!(
                    "Token request failed with status {}: {}",
                    response.status, response.body
                ),
            }
            .with_request(request));
        }

        self.handle_token_response(oauth, state, &response)
    }

    fn handle_token_response(
        &self,
        oauth: &OAuth2Config,
        state: &mut TokenState,
        response: &HttpResponse,
    ) -> Result<CachedToken> {
        let body = response.json()?;
        let access_token = body
            .get(&oauth.access_token_name)
            .and_then(JsonValue::as_str)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::TokenRefresh {
                message: format!(
                    "Token response has no '{}' field",
                    oauth.access_token_name
                ),
            })?
            .to_string();

        let expires_in = body.get(&oauth.expires_in_name).and_then(|v| match v {
            JsonValue::Number(n) => n.as_i64(),
            JsonValue::String(s) => s.trim().parse().ok(),
            _ => None,
        });
        let token = match expires_in {
            Some(secs) => CachedToken::expires_in(access_token.clone(), secs),
            None => CachedToken::new(access_token.clone(), None),
        };

        let rotated = body
            .get(&oauth.refresh_token_name)
            .and_then(JsonValue::as_str)
            .filter(|t| !t.is_empty())
            .map(str::to_string);

        if let Some(secrets) = &self.secrets {
            secrets.add(access_token.as_str());
            if let Some(rotated) = &rotated {
                secrets.add(rotated.as_str());
            }
        }

        if let Some(mut updater) = oauth.refresh_token_updater.clone() {
            if let Some(rotated) = &rotated {
                state.refresh_token = Some(rotated.clone());
            }
            // Start from the previously published config so successive rotations accumulate
            if let Some(latest) = self
                .observer
                .as_ref()
                .and_then(ExchangeObserver::latest_config_update)
            {
                updater.config = latest;
            }
            let refresh_path = updater.refresh_token_config_path.clone();
            let access_path = updater.access_token_config_path.clone();
            let expiry_path = updater.token_expiry_date_config_path.clone();
            if let Some(refresh_token) = &state.refresh_token {
                updater.set(&refresh_path, JsonValue::String(refresh_token.clone()));
            }
            updater.set(&access_path, JsonValue::String(access_token));
            if let Some(expires_at) = token.expires_at {
                updater.set(
                    &expiry_path,
                    JsonValue::String(expires_at.to_rfc3339_opts(SecondsFormat::Secs, true)),
                );
            }
            info!("Access token refreshed, publishing updated config");
            if let Some(observer) = &self.observer {
                observer.update_config(updater.config);
            }
        }

        Ok(token)
    }

    /// Clear the cached token (useful for testing or forced refresh)
    pub async fn clear_cache(&self) {
        self.state.write().await.cached = None;
    }

    /// Get the current auth config
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match &self.config {
            AuthConfig::None => "none",
            AuthConfig::ApiKey { .. } => "api_key",
            AuthConfig::Basic { .. } => "basic",
            AuthConfig::Bearer { .. } => "bearer",
            AuthConfig::OAuth2(_) => "oauth2",
        };
        f.debug_struct("Authenticator")
            .field("kind", &kind)
            .field("has_observer", &self.observer.is_some())
            .finish_non_exhaustive()
    }
}

/// Seed the token state from the config: the initial refresh token, and a
/// still-valid access token previously written back by rotation.
fn initial_token_state(config: &AuthConfig) -> TokenState {
    let AuthConfig::OAuth2(oauth) = config else {
        return TokenState::default();
    };

    let mut state = TokenState::default();
    if let GrantType::RefreshToken { refresh_token } = &oauth.grant_type {
        state.refresh_token = Some(refresh_token.clone());
    }

    if let Some(updater) = &oauth.refresh_token_updater {
        if let Some(rotated) = updater.get(&updater.refresh_token_config_path) {
            state.refresh_token = Some(rotated.to_string());
        }
        let access = updater.get(&updater.access_token_config_path);
        let expiry = updater
            .get(&updater.token_expiry_date_config_path)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc));
        if let (Some(access), Some(expiry)) = (access, expiry) {
            let token = CachedToken::new(access.to_string(), Some(expiry));
            if !token.is_expired() {
                state.cached = Some(token);
            }
        }
    }
    state
}
