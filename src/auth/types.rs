//! Auth configuration types
//!
//! These types represent the runtime auth configuration after template
//! interpolation has been applied.

use crate::types::{Config, JsonValue};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Location for API key placement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Location {
    /// Place in HTTP header
    #[default]
    Header,
    /// Place in query parameter
    Query,
}

/// Authentication configuration (after template interpolation)
#[derive(Debug, Clone, Default)]
pub enum AuthConfig {
    /// No authentication required
    #[default]
    None,

    /// API Key authentication (header or query)
    ApiKey {
        /// Where to place the API key
        location: Location,
        /// Header or query parameter name
        name: String,
        /// Prefix to add before the value (e.g., "Bearer ")
        prefix: Option<String>,
        /// The API key value
        value: String,
    },

    /// HTTP Basic authentication
    Basic {
        /// Username
        username: String,
        /// Password
        password: String,
    },

    /// Bearer token authentication
    Bearer {
        /// The bearer token
        token: String,
    },

    /// OAuth2 with a token endpoint
    OAuth2(OAuth2Config),
}

/// OAuth2 grant used against the token endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrantType {
    /// Exchange a refresh token for an access token
    RefreshToken {
        /// Initial refresh token
        refresh_token: String,
    },
    /// Client credentials flow
    ClientCredentials,
}

/// Resolved OAuth2 settings
#[derive(Debug, Clone)]
pub struct OAuth2Config {
    /// Token endpoint URL
    pub token_url: String,
    /// Client ID
    pub client_id: String,
    /// Client secret
    pub client_secret: String,
    /// Grant type
    pub grant_type: GrantType,
    /// Requested scopes
    pub scopes: Vec<String>,
    /// Additional token request body fields
    pub refresh_request_body: BTreeMap<String, String>,
    /// Field holding the access token in the token response
    pub access_token_name: String,
    /// Field holding the lifetime in seconds in the token response
    pub expires_in_name: String,
    /// Field holding a rotated refresh token in the token response
    pub refresh_token_name: String,
    /// Write rotated tokens back into the config
    pub refresh_token_updater: Option<RefreshTokenUpdater>,
}

impl OAuth2Config {
    /// Refresh-token flow with default response field names
    pub fn refresh_token(
        token_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        refresh_token: impl Into<String>,
    ) -> Self {
        Self {
            token_url: token_url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            grant_type: GrantType::RefreshToken {
                refresh_token: refresh_token.into(),
            },
            scopes: Vec::new(),
            refresh_request_body: BTreeMap::new(),
            access_token_name: "access_token".to_string(),
            expires_in_name: "expires_in".to_string(),
            refresh_token_name: "refresh_token".to_string(),
            refresh_token_updater: None,
        }
    }

    /// Client-credentials flow with default response field names
    pub fn client_credentials(
        token_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            grant_type: GrantType::ClientCredentials,
            ..Self::refresh_token(token_url, client_id, client_secret, "")
        }
    }
}

/// Where rotated tokens are written back into the config
#[derive(Debug, Clone)]
pub struct RefreshTokenUpdater {
    /// Config copy that receives the rotated values
    pub config: Config,
    /// Path of the refresh token
    pub refresh_token_config_path: Vec<String>,
    /// Path of the access token
    pub access_token_config_path: Vec<String>,
    /// Path of the token expiry date
    pub token_expiry_date_config_path: Vec<String>,
}

impl RefreshTokenUpdater {
    /// Updater writing to the default `credentials.*` paths
    pub fn new(config: Config) -> Self {
        let path = |leaf: &str| vec!["credentials".to_string(), leaf.to_string()];
        Self {
            config,
            refresh_token_config_path: path("refresh_token"),
            access_token_config_path: path("access_token"),
            token_expiry_date_config_path: path("token_expiry_date"),
        }
    }

    /// Read a string at a config path
    pub fn get(&self, path: &[String]) -> Option<&str> {
        path.iter()
            .try_fold(&self.config, |value, key| value.get(key))
            .and_then(JsonValue::as_str)
    }

    /// Write a value at a config path, creating objects along the way
    pub fn set(&mut self, path: &[String], value: JsonValue) {
        let Some((leaf, parents)) = path.split_last() else {
            return;
        };
        let mut current = &mut self.config;
        for key in parents {
            if !current.is_object() {
                *current = JsonValue::Object(serde_json::Map::new());
            }
            let JsonValue::Object(map) = current else {
                return;
            };
            current = map
                .entry(key.clone())
                .or_insert_with(|| JsonValue::Object(serde_json::Map::new()));
        }
        if !current.is_object() {
            *current = JsonValue::Object(serde_json::Map::new());
        }
        if let JsonValue::Object(map) = current {
            map.insert(leaf.clone(), value);
        }
    }
}

/// Cached token with expiration
#[derive(Debug, Clone)]
pub struct CachedToken {
    /// The access token
    pub token: String,
    /// When the token expires
    pub expires_at: Option<DateTime<Utc>>,
}

impl CachedToken {
    /// Create a new cached token
    pub fn new(token: String, expires_at: Option<DateTime<Utc>>) -> Self {
        Self { token, expires_at }
    }

    /// Create a token that expires in N seconds from now.
    ///
    /// A lifetime past the datetime range never expires.
    pub fn expires_in(token: String, seconds: i64) -> Self {
        let expires_at = chrono::TimeDelta::try_seconds(seconds)
            .and_then(|lifetime| Utc::now().checked_add_signed(lifetime));
        Self { token, expires_at }
    }

    /// Check if the token is expired (with 30 second buffer)
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => {
                let buffer = chrono::Duration::seconds(30);
                Utc::now() + buffer >= expires_at
            }
            None => false, // No expiration = never expires
        }
    }
}

#[cfg(test)]
mod type_tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cached_token_expiry() {
        assert!(!CachedToken::expires_in("t".to_string(), 3600).is_expired());
        assert!(CachedToken::expires_in("t".to_string(), -100).is_expired());

        let forever = CachedToken::expires_in("t".to_string(), i64::MAX);
        assert_eq!(forever.expires_at, None);
        assert!(!forever.is_expired());
        assert!(!CachedToken::new("t".to_string(), None).is_expired());
    }

    #[test]
    fn test_auth_config_default() {
        assert!(matches!(AuthConfig::default(), AuthConfig::None));
    }

    #[test]
    fn test_updater_set_creates_parents() {
        let mut updater = RefreshTokenUpdater::new(json!({"api": "x"}));
        let path = updater.refresh_token_config_path.clone();
        updater.set(&path, json!("rt-2"));

        assert_eq!(
            updater.config,
            json!({"api": "x", "credentials": {"refresh_token": "rt-2"}})
        );
        assert_eq!(updater.get(&path), Some("rt-2"));
    }

    #[test]
    fn test_client_credentials_defaults() {
        let oauth = OAuth2Config::client_credentials("https://t", "id", "secret");
        assert_eq!(oauth.grant_type, GrantType::ClientCredentials);
        assert_eq!(oauth.access_token_name, "access_token");
    }
}
