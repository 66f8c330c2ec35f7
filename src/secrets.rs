//! Secret registry and masking
//!
//! Config values whose connection-specification property is flagged with
//! `airbyte_secret: true` are registered here at the start of a run and
//! masked out of every human-readable string the crate produces (log lines,
//! error messages, stack traces). Structured payloads are never rewritten.
//!
//! The registry is an explicit object rather than process-global state so
//! that concurrent test reads in one process can each hold their own set.

use crate::types::{Config, JsonValue};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Replacement written in place of every secret occurrence
pub const SECRET_MASK: &str = "****";

/// Schema keywords that are dropped from a discovered secret path
const SCHEMA_KEYWORDS: [&str; 2] = ["properties", "oneOf"];

/// Flag marking a schema property as secret
const SECRET_FLAG: &str = "airbyte_secret";

/// Shared, cheaply clonable set of secret values
#[derive(Debug, Clone, Default)]
pub struct SecretRegistry {
    secrets: Arc<RwLock<Vec<String>>>,
}

impl SecretRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry pre-populated with secrets
    pub fn with_secrets<I, S>(secrets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let registry = Self::new();
        registry.update(secrets);
        registry
    }

    /// Build a registry from a connection specification and the live config
    pub fn from_spec(connection_specification: &JsonValue, config: &Config) -> Self {
        Self::with_secrets(get_secrets(connection_specification, config))
    }

    /// Replace every registered secret (start of a new run)
    pub fn update<I, S>(&self, secrets: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut next: Vec<String> = secrets
            .into_iter()
            .map(Into::into)
            .filter(|s| is_maskable(s))
            .collect();
        sort_longest_first(&mut next);
        let mut guard = self.write();
        *guard = next;
    }

    /// Register one more secret, e.g. a freshly refreshed access token
    pub fn add(&self, secret: impl Into<String>) {
        let secret = secret.into();
        if !is_maskable(&secret) {
            return;
        }
        let mut guard = self.write();
        if !guard.contains(&secret) {
            guard.push(secret);
            sort_longest_first(&mut guard);
        }
    }

    /// Drop every registered secret
    pub fn clear(&self) {
        self.write().clear();
    }

    /// Number of registered secrets
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Whether no secret is registered
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Check whether a value is registered
    pub fn contains(&self, value: &str) -> bool {
        self.read().iter().any(|s| s == value)
    }

    /// Mask every registered secret in `text`.
    ///
    /// Secrets are applied longest first, so when one secret is a substring
    /// of another the longer one is always masked whole.
    pub fn filter(&self, text: &str) -> String {
        let secrets = self.read();
        let mut filtered = text.to_string();
        for secret in secrets.iter() {
            if filtered.contains(secret.as_str()) {
                filtered = filtered.replace(secret.as_str(), SECRET_MASK);
            }
        }
        filtered
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Vec<String>> {
        // A poisoned lock still holds a valid list of strings
        self.secrets
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Vec<String>> {
        self.secrets
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// Empty values and pieces of the mask itself are never registered
fn is_maskable(secret: &str) -> bool {
    !secret.is_empty() && !SECRET_MASK.contains(secret)
}

fn sort_longest_first(secrets: &mut [String]) {
    secrets.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
}

/// Find the config paths of every property flagged as secret.
///
/// `properties` and `oneOf` segments are removed, so
/// `{"credentials": {"oneOf": [{"properties": {"token": {"airbyte_secret": true}}}]}}`
/// yields `["credentials", "token"]`.
pub fn get_secret_paths(schema: &JsonValue) -> Vec<Vec<String>> {
    let mut paths = Vec::new();
    traverse_schema(schema, &mut Vec::new(), &mut paths);
    paths
}

fn traverse_schema(item: &JsonValue, path: &mut Vec<String>, paths: &mut Vec<Vec<String>>) {
    match item {
        JsonValue::Object(map) => {
            for (key, value) in map {
                path.push(key.clone());
                traverse_schema(value, path, paths);
                path.pop();
            }
        }
        JsonValue::Array(items) => {
            for value in items {
                traverse_schema(value, path, paths);
            }
        }
        JsonValue::Bool(true) if path.last().map(String::as_str) == Some(SECRET_FLAG) => {
            let filtered: Vec<String> = path[..path.len() - 1]
                .iter()
                .filter(|p| !SCHEMA_KEYWORDS.contains(&p.as_str()))
                .cloned()
                .collect();
            if !paths.contains(&filtered) {
                paths.push(filtered);
            }
        }
        _ => {}
    }
}

/// Resolve the secret paths of a connection specification against a config.
///
/// Paths absent from the config are skipped: with `oneOf` specs only one
/// branch is ever populated.
pub fn get_secrets(connection_specification: &JsonValue, config: &Config) -> Vec<String> {
    let properties = connection_specification
        .get("properties")
        .cloned()
        .unwrap_or_else(|| JsonValue::Object(serde_json::Map::new()));

    let mut secrets = Vec::new();
    for path in get_secret_paths(&properties) {
        collect_at_path(config, &path, &mut secrets);
    }
    secrets
}

fn collect_at_path(value: &JsonValue, path: &[String], out: &mut Vec<String>) {
    let Some((head, rest)) = path.split_first() else {
        match value {
            JsonValue::String(s) => out.push(s.clone()),
            JsonValue::Null => {}
            JsonValue::Array(items) => {
                for item in items {
                    collect_at_path(item, path, out);
                }
            }
            other => out.push(crate::types::value_to_string(other)),
        }
        return;
    };

    match value {
        JsonValue::Object(map) => {
            if let Some(next) = map.get(head) {
                collect_at_path(next, rest, out);
            }
        }
        JsonValue::Array(items) => {
            for item in items {
                collect_at_path(item, path, out);
            }
        }
        _ => {}
    }
}

/// Summarise failed streams with every secret masked
pub fn generate_failed_streams_error_message(
    registry: &SecretRegistry,
    stream_failures: &HashMap<String, Vec<crate::Error>>,
) -> String {
    let mut streams: Vec<&String> = stream_failures.keys().collect();
    streams.sort();

    let failures = streams
        .into_iter()
        .flat_map(|stream| {
            stream_failures[stream]
                .iter()
                .map(move |err| format!("{stream}: {}", registry.filter(&err.to_string())))
        })
        .collect::<Vec<_>>()
        .join("\n");
    format!("During the sync, the following streams did not sync successfully: {failures}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_filter_masks_registered_secrets() {
        let registry = SecretRegistry::with_secrets(["super_secret_key"]);
        assert_eq!(
            registry.filter("Test exception with secret key: super_secret_key"),
            "Test exception with secret key: ****"
        );
    }

    #[test]
    fn test_filter_is_noop_without_match() {
        let registry = SecretRegistry::with_secrets(["hunter2"]);
        assert_eq!(registry.filter("nothing to hide"), "nothing to hide");
        assert_eq!(registry.filter("already ****"), "already ****");

        let masked = registry.filter("pw=hunter2");
        assert_eq!(registry.filter(&masked), masked);
    }

    #[test]
    fn test_filter_independent_of_registration_order() {
        let forward = SecretRegistry::with_secrets(["x", "xk"]);
        let backward = SecretRegistry::with_secrets(["xk", "x"]);

        assert_eq!(forward.filter("xk"), "****");
        assert_eq!(backward.filter("xk"), "****");

        let added = SecretRegistry::new();
        added.add("x");
        added.add("xk");
        assert_eq!(added.filter("a xk b x"), "a **** b ****");
    }

    #[test]
    fn test_empty_secret_ignored() {
        let registry = SecretRegistry::with_secrets(["", "abc"]);
        assert_eq!(registry.len(), 1);
        registry.add("");
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.filter("abc"), "****");
    }

    #[test]
    fn test_mask_fragments_ignored() {
        let registry = SecretRegistry::with_secrets(["*", "**", "****", "s3cr*t"]);
        registry.add("***");
        assert_eq!(registry.len(), 1);

        let masked = registry.filter("token=s3cr*t");
        assert_eq!(masked, "token=****");
        assert_eq!(registry.filter(&masked), masked);
    }

    #[test]
    fn test_update_replaces_and_clones_share_state() {
        let registry = SecretRegistry::with_secrets(["old"]);
        let shared = registry.clone();

        registry.update(["new"]);
        assert!(!shared.contains("old"));
        assert!(shared.contains("new"));

        shared.clear();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_get_secret_paths() {
        let schema = json!({
            "api_key": {"type": "string", "airbyte_secret": true},
            "name": {"type": "string"},
            "credentials": {
                "oneOf": [
                    {"properties": {"refresh_token": {"type": "string", "airbyte_secret": true}}},
                    {"properties": {"password": {"type": "string", "airbyte_secret": true}}}
                ]
            },
            "visible": {"type": "string", "airbyte_secret": false}
        });

        let mut paths = get_secret_paths(&schema);
        paths.sort();
        assert_eq!(
            paths,
            vec![
                vec!["api_key".to_string()],
                vec!["credentials".to_string(), "password".to_string()],
                vec!["credentials".to_string(), "refresh_token".to_string()],
            ]
        );
    }

    #[test]
    fn test_get_secrets_skips_missing_paths() {
        let spec = json!({
            "properties": {
                "api_key": {"type": "string", "airbyte_secret": true},
                "credentials": {
                    "oneOf": [
                        {"properties": {"refresh_token": {"airbyte_secret": true}}},
                        {"properties": {"password": {"airbyte_secret": true}}}
                    ]
                }
            }
        });
        let config = json!({
            "api_key": "k-123",
            "credentials": {"password": "p@ss"}
        });

        let mut secrets = get_secrets(&spec, &config);
        secrets.sort();
        assert_eq!(secrets, vec!["k-123".to_string(), "p@ss".to_string()]);
    }

    #[test]
    fn test_registry_from_spec() {
        let spec = json!({"properties": {"token": {"airbyte_secret": true}}});
        let registry = SecretRegistry::from_spec(&spec, &json!({"token": "t0k3n"}));
        assert_eq!(registry.filter("Bearer t0k3n"), "Bearer ****");
    }

    #[test]
    fn test_failed_streams_message_is_redacted() {
        let registry = SecretRegistry::with_secrets(["s3cr3t"]);
        let mut failures = HashMap::new();
        failures.insert(
            "users".to_string(),
            vec![crate::Error::auth("bad key s3cr3t")],
        );

        let message = generate_failed_streams_error_message(&registry, &failures);
        assert!(message.starts_with(
            "During the sync, the following streams did not sync successfully: users: "
        ));
        assert!(message.contains("****"));
        assert!(!message.contains("s3cr3t"));
    }
}
