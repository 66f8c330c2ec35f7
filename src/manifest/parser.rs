//! Manifest loading
//!
//! Parses and validates declarative manifests from YAML or JSON text, from
//! files, or from an already-decoded value injected into the config.

use super::types::{DeclarativeManifest, StreamDefinition};
use crate::error::{Error, Result};
use crate::types::JsonValue;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// Load a manifest from a YAML or JSON file
pub fn load_manifest(path: impl AsRef<Path>) -> Result<DeclarativeManifest> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::FileNotFound {
                path: path.display().to_string(),
            }
        } else {
            Error::config(format!(
                "Failed to read manifest file '{}': {}",
                path.display(),
                e
            ))
        }
    })?;
    load_manifest_from_str(&content)
}

/// Load a manifest from YAML text (JSON is accepted too)
pub fn load_manifest_from_str(yaml: &str) -> Result<DeclarativeManifest> {
    let manifest: DeclarativeManifest = serde_yaml::from_str(yaml)
        .map_err(|e| Error::config(format!("Failed to parse manifest: {e}")))?;
    validate_manifest(&manifest)?;
    Ok(manifest)
}

/// Load a manifest from a decoded JSON value
pub fn load_manifest_from_value(value: JsonValue) -> Result<DeclarativeManifest> {
    let manifest: DeclarativeManifest = serde_json::from_value(value)
        .map_err(|e| Error::config(format!("Failed to parse manifest: {e}")))?;
    validate_manifest(&manifest)?;
    Ok(manifest)
}

fn validate_manifest(manifest: &DeclarativeManifest) -> Result<()> {
    if manifest.streams.is_empty() {
        return Err(Error::config("Manifest must have at least one stream"));
    }

    let names: HashSet<_> = manifest.streams.iter().map(|s| &s.name).collect();
    if names.len() != manifest.streams.len() {
        return Err(Error::config("Duplicate stream names found"));
    }

    for stream in &manifest.streams {
        validate_stream(stream)?;
    }
    Ok(())
}

fn validate_stream(stream: &StreamDefinition) -> Result<()> {
    if stream.name.is_empty() {
        return Err(Error::config("Stream name cannot be empty"));
    }
    if stream.retriever.requester.url_base.is_empty() {
        return Err(Error::config(format!(
            "Stream '{}' url_base cannot be empty",
            stream.name
        )));
    }
    Ok(())
}

impl DeclarativeManifest {
    /// Look up a stream by name
    pub fn stream(&self, name: &str) -> Result<&StreamDefinition> {
        self.streams
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| Error::StreamNotFound {
                stream: name.to_string(),
            })
    }

    /// Names of all streams, in manifest order
    pub fn stream_names(&self) -> Vec<&str> {
        self.streams.iter().map(|s| s.name.as_str()).collect()
    }

    /// The connection specification, or null when the manifest has none
    pub fn connection_specification(&self) -> &JsonValue {
        static NULL: JsonValue = JsonValue::Null;
        self.spec
            .as_ref()
            .map_or(&NULL, |spec| &spec.connection_specification)
    }

    /// The parsed manifest, defaults filled in, as JSON
    pub fn resolve(&self) -> Result<JsonValue> {
        Ok(serde_json::to_value(self)?)
    }
}
