//! CLI runner - executes commands

use crate::builder::handle_request;
use crate::cli::commands::{Cli, Commands, OutputFormat};
use crate::error::{Error, Result};
use crate::manifest::load_manifest;
use crate::secrets::SecretRegistry;
use crate::types::{JsonValue, StreamState};
use serde_json::json;
use std::fs;
use std::path::Path;
use tracing::debug;

/// CLI runner
pub struct Runner {
    cli: Cli,
    secrets: SecretRegistry,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self {
            cli,
            secrets: SecretRegistry::new(),
        }
    }

    /// Secrets registered by the last read
    pub fn secrets(&self) -> &SecretRegistry {
        &self.secrets
    }

    /// Run the CLI command and print its result to stdout
    pub async fn run(&self) -> Result<()> {
        let output = self.execute().await?;
        self.output_message(&output);
        Ok(())
    }

    /// Run the CLI command and return the message it produces
    pub async fn execute(&self) -> Result<JsonValue> {
        match &self.cli.command {
            Commands::Read {
                config,
                catalog,
                stream,
                state,
            } => {
                self.read(config, catalog.as_deref(), stream.as_deref(), state.as_deref())
                    .await
            }
            Commands::Validate { manifest } => self.validate(manifest),
        }
    }

    /// Answer a builder request
    async fn read(
        &self,
        config: &Path,
        catalog: Option<&Path>,
        stream: Option<&str>,
        state: Option<&Path>,
    ) -> Result<JsonValue> {
        let config = read_json_file(config)?;
        let stream = match (stream, catalog) {
            (Some(stream), _) => Some(stream.to_string()),
            (None, Some(catalog)) => Some(catalog_stream(&read_json_file(catalog)?)?),
            (None, None) => None,
        };
        let state = state.map(load_state).transpose()?;

        debug!(stream = ?stream, "Reading builder request");
        let message = handle_request(&config, stream.as_deref(), state.as_ref(), &self.secrets).await?;
        Ok(serde_json::to_value(&message)?)
    }

    /// Validate a manifest file
    fn validate(&self, path: &Path) -> Result<JsonValue> {
        let manifest = load_manifest(path)?;
        Ok(json!({
            "valid": true,
            "version": manifest.version,
            "streams": manifest.stream_names(),
        }))
    }

    fn output_message(&self, msg: &JsonValue) {
        let rendered = match self.cli.format {
            OutputFormat::Json => serde_json::to_string(msg),
            OutputFormat::Pretty => serde_json::to_string_pretty(msg),
        };
        println!("{}", rendered.unwrap_or_default());
    }
}

/// Read and parse a JSON input file
fn read_json_file(path: &Path) -> Result<JsonValue> {
    if !path.exists() {
        return Err(Error::FileNotFound {
            path: path.display().to_string(),
        });
    }
    let content = fs::read_to_string(path)?;
    serde_json::from_str(&content)
        .map_err(|e| Error::config(format!("Invalid JSON in {}: {e}", path.display())))
}

/// Name of the first stream of a configured catalog
fn catalog_stream(catalog: &JsonValue) -> Result<String> {
    catalog
        .pointer("/streams/0/stream/name")
        .and_then(JsonValue::as_str)
        .map(String::from)
        .ok_or_else(|| Error::missing_field("streams[0].stream.name"))
}

fn load_state(path: &Path) -> Result<StreamState> {
    match read_json_file(path)? {
        JsonValue::Object(state) => Ok(state),
        other => Err(Error::invalid_value(
            "state",
            format!("expected a JSON object, got {other}"),
        )),
    }
}
