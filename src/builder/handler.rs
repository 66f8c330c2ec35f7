//! Builder request protocol
//!
//! A request is a single config object carrying the manifest under
//! `__injected_declarative_manifest`, the command under `__command` and
//! optional limits under `__test_read_config`. The answer is one record
//! message whose data is the command's result.

use super::reader::TestReader;
use super::types::{get_limits, Message, TestReadLimits, COMMAND, INJECTED_MANIFEST, TEST_READ_CONFIG};
use crate::error::{Error, Result};
use crate::http::ExchangeObserver;
use crate::manifest::{load_manifest_from_value, ComponentFactory, DeclarativeManifest};
use crate::secrets::{get_secrets, SecretRegistry};
use crate::types::{Config, JsonValue, StreamState};
use serde_json::json;
use std::str::FromStr;
use tracing::info;

/// Commands the builder answers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Bounded read of one stream
    TestRead,
    /// Manifest with every default filled in
    ResolveManifest,
}

impl Command {
    /// Name used on the wire and as the record's stream
    pub fn as_str(self) -> &'static str {
        match self {
            Command::TestRead => "test_read",
            Command::ResolveManifest => "resolve_manifest",
        }
    }
}

impl FromStr for Command {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "test_read" => Ok(Command::TestRead),
            "resolve_manifest" => Ok(Command::ResolveManifest),
            other => Err(Error::UnsupportedCommand {
                command: other.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The command named by `__command`
pub fn get_command(config: &Config) -> Result<Command> {
    match config.get(COMMAND) {
        Some(JsonValue::String(command)) => command.parse(),
        Some(other) => Err(Error::UnsupportedCommand {
            command: other.to_string(),
        }),
        None => Err(Error::missing_field(COMMAND)),
    }
}

/// The manifest injected into the config
pub fn create_source(config: &Config) -> Result<DeclarativeManifest> {
    let manifest = config
        .get(INJECTED_MANIFEST)
        .ok_or_else(|| Error::missing_field(INJECTED_MANIFEST))?;
    load_manifest_from_value(manifest.clone())
}

/// The user config with the protocol keys removed
pub fn clean_config(config: &Config) -> Config {
    let mut cleaned = config.clone();
    if let Some(map) = cleaned.as_object_mut() {
        for key in [INJECTED_MANIFEST, COMMAND, TEST_READ_CONFIG] {
            map.remove(key);
        }
    }
    cleaned
}

/// Run a bounded test read of `stream`, starting from `state` when given.
///
/// Secrets declared by the manifest's connection specification are
/// registered on `secrets` (replacing earlier ones) before the read.
/// Component construction errors are returned; read errors end up in the
/// report.
pub async fn read_stream(
    manifest: &DeclarativeManifest,
    config: &Config,
    stream: &str,
    state: Option<&StreamState>,
    limits: TestReadLimits,
    secrets: &SecretRegistry,
) -> Result<Message> {
    let config = clean_config(config);
    secrets.update(get_secrets(manifest.connection_specification(), &config));

    let observer = ExchangeObserver::new();
    let factory = ComponentFactory::new(config)
        .with_observer(observer.clone())
        .with_secrets(secrets.clone());
    let mut retriever = factory.create_retriever(manifest.stream(stream)?)?;
    if let Some(state) = state {
        retriever.set_initial_state(state.clone());
    }

    let reader = TestReader::new(limits, secrets.clone(), observer);
    let report = reader.read(retriever).await;
    Ok(Message::record(
        Command::TestRead.as_str(),
        serde_json::to_value(&report)?,
    ))
}

/// The manifest with every default filled in
pub fn resolve_manifest(manifest: &DeclarativeManifest) -> Result<Message> {
    Ok(Message::record(
        Command::ResolveManifest.as_str(),
        json!({ "manifest": manifest.resolve()? }),
    ))
}

/// Answer one builder request.
///
/// `stream` names the stream to read and is required for `test_read`.
pub async fn handle_request(
    config: &Config,
    stream: Option<&str>,
    state: Option<&StreamState>,
    secrets: &SecretRegistry,
) -> Result<Message> {
    let command = get_command(config)?;
    let manifest = create_source(config)?;
    info!(command = %command, "Handling builder request");

    match command {
        Command::ResolveManifest => resolve_manifest(&manifest),
        Command::TestRead => {
            let stream = stream.ok_or_else(|| Error::missing_field("stream"))?;
            let limits = get_limits(config)?;
            read_stream(&manifest, config, stream, state, limits, secrets).await
        }
    }
}
