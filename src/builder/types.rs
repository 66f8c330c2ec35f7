//! Test read report types

use crate::error::{Error, Result};
use crate::http::{AuxiliaryRequest, HttpRequest, HttpResponse};
use crate::types::{Config, JsonValue, LogLevel};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default ceiling on records across the whole read
pub const DEFAULT_MAXIMUM_RECORDS: usize = 100;
/// Default ceiling on partitions iterated
pub const DEFAULT_MAXIMUM_NUMBER_OF_SLICES: usize = 5;
/// Default ceiling on pages fetched per partition
pub const DEFAULT_MAXIMUM_NUMBER_OF_PAGES_PER_SLICE: usize = 5;

/// Config key holding the manifest to run
pub const INJECTED_MANIFEST: &str = "__injected_declarative_manifest";
/// Config key naming the command to run
pub const COMMAND: &str = "__command";
/// Config key holding the test read limits
pub const TEST_READ_CONFIG: &str = "__test_read_config";

/// Ceilings for a bounded test read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestReadLimits {
    /// Records across all partitions
    #[serde(default = "default_max_records")]
    pub max_records: usize,
    /// Partitions iterated
    #[serde(default = "default_max_slices")]
    pub max_slices: usize,
    /// Pages per partition
    #[serde(default = "default_max_pages_per_slice")]
    pub max_pages_per_slice: usize,
}

fn default_max_records() -> usize {
    DEFAULT_MAXIMUM_RECORDS
}

fn default_max_slices() -> usize {
    DEFAULT_MAXIMUM_NUMBER_OF_SLICES
}

fn default_max_pages_per_slice() -> usize {
    DEFAULT_MAXIMUM_NUMBER_OF_PAGES_PER_SLICE
}

impl Default for TestReadLimits {
    fn default() -> Self {
        Self {
            max_records: DEFAULT_MAXIMUM_RECORDS,
            max_slices: DEFAULT_MAXIMUM_NUMBER_OF_SLICES,
            max_pages_per_slice: DEFAULT_MAXIMUM_NUMBER_OF_PAGES_PER_SLICE,
        }
    }
}

impl TestReadLimits {
    /// Create limits, rejecting zero ceilings
    pub fn new(max_records: usize, max_slices: usize, max_pages_per_slice: usize) -> Result<Self> {
        let limits = Self {
            max_records,
            max_slices,
            max_pages_per_slice,
        };
        limits.validate()?;
        Ok(limits)
    }

    fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("max_records", self.max_records),
            ("max_slices", self.max_slices),
            ("max_pages_per_slice", self.max_pages_per_slice),
        ] {
            if value == 0 {
                return Err(Error::invalid_value(field, "must be a positive integer"));
            }
        }
        Ok(())
    }
}

/// Read the limits from `__test_read_config`, defaulting what is missing
pub fn get_limits(config: &Config) -> Result<TestReadLimits> {
    let Some(block) = config.get(TEST_READ_CONFIG) else {
        return Ok(TestReadLimits::default());
    };
    if block.is_null() {
        return Ok(TestReadLimits::default());
    }

    // Negative numbers fail usize deserialization; report them uniformly
    if let Some(map) = block.as_object() {
        for (field, value) in map {
            if value.as_i64().is_some_and(|n| n <= 0) {
                return Err(Error::invalid_value(
                    field.clone(),
                    "must be a positive integer",
                ));
            }
        }
    }

    let limits: TestReadLimits = serde_json::from_value(block.clone())
        .map_err(|e| Error::invalid_value(TEST_READ_CONFIG, e.to_string()))?;
    limits.validate()?;
    Ok(limits)
}

/// A log entry surfaced in the report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogMessage {
    /// Human readable message
    pub message: String,
    /// Severity
    pub level: LogLevel,
    /// Underlying error, if different from the message
    pub internal_message: Option<String>,
    /// Rendered error chain
    pub stacktrace: Option<String>,
}

impl LogMessage {
    /// Create a log entry with no error details
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            level,
            internal_message: None,
            stacktrace: None,
        }
    }
}

/// One fetched page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamReadPages {
    /// Records extracted from the page
    pub records: Vec<JsonValue>,
    /// The request as sent
    pub request: Option<HttpRequest>,
    /// The response, or `None` when none was received
    pub response: Option<HttpResponse>,
}

/// One partition of the read
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamReadSlices {
    /// Pages in fetch order
    pub pages: Vec<StreamReadPages>,
    /// The partition's merged mapping
    pub slice_descriptor: Option<JsonValue>,
    /// Router state once the partition was read
    pub state: Option<JsonValue>,
}

/// The full report of a bounded test read
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StreamRead {
    pub logs: Vec<LogMessage>,
    pub slices: Vec<StreamReadSlices>,
    pub test_read_limit_reached: bool,
    pub auxiliary_requests: Vec<AuxiliaryRequest>,
    pub inferred_schema: Option<JsonValue>,
    pub inferred_datetime_formats: Option<BTreeMap<String, String>>,
    pub latest_config_update: Option<Config>,
}

impl StreamRead {
    /// Total records across every page
    pub fn record_count(&self) -> usize {
        self.slices
            .iter()
            .flat_map(|slice| &slice.pages)
            .map(|page| page.records.len())
            .sum()
    }

    /// Log entries at error level
    pub fn errors(&self) -> impl Iterator<Item = &LogMessage> {
        self.logs.iter().filter(|log| log.level == LogLevel::Error)
    }
}

/// A record as emitted on stdout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordMessage {
    /// Stream the record belongs to
    pub stream: String,
    /// Record payload
    pub data: JsonValue,
    /// Emission time, milliseconds since the epoch
    pub emitted_at: i64,
}

/// Protocol message wrapper, `{"type": "RECORD", "record": {...}}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
pub enum Message {
    Record { record: RecordMessage },
}

impl Message {
    /// Wrap a payload as a record of `stream`, stamped now
    pub fn record(stream: impl Into<String>, data: JsonValue) -> Self {
        Message::Record {
            record: RecordMessage {
                stream: stream.into(),
                data,
                emitted_at: chrono::Utc::now().timestamp_millis(),
            },
        }
    }

    /// The wrapped record
    pub fn as_record(&self) -> &RecordMessage {
        match self {
            Message::Record { record } => record,
        }
    }
}
