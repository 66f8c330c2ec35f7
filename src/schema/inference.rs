//! Schema inference from records

use super::types::{FieldSchema, SCHEMA_DRAFT};
use crate::slice::Record;
use crate::types::{JsonObject, JsonValue};
use std::collections::BTreeMap;

/// Infers one JSON schema per stream from the records read
#[derive(Debug, Clone, Default)]
pub struct SchemaInferrer {
    streams: BTreeMap<String, FieldSchema>,
}

impl SchemaInferrer {
    /// Create an inferrer that has seen no records
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a record of `stream` into its schema
    pub fn accumulate(&mut self, stream: &str, record: &Record) {
        self.streams
            .entry(stream.to_string())
            .or_default()
            .observe_object(record.data());
    }

    /// The inferred schema for a stream; `None` when it produced no records
    pub fn get_stream_schema(&self, stream: &str) -> Option<JsonValue> {
        self.streams.get(stream).and_then(document)
    }
}

/// Infer a schema from a batch of plain records
pub fn infer_schema<'a>(records: impl IntoIterator<Item = &'a JsonObject>) -> Option<JsonValue> {
    let mut schema = FieldSchema::new();
    for record in records {
        schema.observe_object(record);
    }
    document(&schema)
}

/// Wrap a top-level schema as a schema document
fn document(schema: &FieldSchema) -> Option<JsonValue> {
    if schema.is_empty() {
        return None;
    }
    let JsonValue::Object(body) = schema.to_json() else {
        return None;
    };
    let mut document = JsonObject::new();
    document.insert("$schema".to_string(), JsonValue::from(SCHEMA_DRAFT));
    document.extend(body);
    Some(JsonValue::Object(document))
}
