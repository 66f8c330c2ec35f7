//! Schema types

use crate::types::{JsonObject, JsonValue};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// JSON schema draft used for inferred schemas
pub const SCHEMA_DRAFT: &str = "http://json-schema.org/schema#";

/// JSON Schema type
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JsonType {
    Null,
    Boolean,
    Integer,
    Number,
    String,
    Object,
    Array,
}

impl JsonType {
    /// The type of a JSON value
    pub fn of(value: &JsonValue) -> Self {
        match value {
            JsonValue::Null => JsonType::Null,
            JsonValue::Bool(_) => JsonType::Boolean,
            JsonValue::Number(n) if n.is_i64() || n.is_u64() => JsonType::Integer,
            JsonValue::Number(_) => JsonType::Number,
            JsonValue::String(_) => JsonType::String,
            JsonValue::Array(_) => JsonType::Array,
            JsonValue::Object(_) => JsonType::Object,
        }
    }
}

impl std::fmt::Display for JsonType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            JsonType::Null => "null",
            JsonType::Boolean => "boolean",
            JsonType::Integer => "integer",
            JsonType::Number => "number",
            JsonType::String => "string",
            JsonType::Object => "object",
            JsonType::Array => "array",
        };
        f.write_str(name)
    }
}

/// Accumulated shape of every value seen at one position.
///
/// Objects track how often each key appeared; a key missing from some
/// objects is reported as nullable and not required.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldSchema {
    types: BTreeSet<JsonType>,
    objects_seen: usize,
    properties: BTreeMap<String, (usize, FieldSchema)>,
    items: Option<Box<FieldSchema>>,
}

impl FieldSchema {
    /// Create an empty schema that has seen nothing
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a value into the schema
    pub fn observe(&mut self, value: &JsonValue) {
        self.types.insert(JsonType::of(value));
        match value {
            JsonValue::Object(map) => self.observe_object(map),
            JsonValue::Array(items) => {
                let schema = self.items.get_or_insert_with(Box::default);
                for item in items {
                    schema.observe(item);
                }
            }
            _ => {}
        }
    }

    /// Fold an object's fields into the schema
    pub fn observe_object(&mut self, map: &JsonObject) {
        self.types.insert(JsonType::Object);
        self.objects_seen += 1;
        for (key, value) in map {
            let (count, schema) = self.properties.entry(key.clone()).or_default();
            *count += 1;
            schema.observe(value);
        }
    }

    /// Types seen at this position
    pub fn types(&self) -> &BTreeSet<JsonType> {
        &self.types
    }

    /// Whether nothing has been observed yet
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Render as a JSON schema fragment
    pub fn to_json(&self) -> JsonValue {
        self.render(false)
    }

    fn render(&self, nullable: bool) -> JsonValue {
        let mut types = self.types.clone();
        if nullable {
            types.insert(JsonType::Null);
        }
        // Integers widen to number when both were seen
        if types.contains(&JsonType::Number) {
            types.remove(&JsonType::Integer);
        }

        let mut schema = JsonObject::new();
        let names: Vec<JsonValue> = types.iter().map(|t| JsonValue::from(t.to_string())).collect();
        let type_value = match names.as_slice() {
            [] => None,
            [single] => Some(single.clone()),
            _ => Some(JsonValue::Array(names)),
        };
        if let Some(type_value) = type_value {
            schema.insert("type".to_string(), type_value);
        }

        if self.types.contains(&JsonType::Object) {
            let mut properties = JsonObject::new();
            let mut required = Vec::new();
            for (key, (count, field)) in &self.properties {
                let always_present = *count == self.objects_seen;
                properties.insert(key.clone(), field.render(!always_present));
                if always_present && !field.types.contains(&JsonType::Null) {
                    required.push(JsonValue::from(key.as_str()));
                }
            }
            schema.insert("properties".to_string(), JsonValue::Object(properties));
            if !required.is_empty() {
                schema.insert("required".to_string(), JsonValue::Array(required));
            }
        }

        if let Some(items) = &self.items {
            if !items.is_empty() {
                schema.insert("items".to_string(), items.render(false));
            }
        }

        JsonValue::Object(schema)
    }
}
