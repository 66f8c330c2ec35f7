//! Record selection
//!
//! Extracts records from a decoded response by field path, filters them
//! with an optional condition and applies transformations.

use crate::error::{Error, Result};
use crate::http::HttpResponse;
use crate::interpolation::{InterpolatedBoolean, InterpolatedString, InterpolationContext};
use crate::slice::{Record, StreamSlice};
use crate::types::{JsonObject, JsonValue};
use std::sync::Arc;
use tracing::debug;

/// Path segment matching every element of an array or value of an object
const WILDCARD: &str = "*";

/// A field added to every record
#[derive(Debug, Clone)]
pub struct AddedField {
    /// Where the value goes
    pub path: Vec<String>,
    /// Templated value, evaluated with `record` bound
    pub value: InterpolatedString,
}

/// A record transformation
#[derive(Debug, Clone)]
pub enum Transformation {
    /// Add or overwrite fields
    AddFields(Vec<AddedField>),
    /// Remove fields by path (`*` matches any key)
    RemoveFields(Vec<Vec<String>>),
}

/// Selects records out of a response
#[derive(Debug, Clone, Default)]
pub struct RecordSelector {
    field_path: Vec<InterpolatedString>,
    record_filter: Option<InterpolatedBoolean>,
    transformations: Vec<Transformation>,
}

impl RecordSelector {
    /// Select records at a field path; an empty path selects the whole body
    pub fn new(field_path: Vec<InterpolatedString>) -> Self {
        Self {
            field_path,
            record_filter: None,
            transformations: Vec::new(),
        }
    }

    /// Keep only records for which the condition is true
    #[must_use]
    pub fn with_filter(mut self, condition: InterpolatedBoolean) -> Self {
        self.record_filter = Some(condition);
        self
    }

    /// Apply transformations, in order, to every kept record
    #[must_use]
    pub fn with_transformations(mut self, transformations: Vec<Transformation>) -> Self {
        self.transformations = transformations;
        self
    }

    /// Extract, filter and transform the records of one page.
    ///
    /// `ctx` carries the config plus the page bindings (`stream_slice`,
    /// `stream_state`, `next_page_token`).
    pub fn select(
        &self,
        response: &HttpResponse,
        ctx: &InterpolationContext<'_>,
        slice: &Arc<StreamSlice>,
    ) -> Result<Vec<Record>> {
        let path = self
            .field_path
            .iter()
            .map(|segment| segment.eval_string(ctx))
            .collect::<Result<Vec<_>>>()?;

        let body = response.json_or_empty().map_err(|e| Error::RecordExtraction {
            path: path.join("."),
            message: e.to_string(),
        })?;

        let mut records = Vec::new();
        for value in extract(&body, &path) {
            let data = match value {
                JsonValue::Object(map) => map,
                other => {
                    let mut wrapped = JsonObject::new();
                    wrapped.insert("data".to_string(), other);
                    wrapped
                }
            };

            let mut record_ctx = ctx.clone();
            record_ctx.set("record", JsonValue::Object(data.clone()));

            if let Some(filter) = &self.record_filter {
                if !filter.eval(&record_ctx)? {
                    continue;
                }
            }

            let data = self.transform(data, &mut record_ctx)?;
            records.push(Record::new(data, Some(slice)));
        }

        debug!(count = records.len(), path = %path.join("."), "Selected records");
        Ok(records)
    }

    fn transform(&self, mut data: JsonObject, ctx: &mut InterpolationContext<'_>) -> Result<JsonObject> {
        for transformation in &self.transformations {
            match transformation {
                Transformation::AddFields(fields) => {
                    for field in fields {
                        let value = field.value.eval(ctx)?;
                        set_path(&mut data, &field.path, value);
                    }
                }
                Transformation::RemoveFields(paths) => {
                    for path in paths {
                        remove_path(&mut data, path);
                    }
                }
            }
            ctx.set("record", JsonValue::Object(data.clone()));
        }
        Ok(data)
    }
}

/// Values at a path; arrays at the end are flattened into their elements.
/// Null and empty objects select nothing.
fn extract(value: &JsonValue, path: &[String]) -> Vec<JsonValue> {
    let Some((segment, rest)) = path.split_first() else {
        return match value {
            JsonValue::Array(items) => items.clone(),
            JsonValue::Null => Vec::new(),
            JsonValue::Object(map) if map.is_empty() => Vec::new(),
            other => vec![other.clone()],
        };
    };

    match (segment.as_str(), value) {
        (WILDCARD, JsonValue::Array(items)) => {
            items.iter().flat_map(|item| extract(item, rest)).collect()
        }
        (WILDCARD, JsonValue::Object(map)) => {
            map.values().flat_map(|item| extract(item, rest)).collect()
        }
        (key, JsonValue::Object(map)) => map
            .get(key)
            .map(|inner| extract(inner, rest))
            .unwrap_or_default(),
        (index, JsonValue::Array(items)) => index
            .parse::<usize>()
            .ok()
            .and_then(|i| items.get(i))
            .map(|inner| extract(inner, rest))
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

fn set_path(data: &mut JsonObject, path: &[String], value: JsonValue) {
    let Some((leaf, parents)) = path.split_last() else {
        return;
    };
    let mut current = data;
    for key in parents {
        let entry = current
            .entry(key.clone())
            .or_insert_with(|| JsonValue::Object(JsonObject::new()));
        if !entry.is_object() {
            *entry = JsonValue::Object(JsonObject::new());
        }
        let JsonValue::Object(map) = entry else {
            return;
        };
        current = map;
    }
    current.insert(leaf.clone(), value);
}

fn remove_path(data: &mut JsonObject, path: &[String]) {
    let Some((segment, rest)) = path.split_first() else {
        return;
    };
    if rest.is_empty() {
        if segment == WILDCARD {
            data.clear();
        } else {
            data.remove(segment);
        }
        return;
    }
    let children: Vec<&mut JsonValue> = if segment == WILDCARD {
        data.values_mut().collect()
    } else {
        data.get_mut(segment).into_iter().collect()
    };
    for child in children {
        match child {
            JsonValue::Object(map) => remove_path(map, rest),
            JsonValue::Array(items) => {
                for item in items {
                    if let JsonValue::Object(map) = item {
                        remove_path(map, rest);
                    }
                }
            }
            _ => {}
        }
    }
}

