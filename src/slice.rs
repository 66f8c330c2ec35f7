//! Stream slices and records
//!
//! A [`StreamSlice`] identifies one partition of a stream: a `partition`
//! mapping (e.g. a parent id) and a `cursor_slice` mapping (e.g. a date
//! window). Their key sets never overlap. Identity covers only those two
//! mappings; `extra_fields` ride along for information.
//!
//! A [`Record`] is one extracted row plus a weak back-reference to the slice
//! that produced it.

use crate::error::{Error, Result};
use crate::types::{JsonObject, JsonValue};
use serde::{Serialize, Serializer};
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Weak};

/// Maximum number of nested slices a component may wrap.
pub const MAX_SLICE_NESTING: usize = 32;

/// One constituent of a slice: a plain mapping or another slice
#[derive(Debug, Clone)]
pub enum SliceComponent {
    /// A plain key/value mapping
    Mapping(JsonObject),
    /// A nested slice whose matching component is used
    Slice(Box<StreamSlice>),
}

impl SliceComponent {
    fn depth(&self) -> usize {
        match self {
            Self::Mapping(_) => 0,
            Self::Slice(inner) => 1 + inner.depth,
        }
    }
}

impl From<JsonObject> for SliceComponent {
    fn from(map: JsonObject) -> Self {
        Self::Mapping(map)
    }
}

impl From<StreamSlice> for SliceComponent {
    fn from(slice: StreamSlice) -> Self {
        Self::Slice(Box::new(slice))
    }
}

/// An immutable partition descriptor
#[derive(Debug, Clone)]
pub struct StreamSlice {
    partition: SliceComponent,
    cursor_slice: SliceComponent,
    extra_fields: JsonObject,
    /// Merged view of partition and cursor slice
    merged: JsonObject,
    depth: usize,
}

impl StreamSlice {
    /// Create a slice, rejecting overlapping keys and excessive nesting
    pub fn new(
        partition: impl Into<SliceComponent>,
        cursor_slice: impl Into<SliceComponent>,
        extra_fields: Option<JsonObject>,
    ) -> Result<Self> {
        let partition = partition.into();
        let cursor_slice = cursor_slice.into();

        let depth = partition.depth().max(cursor_slice.depth());
        if depth > MAX_SLICE_NESTING {
            return Err(Error::SliceNestingTooDeep {
                max_depth: MAX_SLICE_NESTING,
            });
        }

        let partition_map = resolve(&partition, |s| &s.partition);
        let cursor_map = resolve(&cursor_slice, |s| &s.cursor_slice);

        let overlapping: Vec<&String> = partition_map
            .keys()
            .filter(|k| cursor_map.contains_key(k.as_str()))
            .collect();
        if !overlapping.is_empty() {
            return Err(Error::invalid_slice(format!(
                "Keys for partition and incremental sync cursor should not overlap: {}",
                overlapping
                    .iter()
                    .map(|k| k.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            )));
        }

        let mut merged = partition_map.clone();
        merged.extend(cursor_map.clone());

        Ok(Self {
            partition,
            cursor_slice,
            extra_fields: extra_fields.unwrap_or_default(),
            merged,
            depth,
        })
    }

    /// The slice with empty partition and cursor slice
    pub fn empty() -> Self {
        Self {
            partition: SliceComponent::Mapping(JsonObject::new()),
            cursor_slice: SliceComponent::Mapping(JsonObject::new()),
            extra_fields: JsonObject::new(),
            merged: JsonObject::new(),
            depth: 0,
        }
    }

    /// Slice with only partition keys
    pub fn from_partition(partition: JsonObject) -> Self {
        Self {
            merged: partition.clone(),
            partition: SliceComponent::Mapping(partition),
            cursor_slice: SliceComponent::Mapping(JsonObject::new()),
            extra_fields: JsonObject::new(),
            depth: 0,
        }
    }

    /// The partition mapping, unwrapping nested slices
    pub fn partition(&self) -> &JsonObject {
        resolve(&self.partition, |s| &s.partition)
    }

    /// The cursor slice mapping, unwrapping nested slices
    pub fn cursor_slice(&self) -> &JsonObject {
        resolve(&self.cursor_slice, |s| &s.cursor_slice)
    }

    /// Informational fields, excluded from identity
    pub fn extra_fields(&self) -> &JsonObject {
        &self.extra_fields
    }

    /// Merged partition and cursor slice view
    pub fn as_map(&self) -> &JsonObject {
        &self.merged
    }

    /// Look up a key in the merged view
    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.merged.get(key)
    }

    /// Check a key in the merged view
    pub fn contains_key(&self, key: &str) -> bool {
        self.merged.contains_key(key)
    }

    /// Number of keys in the merged view
    pub fn len(&self) -> usize {
        self.merged.len()
    }

    /// Whether the merged view is empty
    pub fn is_empty(&self) -> bool {
        self.merged.is_empty()
    }

    /// Iterate over the merged view
    pub fn iter(&self) -> serde_json::map::Iter<'_> {
        self.merged.iter()
    }

    /// The merged view as a JSON value
    pub fn to_value(&self) -> JsonValue {
        JsonValue::Object(self.merged.clone())
    }
}

/// Follow nested slices down to the innermost mapping.
///
/// Terminates because nesting depth is bounded at construction.
fn resolve<'a>(
    component: &'a SliceComponent,
    pick: fn(&StreamSlice) -> &SliceComponent,
) -> &'a JsonObject {
    let mut current = component;
    loop {
        match current {
            SliceComponent::Mapping(map) => return map,
            SliceComponent::Slice(inner) => current = pick(inner),
        }
    }
}

impl PartialEq for StreamSlice {
    fn eq(&self, other: &Self) -> bool {
        self.partition() == other.partition() && self.cursor_slice() == other.cursor_slice()
    }
}

impl Eq for StreamSlice {}

impl PartialEq<JsonObject> for StreamSlice {
    fn eq(&self, other: &JsonObject) -> bool {
        &self.merged == other
    }
}

impl Hash for StreamSlice {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // serde_json maps are key-ordered, so the serialization is canonical
        serde_json::to_string(self.partition())
            .unwrap_or_default()
            .hash(state);
        serde_json::to_string(self.cursor_slice())
            .unwrap_or_default()
            .hash(state);
    }
}

impl Default for StreamSlice {
    fn default() -> Self {
        Self::empty()
    }
}

impl Serialize for StreamSlice {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.merged.serialize(serializer)
    }
}

/// An extracted record
#[derive(Debug, Clone)]
pub struct Record {
    data: JsonObject,
    associated_slice: Option<Weak<StreamSlice>>,
}

impl Record {
    /// Create a record attributed to a slice
    pub fn new(data: JsonObject, associated_slice: Option<&Arc<StreamSlice>>) -> Self {
        Self {
            data,
            associated_slice: associated_slice.map(Arc::downgrade),
        }
    }

    /// Create a record from any JSON value.
    ///
    /// Non-object values are wrapped as `{"data": value}`.
    pub fn from_value(value: JsonValue, associated_slice: Option<&Arc<StreamSlice>>) -> Self {
        let data = match value {
            JsonValue::Object(map) => map,
            other => {
                let mut map = JsonObject::new();
                map.insert("data".to_string(), other);
                map
            }
        };
        Self::new(data, associated_slice)
    }

    /// The record fields
    pub fn data(&self) -> &JsonObject {
        &self.data
    }

    /// The slice that produced this record, if it is still alive
    pub fn associated_slice(&self) -> Option<Arc<StreamSlice>> {
        self.associated_slice.as_ref().and_then(Weak::upgrade)
    }

    /// Look up a field
    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.data.get(key)
    }

    /// Check a field
    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the record has no fields
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Iterate over fields
    pub fn iter(&self) -> serde_json::map::Iter<'_> {
        self.data.iter()
    }

    /// The record as a JSON value
    pub fn to_value(&self) -> JsonValue {
        JsonValue::Object(self.data.clone())
    }

    /// Consume the record, keeping only its fields
    pub fn into_data(self) -> JsonObject {
        self.data
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.data.serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashSet;

    fn obj(value: JsonValue) -> JsonObject {
        match value {
            JsonValue::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_slice_merges_partition_and_cursor() {
        let slice = StreamSlice::new(
            obj(json!({"parent_id": "1"})),
            obj(json!({"start": "2024-01-01"})),
            None,
        )
        .unwrap();

        assert_eq!(slice.len(), 2);
        assert_eq!(slice.get("parent_id"), Some(&json!("1")));
        assert_eq!(slice.get("start"), Some(&json!("2024-01-01")));
        assert_eq!(
            slice.to_value(),
            json!({"parent_id": "1", "start": "2024-01-01"})
        );
    }

    #[test]
    fn test_slice_rejects_overlapping_keys() {
        let result = StreamSlice::new(obj(json!({"id": 1})), obj(json!({"id": 2})), None);
        let err = result.unwrap_err();
        assert!(matches!(err, Error::InvalidSlice { .. }));
        assert!(err.to_string().contains("id"));
        assert!(err.is_config_error());
    }

    #[test]
    fn test_slice_equality_ignores_extra_fields() {
        let a = StreamSlice::new(
            obj(json!({"id": 1})),
            JsonObject::new(),
            Some(obj(json!({"name": "parent one"}))),
        )
        .unwrap();
        let b = StreamSlice::new(obj(json!({"id": 1})), JsonObject::new(), None).unwrap();

        assert_eq!(a, b);
        let mut set = HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
    }

    #[test]
    fn test_slice_equality_against_mapping() {
        let slice = StreamSlice::from_partition(obj(json!({"region": "eu"})));
        assert!(slice == obj(json!({"region": "eu"})));
    }

    #[test]
    fn test_nested_slice_unwraps_to_innermost() {
        let inner = StreamSlice::new(obj(json!({"id": 7})), obj(json!({"day": "mon"})), None)
            .unwrap();
        let outer = StreamSlice::new(inner.clone(), inner, None).unwrap();

        assert_eq!(outer.partition(), &obj(json!({"id": 7})));
        assert_eq!(outer.cursor_slice(), &obj(json!({"day": "mon"})));
    }

    #[test]
    fn test_nesting_depth_is_bounded() {
        let mut slice = StreamSlice::empty();
        for _ in 0..MAX_SLICE_NESTING {
            slice = StreamSlice::new(slice.clone(), JsonObject::new(), None).unwrap();
        }
        let err = StreamSlice::new(slice, JsonObject::new(), None).unwrap_err();
        assert!(matches!(err, Error::SliceNestingTooDeep { .. }));
    }

    #[test]
    fn test_empty_slice() {
        let slice = StreamSlice::empty();
        assert!(slice.is_empty());
        assert!(slice.partition().is_empty());
        assert!(slice.cursor_slice().is_empty());
        assert_eq!(serde_json::to_value(&slice).unwrap(), json!({}));
    }

    #[test]
    fn test_record_back_reference_is_weak() {
        let slice = Arc::new(StreamSlice::from_partition(obj(json!({"id": 1}))));
        let record = Record::new(obj(json!({"name": "a"})), Some(&slice));

        assert_eq!(record.associated_slice().as_deref(), Some(&*slice));
        drop(slice);
        assert!(record.associated_slice().is_none());
    }

    #[test]
    fn test_record_equality_on_data() {
        let slice = Arc::new(StreamSlice::empty());
        let a = Record::new(obj(json!({"id": 1})), Some(&slice));
        let b = Record::new(obj(json!({"id": 1})), None);
        assert_eq!(a, b);
        assert_eq!(a.get("id"), Some(&json!(1)));
        assert!(a.contains_key("id"));
    }

    #[test]
    fn test_record_from_scalar() {
        let record = Record::from_value(json!(5), None);
        assert_eq!(record.to_value(), json!({"data": 5}));
    }
}
