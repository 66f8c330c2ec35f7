//! Schema inference tests

use super::*;
use crate::slice::Record;
use crate::types::JsonObject;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use test_case::test_case;

fn record(value: Value) -> Record {
    Record::from_value(value, None)
}

fn object(value: Value) -> JsonObject {
    value.as_object().cloned().unwrap_or_default()
}

// ============================================================================
// Schema Inference Tests
// ============================================================================

#[test]
fn test_infer_simple_object() {
    let records = [object(json!({"name": "John", "age": 30, "active": true}))];

    let schema = infer_schema(&records).unwrap();

    assert_eq!(
        schema,
        json!({
            "$schema": SCHEMA_DRAFT,
            "type": "object",
            "properties": {
                "active": {"type": "boolean"},
                "age": {"type": "integer"},
                "name": {"type": "string"}
            },
            "required": ["active", "age", "name"]
        })
    );
}

#[test]
fn test_infer_no_records() {
    let records: Vec<JsonObject> = Vec::new();
    assert_eq!(infer_schema(&records), None);
    assert_eq!(SchemaInferrer::new().get_stream_schema("users"), None);
}

#[test]
fn test_missing_and_null_fields_are_nullable() {
    let records = [
        object(json!({"id": 1, "email": "a@example.com", "note": null})),
        object(json!({"id": 2, "note": "hi"})),
    ];

    let schema = infer_schema(&records).unwrap();

    assert_eq!(schema["properties"]["email"]["type"], json!(["null", "string"]));
    assert_eq!(schema["properties"]["note"]["type"], json!(["null", "string"]));
    assert_eq!(schema["required"], json!(["id"]));
}

#[test]
fn test_integer_widens_to_number() {
    let records = [object(json!({"price": 10})), object(json!({"price": 10.5}))];
    let schema = infer_schema(&records).unwrap();
    assert_eq!(schema["properties"]["price"]["type"], json!("number"));
}

#[test]
fn test_type_union() {
    let records = [object(json!({"code": 7})), object(json!({"code": "seven"}))];
    let schema = infer_schema(&records).unwrap();
    assert_eq!(schema["properties"]["code"]["type"], json!(["integer", "string"]));
}

#[test]
fn test_nested_objects_and_arrays() {
    let records = [object(json!({
        "user": {"name": "Ada", "tags": ["x", "y"]},
        "items": [{"sku": "a", "qty": 1}, {"sku": "b"}]
    }))];

    let schema = infer_schema(&records).unwrap();

    let user = &schema["properties"]["user"];
    assert_eq!(user["type"], json!("object"));
    assert_eq!(user["properties"]["tags"]["items"], json!({"type": "string"}));

    let items = &schema["properties"]["items"];
    assert_eq!(items["type"], json!("array"));
    assert_eq!(items["items"]["properties"]["qty"]["type"], json!(["null", "integer"]));
    assert_eq!(items["items"]["required"], json!(["sku"]));
}

#[test]
fn test_empty_array_has_no_items() {
    let records = [object(json!({"tags": []}))];
    let schema = infer_schema(&records).unwrap();
    assert_eq!(schema["properties"]["tags"], json!({"type": "array"}));
}

#[test]
fn test_inferrer_per_stream() {
    let mut inferrer = SchemaInferrer::new();
    inferrer.accumulate("users", &record(json!({"id": 1})));
    inferrer.accumulate("users", &record(json!({"id": 2, "name": "b"})));
    inferrer.accumulate("orders", &record(json!({"total": 1.5})));

    let users = inferrer.get_stream_schema("users").unwrap();
    assert_eq!(users["properties"]["name"]["type"], json!(["null", "string"]));

    let orders = inferrer.get_stream_schema("orders").unwrap();
    assert_eq!(orders["properties"]["total"]["type"], json!("number"));

    assert_eq!(inferrer.get_stream_schema("refunds"), None);
}

#[test]
fn test_json_type_of() {
    assert_eq!(JsonType::of(&json!(null)), JsonType::Null);
    assert_eq!(JsonType::of(&json!(1)), JsonType::Integer);
    assert_eq!(JsonType::of(&json!(1.5)), JsonType::Number);
    assert_eq!(JsonType::of(&json!([1])), JsonType::Array);
    assert_eq!(JsonType::Boolean.to_string(), "boolean");
}

// ============================================================================
// Datetime Format Tests
// ============================================================================

#[test_case(json!("2024-01-15"), "%Y-%m-%d"; "date")]
#[test_case(json!("2024-01-15 10:30:00"), "%Y-%m-%d %H:%M:%S"; "space separated")]
#[test_case(json!("2024-01-15T10:30:00"), "%Y-%m-%dT%H:%M:%S"; "iso without zone")]
#[test_case(json!("2024-01-15T10:30:00.123Z"), "%Y-%m-%dT%H:%M:%S.%f%z"; "iso with z")]
#[test_case(json!("2024-01-15T10:30:00+02:00"), "%Y-%m-%dT%H:%M:%S.%f%z"; "iso with offset")]
#[test_case(json!(1_700_000_000), "%s"; "epoch number")]
#[test_case(json!("1700000000"), "%s"; "epoch string")]
#[test_case(json!("15/01/2024 10:30"), "%d/%m/%Y %H:%M"; "day first with time")]
#[test_case(json!("2024-01"), "%Y-%m"; "year month")]
#[test_case(json!("15-01-2024"), "%d-%m-%Y"; "day first date")]
fn test_datetime_format_detected(value: Value, expected: &str) {
    let mut inferrer = DatetimeFormatInferrer::new();
    inferrer.accumulate(&record(json!({ "at": value })));

    assert_eq!(
        inferrer.get_inferred_datetime_formats().get("at").map(String::as_str),
        Some(expected)
    );
}

#[test_case(json!(42); "small number")]
#[test_case(json!("hello"); "text")]
#[test_case(json!(true); "boolean")]
#[test_case(json!(1.7e9); "float")]
fn test_datetime_format_not_detected(value: Value) {
    let mut inferrer = DatetimeFormatInferrer::new();
    inferrer.accumulate(&record(json!({ "at": value })));
    assert!(inferrer.get_inferred_datetime_formats().is_empty());
}

#[test]
fn test_datetime_format_dropped_on_mismatch() {
    let mut inferrer = DatetimeFormatInferrer::new();
    inferrer.accumulate(&record(json!({"created": "2024-01-15", "updated": "2024-01-15"})));
    inferrer.accumulate(&record(json!({"created": "2024-02-01", "updated": "15-01-2024"})));
    // Once dropped, a field never comes back
    inferrer.accumulate(&record(json!({"created": "2024-03-01", "updated": "2024-03-01"})));

    let formats = inferrer.get_inferred_datetime_formats();
    assert_eq!(formats.get("created").map(String::as_str), Some("%Y-%m-%d"));
    assert!(!formats.contains_key("updated"));
}

#[test]
fn test_datetime_format_ignores_non_candidates() {
    let mut inferrer = DatetimeFormatInferrer::new();
    inferrer.accumulate(&record(json!({"created": "2024-01-15"})));
    inferrer.accumulate(&record(json!({"created": null})));

    assert_eq!(
        inferrer.get_inferred_datetime_formats().get("created").map(String::as_str),
        Some("%Y-%m-%d")
    );
}
