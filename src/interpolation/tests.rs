//! Tests for the interpolation engine

use super::*;
use crate::error::Error;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use test_case::test_case;

fn config() -> Value {
    json!({
        "api_key": "sk_test_123",
        "page_size": 10,
        "page_size_str": "25",
        "host": "api.example.com",
        "credentials": {"client_id": "my-client"},
        "regions": ["eu", "us"],
        "start_date": "2024-01-15"
    })
}

// ============================================================================
// evaluate
// ============================================================================

#[test]
fn test_non_template_evaluates_to_itself() {
    let config = config();
    let ctx = InterpolationContext::new(&config);
    assert_eq!(
        evaluate("plain text", &ctx, None, None).unwrap(),
        json!("plain text")
    );
}

#[test]
fn test_single_expression_returns_native_value() {
    let config = config();
    let ctx = InterpolationContext::new(&config);
    assert_eq!(
        evaluate("{{ config.page_size }}", &ctx, None, None).unwrap(),
        json!(10)
    );
    assert_eq!(
        evaluate("{{ config.regions }}", &ctx, None, None).unwrap(),
        json!(["eu", "us"])
    );
}

#[test]
fn test_mixed_template_renders_string() {
    let config = config();
    let ctx = InterpolationContext::new(&config);
    assert_eq!(
        evaluate(
            "https://{{ config.host }}/v1?limit={{ config.page_size }}",
            &ctx,
            None,
            None
        )
        .unwrap(),
        json!("https://api.example.com/v1?limit=10")
    );
}

#[test]
fn test_whitespace_in_expression() {
    let config = config();
    let ctx = InterpolationContext::new(&config);
    for template in ["{{config.api_key}}", "{{ config.api_key }}", "{{  config.api_key  }}"] {
        assert_eq!(
            evaluate(template, &ctx, None, None).unwrap(),
            json!("sk_test_123")
        );
    }
}

#[test]
fn test_bindings_and_nested_paths() {
    let config = config();
    let ctx = InterpolationContext::new(&config)
        .with("response", json!({"_metadata": {"next": "abc"}, "items": [1, 2, 3]}))
        .with("last_page_size", json!(3));

    assert_eq!(
        evaluate("{{ response._metadata.next }}", &ctx, None, None).unwrap(),
        json!("abc")
    );
    assert_eq!(
        evaluate("{{ response['items'][-1] }}", &ctx, None, None).unwrap(),
        json!(3)
    );
    assert_eq!(
        evaluate("{{ last_page_size * 2 }}", &ctx, None, None).unwrap(),
        json!(6)
    );
    assert_eq!(
        evaluate("{{ config.credentials.client_id | upper }}", &ctx, None, None).unwrap(),
        json!("MY-CLIENT")
    );
}

#[test]
fn test_missing_value_falls_back_to_default() {
    let config = config();
    let ctx = InterpolationContext::new(&config);
    assert_eq!(
        evaluate("{{ config.missing }}", &ctx, Some("fallback"), None).unwrap(),
        json!("fallback")
    );
    assert_eq!(
        evaluate("{{ config.missing }}", &ctx, None, None).unwrap(),
        Value::Null
    );
}

#[test]
fn test_default_is_itself_a_template() {
    let config = config();
    let ctx = InterpolationContext::new(&config);
    assert_eq!(
        evaluate("{{ config.missing }}", &ctx, Some("{{ config.page_size }}"), None).unwrap(),
        json!(10)
    );
}

#[test]
fn test_evaluation_error_returns_default() {
    let config = config();
    let ctx = InterpolationContext::new(&config);

    // Syntax error, unknown filter, bad arithmetic
    for template in ["{{ config. }}", "{{ config.api_key | nope }}", "{{ 'a' - 1 }}"] {
        assert_eq!(
            evaluate(template, &ctx, Some("dflt"), None).unwrap(),
            json!("dflt"),
            "template {template}"
        );
    }
}

#[test]
fn test_expected_types_coerce_numeric_strings() {
    let config = config();
    let ctx = InterpolationContext::new(&config);
    assert_eq!(
        evaluate(
            "{{ config.page_size_str }}",
            &ctx,
            None,
            Some(&[ValueKind::Integer])
        )
        .unwrap(),
        json!(25)
    );
    assert_eq!(
        evaluate("true", &ctx, None, Some(&[ValueKind::Boolean])).unwrap(),
        json!(true)
    );
}

#[test]
fn test_expected_types_mismatch_is_an_error() {
    let config = config();
    let ctx = InterpolationContext::new(&config);
    let err = evaluate("{{ config.api_key }}", &ctx, None, Some(&[ValueKind::Integer])).unwrap_err();
    assert!(matches!(err, Error::TypeMismatch { .. }));
    assert!(err.is_config_error());
    assert_eq!(
        err.to_string(),
        "Type mismatch: sk_test_123 is of type string, expected integer"
    );
}

#[test]
fn test_conditional_and_logic() {
    let config = config();
    let ctx = InterpolationContext::new(&config).with("response", json!({"has_more": false}));
    assert_eq!(
        evaluate("{{ 'more' if response.has_more else 'done' }}", &ctx, None, None).unwrap(),
        json!("done")
    );
    assert_eq!(
        evaluate("{{ not response.has_more and 'eu' in config.regions }}", &ctx, None, None)
            .unwrap(),
        json!(true)
    );
    assert_eq!(
        evaluate("{{ response.cursor is defined }}", &ctx, None, None).unwrap(),
        json!(false)
    );
}

#[test]
fn test_filters() {
    let config = config();
    let ctx = InterpolationContext::new(&config);
    let cases = [
        ("{{ 'a b' | urlencode }}", json!("a+b")),
        ("{{ 'user:pass' | b64encode }}", json!("dXNlcjpwYXNz")),
        ("{{ 'dXNlcjpwYXNz' | b64decode }}", json!("user:pass")),
        ("{{ config.page_size | string }}", json!("10")),
        ("{{ '42' | int }}", json!(42)),
        ("{{ config.missing | default(5) }}", json!(5)),
        ("{{ config.regions | length }}", json!(2)),
        ("{{ config.regions | join(',') }}", json!("eu,us")),
        ("{{ '  x ' | trim }}", json!("x")),
        ("{{ 'x' ~ 1 }}", json!("x1")),
    ];
    for (template, expected) in cases {
        assert_eq!(
            evaluate(template, &ctx, None, None).unwrap(),
            expected,
            "template {template}"
        );
    }
}

#[test]
fn test_datetime_functions() {
    let config = config();
    let ctx = InterpolationContext::new(&config);
    assert_eq!(
        evaluate(
            "{{ format_datetime(config.start_date, '%Y/%m/%d') }}",
            &ctx,
            None,
            None
        )
        .unwrap(),
        json!("2024/01/15")
    );
    assert_eq!(
        evaluate("{{ timestamp('2024-01-01T00:00:00Z') }}", &ctx, None, None).unwrap(),
        json!(1_704_067_200)
    );

    let today = evaluate("{{ today_utc() }}", &ctx, None, None).unwrap();
    assert_eq!(today.as_str().map(str::len), Some(10));
    let shifted = evaluate("{{ day_delta(-1, '%Y-%m-%d') }}", &ctx, None, None).unwrap();
    assert_eq!(shifted.as_str().map(str::len), Some(10));
}

#[test_case(json!(1e12) ; "beyond the datetime range")]
#[test_case(json!(1e300) ; "beyond integer seconds")]
#[test_case(json!(-1e15) ; "far in the past")]
fn test_day_delta_out_of_range_uses_default(days: Value) {
    let config = json!({ "days": days });
    let ctx = InterpolationContext::new(&config);
    assert_eq!(
        evaluate("{{ day_delta(config.days) }}", &ctx, Some("fallback"), None).unwrap(),
        json!("fallback")
    );
}

#[test]
fn test_huge_timestamp_is_not_a_datetime() {
    let config = json!({ "ts": 1e300 });
    let ctx = InterpolationContext::new(&config);
    assert_eq!(
        evaluate("{{ format_datetime(config.ts, '%Y') }}", &ctx, Some("none"), None).unwrap(),
        json!("none")
    );
}

#[test]
fn test_has_expressions() {
    assert!(has_expressions("{{ config.key }}"));
    assert!(has_expressions("prefix {{ var }} suffix"));
    assert!(!has_expressions("no templates here"));
    assert!(!has_expressions("{ not a template }"));
}

// ============================================================================
// InterpolatedString
// ============================================================================

#[test]
fn test_interpolated_string_with_default() {
    let config = config();
    let ctx = InterpolationContext::new(&config);
    let s = InterpolatedString::new("{{ config.missing }}").with_default("none given");
    assert_eq!(s.eval_string(&ctx).unwrap(), "none given");
    assert!(s.is_template());
    assert!(!InterpolatedString::from("static").is_template());
}

#[test]
fn test_interpolated_string_deserializes_from_plain_string() {
    let s: InterpolatedString = serde_json::from_value(json!("{{ config.api_key }}")).unwrap();
    assert_eq!(s.as_str(), "{{ config.api_key }}");
}

// ============================================================================
// InterpolatedBoolean
// ============================================================================

#[test_case(json!(false) ; "boolean false")]
#[test_case(Value::Null ; "null")]
#[test_case(json!("") ; "empty string")]
#[test_case(json!("0") ; "zero string")]
#[test_case(json!("0.0") ; "zero float string")]
#[test_case(json!("{}") ; "braces string")]
#[test_case(json!("[]") ; "brackets string")]
#[test_case(json!("()") ; "parens string")]
#[test_case(json!("false") ; "lowercase false string")]
#[test_case(json!("False") ; "capitalised false string")]
#[test_case(json!({}) ; "empty object")]
#[test_case(json!([]) ; "empty array")]
#[test_case(json!(0) ; "zero")]
fn test_boolean_falsy_values(value: Value) {
    let config = config();
    let ctx = InterpolationContext::new(&config).with("value", value);
    let condition = InterpolatedBoolean::new("{{ value }}");
    assert!(!condition.eval(&ctx).unwrap());
}

#[test_case(json!(true) ; "boolean true")]
#[test_case(json!("no") ; "arbitrary string")]
#[test_case(json!("None") ; "none spelled out")]
#[test_case(json!(1) ; "one")]
#[test_case(json!([0]) ; "non empty array")]
#[test_case(json!({"a": null}) ; "non empty object")]
fn test_boolean_truthy_values(value: Value) {
    let config = config();
    let ctx = InterpolationContext::new(&config).with("value", value);
    let condition = InterpolatedBoolean::new("{{ value }}");
    assert!(condition.eval(&ctx).unwrap());
}

#[test]
fn test_boolean_comparison_and_literal() {
    let config = config();
    let ctx = InterpolationContext::new(&config).with("last_page_size", json!(0));
    assert!(InterpolatedBoolean::new("{{ last_page_size == 0 }}")
        .eval(&ctx)
        .unwrap());
    assert!(!InterpolatedBoolean::Literal(false).eval(&ctx).unwrap());

    let parsed: InterpolatedBoolean = serde_json::from_value(json!(true)).unwrap();
    assert_eq!(parsed, InterpolatedBoolean::Literal(true));
}

#[test]
fn test_boolean_error_is_false() {
    let config = config();
    let ctx = InterpolationContext::new(&config);
    assert!(!InterpolatedBoolean::new("{{ (( }}").eval(&ctx).unwrap());
}

// ============================================================================
// InterpolatedMapping
// ============================================================================

#[test]
fn test_mapping_evaluates_keys_and_string_values() {
    let config = config();
    let ctx = InterpolationContext::new(&config).with("next_page_token", json!("tok"));
    let mapping = InterpolatedMapping::new(
        json!({
            "api_key": "{{ config.api_key }}",
            "{{ 'cur' ~ 'sor' }}": "{{ next_page_token }}",
            "limit": 50,
            "nested": {"untouched": "{{ config.api_key }}"}
        })
        .as_object()
        .cloned()
        .unwrap(),
    );

    let evaluated = mapping.eval(&ctx).unwrap();
    assert_eq!(
        Value::Object(evaluated),
        json!({
            "api_key": "sk_test_123",
            "cursor": "tok",
            "limit": 50,
            "nested": {"untouched": "{{ config.api_key }}"}
        })
    );
}

#[test]
fn test_mapping_key_type_constraint() {
    let config = config();
    let ctx = InterpolationContext::new(&config);
    let mapping = InterpolatedMapping::new(
        json!({"{{ config.page_size }}": "x"})
            .as_object()
            .cloned()
            .unwrap(),
    );

    assert!(matches!(
        mapping.eval(&ctx).unwrap_err(),
        Error::TypeMismatch { .. }
    ));

    let evaluated = mapping
        .eval_with(&ctx, &[ValueKind::String, ValueKind::Integer], None)
        .unwrap();
    assert_eq!(evaluated.get("10"), Some(&json!("x")));
}
