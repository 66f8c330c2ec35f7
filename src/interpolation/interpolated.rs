//! Template evaluation and typed wrappers

use super::context::InterpolationContext;
use super::eval::{evaluate as evaluate_expr, kind_name};
use super::parser::parse;
use crate::error::{Error, Result};
use crate::types::{as_integer, value_to_string, JsonObject, JsonValue};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Matches one `{{ expression }}` block
static EXPRESSION_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\{\{(.*?)\}\}").expect("expression regex is valid"));

/// String spellings that evaluate to false in a boolean condition
const FALSY_STRINGS: [&str; 8] = ["False", "false", "{}", "[]", "()", "", "0", "0.0"];

/// Expected type of an evaluated template
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    String,
    Integer,
    Number,
    Boolean,
    Object,
    Array,
}

impl ValueKind {
    fn matches(self, value: &JsonValue) -> bool {
        match self {
            ValueKind::String => value.is_string(),
            ValueKind::Integer => as_integer(value).is_some(),
            ValueKind::Number => value.is_number(),
            ValueKind::Boolean => value.is_boolean(),
            ValueKind::Object => value.is_object(),
            ValueKind::Array => value.is_array(),
        }
    }

    /// Convert a string to this kind when it spells one
    fn coerce(self, text: &str) -> Option<JsonValue> {
        let text = text.trim();
        match self {
            ValueKind::Integer => text.parse::<i64>().ok().map(JsonValue::from),
            ValueKind::Number => text
                .parse::<i64>()
                .ok()
                .map(JsonValue::from)
                .or_else(|| text.parse::<f64>().ok().map(JsonValue::from)),
            ValueKind::Boolean => match text {
                "true" | "True" => Some(JsonValue::Bool(true)),
                "false" | "False" => Some(JsonValue::Bool(false)),
                _ => None,
            },
            ValueKind::String | ValueKind::Object | ValueKind::Array => None,
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::String => "string",
            ValueKind::Integer => "integer",
            ValueKind::Number => "number",
            ValueKind::Boolean => "boolean",
            ValueKind::Object => "object",
            ValueKind::Array => "array",
        };
        f.write_str(name)
    }
}

/// Check if a string contains an expression block
pub fn has_expressions(text: &str) -> bool {
    EXPRESSION_REGEX.is_match(text)
}

/// Evaluate a template string.
///
/// A template that is exactly one `{{ expr }}` block yields the native value
/// of the expression; anything else renders to a string. Evaluation failures
/// and empty results fall back to `default`, itself a template. When
/// `expected` is given the result must be one of those kinds (numeric and
/// boolean strings are coerced first), otherwise a type mismatch is
/// returned.
pub fn evaluate(
    template: &str,
    ctx: &InterpolationContext<'_>,
    default: Option<&str>,
    expected: Option<&[ValueKind]>,
) -> Result<JsonValue> {
    let mut value = render(template, ctx).unwrap_or_else(|e| {
        debug!(template, error = %e, "Template evaluation failed, using default");
        JsonValue::Null
    });

    if is_empty(&value) {
        if let Some(default) = default {
            value = render(default, ctx).unwrap_or_else(|e| {
                debug!(default, error = %e, "Default evaluation failed");
                JsonValue::Null
            });
        }
    }

    match expected {
        Some(kinds) if !kinds.is_empty() => check_kinds(value, kinds),
        _ => Ok(value),
    }
}

fn render(template: &str, ctx: &InterpolationContext<'_>) -> Result<JsonValue> {
    let mut blocks = EXPRESSION_REGEX.captures_iter(template).peekable();
    if blocks.peek().is_none() {
        return Ok(JsonValue::String(template.to_string()));
    }

    let mut rendered = String::new();
    let mut last_end = 0;
    for caps in blocks {
        let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let value = evaluate_expr(&parse(inner.as_str())?, ctx)?;
        if whole.start() == 0 && whole.end() == template.len() {
            return Ok(value);
        }
        rendered.push_str(&template[last_end..whole.start()]);
        rendered.push_str(&value_to_string(&value));
        last_end = whole.end();
    }
    rendered.push_str(&template[last_end..]);
    Ok(JsonValue::String(rendered))
}

fn is_empty(value: &JsonValue) -> bool {
    match value {
        JsonValue::Null => true,
        JsonValue::String(s) => s.is_empty(),
        _ => false,
    }
}

fn check_kinds(value: JsonValue, kinds: &[ValueKind]) -> Result<JsonValue> {
    if kinds.iter().any(|kind| kind.matches(&value)) {
        return Ok(value);
    }
    if let JsonValue::String(text) = &value {
        if let Some(coerced) = kinds.iter().find_map(|kind| kind.coerce(text)) {
            return Ok(coerced);
        }
    }
    Err(Error::type_mismatch(
        value_to_string(&value),
        kind_name(&value),
        kinds
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" or "),
    ))
}

// ============================================================================
// InterpolatedString
// ============================================================================

/// A string that may contain expressions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InterpolatedString {
    template: String,
    #[serde(skip)]
    default: Option<String>,
}

impl InterpolatedString {
    /// Create from a template
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            default: None,
        }
    }

    /// Set the fallback template used when evaluation is empty or fails
    #[must_use]
    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// The raw template
    pub fn as_str(&self) -> &str {
        &self.template
    }

    /// Whether the template contains expressions
    pub fn is_template(&self) -> bool {
        has_expressions(&self.template)
    }

    /// Evaluate to a native value
    pub fn eval(&self, ctx: &InterpolationContext<'_>) -> Result<JsonValue> {
        evaluate(&self.template, ctx, self.default.as_deref(), None)
    }

    /// Evaluate, requiring one of the given kinds
    pub fn eval_as(&self, ctx: &InterpolationContext<'_>, kinds: &[ValueKind]) -> Result<JsonValue> {
        evaluate(&self.template, ctx, self.default.as_deref(), Some(kinds))
    }

    /// Evaluate and render as text; null renders empty
    pub fn eval_string(&self, ctx: &InterpolationContext<'_>) -> Result<String> {
        Ok(value_to_string(&self.eval(ctx)?))
    }
}

impl From<&str> for InterpolatedString {
    fn from(template: &str) -> Self {
        Self::new(template)
    }
}

impl From<String> for InterpolatedString {
    fn from(template: String) -> Self {
        Self::new(template)
    }
}

// ============================================================================
// InterpolatedBoolean
// ============================================================================

/// A condition evaluated to a boolean.
///
/// The result is false when the condition evaluates to false, null, zero,
/// an empty collection, or one of the strings `"False"`, `"false"`, `"{}"`,
/// `"[]"`, `"()"`, `""`, `"0"`, `"0.0"`. Any other value is true: presence
/// is truthy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InterpolatedBoolean {
    Literal(bool),
    Condition(String),
}

impl InterpolatedBoolean {
    /// Create from a condition template
    pub fn new(condition: impl Into<String>) -> Self {
        Self::Condition(condition.into())
    }

    /// Evaluate the condition
    pub fn eval(&self, ctx: &InterpolationContext<'_>) -> Result<bool> {
        match self {
            Self::Literal(value) => Ok(*value),
            Self::Condition(condition) => {
                let evaluated = evaluate(condition, ctx, Some("False"), None)?;
                Ok(!is_falsy(&evaluated))
            }
        }
    }
}

/// Membership in the closed falsy set
pub fn is_falsy(value: &JsonValue) -> bool {
    match value {
        JsonValue::Null => true,
        JsonValue::Bool(b) => !b,
        JsonValue::Number(n) => n.as_f64() == Some(0.0),
        JsonValue::String(s) => FALSY_STRINGS.contains(&s.as_str()),
        JsonValue::Array(items) => items.is_empty(),
        JsonValue::Object(map) => map.is_empty(),
    }
}

// ============================================================================
// InterpolatedMapping
// ============================================================================

/// A mapping whose keys and string values are templates
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InterpolatedMapping {
    mapping: JsonObject,
}

impl InterpolatedMapping {
    /// Create from a mapping
    pub fn new(mapping: JsonObject) -> Self {
        Self { mapping }
    }

    /// Whether the mapping has no entries
    pub fn is_empty(&self) -> bool {
        self.mapping.is_empty()
    }

    /// Evaluate with string keys and unconstrained values
    pub fn eval(&self, ctx: &InterpolationContext<'_>) -> Result<JsonObject> {
        self.eval_with(ctx, &[ValueKind::String], None)
    }

    /// Evaluate keys and values.
    ///
    /// Keys must evaluate to one of `key_kinds`. Only string values are
    /// evaluated; other values pass through unchanged.
    pub fn eval_with(
        &self,
        ctx: &InterpolationContext<'_>,
        key_kinds: &[ValueKind],
        value_kinds: Option<&[ValueKind]>,
    ) -> Result<JsonObject> {
        let mut evaluated = JsonObject::new();
        for (name, value) in &self.mapping {
            let key = evaluate(name, ctx, None, Some(key_kinds))?;
            let value = match value {
                JsonValue::String(template) => evaluate(template, ctx, None, value_kinds)?,
                other => other.clone(),
            };
            evaluated.insert(value_to_string(&key), value);
        }
        Ok(evaluated)
    }
}

impl From<JsonObject> for InterpolatedMapping {
    fn from(mapping: JsonObject) -> Self {
        Self::new(mapping)
    }
}
