//! Expression evaluation, filters and functions

use super::context::InterpolationContext;
use super::parser::{BinOp, Expr};
use crate::error::{Error, Result};
use crate::types::{value_to_string, JsonObject, JsonValue};
use base64::Engine as _;
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta, TimeZone, Utc};
use std::cmp::Ordering;

/// Default output format of `day_delta`
const DAY_DELTA_FORMAT: &str = "%Y-%m-%dT%H:%M:%S.%f%z";

/// Evaluate a parsed expression against a context
pub(crate) fn evaluate(expr: &Expr, ctx: &InterpolationContext) -> Result<JsonValue> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Var(name) => Ok(ctx.lookup(name).cloned().unwrap_or(JsonValue::Null)),
        Expr::Attr(target, name) => {
            let target = evaluate(target, ctx)?;
            Ok(get_item(&target, &JsonValue::String(name.clone())))
        }
        Expr::Index(target, index) => {
            let target = evaluate(target, ctx)?;
            let index = evaluate(index, ctx)?;
            Ok(get_item(&target, &index))
        }
        Expr::Call(name, args) => {
            let args = args
                .iter()
                .map(|arg| evaluate(arg, ctx))
                .collect::<Result<Vec<_>>>()?;
            call_function(name, &args)
        }
        Expr::Filter(target, name, args) => {
            let target = evaluate(target, ctx)?;
            let args = args
                .iter()
                .map(|arg| evaluate(arg, ctx))
                .collect::<Result<Vec<_>>>()?;
            apply_filter(name, target, &args)
        }
        Expr::Not(inner) => Ok(JsonValue::Bool(!is_truthy(&evaluate(inner, ctx)?))),
        Expr::Neg(inner) => {
            let value = evaluate(inner, ctx)?;
            arithmetic(BinOp::Sub, &JsonValue::from(0), &value)
        }
        Expr::Binary(BinOp::And, left, right) => {
            let left = evaluate(left, ctx)?;
            if is_truthy(&left) {
                evaluate(right, ctx)
            } else {
                Ok(left)
            }
        }
        Expr::Binary(BinOp::Or, left, right) => {
            let left = evaluate(left, ctx)?;
            if is_truthy(&left) {
                Ok(left)
            } else {
                evaluate(right, ctx)
            }
        }
        Expr::Binary(op, left, right) => {
            let left = evaluate(left, ctx)?;
            let right = evaluate(right, ctx)?;
            binary(*op, &left, &right)
        }
        Expr::Test {
            expr,
            name,
            negated,
        } => {
            let value = evaluate(expr, ctx)?;
            let result = match name.as_str() {
                "defined" => !value.is_null(),
                "undefined" | "none" => value.is_null(),
                "string" => value.is_string(),
                "number" => value.is_number(),
                "integer" => value.is_i64() || value.is_u64(),
                "boolean" => value.is_boolean(),
                "mapping" => value.is_object(),
                "sequence" | "iterable" => value.is_array() || value.is_string(),
                other => return Err(Error::template(format!("Unknown test '{other}'"))),
            };
            Ok(JsonValue::Bool(result != *negated))
        }
        Expr::Conditional {
            condition,
            then,
            otherwise,
        } => {
            if is_truthy(&evaluate(condition, ctx)?) {
                evaluate(then, ctx)
            } else {
                match otherwise {
                    Some(expr) => evaluate(expr, ctx),
                    None => Ok(JsonValue::Null),
                }
            }
        }
        Expr::List(items) => Ok(JsonValue::Array(
            items
                .iter()
                .map(|item| evaluate(item, ctx))
                .collect::<Result<Vec<_>>>()?,
        )),
        Expr::Dict(entries) => {
            let mut map = JsonObject::new();
            for (key, value) in entries {
                let key = value_to_string(&evaluate(key, ctx)?);
                map.insert(key, evaluate(value, ctx)?);
            }
            Ok(JsonValue::Object(map))
        }
    }
}

/// Python-style truthiness of an evaluated value
pub(crate) fn is_truthy(value: &JsonValue) -> bool {
    match value {
        JsonValue::Null => false,
        JsonValue::Bool(b) => *b,
        JsonValue::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        JsonValue::String(s) => !s.is_empty(),
        JsonValue::Array(items) => !items.is_empty(),
        JsonValue::Object(map) => !map.is_empty(),
    }
}

/// Attribute or index access; anything missing is null
fn get_item(target: &JsonValue, key: &JsonValue) -> JsonValue {
    match (target, key) {
        (JsonValue::Object(map), JsonValue::String(k)) => {
            map.get(k).cloned().unwrap_or(JsonValue::Null)
        }
        (JsonValue::Object(map), other) => map
            .get(&value_to_string(other))
            .cloned()
            .unwrap_or(JsonValue::Null),
        (JsonValue::Array(items), key) => index_of(key, items.len())
            .and_then(|i| items.get(i).cloned())
            .unwrap_or(JsonValue::Null),
        (JsonValue::String(s), key) => {
            let chars: Vec<char> = s.chars().collect();
            index_of(key, chars.len())
                .and_then(|i| chars.get(i))
                .map_or(JsonValue::Null, |c| JsonValue::String(c.to_string()))
        }
        _ => JsonValue::Null,
    }
}

/// Resolve a possibly negative index against a length
fn index_of(key: &JsonValue, len: usize) -> Option<usize> {
    let index = match key {
        JsonValue::Number(n) => n.as_i64()?,
        JsonValue::String(s) => s.parse::<i64>().ok()?,
        _ => return None,
    };
    let len = i64::try_from(len).ok()?;
    let resolved = if index < 0 { len + index } else { index };
    usize::try_from(resolved).ok()
}

fn binary(op: BinOp, left: &JsonValue, right: &JsonValue) -> Result<JsonValue> {
    match op {
        BinOp::Eq => Ok(JsonValue::Bool(values_equal(left, right))),
        BinOp::Ne => Ok(JsonValue::Bool(!values_equal(left, right))),
        BinOp::Lt => compare(left, right).map(|o| JsonValue::Bool(o == Ordering::Less)),
        BinOp::Le => compare(left, right).map(|o| JsonValue::Bool(o != Ordering::Greater)),
        BinOp::Gt => compare(left, right).map(|o| JsonValue::Bool(o == Ordering::Greater)),
        BinOp::Ge => compare(left, right).map(|o| JsonValue::Bool(o != Ordering::Less)),
        BinOp::In => Ok(JsonValue::Bool(contains(right, left))),
        BinOp::NotIn => Ok(JsonValue::Bool(!contains(right, left))),
        BinOp::Concat => Ok(JsonValue::String(format!(
            "{}{}",
            value_to_string(left),
            value_to_string(right)
        ))),
        BinOp::Add => match (left, right) {
            (JsonValue::String(a), JsonValue::String(b)) => Ok(JsonValue::String(format!("{a}{b}"))),
            (JsonValue::Array(a), JsonValue::Array(b)) => {
                Ok(JsonValue::Array(a.iter().chain(b).cloned().collect()))
            }
            _ => arithmetic(op, left, right),
        },
        BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::FloorDiv | BinOp::Mod => {
            arithmetic(op, left, right)
        }
        BinOp::And | BinOp::Or => unreachable!("short-circuit operators are evaluated lazily"),
    }
}

fn values_equal(left: &JsonValue, right: &JsonValue) -> bool {
    match (left, right) {
        (JsonValue::Number(a), JsonValue::Number(b)) => a.as_f64() == b.as_f64(),
        _ => left == right,
    }
}

fn compare(left: &JsonValue, right: &JsonValue) -> Result<Ordering> {
    match (left, right) {
        (JsonValue::Number(a), JsonValue::Number(b)) => a
            .as_f64()
            .zip(b.as_f64())
            .and_then(|(a, b)| a.partial_cmp(&b))
            .ok_or_else(|| Error::template("Cannot compare numbers")),
        (JsonValue::String(a), JsonValue::String(b)) => Ok(a.cmp(b)),
        (JsonValue::Bool(a), JsonValue::Bool(b)) => Ok(a.cmp(b)),
        _ => Err(Error::template(format!(
            "Cannot compare {} with {}",
            kind_name(left),
            kind_name(right)
        ))),
    }
}

fn contains(container: &JsonValue, item: &JsonValue) -> bool {
    match container {
        JsonValue::Array(items) => items.iter().any(|v| values_equal(v, item)),
        JsonValue::Object(map) => map.contains_key(&value_to_string(item)),
        JsonValue::String(s) => s.contains(&value_to_string(item)),
        _ => false,
    }
}

fn arithmetic(op: BinOp, left: &JsonValue, right: &JsonValue) -> Result<JsonValue> {
    let (Some(a), Some(b)) = (to_number(left), to_number(right)) else {
        return Err(Error::template(format!(
            "Unsupported operand types for {op:?}: {} and {}",
            kind_name(left),
            kind_name(right)
        )));
    };

    // Integer arithmetic stays integral where the result is exact
    if let (Number::Int(a), Number::Int(b)) = (a, b) {
        let result = match op {
            BinOp::Add => a.checked_add(b),
            BinOp::Sub => a.checked_sub(b),
            BinOp::Mul => a.checked_mul(b),
            BinOp::FloorDiv if b != 0 => Some(a.div_euclid(b)),
            BinOp::Mod if b != 0 => Some(a.rem_euclid(b)),
            _ => None,
        };
        if let Some(result) = result {
            return Ok(JsonValue::from(result));
        }
    }

    let (a, b) = (a.as_f64(), b.as_f64());
    if b == 0.0 && matches!(op, BinOp::Div | BinOp::FloorDiv | BinOp::Mod) {
        return Err(Error::template("Division by zero"));
    }
    let result = match op {
        BinOp::Add => a + b,
        BinOp::Sub => a - b,
        BinOp::Mul => a * b,
        BinOp::Div => a / b,
        BinOp::FloorDiv => (a / b).floor(),
        BinOp::Mod => a.rem_euclid(b),
        _ => unreachable!("only arithmetic operators reach here"),
    };
    Ok(JsonValue::from(result))
}

#[derive(Debug, Clone, Copy)]
enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    fn as_f64(self) -> f64 {
        match self {
            Number::Int(i) => i as f64,
            Number::Float(f) => f,
        }
    }
}

fn to_number(value: &JsonValue) -> Option<Number> {
    match value {
        JsonValue::Number(n) => n
            .as_i64()
            .map(Number::Int)
            .or_else(|| n.as_f64().map(Number::Float)),
        JsonValue::Bool(b) => Some(Number::Int(i64::from(*b))),
        _ => None,
    }
}

/// Human readable type name used in error messages
pub(crate) fn kind_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(n) if n.is_i64() || n.is_u64() => "integer",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

// ============================================================================
// Filters
// ============================================================================

fn apply_filter(name: &str, value: JsonValue, args: &[JsonValue]) -> Result<JsonValue> {
    let arg = |i: usize| args.get(i).cloned().unwrap_or(JsonValue::Null);
    match name {
        "default" | "d" => Ok(if value.is_null() { arg(0) } else { value }),
        "string" => Ok(JsonValue::String(value_to_string(&value))),
        "int" => Ok(JsonValue::from(
            to_int(&value).or_else(|| to_int(&arg(0))).unwrap_or(0),
        )),
        "float" => Ok(to_float(&value).map_or(JsonValue::from(0.0), JsonValue::from)),
        "lower" => Ok(JsonValue::String(value_to_string(&value).to_lowercase())),
        "upper" => Ok(JsonValue::String(value_to_string(&value).to_uppercase())),
        "trim" => Ok(JsonValue::String(value_to_string(&value).trim().to_string())),
        "length" | "count" => Ok(JsonValue::from(length(&value))),
        "first" => Ok(match &value {
            JsonValue::Array(items) => items.first().cloned().unwrap_or(JsonValue::Null),
            other => get_item(other, &JsonValue::from(0)),
        }),
        "last" => Ok(match &value {
            JsonValue::Array(items) => items.last().cloned().unwrap_or(JsonValue::Null),
            other => get_item(other, &JsonValue::from(-1)),
        }),
        "join" => {
            let separator = value_to_string(&arg(0));
            match value {
                JsonValue::Array(items) => Ok(JsonValue::String(
                    items
                        .iter()
                        .map(value_to_string)
                        .collect::<Vec<_>>()
                        .join(&separator),
                )),
                other => Ok(JsonValue::String(value_to_string(&other))),
            }
        }
        "replace" => Ok(JsonValue::String(value_to_string(&value).replace(
            &value_to_string(&arg(0)),
            &value_to_string(&arg(1)),
        ))),
        "tojson" => Ok(JsonValue::String(serde_json::to_string(&value)?)),
        "b64encode" => Ok(JsonValue::String(
            base64::engine::general_purpose::STANDARD.encode(value_to_string(&value)),
        )),
        "b64decode" => {
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(value_to_string(&value))
                .map_err(|e| Error::template(format!("Invalid base64 input: {e}")))?;
            let text = String::from_utf8(bytes)
                .map_err(|e| Error::template(format!("Decoded base64 is not UTF-8: {e}")))?;
            Ok(JsonValue::String(text))
        }
        "urlencode" => Ok(JsonValue::String(
            url::form_urlencoded::byte_serialize(value_to_string(&value).as_bytes()).collect(),
        )),
        "datetime_format" | "format_datetime" => {
            format_datetime(&value, &value_to_string(&arg(0))).map(JsonValue::String)
        }
        other => Err(Error::template(format!("Unknown filter '{other}'"))),
    }
}

fn length(value: &JsonValue) -> usize {
    match value {
        JsonValue::String(s) => s.chars().count(),
        JsonValue::Array(items) => items.len(),
        JsonValue::Object(map) => map.len(),
        _ => 0,
    }
}

fn to_int(value: &JsonValue) -> Option<i64> {
    match value {
        JsonValue::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(float_to_i64)),
        JsonValue::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(float_to_i64))
        }
        JsonValue::Bool(b) => Some(i64::from(*b)),
        _ => None,
    }
}

/// Truncate to an integer, `None` when out of range
#[allow(clippy::cast_precision_loss)]
fn float_to_i64(value: f64) -> Option<i64> {
    let value = value.trunc();
    (value.is_finite() && value >= i64::MIN as f64 && value < i64::MAX as f64)
        .then(|| value as i64)
}

fn to_float(value: &JsonValue) -> Option<f64> {
    match value {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => s.trim().parse().ok(),
        JsonValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

// ============================================================================
// Functions
// ============================================================================

fn call_function(name: &str, args: &[JsonValue]) -> Result<JsonValue> {
    match name {
        "now_utc" => Ok(JsonValue::String(
            Utc::now().format("%Y-%m-%d %H:%M:%S%.6f+00:00").to_string(),
        )),
        "today_utc" => Ok(JsonValue::String(Utc::now().format("%Y-%m-%d").to_string())),
        "timestamp" => {
            let value = args
                .first()
                .ok_or_else(|| Error::template("timestamp() takes one argument"))?;
            let datetime = parse_datetime(value).ok_or_else(|| {
                Error::template(format!("Cannot parse '{}' as a datetime", value_to_string(value)))
            })?;
            Ok(JsonValue::from(datetime.timestamp()))
        }
        "day_delta" => {
            let days = args
                .first()
                .and_then(to_float)
                .ok_or_else(|| Error::template("day_delta() requires a number of days"))?;
            let format = args
                .get(1)
                .map_or_else(|| DAY_DELTA_FORMAT.to_string(), value_to_string);
            let shifted = float_to_i64((days * 86_400.0).round())
                .and_then(TimeDelta::try_seconds)
                .and_then(|delta| Utc::now().checked_add_signed(delta))
                .ok_or_else(|| {
                    Error::template(format!("day_delta({days}) is out of the datetime range"))
                })?;
            Ok(JsonValue::String(
                shifted.format(&to_chrono_format(&format)).to_string(),
            ))
        }
        "format_datetime" => {
            let value = args.first().cloned().unwrap_or(JsonValue::Null);
            let format = args.get(1).map(value_to_string).unwrap_or_default();
            format_datetime(&value, &format).map(JsonValue::String)
        }
        "max" | "min" => {
            let items: Vec<JsonValue> = match args {
                [JsonValue::Array(items)] => items.clone(),
                _ => args.to_vec(),
            };
            let wanted = if name == "max" {
                Ordering::Greater
            } else {
                Ordering::Less
            };
            let mut best: Option<JsonValue> = None;
            for item in items {
                let replace = match &best {
                    Some(current) => compare(&item, current)? == wanted,
                    None => true,
                };
                if replace {
                    best = Some(item);
                }
            }
            Ok(best.unwrap_or(JsonValue::Null))
        }
        "range" => {
            let (start, end) = match args {
                [end] => (0, to_int(end).unwrap_or(0)),
                [start, end, ..] => (to_int(start).unwrap_or(0), to_int(end).unwrap_or(0)),
                [] => return Err(Error::template("range() requires arguments")),
            };
            Ok(JsonValue::Array((start..end).map(JsonValue::from).collect()))
        }
        other => Err(Error::template(format!("Unknown function '{other}'"))),
    }
}

/// Translate the `%f` microsecond directive to chrono's fixed-width form
fn to_chrono_format(format: &str) -> String {
    format.replace("%f", "%6f")
}

fn format_datetime(value: &JsonValue, format: &str) -> Result<String> {
    let datetime = parse_datetime(value).ok_or_else(|| {
        Error::template(format!("Cannot parse '{}' as a datetime", value_to_string(value)))
    })?;
    if format.is_empty() {
        return Ok(datetime.to_rfc3339());
    }
    Ok(datetime.format(&to_chrono_format(format)).to_string())
}

/// Parse the datetime shapes that show up in configs and API payloads
pub(crate) fn parse_datetime(value: &JsonValue) -> Option<DateTime<Utc>> {
    match value {
        JsonValue::Number(n) => {
            let seconds = n.as_f64()?;
            Utc.timestamp_opt(float_to_i64(seconds)?, 0).single()
        }
        JsonValue::String(s) => {
            let s = s.trim();
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.with_timezone(&Utc));
            }
            for format in ["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%dT%H:%M:%S%.f%z"] {
                if let Ok(dt) = DateTime::parse_from_str(s, format) {
                    return Some(dt.with_timezone(&Utc));
                }
            }
            for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
                if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
                    return Some(Utc.from_utc_datetime(&naive));
                }
            }
            if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
                return date.and_hms_opt(0, 0, 0).map(|naive| Utc.from_utc_datetime(&naive));
            }
            s.parse::<i64>()
                .ok()
                .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
        }
        _ => None,
    }
}
