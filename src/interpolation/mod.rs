//! Interpolation engine
//!
//! Evaluates `{{ expression }}` templates against the user config and a set
//! of named bindings. Expressions support dotted and bracket path access,
//! literals, arithmetic, comparisons, `and`/`or`/`not`, conditionals, a
//! filter library (`default`, `string`, `int`, `lower`, `b64encode`,
//! `urlencode`, ...) and date helpers (`now_utc()`, `day_delta()`,
//! `format_datetime()`, ...).
//!
//! # Example
//!
//! ```
//! use solidafy_builder::interpolation::{InterpolatedString, InterpolationContext};
//! use serde_json::json;
//!
//! let config = json!({"api_key": "k"});
//! let ctx = InterpolationContext::new(&config).with("page", json!(3));
//! let url = InterpolatedString::new("/items?page={{ page }}&key={{ config.api_key }}");
//! assert_eq!(url.eval_string(&ctx).unwrap(), "/items?page=3&key=k");
//! ```

mod context;
mod eval;
mod interpolated;
mod parser;

pub use context::InterpolationContext;
pub use interpolated::{
    evaluate, has_expressions, is_falsy, InterpolatedBoolean, InterpolatedMapping,
    InterpolatedString, ValueKind,
};

pub(crate) use eval::{kind_name, parse_datetime};

#[cfg(test)]
mod tests;
