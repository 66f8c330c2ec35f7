//! Request options
//!
//! Describes where a value computed at runtime (a page token, a page size,
//! a partition value) is placed on the outbound request.

use crate::error::Result;
use crate::interpolation::{InterpolatedString, InterpolationContext};
use crate::types::{value_to_string, Config, JsonObject, JsonValue};
use serde::{Deserialize, Serialize};

/// Part of the request a value is injected into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InjectInto {
    /// Query string parameter
    RequestParameter,
    /// HTTP header
    Header,
    /// Form-encoded body field
    BodyData,
    /// JSON body field
    BodyJson,
}

/// A named slot on the request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestOption {
    /// Where the value goes
    pub inject_into: InjectInto,
    /// Parameter, header or body field name; may be a template
    pub field_name: InterpolatedString,
}

impl RequestOption {
    /// Create a request option
    pub fn new(inject_into: InjectInto, field_name: impl Into<String>) -> Self {
        Self {
            inject_into,
            field_name: InterpolatedString::new(field_name.into()),
        }
    }

    /// Query parameter shorthand
    pub fn parameter(field_name: impl Into<String>) -> Self {
        Self::new(InjectInto::RequestParameter, field_name)
    }

    /// Header shorthand
    pub fn header(field_name: impl Into<String>) -> Self {
        Self::new(InjectInto::Header, field_name)
    }

    /// Insert `value` into `target` when this option points at `location`
    pub fn inject(
        &self,
        location: InjectInto,
        value: &JsonValue,
        config: &Config,
        target: &mut JsonObject,
    ) -> Result<()> {
        if self.inject_into != location {
            return Ok(());
        }
        let name = self
            .field_name
            .eval_string(&InterpolationContext::new(config))?;
        let value = match location {
            // Parameters, headers and form fields are always text
            InjectInto::BodyJson => value.clone(),
            _ => JsonValue::String(value_to_string(value)),
        };
        target.insert(name, value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_inject_only_at_matching_location() {
        let option = RequestOption::parameter("page");
        let config = json!({});

        let mut params = JsonObject::new();
        option
            .inject(InjectInto::RequestParameter, &json!(2), &config, &mut params)
            .unwrap();
        assert_eq!(params.get("page"), Some(&json!("2")));

        let mut headers = JsonObject::new();
        option
            .inject(InjectInto::Header, &json!(2), &config, &mut headers)
            .unwrap();
        assert!(headers.is_empty());
    }

    #[test]
    fn test_field_name_is_interpolated() {
        let option = RequestOption::new(InjectInto::BodyJson, "{{ config['cursor_field'] }}");
        let config = json!({"cursor_field": "after"});

        let mut body = JsonObject::new();
        option
            .inject(InjectInto::BodyJson, &json!({"id": 5}), &config, &mut body)
            .unwrap();
        assert_eq!(body.get("after"), Some(&json!({"id": 5})));
    }

    #[test]
    fn test_deserialize() {
        let option: RequestOption =
            serde_json::from_value(json!({"inject_into": "header", "field_name": "X-Cursor"}))
                .unwrap();
        assert_eq!(option, RequestOption::header("X-Cursor"));
    }
}
