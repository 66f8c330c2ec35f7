//! Request construction
//!
//! Renders the requester's templated URL, parameters, headers and body for
//! one page of one slice, and merges in what the partition router and the
//! paginator contribute.

use crate::error::Result;
use crate::http::{join_url, HttpRequest};
use crate::interpolation::{InterpolatedMapping, InterpolatedString, InterpolationContext};
use crate::types::{value_to_string, JsonObject, JsonValue, Method};
use std::collections::BTreeMap;

/// Request fragments contributed by routers and paginators
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestParts {
    /// Query parameters
    pub params: JsonObject,
    /// Headers
    pub headers: JsonObject,
    /// Form body fields
    pub body_data: JsonObject,
    /// JSON body fields
    pub body_json: JsonObject,
}

impl RequestParts {
    /// Merge another set of parts over this one
    pub fn merge(&mut self, other: RequestParts) {
        self.params.extend(other.params);
        self.headers.extend(other.headers);
        self.body_data.extend(other.body_data);
        self.body_json.extend(other.body_json);
    }
}

/// Templated HTTP request definition
#[derive(Debug, Clone)]
pub struct Requester {
    url_base: InterpolatedString,
    path: InterpolatedString,
    http_method: Method,
    request_parameters: InterpolatedMapping,
    request_headers: InterpolatedMapping,
    request_body_data: InterpolatedMapping,
    request_body_json: InterpolatedMapping,
}

impl Requester {
    /// Create a GET requester
    pub fn new(url_base: impl Into<InterpolatedString>, path: impl Into<InterpolatedString>) -> Self {
        Self {
            url_base: url_base.into(),
            path: path.into(),
            http_method: Method::GET,
            request_parameters: InterpolatedMapping::default(),
            request_headers: InterpolatedMapping::default(),
            request_body_data: InterpolatedMapping::default(),
            request_body_json: InterpolatedMapping::default(),
        }
    }

    /// Set the HTTP method
    #[must_use]
    pub fn with_method(mut self, method: Method) -> Self {
        self.http_method = method;
        self
    }

    /// Set templated query parameters
    #[must_use]
    pub fn with_parameters(mut self, parameters: JsonObject) -> Self {
        self.request_parameters = parameters.into();
        self
    }

    /// Set templated headers
    #[must_use]
    pub fn with_headers(mut self, headers: JsonObject) -> Self {
        self.request_headers = headers.into();
        self
    }

    /// Set templated form body fields
    #[must_use]
    pub fn with_body_data(mut self, body: JsonObject) -> Self {
        self.request_body_data = body.into();
        self
    }

    /// Set templated JSON body fields
    #[must_use]
    pub fn with_body_json(mut self, body: JsonObject) -> Self {
        self.request_body_json = body.into();
        self
    }

    /// HTTP method
    pub fn method(&self) -> Method {
        self.http_method
    }

    /// Render the request.
    ///
    /// `path_override` (from a paginator) replaces the templated path; an
    /// absolute URL replaces the base too. Contributed parts override
    /// templated values with the same name. Empty parameters are dropped.
    pub fn build_request(
        &self,
        ctx: &InterpolationContext<'_>,
        path_override: Option<&str>,
        parts: RequestParts,
    ) -> Result<HttpRequest> {
        let url_base = self.url_base.eval_string(ctx)?;
        let path = match path_override {
            Some(path) => path.to_string(),
            None => self.path.eval_string(ctx)?,
        };
        let url = join_url(&url_base, &path);

        let mut params = self.request_parameters.eval(ctx)?;
        params.extend(parts.params);
        let params: Vec<(String, String)> = params
            .iter()
            .map(|(k, v)| (k.clone(), value_to_string(v)))
            .filter(|(_, v)| !v.is_empty())
            .collect();

        let mut request = HttpRequest::new(self.http_method, url)
            .with_query(params.iter().map(|(k, v)| (k.as_str(), v.as_str())))?;

        let mut headers = self.request_headers.eval(ctx)?;
        headers.extend(parts.headers);
        for (name, value) in &headers {
            let value = value_to_string(value);
            if !value.is_empty() {
                request = request.with_header(name.as_str(), value);
            }
        }

        let mut body_json = self.request_body_json.eval(ctx)?;
        body_json.extend(parts.body_json);
        let mut body_data = self.request_body_data.eval(ctx)?;
        body_data.extend(parts.body_data);

        if !body_json.is_empty() {
            request = request.with_json_body(&JsonValue::Object(body_json))?;
        } else if !body_data.is_empty() {
            let fields: BTreeMap<String, String> = body_data
                .iter()
                .map(|(k, v)| (k.clone(), value_to_string(v)))
                .collect();
            request = request.with_form_body(&fields);
        }

        Ok(request)
    }
}
