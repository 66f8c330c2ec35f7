//! HTTP request and response snapshots
//!
//! These are the plain-data views of an exchange that end up in the test
//! read report and in the interpolation context.

use crate::error::{Error, Result};
use crate::types::{JsonObject, JsonValue, Method};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use url::Url;

/// Outbound request as it was sent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpRequest {
    /// Fully resolved URL including query string
    pub url: String,
    /// HTTP method
    #[serde(rename = "http_method")]
    pub method: Method,
    /// Request headers
    pub headers: BTreeMap<String, String>,
    /// Request body, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

impl HttpRequest {
    /// Create a request with no headers or body
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method,
            headers: BTreeMap::new(),
            body: None,
        }
    }

    /// Set a header
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Append query parameters to the URL
    pub fn with_query<'a, I>(mut self, params: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut params = params.into_iter().peekable();
        if params.peek().is_none() {
            return Ok(self);
        }
        let mut url = Url::parse(&self.url)?;
        url.query_pairs_mut().extend_pairs(params);
        self.url = url.to_string();
        Ok(self)
    }

    /// Set a JSON body
    pub fn with_json_body(mut self, body: &JsonValue) -> Result<Self> {
        self.body = Some(serde_json::to_string(body)?);
        self.headers
            .entry("Content-Type".to_string())
            .or_insert_with(|| "application/json".to_string());
        Ok(self)
    }

    /// Set a form-encoded body
    #[must_use]
    pub fn with_form_body(mut self, fields: &BTreeMap<String, String>) -> Self {
        let body = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(fields)
            .finish();
        self.body = Some(body);
        self.headers
            .entry("Content-Type".to_string())
            .or_insert_with(|| "application/x-www-form-urlencoded".to_string());
        self
    }

    /// Stable key identifying this request for caching
    pub fn cache_key(&self) -> String {
        format!(
            "{} {} {}",
            self.method,
            self.url,
            self.body.as_deref().unwrap_or_default()
        )
    }
}

/// Inbound response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpResponse {
    /// Status code
    pub status: u16,
    /// Response headers, names lowercased
    pub headers: BTreeMap<String, String>,
    /// Raw response body
    pub body: String,
}

impl HttpResponse {
    /// Create a response
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
            body: body.into(),
        }
    }

    /// Set a header (name is lowercased)
    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Whether the status is 2xx
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Look up a header, case-insensitively
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Decode the body as JSON
    pub fn json(&self) -> Result<JsonValue> {
        serde_json::from_str(&self.body).map_err(|e| {
            Error::decode(format!(
                "Response body is not valid JSON ({e}): {}",
                truncate(&self.body, 200)
            ))
        })
    }

    /// Decode the body as JSON, treating an empty body as an empty object
    pub fn json_or_empty(&self) -> Result<JsonValue> {
        if self.body.trim().is_empty() {
            return Ok(JsonValue::Object(JsonObject::new()));
        }
        self.json()
    }

    /// Parsed `Link` header, keyed by relation.
    ///
    /// `<https://api/x?page=2>; rel="next"` becomes
    /// `{"next": {"url": "https://api/x?page=2", "rel": "next"}}`.
    pub fn links(&self) -> JsonObject {
        self.header("link").map(parse_link_header).unwrap_or_default()
    }

    /// Headers as a JSON object with the parsed links under `link`
    pub fn headers_with_links(&self) -> JsonValue {
        let mut headers: JsonObject = self
            .headers
            .iter()
            .map(|(k, v)| (k.clone(), JsonValue::String(v.clone())))
            .collect();
        headers.insert("link".to_string(), JsonValue::Object(self.links()));
        JsonValue::Object(headers)
    }
}

/// Join a base URL and a path.
///
/// An absolute `path` (e.g. a next-page link) replaces the base entirely.
pub fn join_url(base: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }
    if path.is_empty() {
        return base.to_string();
    }
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Parse an RFC 8288 `Link` header into a map of relation to link
pub fn parse_link_header(header: &str) -> JsonObject {
    let mut links = JsonObject::new();

    // Link header format: <url>; rel="next", <url>; rel="prev"
    for part in header.split(',') {
        let mut url = None;
        let mut params = JsonObject::new();

        for segment in part.split(';') {
            let segment = segment.trim();
            if segment.starts_with('<') && segment.ends_with('>') {
                url = Some(&segment[1..segment.len() - 1]);
            } else if let Some((key, value)) = segment.split_once('=') {
                let value = value.trim().trim_matches('"').trim_matches('\'');
                params.insert(key.trim().to_string(), JsonValue::String(value.to_string()));
            }
        }

        let Some(url) = url else { continue };
        let rel = params
            .get("rel")
            .and_then(JsonValue::as_str)
            .unwrap_or(url)
            .to_string();
        params.insert("url".to_string(), JsonValue::String(url.to_string()));
        links.insert(rel, JsonValue::Object(params));
    }

    links
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
