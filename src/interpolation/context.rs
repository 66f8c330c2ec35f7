//! Interpolation context
//!
//! The user config is always bound as `config`. Everything else (response,
//! headers, last_record, stream_slice, ...) is a named binding that exists
//! only for one evaluation.

use crate::types::{Config, JsonObject, JsonValue};
use std::borrow::Cow;

/// Values visible to a template during evaluation
#[derive(Debug, Clone)]
pub struct InterpolationContext<'a> {
    config: Cow<'a, Config>,
    bindings: JsonObject,
}

impl<'a> InterpolationContext<'a> {
    /// Create a context over a borrowed config
    pub fn new(config: &'a Config) -> Self {
        Self {
            config: Cow::Borrowed(config),
            bindings: JsonObject::new(),
        }
    }

    /// Create a context that owns its config
    pub fn owned(config: Config) -> InterpolationContext<'static> {
        InterpolationContext {
            config: Cow::Owned(config),
            bindings: JsonObject::new(),
        }
    }

    /// Add a named binding
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: JsonValue) -> Self {
        self.bindings.insert(name.into(), value);
        self
    }

    /// Add several bindings at once
    #[must_use]
    pub fn with_all(mut self, bindings: JsonObject) -> Self {
        self.bindings.extend(bindings);
        self
    }

    /// Set a named binding in place
    pub fn set(&mut self, name: impl Into<String>, value: JsonValue) {
        self.bindings.insert(name.into(), value);
    }

    /// The user config
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Resolve a top-level name
    pub fn lookup(&self, name: &str) -> Option<&JsonValue> {
        if name == "config" {
            return Some(&self.config);
        }
        self.bindings.get(name)
    }
}
