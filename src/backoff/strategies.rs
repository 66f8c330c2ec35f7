//! Backoff strategy implementations

use super::{BackoffStrategy, Outcome};
use crate::error::{Error, Result};
use crate::interpolation::{InterpolatedString, InterpolationContext, ValueKind};
use crate::types::{Config, JsonValue};
use regex::Regex;
use std::time::Duration;
use tracing::debug;

/// Factor used when no strategy is configured
const DEFAULT_EXPONENTIAL_FACTOR: f64 = 5.0;

/// Convert non-negative seconds to a duration
fn seconds(value: f64, field: &str) -> Result<Duration> {
    if !value.is_finite() || value < 0.0 {
        return Err(Error::invalid_value(
            field,
            format!("expected a non-negative number of seconds, got {value}"),
        ));
    }
    Duration::try_from_secs_f64(value).map_err(|_| {
        Error::invalid_value(field, format!("{value} seconds is not a representable wait"))
    })
}

/// Resolve a seconds value that may be a number or a template
fn resolve_seconds(raw: &JsonValue, config: &Config, field: &str) -> Result<Duration> {
    let value = match raw {
        JsonValue::String(template) => InterpolatedString::new(template.as_str())
            .eval_as(&InterpolationContext::new(config), &[ValueKind::Number])?,
        other => other.clone(),
    };
    let number = value.as_f64().ok_or_else(|| {
        Error::invalid_value(field, format!("expected a number of seconds, got {value}"))
    })?;
    seconds(number, field)
}

// ============================================================================
// Constant
// ============================================================================

/// Always waits the same configured time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstantBackoffStrategy {
    backoff_time: Duration,
}

impl ConstantBackoffStrategy {
    /// Create from a fixed duration
    pub fn new(backoff_time: Duration) -> Self {
        Self { backoff_time }
    }

    /// Create from a number or template, resolved against the config now
    pub fn from_config(backoff_time_in_seconds: &JsonValue, config: &Config) -> Result<Self> {
        Ok(Self::new(resolve_seconds(
            backoff_time_in_seconds,
            config,
            "backoff_time_in_seconds",
        )?))
    }
}

impl BackoffStrategy for ConstantBackoffStrategy {
    fn backoff_time(&self, _outcome: Option<Outcome<'_>>, _attempt_count: u32) -> Result<Option<Duration>> {
        Ok(Some(self.backoff_time))
    }
}

// ============================================================================
// Exponential
// ============================================================================

/// Waits `factor * 2^attempt` seconds
#[derive(Debug, Clone, PartialEq)]
pub struct ExponentialBackoffStrategy {
    factor: f64,
}

impl ExponentialBackoffStrategy {
    /// Create with a factor in seconds
    pub fn new(factor: f64) -> Self {
        Self { factor }
    }

    /// Create from a number or template, resolved against the config now
    pub fn from_config(factor: &JsonValue, config: &Config) -> Result<Self> {
        let factor = resolve_seconds(factor, config, "factor")?;
        Ok(Self::new(factor.as_secs_f64()))
    }
}

impl Default for ExponentialBackoffStrategy {
    fn default() -> Self {
        Self::new(DEFAULT_EXPONENTIAL_FACTOR)
    }
}

impl BackoffStrategy for ExponentialBackoffStrategy {
    fn backoff_time(&self, _outcome: Option<Outcome<'_>>, attempt_count: u32) -> Result<Option<Duration>> {
        let multiplier = 2f64.powi(i32::try_from(attempt_count).unwrap_or(i32::MAX));
        Ok(Some(seconds(self.factor * multiplier, "factor")?))
    }
}

// ============================================================================
// Wait time from header
// ============================================================================

/// Reads the wait time from a response header such as `Retry-After`
#[derive(Debug, Clone)]
pub struct WaitTimeFromHeaderBackoffStrategy {
    header: String,
    regex: Option<Regex>,
    max_waiting_time: Option<Duration>,
}

impl WaitTimeFromHeaderBackoffStrategy {
    /// Create for a header name
    pub fn new(header: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            regex: None,
            max_waiting_time: None,
        }
    }

    /// Extract the number from the header with a regex (first match)
    pub fn with_regex(mut self, pattern: &str) -> Result<Self> {
        let regex = Regex::new(pattern)
            .map_err(|e| Error::invalid_value("regex", e.to_string()))?;
        self.regex = Some(regex);
        Ok(self)
    }

    /// Give up when the server asks for a longer wait than this
    #[must_use]
    pub fn with_max_waiting_time(mut self, max: Duration) -> Self {
        self.max_waiting_time = Some(max);
        self
    }

    fn header_seconds(&self, raw: &str) -> Option<f64> {
        let raw = raw.trim();
        match &self.regex {
            Some(regex) => regex.find(raw)?.as_str().parse().ok(),
            None => raw.parse().ok(),
        }
    }
}

impl BackoffStrategy for WaitTimeFromHeaderBackoffStrategy {
    fn backoff_time(&self, outcome: Option<Outcome<'_>>, _attempt_count: u32) -> Result<Option<Duration>> {
        let Some(raw) = outcome
            .and_then(|o| o.response())
            .and_then(|response| response.header(&self.header))
        else {
            return Ok(None);
        };

        let Some(wait) = self.header_seconds(raw) else {
            debug!(header = %self.header, value = raw, "Wait time header is not a number");
            return Ok(None);
        };
        if self.max_waiting_time.is_some_and(|max| wait > max.as_secs_f64()) {
            debug!(header = %self.header, wait, "Server wait time exceeds the maximum, giving up");
            return Ok(None);
        }
        match seconds(wait, &self.header) {
            Ok(wait) => Ok(Some(wait)),
            Err(e) => {
                debug!(header = %self.header, error = %e, "Server wait time is unusable, giving up");
                Ok(None)
            }
        }
    }
}

// ============================================================================
// Resolved variants
// ============================================================================

/// A backoff strategy selected from the manifest
#[derive(Debug, Clone)]
pub enum Backoff {
    Constant(ConstantBackoffStrategy),
    Exponential(ExponentialBackoffStrategy),
    WaitTimeFromHeader(WaitTimeFromHeaderBackoffStrategy),
}

impl BackoffStrategy for Backoff {
    fn backoff_time(&self, outcome: Option<Outcome<'_>>, attempt_count: u32) -> Result<Option<Duration>> {
        match self {
            Backoff::Constant(s) => s.backoff_time(outcome, attempt_count),
            Backoff::Exponential(s) => s.backoff_time(outcome, attempt_count),
            Backoff::WaitTimeFromHeader(s) => s.backoff_time(outcome, attempt_count),
        }
    }
}

/// Strategies consulted in order; the first to name a wait wins.
///
/// An empty chain behaves as the default exponential strategy.
#[derive(Debug, Clone, Default)]
pub struct BackoffChain {
    strategies: Vec<Backoff>,
}

impl BackoffChain {
    /// Create from resolved strategies
    pub fn new(strategies: Vec<Backoff>) -> Self {
        Self { strategies }
    }

    /// Chain with a single strategy
    pub fn single(strategy: Backoff) -> Self {
        Self::new(vec![strategy])
    }
}

impl BackoffStrategy for BackoffChain {
    fn backoff_time(&self, outcome: Option<Outcome<'_>>, attempt_count: u32) -> Result<Option<Duration>> {
        if self.strategies.is_empty() {
            return ExponentialBackoffStrategy::default().backoff_time(outcome, attempt_count);
        }
        for strategy in &self.strategies {
            if let Some(wait) = strategy.backoff_time(outcome, attempt_count)? {
                return Ok(Some(wait));
            }
        }
        Ok(None)
    }
}
