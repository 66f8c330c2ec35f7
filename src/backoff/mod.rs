//! Backoff strategies
//!
//! Supports: Constant, Exponential, Wait-time-from-header
//!
//! # Overview
//!
//! A backoff strategy decides how long to wait before retrying a failed
//! request. It sees the outcome of the last attempt (a response, a transport
//! error, or nothing yet) and the attempt count, and returns either a wait
//! duration or `None` to give up.

mod strategies;

pub use strategies::{
    Backoff, BackoffChain, ConstantBackoffStrategy, ExponentialBackoffStrategy,
    WaitTimeFromHeaderBackoffStrategy,
};

use crate::error::{Error, Result};
use crate::http::HttpResponse;
use std::fmt::Debug;
use std::time::Duration;

/// What happened on the last attempt
#[derive(Debug, Clone, Copy)]
pub enum Outcome<'a> {
    /// The server answered with a retryable status
    Response(&'a HttpResponse),
    /// The request failed before a response arrived
    Error(&'a Error),
}

impl<'a> Outcome<'a> {
    /// The response, if the attempt produced one
    pub fn response(&self) -> Option<&'a HttpResponse> {
        match *self {
            Outcome::Response(response) => Some(response),
            Outcome::Error(_) => None,
        }
    }
}

/// Computes the wait before a retry
pub trait BackoffStrategy: Send + Sync + Debug {
    /// Wait time before the next attempt, or `None` to give up
    fn backoff_time(&self, outcome: Option<Outcome<'_>>, attempt_count: u32)
        -> Result<Option<Duration>>;
}
