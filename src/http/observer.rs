//! Side-channel exchange recording
//!
//! Requests made outside the page-fetch path (token refreshes) are recorded
//! here instead of in a slice's page list, together with the latest config
//! produced by token rotation.

use super::types::{HttpRequest, HttpResponse};
use crate::types::Config;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A request issued as a side effect of the main retrieval
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuxiliaryRequest {
    /// Short title, e.g. "Refresh token"
    pub title: String,
    /// What the request was for
    pub description: String,
    /// The request that was sent
    pub request: HttpRequest,
    /// The response, if one arrived
    pub response: Option<HttpResponse>,
}

#[derive(Debug, Default)]
struct ObserverState {
    auxiliary_requests: Vec<AuxiliaryRequest>,
    latest_config_update: Option<Config>,
}

/// Shared collector for auxiliary requests and config updates
#[derive(Debug, Clone, Default)]
pub struct ExchangeObserver {
    state: Arc<Mutex<ObserverState>>,
}

impl ExchangeObserver {
    /// Create an empty observer
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an auxiliary request
    pub fn record_auxiliary(&self, request: AuxiliaryRequest) {
        self.lock().auxiliary_requests.push(request);
    }

    /// Publish an updated config
    pub fn update_config(&self, config: Config) {
        self.lock().latest_config_update = Some(config);
    }

    /// Auxiliary requests recorded so far, in order
    pub fn auxiliary_requests(&self) -> Vec<AuxiliaryRequest> {
        self.lock().auxiliary_requests.clone()
    }

    /// The most recent config update, if any
    pub fn latest_config_update(&self) -> Option<Config> {
        self.lock().latest_config_update.clone()
    }

    /// Forget everything recorded
    pub fn clear(&self) {
        let mut state = self.lock();
        state.auxiliary_requests.clear();
        state.latest_config_update = None;
    }

    fn lock(&self) -> MutexGuard<'_, ObserverState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
