//! Detection dispatch with graceful degradation.
//!
//! A request names the backend it wants. Any failure of that backend
//! (not registered, error, timeout) drops the request to the rule matcher
//! and the result is flagged `degraded`. So does an `unknown` answer below
//! [`UNKNOWN_FALLBACK_CONFIDENCE`].

use futures::future::join_all;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, instrument, warn};

use super::backends::BackendRegistry;
use super::intent::{BackendKind, DetectionResult, Intent};
use super::rules::RuleMatcher;
use crate::config::DEFAULT_BACKEND_TIMEOUT_SECS;
use crate::error::BackendError;

/// A model answering `unknown` below this confidence defers to the rules.
pub const UNKNOWN_FALLBACK_CONFIDENCE: f32 = 0.5;

/// Where a request ended up.
#[derive(Debug)]
enum DispatchState {
    Primary {
        backend: BackendKind,
        intent: Intent,
        confidence: f32,
    },
    Fallback {
        requested: BackendKind,
        reason: String,
    },
}

#[derive(Clone)]
pub struct DetectionDispatcher {
    rules: RuleMatcher,
    registry: BackendRegistry,
    timeout: Duration,
}

impl DetectionDispatcher {
    pub fn new(rules: RuleMatcher, registry: BackendRegistry, timeout: Duration) -> Self {
        Self {
            rules,
            registry,
            timeout,
        }
    }

    /// Dispatcher with no model backends: every non-rule request degrades.
    pub fn rules_only() -> Self {
        Self::new(
            RuleMatcher::new(),
            BackendRegistry::new(),
            Duration::from_secs(DEFAULT_BACKEND_TIMEOUT_SECS),
        )
    }

    /// Backends that can answer without degrading, in presentation order.
    pub fn available(&self) -> Vec<BackendKind> {
        BackendKind::ALL
            .into_iter()
            .filter(|kind| *kind == BackendKind::RuleBased || self.registry.contains(*kind))
            .collect()
    }

    /// Detects the intent of `text` with the requested backend.
    ///
    /// Always yields a result; backend failures surface only as
    /// `degraded` + `fallback_reason`.
    #[instrument(skip(self, text), fields(backend = %requested))]
    pub async fn detect(&self, text: &str, requested: BackendKind) -> DetectionResult {
        let started = Instant::now();

        let mut result = if requested == BackendKind::RuleBased {
            self.rules.classify(text)
        } else {
            let state = match self.call_backend(requested, text).await {
                Ok((Intent::Unknown, confidence)) if confidence < UNKNOWN_FALLBACK_CONFIDENCE => {
                    DispatchState::Fallback {
                        requested,
                        reason: format!("low-confidence unknown ({:.2})", confidence),
                    }
                }
                Ok((intent, confidence)) => DispatchState::Primary {
                    backend: requested,
                    intent,
                    confidence,
                },
                Err(error) => DispatchState::Fallback {
                    requested,
                    reason: error.to_string(),
                },
            };
            self.resolve(text, state)
        };

        result.latency_ms = started.elapsed().as_millis() as u64;
        debug!("Detection: {}", result.summary());
        result
    }

    /// Runs every backend on the same text concurrently.
    ///
    /// Returns one result per backend, in `BackendKind::ALL` order.
    pub async fn compare(&self, text: &str) -> Vec<DetectionResult> {
        join_all(BackendKind::ALL.map(|kind| self.detect(text, kind))).await
    }

    async fn call_backend(
        &self,
        kind: BackendKind,
        text: &str,
    ) -> Result<(Intent, f32), BackendError> {
        let backend = self.registry.get(kind).ok_or_else(|| {
            BackendError::Unavailable(format!("{} backend is not loaded", kind.display_name()))
        })?;

        timeout(self.timeout, backend.classify(text, &Intent::ALL)).await?
    }

    fn resolve(&self, text: &str, state: DispatchState) -> DetectionResult {
        match state {
            DispatchState::Primary {
                backend,
                intent,
                confidence,
            } => DetectionResult::new(intent, confidence, backend),
            DispatchState::Fallback { requested, reason } => {
                warn!(backend = %requested, "Backend failed, falling back to rules: {}", reason);
                self.rules.classify(text).degraded_from(requested, reason)
            }
        }
    }
}
