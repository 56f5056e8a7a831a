//! Model-backed intent backends.
//!
//! Every backend answers the same question: given an utterance and the
//! allowed labels, which intent is it and how sure are you. Failures are
//! typed ([`BackendError`]) and left to the dispatcher to absorb.

pub mod cloud;
pub mod embedding;
pub mod zero_shot;

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

use super::intent::{BackendKind, Intent};
use super::models::ModelHub;
use crate::config::CloudSettings;
use crate::error::BackendError;

pub use cloud::CloudBackend;
pub use embedding::EmbeddingBackend;
pub use zero_shot::ZeroShotBackend;

/// Uniform contract of an intent classifier.
#[async_trait]
pub trait IntentBackend: Send + Sync {
    /// Which backend this is.
    fn kind(&self) -> BackendKind;

    /// Classify `text` into one of `labels`.
    async fn classify(&self, text: &str, labels: &[Intent]) -> Result<(Intent, f32), BackendError>;
}

/// Backends available in this process, keyed by identity.
///
/// A kind missing from the registry is treated as `Unavailable`.
#[derive(Clone, Default)]
pub struct BackendRegistry {
    backends: HashMap<BackendKind, Arc<dyn IntentBackend>>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds every backend whose model or credential is present.
    pub fn from_hub(hub: &ModelHub, cloud: &CloudSettings) -> Self {
        let mut registry = Self::new();

        if let Some(embedder) = hub.embedder() {
            match EmbeddingBackend::new(embedder) {
                Ok(backend) => registry.register(Arc::new(backend)),
                Err(e) => warn!("Embedding backend not registered: {}", e),
            }
        }

        if let Some(model) = hub.zero_shot() {
            registry.register(Arc::new(ZeroShotBackend::new(model)));
        }

        match CloudBackend::new(cloud) {
            Ok(backend) => registry.register(Arc::new(backend)),
            Err(e) => info!("Cloud backend not registered: {}", e),
        }

        registry
    }

    /// Adds a backend, replacing any previous one of the same kind.
    pub fn register(&mut self, backend: Arc<dyn IntentBackend>) {
        self.backends.insert(backend.kind(), backend);
    }

    pub fn get(&self, kind: BackendKind) -> Option<Arc<dyn IntentBackend>> {
        self.backends.get(&kind).cloned()
    }

    pub fn contains(&self, kind: BackendKind) -> bool {
        self.backends.contains_key(&kind)
    }

    /// Registered kinds, in presentation order.
    pub fn kinds(&self) -> Vec<BackendKind> {
        BackendKind::ALL
            .into_iter()
            .filter(|kind| self.contains(*kind))
            .collect()
    }
}
