//! Shared model handles.
//!
//! Local models are loaded once at startup into a [`ModelHub`] and shared
//! read-only with every component that needs them (intent backends and the
//! memory store). The traits keep FastEmbed behind a seam so that tests can
//! plug in deterministic models.

use fastembed::{
    EmbeddingModel, InitOptions, RerankInitOptions, RerankerModel, TextEmbedding, TextRerank,
};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::BackendError;

/// Text → vector model.
pub trait Embedder: Send + Sync {
    /// Model name for logs and preflight reports.
    fn name(&self) -> &str;

    /// Embed a batch of texts; one vector per input, same order.
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, BackendError>;
}

/// Zero-shot classifier: scores a text against natural-language hypotheses.
pub trait ZeroShotModel: Send + Sync {
    fn name(&self) -> &str;

    /// Probability of each hypothesis, aligned with the input order.
    fn score(&self, text: &str, hypotheses: &[String]) -> Result<Vec<f32>, BackendError>;
}

/// Sentence embeddings with FastEmbed's AllMiniLML6V2.
pub struct FastEmbedder {
    model: TextEmbedding,
}

impl FastEmbedder {
    /// Loads the model, downloading it into `cache_dir` on first use.
    pub fn load(cache_dir: PathBuf) -> Result<Self, BackendError> {
        let mut options = InitOptions::new(EmbeddingModel::AllMiniLML6V2);
        options.show_download_progress = false;
        options.cache_dir = cache_dir;

        let model = TextEmbedding::try_new(options).map_err(|e| {
            BackendError::Unavailable(format!("Failed to load embedding model: {}", e))
        })?;
        Ok(Self { model })
    }
}

impl Embedder for FastEmbedder {
    fn name(&self) -> &str {
        "AllMiniLML6V2"
    }

    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, BackendError> {
        self.model
            .embed(texts.to_vec(), None)
            .map_err(|e| BackendError::Unavailable(format!("Embedding failed: {}", e)))
    }
}

/// Zero-shot classification with a cross-encoder: each hypothesis is scored
/// as a (text, hypothesis) pair and the scores are softmax-normalized.
pub struct RerankZeroShot {
    model: TextRerank,
}

impl RerankZeroShot {
    pub fn load(cache_dir: PathBuf) -> Result<Self, BackendError> {
        let mut options = RerankInitOptions::new(RerankerModel::BGERerankerBase);
        options.show_download_progress = false;
        options.cache_dir = cache_dir;

        let model = TextRerank::try_new(options).map_err(|e| {
            BackendError::Unavailable(format!("Failed to load zero-shot model: {}", e))
        })?;
        Ok(Self { model })
    }
}

impl ZeroShotModel for RerankZeroShot {
    fn name(&self) -> &str {
        "BGERerankerBase"
    }

    fn score(&self, text: &str, hypotheses: &[String]) -> Result<Vec<f32>, BackendError> {
        let documents: Vec<&str> = hypotheses.iter().map(String::as_str).collect();
        let ranked = self
            .model
            .rerank(text, documents, false, None)
            .map_err(|e| BackendError::Unavailable(format!("Zero-shot inference failed: {}", e)))?;

        let mut logits = vec![f32::NEG_INFINITY; hypotheses.len()];
        for result in ranked {
            if let Some(slot) = logits.get_mut(result.index) {
                *slot = result.score;
            }
        }
        Ok(softmax(&logits))
    }
}

/// Read-only handle to the loaded local models.
#[derive(Clone, Default)]
pub struct ModelHub {
    embedder: Option<Arc<dyn Embedder>>,
    zero_shot: Option<Arc<dyn ZeroShotModel>>,
}

impl fmt::Debug for ModelHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelHub")
            .field("embedder", &self.embedder.as_ref().map(|m| m.name().to_string()))
            .field("zero_shot", &self.zero_shot.as_ref().map(|m| m.name().to_string()))
            .finish()
    }
}

impl ModelHub {
    /// A hub with no models: only rule-based detection and substring recall.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn with_zero_shot(mut self, model: Arc<dyn ZeroShotModel>) -> Self {
        self.zero_shot = Some(model);
        self
    }

    pub fn embedder(&self) -> Option<Arc<dyn Embedder>> {
        self.embedder.clone()
    }

    pub fn zero_shot(&self) -> Option<Arc<dyn ZeroShotModel>> {
        self.zero_shot.clone()
    }

    /// Loads the enabled local models on the blocking pool.
    ///
    /// A model that fails to load is logged and left out; the backends that
    /// depend on it then report `Unavailable`.
    pub async fn load(models_dir: PathBuf, embeddings: bool, zero_shot: bool) -> Self {
        let mut hub = Self::empty();

        if embeddings {
            let dir = models_dir.join("embeddings");
            match tokio::task::spawn_blocking(move || FastEmbedder::load(dir)).await {
                Ok(Ok(model)) => {
                    info!("Embedding model loaded: {}", model.name());
                    hub.embedder = Some(Arc::new(model));
                }
                Ok(Err(e)) => warn!("Embedding backend disabled: {}", e),
                Err(e) => warn!("Embedding model loader panicked: {}", e),
            }
        }

        if zero_shot {
            let dir = models_dir.join("zero_shot");
            match tokio::task::spawn_blocking(move || RerankZeroShot::load(dir)).await {
                Ok(Ok(model)) => {
                    info!("Zero-shot model loaded: {}", model.name());
                    hub.zero_shot = Some(Arc::new(model));
                }
                Ok(Err(e)) => warn!("Zero-shot backend disabled: {}", e),
                Err(e) => warn!("Zero-shot model loader panicked: {}", e),
            }
        }

        hub
    }
}

/// Calculate cosine similarity between two vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let magnitude_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let magnitude_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return 0.0;
    }

    dot_product / (magnitude_a * magnitude_b)
}

/// Numerically stable softmax; an all -inf input yields all zeros.
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    if !max.is_finite() {
        return vec![0.0; logits.len()];
    }
    let exps: Vec<f32> = logits.iter().map(|l| (l - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}
