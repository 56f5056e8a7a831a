//! Zero-shot intent classification: one hypothesis sentence per label,
//! scored against the utterance by a local model.

use async_trait::async_trait;
use std::sync::Arc;

use super::IntentBackend;
use crate::brain::intent::{clamp_confidence, BackendKind, Intent};
use crate::brain::models::ZeroShotModel;
use crate::error::BackendError;

pub struct ZeroShotBackend {
    model: Arc<dyn ZeroShotModel>,
}

impl ZeroShotBackend {
    pub fn new(model: Arc<dyn ZeroShotModel>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl IntentBackend for ZeroShotBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::ZeroShot
    }

    async fn classify(&self, text: &str, labels: &[Intent]) -> Result<(Intent, f32), BackendError> {
        if labels.is_empty() {
            return Err(BackendError::Parse("no candidate labels".to_string()));
        }

        let model = Arc::clone(&self.model);
        let input = text.to_string();
        let hypotheses: Vec<String> = labels.iter().map(|l| l.hypothesis().to_string()).collect();
        let probabilities =
            tokio::task::spawn_blocking(move || model.score(&input, &hypotheses)).await??;

        if probabilities.len() != labels.len() {
            return Err(BackendError::Parse(format!(
                "expected {} scores, got {}",
                labels.len(),
                probabilities.len()
            )));
        }

        let (best, score) = probabilities
            .iter()
            .enumerate()
            .filter(|(_, p)| !p.is_nan())
            .max_by(|a, b| a.1.total_cmp(b.1))
            .ok_or_else(|| BackendError::Parse("model returned only NaN scores".to_string()))?;

        Ok((labels[best], clamp_confidence(*score)))
    }
}
