//! Intent classification by embedding similarity.
//!
//! Exemplar phrases per intent are embedded once; an utterance takes the
//! intent of its most similar exemplar, provided the similarity clears a
//! floor.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use super::IntentBackend;
use crate::brain::intent::{clamp_confidence, BackendKind, Intent};
use crate::brain::models::{cosine_similarity, Embedder};
use crate::error::BackendError;

/// Similarities at or below this floor yield `Unknown`.
pub const SIMILARITY_FLOOR: f32 = 0.3;

/// Example utterances for one intent
struct IntentExemplars {
    intent: Intent,
    phrases: &'static [&'static str],
}

const INTENT_EXEMPLARS: &[IntentExemplars] = &[
    IntentExemplars {
        intent: Intent::SetPreference,
        phrases: &[
            "I prefer coffee over tea",
            "Set my timezone to EST",
            "I like quiet hours from 9-5",
        ],
    },
    IntentExemplars {
        intent: Intent::SetReminder,
        phrases: &[
            "Remind me about the meeting",
            "Alert me in 30 minutes",
            "Set an alarm for 6 AM",
        ],
    },
    IntentExemplars {
        intent: Intent::ScheduleMeeting,
        phrases: &[
            "Schedule a meeting for tomorrow",
            "Book an appointment with John",
            "Arrange a call next week",
        ],
    },
    IntentExemplars {
        intent: Intent::RetrieveTask,
        phrases: &[
            "What did I say earlier",
            "Did I mention anything about the project",
            "Do you remember my preferences",
        ],
    },
    IntentExemplars {
        intent: Intent::CreateTask,
        phrases: &[
            "Submit the report by Friday",
            "Call the client",
            "Prepare the presentation",
            "Send an email",
        ],
    },
];

/// Nearest-exemplar classifier over a shared embedding model.
pub struct EmbeddingBackend {
    embedder: Arc<dyn Embedder>,
    exemplars: Arc<[(Intent, Vec<f32>)]>,
}

impl EmbeddingBackend {
    /// Embeds the exemplar phrases. Runs the model synchronously.
    pub fn new(embedder: Arc<dyn Embedder>) -> Result<Self, BackendError> {
        let (intents, phrases): (Vec<Intent>, Vec<String>) = INTENT_EXEMPLARS
            .iter()
            .flat_map(|set| set.phrases.iter().map(|p| (set.intent, p.to_string())))
            .unzip();

        let vectors = embedder.embed(&phrases)?;
        if vectors.len() != phrases.len() {
            return Err(BackendError::Parse(format!(
                "expected {} exemplar embeddings, got {}",
                phrases.len(),
                vectors.len()
            )));
        }

        debug!("Embedded {} intent exemplars", vectors.len());
        Ok(Self {
            embedder,
            exemplars: intents.into_iter().zip(vectors).collect(),
        })
    }

    /// Best (intent, similarity) among exemplars of the allowed labels.
    fn nearest(&self, query: &[f32], labels: &[Intent]) -> (Intent, f32) {
        let mut best = (Intent::Unknown, SIMILARITY_FLOOR);
        for (intent, vector) in self.exemplars.iter() {
            if !labels.contains(intent) {
                continue;
            }
            let similarity = cosine_similarity(query, vector);
            if similarity > best.1 {
                best = (*intent, similarity);
            }
        }
        (best.0, clamp_confidence(best.1))
    }
}

#[async_trait]
impl IntentBackend for EmbeddingBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Embedding
    }

    async fn classify(&self, text: &str, labels: &[Intent]) -> Result<(Intent, f32), BackendError> {
        let embedder = Arc::clone(&self.embedder);
        let input = vec![text.to_string()];
        let mut vectors = tokio::task::spawn_blocking(move || embedder.embed(&input)).await??;

        let query = vectors
            .pop()
            .ok_or_else(|| BackendError::Parse("embedding model returned no vector".to_string()))?;

        Ok(self.nearest(&query, labels))
    }
}
