//! Deterministic stand-ins for models and backends.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::time::{sleep, Duration};

use crate::brain::backends::{BackendRegistry, IntentBackend};
use crate::brain::intent::{BackendKind, Intent};
use crate::brain::models::{Embedder, ZeroShotModel};
use crate::brain::rules::RuleMatcher;
use crate::brain::DetectionDispatcher;
use crate::error::BackendError;
use crate::memory::keywords::keywords;

// --- Mock Components ---

/// Backend with a canned answer, an optional delay and a call counter.
pub struct MockBackend {
    pub kind: BackendKind,
    pub answer: Result<(Intent, f32), BackendError>,
    pub delay_ms: u64,
    pub calls: Arc<AtomicUsize>,
}

impl MockBackend {
    pub fn answering(kind: BackendKind, intent: Intent, confidence: f32) -> Self {
        Self {
            kind,
            answer: Ok((intent, confidence)),
            delay_ms: 0,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing(kind: BackendKind, error: BackendError) -> Self {
        Self {
            kind,
            answer: Err(error),
            delay_ms: 0,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_delay(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }
}

#[async_trait]
impl IntentBackend for MockBackend {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    async fn classify(&self, _text: &str, _labels: &[Intent]) -> Result<(Intent, f32), BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.delay_ms > 0 {
            sleep(Duration::from_millis(self.delay_ms)).await;
        }
        self.answer.clone()
    }
}

pub fn dispatcher_with(backends: Vec<MockBackend>, timeout_ms: u64) -> DetectionDispatcher {
    let mut registry = BackendRegistry::new();
    for backend in backends {
        registry.register(Arc::new(backend));
    }
    DetectionDispatcher::new(RuleMatcher::new(), registry, Duration::from_millis(timeout_ms))
}

/// Bag-of-keywords embedder: each content word is hashed into one of 4096
/// dimensions.
#[derive(Default)]
pub struct KeywordEmbedder {
    pub texts_embedded: AtomicUsize,
}

const DIMS: usize = 4096;

fn bucket(word: &str) -> usize {
    // FNV-1a
    let mut hash: u32 = 0x811c9dc5;
    for byte in word.bytes() {
        hash ^= byte as u32;
        hash = hash.wrapping_mul(0x01000193);
    }
    hash as usize % DIMS
}

impl Embedder for KeywordEmbedder {
    fn name(&self) -> &str {
        "keyword-hash"
    }

    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, BackendError> {
        self.texts_embedded.fetch_add(texts.len(), Ordering::SeqCst);
        Ok(texts
            .iter()
            .map(|text| {
                let mut v = vec![0.0; DIMS];
                for word in keywords(text) {
                    v[bucket(&word)] += 1.0;
                }
                v
            })
            .collect())
    }
}

/// Embedder whose model is gone.
pub struct BrokenEmbedder;

impl Embedder for BrokenEmbedder {
    fn name(&self) -> &str {
        "broken"
    }

    fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, BackendError> {
        Err(BackendError::Unavailable("model file missing".to_string()))
    }
}

/// Zero-shot model that puts all mass on hypotheses sharing a word with the
/// text.
pub struct OverlapZeroShot;

impl ZeroShotModel for OverlapZeroShot {
    fn name(&self) -> &str {
        "overlap"
    }

    fn score(&self, text: &str, hypotheses: &[String]) -> Result<Vec<f32>, BackendError> {
        let words = keywords(text);
        let raw: Vec<f32> = hypotheses
            .iter()
            .map(|h| {
                let lower = h.to_lowercase();
                words.iter().filter(|w| lower.contains(w.as_str())).count() as f32 + 0.01
            })
            .collect();
        let total: f32 = raw.iter().sum();
        Ok(raw.into_iter().map(|r| r / total).collect())
    }
}
