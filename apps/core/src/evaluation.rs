//! Evaluation harness: a fixed labelled utterance set run against every
//! backend, reporting per-backend accuracy.

use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{info, warn};

use crate::brain::dispatcher::DetectionDispatcher;
use crate::brain::intent::{BackendKind, Intent};

/// Minimum accuracy for a backend to pass.
pub const PASS_ACCURACY: f32 = 0.8;

/// Labelled utterances: (input_text, expected_intent)
pub const TEST_CASES: &[(&str, Intent)] = &[
    ("schedule a meeting tomorrow at 3pm", Intent::ScheduleMeeting),
    ("remind me about the project deadline", Intent::SetReminder),
    ("I prefer coffee over tea", Intent::SetPreference),
    ("what did I tell you earlier", Intent::RetrieveTask),
    ("send an email to john", Intent::CreateTask),
    ("set my timezone to EST", Intent::SetPreference),
    ("alert me in 30 minutes", Intent::SetReminder),
    ("book an appointment with alice", Intent::ScheduleMeeting),
    ("did I mention anything about the presentation", Intent::RetrieveTask),
    ("submit the report by Friday", Intent::CreateTask),
    ("hello there", Intent::Unknown),
    ("call the client tomorrow", Intent::CreateTask),
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseOutcome {
    pub text: String,
    pub expected: Intent,
    pub detected: Intent,
    pub confidence: f32,
    pub degraded: bool,
}

impl CaseOutcome {
    pub fn correct(&self) -> bool {
        self.expected == self.detected
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendScore {
    pub backend: BackendKind,
    pub total: usize,
    pub correct: usize,
    /// Cases answered by the rule fallback instead of this backend
    pub degraded: usize,
    pub accuracy: f32,
    pub passed: bool,
    pub duration_ms: u64,
    pub failures: Vec<CaseOutcome>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub backends: Vec<BackendScore>,
    pub total_duration_ms: u64,
}

impl EvaluationReport {
    pub fn score(&self, backend: BackendKind) -> Option<&BackendScore> {
        self.backends.iter().find(|s| s.backend == backend)
    }
}

/// Runs the labelled set against all four backends, one backend at a time.
pub async fn run_evaluation(dispatcher: &DetectionDispatcher) -> EvaluationReport {
    let start = Instant::now();
    let mut backends = Vec::with_capacity(BackendKind::ALL.len());
    for kind in BackendKind::ALL {
        backends.push(evaluate_backend(dispatcher, kind).await);
    }
    EvaluationReport {
        backends,
        total_duration_ms: start.elapsed().as_millis() as u64,
    }
}

pub async fn evaluate_backend(dispatcher: &DetectionDispatcher, backend: BackendKind) -> BackendScore {
    let start = Instant::now();
    let mut outcomes = Vec::with_capacity(TEST_CASES.len());

    for (text, expected) in TEST_CASES {
        let result = dispatcher.detect(text, backend).await;
        outcomes.push(CaseOutcome {
            text: text.to_string(),
            expected: *expected,
            detected: result.intent,
            confidence: result.confidence,
            degraded: result.degraded,
        });
    }

    let total = outcomes.len();
    let correct = outcomes.iter().filter(|o| o.correct()).count();
    let degraded = outcomes.iter().filter(|o| o.degraded).count();
    let accuracy = if total == 0 { 0.0 } else { correct as f32 / total as f32 };
    let passed = accuracy >= PASS_ACCURACY;

    if passed {
        info!("  ✅ {}: {:.1}% ({}/{})", backend.display_name(), accuracy * 100.0, correct, total);
    } else {
        warn!("  ❌ {}: {:.1}% ({}/{})", backend.display_name(), accuracy * 100.0, correct, total);
    }

    BackendScore {
        backend,
        total,
        correct,
        degraded,
        accuracy,
        passed,
        duration_ms: start.elapsed().as_millis() as u64,
        failures: outcomes.into_iter().filter(|o| !o.correct()).collect(),
    }
}
