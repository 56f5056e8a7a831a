//! Intent vocabulary shared by every detection backend.
//!
//! The intent set is closed: every utterance maps to exactly one of the six
//! variants, `Unknown` being the default when nothing matches confidently.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Detected intent type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    /// Book a meeting or appointment
    ScheduleMeeting,
    /// Set a reminder or alert
    SetReminder,
    /// Record a user preference
    SetPreference,
    /// Create a generic task / to-do
    CreateTask,
    /// Recall something the user said earlier
    RetrieveTask,
    /// Unknown/Default
    Unknown,
}

impl Intent {
    /// Every intent, in label order.
    pub const ALL: [Intent; 6] = [
        Intent::SetPreference,
        Intent::SetReminder,
        Intent::ScheduleMeeting,
        Intent::RetrieveTask,
        Intent::CreateTask,
        Intent::Unknown,
    ];

    /// Returns the wire label for the intent
    pub fn label(&self) -> &'static str {
        match self {
            Intent::ScheduleMeeting => "schedule_meeting",
            Intent::SetReminder => "set_reminder",
            Intent::SetPreference => "set_preference",
            Intent::CreateTask => "create_task",
            Intent::RetrieveTask => "retrieve_task",
            Intent::Unknown => "unknown",
        }
    }

    /// Natural-language hypothesis used by the zero-shot backend.
    pub fn hypothesis(&self) -> &'static str {
        match self {
            Intent::SetPreference => "User is setting their preference or configuration",
            Intent::SetReminder => "User is setting a reminder or alarm",
            Intent::ScheduleMeeting => "User is scheduling a meeting or appointment",
            Intent::RetrieveTask => "User is retrieving or asking about stored information",
            Intent::CreateTask => "User is creating a new task or to-do item",
            Intent::Unknown => "User intent is unclear or unknown",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for Intent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace([' ', '-'], "_");
        Intent::ALL
            .into_iter()
            .find(|intent| intent.label() == normalized)
            .ok_or_else(|| format!("unknown intent label '{}'", s.trim()))
    }
}

/// Identity of a detection backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    RuleBased,
    Embedding,
    ZeroShot,
    Cloud,
}

impl BackendKind {
    /// Fixed presentation order used by comparison mode.
    pub const ALL: [BackendKind; 4] = [
        BackendKind::RuleBased,
        BackendKind::Embedding,
        BackendKind::ZeroShot,
        BackendKind::Cloud,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::RuleBased => "rule_based",
            BackendKind::Embedding => "embedding",
            BackendKind::ZeroShot => "zero_shot",
            BackendKind::Cloud => "cloud",
        }
    }

    /// Human-facing name shown by front ends.
    pub fn display_name(&self) -> &'static str {
        match self {
            BackendKind::RuleBased => "Rule-Based",
            BackendKind::Embedding => "Sentence Transformers",
            BackendKind::ZeroShot => "HuggingFace",
            BackendKind::Cloud => "Claude API",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        BackendKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == wanted || kind.display_name().to_lowercase() == wanted)
            .or(match wanted.as_str() {
                "rules" | "rule" => Some(BackendKind::RuleBased),
                "sentence_transformers" | "embeddings" => Some(BackendKind::Embedding),
                "huggingface" | "zeroshot" | "zero-shot" => Some(BackendKind::ZeroShot),
                "claude" | "anthropic" => Some(BackendKind::Cloud),
                _ => None,
            })
            .ok_or_else(|| format!("unknown backend '{}'", s.trim()))
    }
}

/// Outcome of one detection request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    /// Detected intent
    pub intent: Intent,
    /// Confidence score (0.0 - 1.0)
    pub confidence: f32,
    /// Backend that actually produced the answer
    pub backend_used: BackendKind,
    /// Backend the caller asked for
    pub requested_backend: BackendKind,
    /// Set iff the requested backend failed and the rules answered instead
    pub degraded: bool,
    /// Error text of the failed backend, when degraded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<String>,
    /// Wall-clock time spent on the request
    #[serde(default)]
    pub latency_ms: u64,
}

impl DetectionResult {
    /// A successful, non-degraded detection.
    pub fn new(intent: Intent, confidence: f32, backend: BackendKind) -> Self {
        Self {
            intent,
            confidence: clamp_confidence(confidence),
            backend_used: backend,
            requested_backend: backend,
            degraded: false,
            fallback_reason: None,
            latency_ms: 0,
        }
    }

    /// Marks a rule-based result as standing in for a failed backend.
    pub fn degraded_from(mut self, requested: BackendKind, reason: String) -> Self {
        self.requested_backend = requested;
        self.degraded = true;
        self.fallback_reason = Some(reason);
        self
    }

    /// One-line summary for logs and terminal output.
    pub fn summary(&self) -> String {
        format!(
            "{} ({:.0}%) via {}{}",
            self.intent,
            self.confidence * 100.0,
            self.backend_used,
            if self.degraded { " [degraded]" } else { "" }
        )
    }
}

/// Keeps model-reported scores inside [0, 1]; NaN counts as no confidence.
pub fn clamp_confidence(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
