//! Intent classification using an ordered rule table.
//!
//! Rules are data: each record names an intent, a fixed confidence and the
//! triggers that must all hold. The first matching rule wins, so table order
//! is the priority order. No ML model required.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, LazyLock};

use super::intent::{BackendKind, DetectionResult, Intent};
use crate::error::AppError;

/// Confidence reported when no rule matches.
pub const NO_MATCH_CONFIDENCE: f32 = 0.3;

/// Rule table compiled into the binary.
const DEFAULT_RULES_JSON: &str = include_str!("../../rules/intent_rules.json");

// NOTE: expect() is acceptable here: the embedded table is covered by tests
static DEFAULT_RULES: LazyLock<Arc<[IntentRule]>> = LazyLock::new(|| {
    compile_rules(DEFAULT_RULES_JSON)
        .expect("Invalid embedded intent rule table")
        .into()
});

/// Declarative rule record, as stored in the JSON table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleDef {
    /// Short identifier used in logs
    pub name: String,
    /// Intent produced when the rule matches
    pub intent: Intent,
    /// Fixed confidence reported for a match
    pub confidence: f32,
    /// At least one of these phrases must occur
    #[serde(default)]
    pub any_of: Vec<String>,
    /// Text must start with this phrase
    #[serde(default)]
    pub prefix: Option<String>,
    /// Regex that must match somewhere in the text
    #[serde(default)]
    pub pattern: Option<String>,
    /// None of these phrases may occur
    #[serde(default)]
    pub none_of: Vec<String>,
}

/// A compiled rule.
#[derive(Debug, Clone)]
pub struct IntentRule {
    name: String,
    intent: Intent,
    confidence: f32,
    triggers: Vec<Trigger>,
    exclusions: Vec<String>,
}

#[derive(Debug, Clone)]
enum Trigger {
    AnyOf(Vec<String>),
    Prefix(String),
    Pattern(Regex),
}

impl Trigger {
    fn holds(&self, text: &str) -> bool {
        match self {
            Trigger::AnyOf(phrases) => phrases.iter().any(|p| text.contains(p.as_str())),
            Trigger::Prefix(prefix) => text.starts_with(prefix.as_str()),
            Trigger::Pattern(regex) => regex.is_match(text),
        }
    }
}

impl IntentRule {
    fn compile(def: RuleDef) -> Result<Self, AppError> {
        if !(0.0..=1.0).contains(&def.confidence) {
            return Err(AppError::Validation(format!(
                "rule '{}' has confidence {} outside [0, 1]",
                def.name, def.confidence
            )));
        }

        let mut triggers = Vec::new();
        if let Some(prefix) = def.prefix {
            triggers.push(Trigger::Prefix(prefix.to_lowercase()));
        }
        if !def.any_of.is_empty() {
            triggers.push(Trigger::AnyOf(
                def.any_of.iter().map(|p| p.to_lowercase()).collect(),
            ));
        }
        if let Some(pattern) = def.pattern {
            triggers.push(Trigger::Pattern(Regex::new(&pattern)?));
        }
        if triggers.is_empty() {
            return Err(AppError::Validation(format!(
                "rule '{}' has no trigger",
                def.name
            )));
        }

        Ok(Self {
            name: def.name,
            intent: def.intent,
            confidence: def.confidence,
            triggers,
            exclusions: def.none_of.iter().map(|p| p.to_lowercase()).collect(),
        })
    }

    fn matches(&self, normalized: &str) -> bool {
        self.triggers.iter().all(|t| t.holds(normalized))
            && !self.exclusions.iter().any(|e| normalized.contains(e.as_str()))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn intent(&self) -> Intent {
        self.intent
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }
}

fn compile_rules(json: &str) -> Result<Vec<IntentRule>, AppError> {
    let defs: Vec<RuleDef> = serde_json::from_str(json)?;
    defs.into_iter().map(IntentRule::compile).collect()
}

/// Lowercases and trims an utterance before matching.
pub fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Rule-based intent matcher.
#[derive(Debug, Clone)]
pub struct RuleMatcher {
    rules: Arc<[IntentRule]>,
}

impl Default for RuleMatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleMatcher {
    /// Create a matcher over the built-in rule table
    pub fn new() -> Self {
        Self {
            rules: DEFAULT_RULES.clone(),
        }
    }

    /// Create a matcher from a JSON rule table (same shape as the built-in one).
    pub fn from_json(json: &str) -> Result<Self, AppError> {
        Ok(Self {
            rules: compile_rules(json)?.into(),
        })
    }

    pub fn rules(&self) -> &[IntentRule] {
        &self.rules
    }

    /// First rule matching the text, if any.
    pub fn matched_rule(&self, text: &str) -> Option<&IntentRule> {
        let normalized = normalize(text);
        if normalized.is_empty() {
            return None;
        }
        self.rules.iter().find(|rule| rule.matches(&normalized))
    }

    /// Classify the intent of a text
    pub fn classify(&self, text: &str) -> DetectionResult {
        match self.matched_rule(text) {
            Some(rule) => DetectionResult::new(rule.intent, rule.confidence, BackendKind::RuleBased),
            None => DetectionResult::new(Intent::Unknown, NO_MATCH_CONFIDENCE, BackendKind::RuleBased),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_table_compiles() {
        let matcher = RuleMatcher::new();
        assert_eq!(matcher.rules().len(), 6);
        assert_eq!(matcher.rules()[0].name(), "recall_phrase");
    }

    #[test]
    fn test_meeting_detection() {
        let matcher = RuleMatcher::new();

        let result = matcher.classify("schedule a meeting tomorrow at 3pm");
        assert_eq!(result.intent, Intent::ScheduleMeeting);
        assert!(result.confidence >= 0.85);

        let result = matcher.classify("Book an appointment with Alice");
        assert_eq!(result.intent, Intent::ScheduleMeeting);
    }

    #[test]
    fn test_priority_order() {
        let matcher = RuleMatcher::new();

        // recall beats meeting keywords
        let result = matcher.classify("did I mention anything about the meeting");
        assert_eq!(result.intent, Intent::RetrieveTask);
        assert_eq!(result.confidence, 0.8);

        // reminder beats task verbs
        let result = matcher.classify("remind me to submit form to kavita mam on 17 feb 2026");
        assert_eq!(result.intent, Intent::SetReminder);
        assert_eq!(result.confidence, 0.9);
    }

    #[test]
    fn test_exclusions() {
        let matcher = RuleMatcher::new();

        let result = matcher.classify("I prefer mornings, remember that");
        assert_ne!(result.intent, Intent::SetPreference);

        let result = matcher.classify("I prefer coffee over tea");
        assert_eq!(result.intent, Intent::SetPreference);
    }

    #[test]
    fn test_recall_prefix_rule() {
        let matcher = RuleMatcher::new();
        let rule = matcher.matched_rule("What was it I said yesterday?").unwrap();
        assert_eq!(rule.name(), "recall_question");
    }

    #[test]
    fn test_unknown_detection() {
        let matcher = RuleMatcher::new();

        for text in ["", "   ", "hello there"] {
            let result = matcher.classify(text);
            assert_eq!(result.intent, Intent::Unknown);
            assert_eq!(result.confidence, NO_MATCH_CONFIDENCE);
            assert_eq!(result.backend_used, BackendKind::RuleBased);
            assert!(!result.degraded);
        }
    }

    #[test]
    fn test_custom_table_with_pattern() {
        let json = r#"[
            {"name": "alarm", "intent": "set_reminder", "confidence": 0.7, "pattern": "\\bwake me\\b"}
        ]"#;
        let matcher = RuleMatcher::from_json(json).unwrap();
        assert_eq!(matcher.classify("Wake me at six").intent, Intent::SetReminder);
        assert_eq!(matcher.classify("schedule a meeting").intent, Intent::Unknown);
    }

    #[test]
    fn test_invalid_tables_are_rejected() {
        let no_trigger = r#"[{"name": "empty", "intent": "unknown", "confidence": 0.5}]"#;
        assert!(matches!(RuleMatcher::from_json(no_trigger), Err(AppError::Validation(_))));

        let bad_confidence =
            r#"[{"name": "x", "intent": "create_task", "confidence": 1.5, "any_of": ["do"]}]"#;
        assert!(RuleMatcher::from_json(bad_confidence).is_err());

        let bad_regex =
            r#"[{"name": "x", "intent": "create_task", "confidence": 0.5, "pattern": "(unclosed"}]"#;
        assert!(RuleMatcher::from_json(bad_regex).is_err());
    }
}
