//! Maps a detection to a canned action and response.
//!
//! Planning is pure: anything read from storage (stored preference, recall
//! match) is gathered by the caller and handed in through [`PlanContext`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::entities::EntitySet;
use super::intent::{DetectionResult, Intent};
use crate::memory::RecallMatch;

/// Preference key written by `set_preference` and read by `schedule_meeting`.
pub const MEETING_PREFERENCE_KEY: &str = "meeting_time";

pub const CLARIFY_RESPONSE: &str =
    "Could you please clarify your request? I want to make sure I understand correctly.";
pub const UNKNOWN_RESPONSE: &str = "I didn't understand that request. Could you rephrase it?";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    StorePreference,
    ScheduleWithPreference,
    ScheduleAtTime,
    ScheduleDefault,
    StoreTask,
    SemanticRecall,
    Clarify,
    Unknown,
}

impl Action {
    pub const ALL: [Action; 8] = [
        Action::StorePreference,
        Action::ScheduleWithPreference,
        Action::ScheduleAtTime,
        Action::ScheduleDefault,
        Action::StoreTask,
        Action::SemanticRecall,
        Action::Clarify,
        Action::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::StorePreference => "store_preference",
            Action::ScheduleWithPreference => "schedule_with_preference",
            Action::ScheduleAtTime => "schedule_at_time",
            Action::ScheduleDefault => "schedule_default",
            Action::StoreTask => "store_task",
            Action::SemanticRecall => "semantic_recall",
            Action::Clarify => "clarify",
            Action::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Action::ALL
            .into_iter()
            .find(|action| action.as_str() == s.trim())
            .ok_or_else(|| format!("unknown action '{}'", s.trim()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionPlan {
    pub action: Action,
    /// Text shown to the user
    pub response: String,
    /// Why this action was chosen
    pub reasoning: String,
}

impl ActionPlan {
    fn new(action: Action, response: impl Into<String>, reasoning: impl Into<String>) -> Self {
        Self {
            action,
            response: response.into(),
            reasoning: reasoning.into(),
        }
    }
}

/// Storage-derived inputs to planning.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlanContext {
    pub meeting_preference: Option<String>,
    pub recall: Option<RecallMatch>,
}

/// Plans with an empty context.
pub fn plan(intent: Intent, entities: &EntitySet) -> ActionPlan {
    plan_with_context(intent, entities, &PlanContext::default())
}

pub fn plan_with_context(intent: Intent, entities: &EntitySet, ctx: &PlanContext) -> ActionPlan {
    let time = entities.primary_time().map(|e| e.value.as_str());
    let person = entities.primary_person().map(|e| e.value.as_str());

    match intent {
        Intent::SetPreference => ActionPlan::new(
            Action::StorePreference,
            format!("Preference saved successfully: {}", MEETING_PREFERENCE_KEY),
            "User is setting a preference. Storing preference for future use.",
        ),
        Intent::ScheduleMeeting => match (&ctx.meeting_preference, time) {
            (Some(pref), _) => ActionPlan::new(
                Action::ScheduleWithPreference,
                format!("Meeting scheduled based on your preference: {}", pref),
                format!("Found stored preference for meeting time: {}. Using preference.", pref),
            ),
            (None, Some(time)) => ActionPlan::new(
                Action::ScheduleAtTime,
                format!("Meeting scheduled for {}", time),
                format!("No stored preference found. Using requested time: {}.", time),
            ),
            (None, None) => ActionPlan::new(
                Action::ScheduleDefault,
                "Meeting scheduled at default time",
                "No stored preference found. Using default meeting time.",
            ),
        },
        Intent::SetReminder => store_task("User wants to set a reminder", "with time:", "for person:", time, person),
        Intent::CreateTask => store_task("User wants to create a task", "due by", "assigned to", time, person),
        Intent::RetrieveTask => match &ctx.recall {
            Some(found) => ActionPlan::new(
                Action::SemanticRecall,
                format!(
                    "I remember you mentioned: {} (Relevance: {:.2})",
                    found.record.utterance, found.score
                ),
                format!(
                    "Searching memory for similar past conversations. Found match with relevance score: {:.2}",
                    found.score
                ),
            ),
            None => ActionPlan::new(
                Action::SemanticRecall,
                "No relevant memory found for your query",
                "Searching memory but no relevant past conversations found.",
            ),
        },
        Intent::Unknown => ActionPlan::new(
            Action::Unknown,
            UNKNOWN_RESPONSE,
            "Intent not recognized. Unable to determine appropriate action.",
        ),
    }
}

/// Plans a detection, asking for clarification below `threshold`.
pub fn plan_detection(
    detection: &DetectionResult,
    entities: &EntitySet,
    ctx: &PlanContext,
    threshold: f32,
) -> ActionPlan {
    if detection.confidence < threshold {
        return ActionPlan::new(
            Action::Clarify,
            CLARIFY_RESPONSE,
            format!(
                "Confidence level ({:.1}%) is below threshold ({:.1}%). Need clarification.",
                detection.confidence * 100.0,
                threshold * 100.0
            ),
        );
    }
    plan_with_context(detection.intent, entities, ctx)
}

fn store_task(
    lead: &str,
    time_label: &str,
    person_label: &str,
    time: Option<&str>,
    person: Option<&str>,
) -> ActionPlan {
    let mut response = String::from("Task saved");
    let mut reasoning = vec![lead.to_string()];
    if let Some(time) = time {
        response.push_str(&format!(" for {}", time));
        reasoning.push(format!("{} {}", time_label, time));
    }
    if let Some(person) = person {
        response.push_str(&format!(" with {}", person));
        reasoning.push(format!("{} {}", person_label, person));
    }
    response.push('.');

    ActionPlan::new(Action::StoreTask, response, reasoning.join(". ") + ".")
}
