//! Brain Module Tests
//!
//! Rule matching, entity extraction and planning exercised together on
//! realistic utterances.

use crate::brain::entities::{EntityExtractor, EntityKind};
use crate::brain::intent::{BackendKind, Intent};
use crate::brain::planner::{plan, Action};
use crate::brain::rules::{RuleMatcher, NO_MATCH_CONFIDENCE};

const UTTERANCES: &[&str] = &[
    "",
    "   ",
    "hello there",
    "schedule a meeting tomorrow at 3pm",
    "remind me to submit form to kavita mam on 17 feb 2026",
    "I prefer morning meetings",
    "what did I tell you earlier",
    "What have I said about the budget?",
    "tell me about my tasks",
    "Book an appointment with Dr. Rao next friday at 10:30 am",
    "pay electricity bill on 20 feb 2026 at 7 pm",
    "🙂🙂🙂",
    "SCHEDULE MEETING!!!",
    "meet alice for coffee",
    "what time is the appointment",
];

#[test]
fn test_matcher_is_total_and_idempotent() {
    let matcher = RuleMatcher::new();
    for text in UTTERANCES {
        let first = matcher.classify(text);
        let second = matcher.classify(text);
        assert!(Intent::ALL.contains(&first.intent), "'{}'", text);
        assert!((0.0..=1.0).contains(&first.confidence));
        assert_eq!(first, second, "not idempotent for '{}'", text);
        assert_eq!(first.backend_used, BackendKind::RuleBased);
    }
}

#[test]
fn test_extraction_invariants() {
    let extractor = EntityExtractor::new();
    for text in UTTERANCES {
        let entities = extractor.extract(text);
        for pair in entities.windows(2) {
            assert!(pair[0].offset <= pair[1].offset, "unordered for '{}'", text);
            if pair[0].kind == pair[1].kind {
                assert!(!pair[0].overlaps(&pair[1]), "overlap for '{}'", text);
            }
        }
        // restartable: extracting again gives the same set
        assert_eq!(entities, extractor.extract(text));
    }
}

#[test]
fn test_meeting_with_time() {
    let text = "schedule a meeting tomorrow at 3pm";
    let detection = RuleMatcher::new().classify(text);
    assert_eq!(detection.intent, Intent::ScheduleMeeting);
    assert!(detection.confidence >= 0.85);

    let entities = EntityExtractor::new().extract(text);
    let times: Vec<_> = entities.of_kind(EntityKind::Time).map(|e| e.value.as_str()).collect();
    assert_eq!(times, vec!["tomorrow at 3pm"]);
}

#[test]
fn test_reminder_with_person_and_date() {
    let text = "remind me to submit form to kavita mam on 17 feb 2026";
    let detection = RuleMatcher::new().classify(text);
    assert_eq!(detection.intent, Intent::SetReminder);

    let entities = EntityExtractor::new().extract(text);
    assert_eq!(entities.primary_person().unwrap().value, "kavita mam");
    assert_eq!(entities.primary_time().unwrap().value, "17 feb 2026");

    let plan = plan(detection.intent, &entities);
    assert_eq!(plan.action, Action::StoreTask);
    assert_eq!(plan.response, "Task saved for 17 feb 2026 with kavita mam.");
}

#[test]
fn test_empty_input() {
    let detection = RuleMatcher::new().classify("");
    assert_eq!(detection.intent, Intent::Unknown);
    assert!(detection.confidence <= NO_MATCH_CONFIDENCE);
    assert!(EntityExtractor::new().extract("").is_empty());
}

#[test]
fn test_question_about_meeting_is_not_scheduling() {
    // "what" vetoes the meeting rule and no task verb occurs
    let detection = RuleMatcher::new().classify("what time is the appointment");
    assert_eq!(detection.intent, Intent::Unknown);

    let detection = RuleMatcher::new().classify("What have I said about the budget?");
    assert_eq!(detection.intent, Intent::RetrieveTask);
}

#[test]
fn test_case_insensitive_rules() {
    let detection = RuleMatcher::new().classify("SCHEDULE MEETING!!!");
    assert_eq!(detection.intent, Intent::ScheduleMeeting);
}
