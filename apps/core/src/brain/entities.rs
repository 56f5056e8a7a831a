//! Entity extraction: date/time expressions and person names.
//!
//! Time patterns are grouped in categories evaluated in a fixed priority
//! (absolute date, relative day, weekday, clock time). Within a category the
//! first pattern that matches wins and at most one span is kept. Person
//! candidates come from honorifics, prepositions and capitalization.
//! Overlapping spans of the same kind collapse to the longest one.

use regex::{Match, Regex};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::ops::Deref;
use std::sync::LazyLock;

/// Kind of an extracted span
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Time,
    Person,
}

/// A typed span of the original utterance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub kind: EntityKind,
    /// Text exactly as it appears in the utterance
    pub value: String,
    /// Byte offset of the span in the utterance
    pub offset: usize,
}

impl Entity {
    fn from_match(kind: EntityKind, m: Match<'_>) -> Self {
        Self {
            kind,
            value: m.as_str().to_string(),
            offset: m.start(),
        }
    }

    /// Byte offset one past the end of the span.
    pub fn end(&self) -> usize {
        self.offset + self.value.len()
    }

    pub fn overlaps(&self, other: &Entity) -> bool {
        self.offset < other.end() && other.offset < self.end()
    }
}

/// Entities of one utterance, ordered left to right.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntitySet(Vec<Entity>);

impl EntitySet {
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    /// Entities of one kind, in order.
    pub fn of_kind(&self, kind: EntityKind) -> impl Iterator<Item = &Entity> + '_ {
        self.0.iter().filter(move |e| e.kind == kind)
    }

    /// The most complete time expression (longest span, earliest on ties).
    pub fn primary_time(&self) -> Option<&Entity> {
        self.of_kind(EntityKind::Time)
            .fold(None, |best: Option<&Entity>, e| match best {
                Some(b) if b.value.len() >= e.value.len() => Some(b),
                _ => Some(e),
            })
    }

    /// The first person mentioned.
    pub fn primary_person(&self) -> Option<&Entity> {
        self.of_kind(EntityKind::Person).next()
    }

    pub fn into_vec(self) -> Vec<Entity> {
        self.0
    }
}

impl Deref for EntitySet {
    type Target = [Entity];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<'a> IntoIterator for &'a EntitySet {
    type Item = &'a Entity;
    type IntoIter = std::slice::Iter<'a, Entity>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl From<Vec<Entity>> for EntitySet {
    fn from(mut entities: Vec<Entity>) -> Self {
        entities.sort_by_key(|e| e.offset);
        Self(entities)
    }
}

const MONTHS: &str = "january|february|march|april|may|june|july|august|september|october|november|december|jan|feb|mar|apr|jun|jul|aug|sept|sep|oct|nov|dec";
const WEEKDAYS: &str = "monday|tuesday|wednesday|thursday|friday|saturday|sunday";
const DAY_PARTS: &str = "morning|afternoon|evening|night";
const CLOCK: &str = r"\d{1,2}(?::\d{2})?\s*(?:am|pm)\b|\d{1,2}:\d{2}\b";

fn time_regex(pattern: String, what: &str) -> Regex {
    Regex::new(&format!("(?i){}", pattern))
        .unwrap_or_else(|e| panic!("Invalid regex: {} ({})", what, e))
}

// Compile patterns once at startup
static ABSOLUTE_DATE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        // 17 feb 2026
        time_regex(format!(r"\b\d{{1,2}}(?:st|nd|rd|th)?\s+(?:{MONTHS})\s+\d{{4}}\b"), "day month year"),
        // 02/16/2026
        time_regex(r"\b\d{1,2}/\d{1,2}/\d{2,4}\b".to_string(), "numeric date"),
        // feb 17, 2026
        time_regex(format!(r"\b(?:{MONTHS})\s+\d{{1,2}}(?:st|nd|rd|th)?,?\s+\d{{4}}\b"), "month day year"),
        // 17 feb
        time_regex(format!(r"\b\d{{1,2}}(?:st|nd|rd|th)?\s+(?:{MONTHS})\b"), "day month"),
    ]
});

static RELATIVE_DAY_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![time_regex(
        format!(r"\b(?:today|tomorrow|tonight|yesterday)\b(?:\s+(?:{DAY_PARTS}))?(?:\s+(?:at\s+)?(?:{CLOCK}))?"),
        "relative day",
    )]
});

static WEEKDAY_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![time_regex(
        format!(r"\b(?:(?:next|this)\s+)?(?:{WEEKDAYS})\b(?:\s+(?:{DAY_PARTS}))?(?:\s+(?:at\s+)?(?:{CLOCK}))?"),
        "weekday",
    )]
});

static CLOCK_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        time_regex(format!(r"\b(?:{CLOCK})"), "clock time"),
        time_regex(r"\b(?:noon|midnight)\b".to_string(), "named time"),
    ]
});

/// Time categories in priority order.
static TIME_CATEGORIES: LazyLock<[&'static [Regex]; 4]> = LazyLock::new(|| {
    [
        ABSOLUTE_DATE_PATTERNS.as_slice(),
        RELATIVE_DAY_PATTERNS.as_slice(),
        WEEKDAY_PATTERNS.as_slice(),
        CLOCK_PATTERNS.as_slice(),
    ]
});

static HONORIFIC_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:dr|mr|mrs|ms|prof)\.?\s+([a-z]+)\b")
        .expect("Invalid regex: honorific prefix")
});

static HONORIFIC_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b([a-z]+)\s+(?:mam|madam|sir|ji)\b").expect("Invalid regex: honorific suffix")
});

static PREPOSITION_TARGET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:to|with|from|by|for)\s+([a-z]+)\b").expect("Invalid regex: preposition target")
});

static CAPITALIZED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[A-Z][a-z]+\b").expect("Invalid regex: capitalized token"));

/// Words that are never names: function words, time words and the verbs and
/// nouns that commonly follow a preposition in task requests.
static NOT_A_NAME: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        // function words
        "the", "you", "me", "him", "her", "it", "them", "us", "my", "your", "our", "their", "his",
        "its", "this", "that", "these", "those", "what", "when", "where", "why", "how", "who",
        "which", "and", "but", "all", "any", "some", "every", "each", "not", "she", "they", "there",
        "here", "about", "after", "before", "over", "into", "from", "with", "for", "did", "does",
        "have", "has", "had", "was", "were", "will", "would", "can", "could", "should", "are",
        "also", "just", "then", "than", "please", "hello", "hey", "thanks", "thank", "okay",
        "everyone", "everybody", "someone", "anyone", "myself", "yourself", "yes", "dear",
        // time words
        "morning", "afternoon", "evening", "night", "today", "tomorrow", "tonight", "yesterday",
        "monday", "tuesday", "wednesday", "thursday", "friday", "saturday", "sunday", "january",
        "february", "march", "april", "may", "june", "july", "august", "september", "october",
        "november", "december", "jan", "feb", "mar", "apr", "jun", "jul", "aug", "sep", "sept",
        "oct", "nov", "dec", "date", "time", "day", "days", "hour", "hours", "minute", "minutes",
        "week", "weeks", "month", "months", "year", "years", "noon", "midnight", "next", "later",
        "now", "soon", "lunch", "dinner", "breakfast",
        // request verbs
        "submit", "attend", "complete", "finish", "send", "call", "pay", "buy", "prepare",
        "visit", "meet", "schedule", "remind", "alert", "set", "book", "arrange", "create",
        "add", "make", "get", "take", "check", "tell", "ask", "show", "find", "prefer",
        "remember", "organise", "organize", "plan", "review", "write", "read", "keep", "bring",
        "pick", "collect", "renew", "clean", "fix", "note", "save", "share", "give", "start",
        "stop", "cancel", "move", "join", "talk", "speak", "discuss",
        // request nouns
        "reminder", "email", "mail", "message", "form", "report", "task", "meeting",
        "appointment", "deadline", "presentation", "project", "bill", "document", "file", "work",
        "office", "home", "team", "alarm", "event", "call", "doctor", "notes",
    ]
    .into_iter()
    .collect()
});

fn is_name_token(token: &str) -> bool {
    token.len() > 2
        && !NOT_A_NAME.contains(token.to_lowercase().as_str())
        // acronyms such as EST or PDF
        && !token.chars().all(|c| c.is_ascii_uppercase())
}

/// Entity extractor over fixed pattern tables.
#[derive(Debug, Clone, Copy, Default)]
pub struct EntityExtractor;

impl EntityExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Extract all entities from a text, ordered by position.
    pub fn extract(&self, text: &str) -> EntitySet {
        if text.trim().is_empty() {
            return EntitySet::empty();
        }

        let mut entities = dedupe_overlaps(self.time_candidates(text));
        entities.extend(dedupe_overlaps(self.person_candidates(text)));
        EntitySet::from(entities)
    }

    /// One candidate per time category: the leftmost match of the first
    /// pattern in the category that matches at all.
    fn time_candidates(&self, text: &str) -> Vec<Entity> {
        TIME_CATEGORIES
            .iter()
            .filter_map(|patterns| patterns.iter().find_map(|p| p.find(text)))
            .map(|m| Entity::from_match(EntityKind::Time, m))
            .collect()
    }

    fn person_candidates(&self, text: &str) -> Vec<Entity> {
        let mut candidates = Vec::new();

        // "dr. smith": the whole phrase is the name
        for caps in HONORIFIC_PREFIX.captures_iter(text) {
            if let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) {
                if is_name_token(name.as_str()) {
                    candidates.push(Entity::from_match(EntityKind::Person, whole));
                }
            }
        }

        // "kavita mam"
        for caps in HONORIFIC_SUFFIX.captures_iter(text) {
            if let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) {
                if is_name_token(name.as_str()) {
                    candidates.push(Entity::from_match(EntityKind::Person, whole));
                }
            }
        }

        // "with alice": only the token after the preposition
        for caps in PREPOSITION_TARGET.captures_iter(text) {
            if let Some(name) = caps.get(1) {
                if is_name_token(name.as_str()) {
                    candidates.push(Entity::from_match(EntityKind::Person, name));
                }
            }
        }

        // a sentence-initial capital is usually a verb ("Water the plants")
        for m in CAPITALIZED.find_iter(text) {
            if is_name_token(m.as_str()) && !starts_sentence(text, m.start()) {
                candidates.push(Entity::from_match(EntityKind::Person, m));
            }
        }

        candidates
    }
}

fn starts_sentence(text: &str, offset: usize) -> bool {
    let before = text[..offset].trim_end();
    before.is_empty() || before.ends_with(['.', '!', '?'])
}

/// Keeps the longest of any overlapping spans (earlier span on ties).
fn dedupe_overlaps(mut candidates: Vec<Entity>) -> Vec<Entity> {
    candidates.sort_by(|a, b| {
        b.value
            .len()
            .cmp(&a.value.len())
            .then(a.offset.cmp(&b.offset))
    });

    let mut kept: Vec<Entity> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        if !kept.iter().any(|k| k.overlaps(&candidate)) {
            kept.push(candidate);
        }
    }
    kept.sort_by_key(|e| e.offset);
    kept
}
