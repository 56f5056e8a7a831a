//! Keyword overlap scoring, used for recall when no embedding model is
//! loaded.

use std::collections::HashSet;
use std::sync::LazyLock;

/// Stopwords for English language
const STOPWORDS_EN: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "nor", "for", "yet", "so", "i", "you", "he", "she", "it",
    "we", "they", "me", "him", "her", "us", "them", "my", "your", "his", "its", "our", "their",
    "this", "that", "these", "those", "who", "whom", "which", "what", "whose", "is", "am", "are",
    "was", "were", "be", "been", "have", "has", "had", "do", "does", "did", "will", "would",
    "should", "can", "could", "may", "might", "must", "in", "on", "at", "to", "from", "by",
    "with", "about", "into", "up", "out", "off", "over", "here", "there", "where", "when", "why",
    "how", "all", "any", "some", "no", "not", "only", "than", "too", "very", "just", "also",
    "now", "then", "if", "as", "yes",
    // recall phrasing carries no topic
    "tell", "told", "say", "said", "mention", "mentioned", "remember", "earlier", "anything",
    "something", "again",
];

static STOPWORDS: LazyLock<HashSet<&'static str>> =
    LazyLock::new(|| STOPWORDS_EN.iter().copied().collect());

const MIN_WORD_LENGTH: usize = 3;

/// Content words of a text, lowercased, in order, without duplicates.
pub fn keywords(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric() && c != '-')
        .map(|w| w.trim_matches('-'))
        .filter(|w| {
            w.len() >= MIN_WORD_LENGTH
                && !STOPWORDS.contains(w)
                && !w.chars().all(|c| c.is_numeric())
        })
        .filter(|w| seen.insert(w.to_string()))
        .map(str::to_string)
        .collect()
}

/// Fraction of the query's keywords found as substrings of `candidate`.
pub fn overlap_score(query_keywords: &[String], candidate: &str) -> f32 {
    if query_keywords.is_empty() {
        return 0.0;
    }
    let haystack = candidate.to_lowercase();
    let hits = query_keywords
        .iter()
        .filter(|k| haystack.contains(k.as_str()))
        .count();
    hits as f32 / query_keywords.len() as f32
}
