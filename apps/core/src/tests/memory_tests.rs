//! Memory Store Tests
//!
//! Interaction log persistence, preferences and recall, on temporary
//! database files and in-memory databases.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use tempfile::tempdir;

use super::support::{BrokenEmbedder, KeywordEmbedder};
use crate::brain::entities::EntityExtractor;
use crate::brain::intent::{BackendKind, DetectionResult, Intent};
use crate::brain::planner::Action;
use crate::brain::rules::RuleMatcher;
use crate::memory::{MemoryRecord, MemoryStore, RECALL_THRESHOLD};

fn record(text: &str) -> MemoryRecord {
    let detection = RuleMatcher::new().classify(text);
    let entities = EntityExtractor::new().extract(text);
    let action = match detection.intent {
        Intent::RetrieveTask => Action::SemanticRecall,
        Intent::SetPreference => Action::StorePreference,
        Intent::Unknown => Action::Unknown,
        _ => Action::StoreTask,
    };
    MemoryRecord::new(text, detection, entities, action)
}

async fn store_with(texts: &[&str]) -> MemoryStore {
    let store = MemoryStore::in_memory().await.expect("Failed to open store");
    for text in texts {
        store.append(&record(text)).await.expect("Failed to append");
    }
    store
}

#[tokio::test]
async fn test_append_and_reopen() {
    let dir = tempdir().expect("Failed to create temp dir");
    let db_path = dir.path().join("nested").join("memory.db");

    let first = record("remind me to submit form to kavita mam on 17 feb 2026");
    {
        let store = MemoryStore::open(&db_path).await.unwrap();
        store.append(&first).await.unwrap();
        store.append(&record("call the client tomorrow")).await.unwrap();
        store.pool().close().await;
    }

    let store = MemoryStore::open(&db_path).await.unwrap();
    assert_eq!(store.len().await.unwrap(), 2);

    let records = store.records().await.unwrap();
    assert_eq!(records[0], first);
    assert_eq!(records[1].utterance, "call the client tomorrow");
    assert_eq!(records[0].entities.primary_person().unwrap().value, "kavita mam");
}

#[tokio::test]
async fn test_recent_keeps_chronological_order() {
    let store = store_with(&["one call", "two call", "three call"]).await;

    let recent = store.recent(2).await.unwrap();
    let texts: Vec<_> = recent.iter().map(|r| r.utterance.as_str()).collect();
    assert_eq!(texts, vec!["two call", "three call"]);
    assert_eq!(store.recent(10).await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_detection_round_trips_with_fallback_marker() {
    let store = MemoryStore::in_memory().await.unwrap();
    let detection = DetectionResult::new(Intent::CreateTask, 0.85, BackendKind::RuleBased)
        .degraded_from(BackendKind::Cloud, "backend unavailable: no key".to_string());
    let rec = MemoryRecord::new(
        "send an email to john",
        detection.clone(),
        EntityExtractor::new().extract("send an email to john"),
        Action::StoreTask,
    );
    store.append(&rec).await.unwrap();

    let stored = store.records().await.unwrap().remove(0);
    assert_eq!(stored.detection, detection);
    assert_eq!(stored.action_taken, Action::StoreTask);
    assert_eq!(stored.timestamp.timestamp_millis(), rec.timestamp.timestamp_millis());
}

#[tokio::test]
async fn test_latest_preference_wins() {
    let store = MemoryStore::in_memory().await.unwrap();
    assert!(store.latest_preference("meeting_time").await.unwrap().is_none());

    store.store_preference("meeting_time", "I prefer mornings").await.unwrap();
    store.store_preference("meeting_time", "I prefer afternoons").await.unwrap();
    store.store_preference("drink", "I prefer tea").await.unwrap();

    let pref = store.latest_preference("meeting_time").await.unwrap().unwrap();
    assert_eq!(pref.value, "I prefer afternoons");
}

#[tokio::test]
async fn test_retrieve_on_empty_store() {
    let store = MemoryStore::in_memory().await.unwrap();
    assert!(store.retrieve("what did I say").await.unwrap().is_none());
}

#[tokio::test]
async fn test_keyword_recall_skips_recall_questions() {
    let store = store_with(&[
        "remind me about the project deadline",
        "buy groceries tonight",
        "did I mention anything about the project deadline",
    ])
    .await;

    let found = store
        .retrieve("what did I tell you about the project deadline")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.record.utterance, "remind me about the project deadline");
    assert_eq!(found.score, 1.0);

    assert!(store.retrieve("anything about holidays").await.unwrap().is_none());
}

#[tokio::test]
async fn test_embedding_recall() {
    let embedder = Arc::new(KeywordEmbedder::default());
    let store = store_with(&[
        "remind me about the project deadline",
        "buy groceries tonight",
    ])
    .await
    .with_embedder(Some(embedder.clone()));

    let found = store
        .retrieve("did I mention anything about the project deadline")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.record.utterance, "remind me about the project deadline");
    assert!(found.score >= RECALL_THRESHOLD && found.score <= 1.0);

    assert!(store.retrieve("anything about holidays").await.unwrap().is_none());
}

#[tokio::test]
async fn test_embedding_cache_avoids_recomputation() {
    let embedder = Arc::new(KeywordEmbedder::default());
    let store = store_with(&["call the client", "pay the rent", "visit grandma"])
        .await
        .with_embedder(Some(embedder.clone()));

    store.retrieve("the client call").await.unwrap();
    assert_eq!(embedder.texts_embedded.load(Ordering::SeqCst), 4);

    // only the new query is embedded
    store.retrieve("rent payment").await.unwrap();
    assert_eq!(embedder.texts_embedded.load(Ordering::SeqCst), 5);
}

#[tokio::test]
async fn test_broken_embedder_falls_back_to_keywords() {
    let store = store_with(&["remind me about the project deadline"])
        .await
        .with_embedder(Some(Arc::new(BrokenEmbedder)));

    let found = store.retrieve("the project deadline?").await.unwrap();
    assert_eq!(found.unwrap().record.utterance, "remind me about the project deadline");
}

#[tokio::test]
async fn test_storage_error_is_surfaced() {
    let store = MemoryStore::in_memory().await.unwrap();
    store.pool().close().await;

    let err = store.append(&record("call the client")).await.unwrap_err();
    assert!(err.is_storage());
    assert!(store.len().await.is_err());
}

#[tokio::test]
async fn test_recall_returns_the_stored_record() {
    let store = MemoryStore::in_memory().await.unwrap();
    let stored = record("remind me to submit form to kavita mam on 17 feb 2026");
    store.append(&stored).await.unwrap();
    store.append(&record("buy groceries tonight")).await.unwrap();

    let found = store
        .retrieve("did I mention the form for kavita?")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.record, stored);
    assert_eq!(found.record.detection.intent, Intent::SetReminder);
}

#[tokio::test]
async fn test_embedding_cache_covers_a_long_log() {
    let embedder = Arc::new(KeywordEmbedder::default());
    let store = MemoryStore::in_memory().await.unwrap();
    for i in 0..600 {
        let text = format!("prepare report {} for client {}", i, i % 7);
        store.append(&record(&text)).await.unwrap();
    }
    let store = store.with_embedder(Some(embedder.clone()));

    store.retrieve("the client report").await.unwrap();
    assert_eq!(embedder.texts_embedded.load(Ordering::SeqCst), 601);

    // the whole log stays cached between recalls
    store.retrieve("report for the client").await.unwrap();
    assert_eq!(embedder.texts_embedded.load(Ordering::SeqCst), 602);
}

#[tokio::test]
async fn test_preference_and_record_are_written_together() {
    let store = MemoryStore::in_memory().await.unwrap();
    let first = record("I prefer meetings in the morning");
    let preference = store
        .append_with_preference(&first, "meeting_time", &first.utterance)
        .await
        .unwrap();
    assert_eq!(preference.value, "I prefer meetings in the morning");
    assert_eq!(store.len().await.unwrap(), 1);

    sqlx::query("DROP TABLE interactions")
        .execute(store.pool())
        .await
        .unwrap();

    let second = record("I prefer meetings at 9 am");
    let err = store
        .append_with_preference(&second, "meeting_time", &second.utterance)
        .await
        .unwrap_err();
    assert!(err.is_storage());

    // the failed interaction rolled the preference back
    let latest = store.latest_preference("meeting_time").await.unwrap().unwrap();
    assert_eq!(latest.value, "I prefer meetings in the morning");
}
