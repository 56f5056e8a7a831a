use chrono::{SubsecRound, Utc};
use lru::LruCache;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqlitePool, SqlitePoolOptions};
use sqlx::types::Json;
use std::num::NonZeroUsize;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, instrument, warn};

use super::keywords::{keywords, overlap_score};
use super::record::{InteractionRow, MemoryRecord, Preference, PreferenceRow, RecallMatch};
use crate::brain::intent::Intent;
use crate::brain::models::{cosine_similarity, Embedder};
use crate::error::{AppError, BackendError};

/// Minimum embedding similarity for a recall hit.
pub const RECALL_THRESHOLD: f32 = 0.5;

const EMBEDDING_CACHE_SIZE: usize = 512;

/// SQLite-backed interaction memory.
pub struct MemoryStore {
    pool: SqlitePool,
    embedder: Option<Arc<dyn Embedder>>,
    cache: Mutex<LruCache<String, Arc<Vec<f32>>>>,
}

impl MemoryStore {
    /// Opens (or creates) the database file and applies migrations.
    pub async fn open(path: &Path) -> Result<Self, AppError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let db_url = format!("sqlite://{}", path.to_string_lossy());
        info!("Opening memory database at: {}", db_url);

        let options = SqliteConnectOptions::from_str(&db_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        Self::from_pool(pool).await
    }

    /// A private in-memory database, dropped with the store.
    pub async fn in_memory() -> Result<Self, AppError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        // a single connection that never recycles keeps the database alive
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        Self::from_pool(pool).await
    }

    async fn from_pool(pool: SqlitePool) -> Result<Self, AppError> {
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self {
            pool,
            embedder: None,
            cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(EMBEDDING_CACHE_SIZE).unwrap_or(NonZeroUsize::MIN),
            )),
        })
    }

    /// Enables embedding-based recall.
    pub fn with_embedder(mut self, embedder: Option<Arc<dyn Embedder>>) -> Self {
        self.embedder = embedder;
        self
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    #[instrument(skip(self, record), fields(id = %record.id))]
    pub async fn append(&self, record: &MemoryRecord) -> Result<(), AppError> {
        let mut conn = self.pool.acquire().await?;
        insert_interaction(&mut conn, record).await?;

        debug!("Interaction stored");
        Ok(())
    }

    /// Appends `record` and a preference value in one transaction: either
    /// both are stored or neither is.
    #[instrument(skip(self, record, value), fields(id = %record.id))]
    pub async fn append_with_preference(
        &self,
        record: &MemoryRecord,
        key: &str,
        value: &str,
    ) -> Result<Preference, AppError> {
        let mut tx = self.pool.begin().await?;
        let preference = insert_preference(&mut tx, key, value).await?;
        insert_interaction(&mut tx, record).await?;
        tx.commit().await?;

        info!("Preference stored: {}", key);
        debug!("Interaction stored");
        Ok(preference)
    }

    /// All records, oldest first.
    pub async fn records(&self) -> Result<Vec<MemoryRecord>, AppError> {
        let rows = sqlx::query_as::<_, InteractionRow>(
            r#"
            SELECT id, utterance, detection, entities, action_taken, created_at
            FROM interactions
            ORDER BY seq ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(MemoryRecord::try_from).collect()
    }

    /// The `limit` most recent records, oldest first.
    pub async fn recent(&self, limit: usize) -> Result<Vec<MemoryRecord>, AppError> {
        let rows = sqlx::query_as::<_, InteractionRow>(
            r#"
            SELECT id, utterance, detection, entities, action_taken, created_at
            FROM (SELECT * FROM interactions ORDER BY seq DESC LIMIT ?)
            ORDER BY seq ASC
            "#,
        )
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(MemoryRecord::try_from).collect()
    }

    pub async fn len(&self) -> Result<usize, AppError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM interactions")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }

    pub async fn is_empty(&self) -> Result<bool, AppError> {
        Ok(self.len().await? == 0)
    }

    /// Most similar earlier record, if any is similar enough.
    ///
    /// Recall questions themselves are never returned. Uses embeddings when
    /// a model is loaded and falls back to keyword overlap otherwise (or when
    /// embedding fails).
    #[instrument(skip(self))]
    pub async fn retrieve(&self, query: &str) -> Result<Option<RecallMatch>, AppError> {
        let rows = sqlx::query_as::<_, InteractionRow>(
            r#"
            SELECT id, utterance, detection, entities, action_taken, created_at
            FROM interactions
            WHERE intent != ?
            ORDER BY seq ASC
            "#,
        )
        .bind(Intent::RetrieveTask.label())
        .fetch_all(&self.pool)
        .await?;

        if rows.is_empty() || query.trim().is_empty() {
            return Ok(None);
        }
        let candidates = rows
            .into_iter()
            .map(MemoryRecord::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        if let Some(embedder) = &self.embedder {
            match self.embedding_recall(embedder, query, &candidates).await {
                Ok(found) => return Ok(found),
                Err(e) => warn!("Embedding recall failed, using keywords: {}", e),
            }
        }

        Ok(keyword_recall(query, &candidates))
    }

    async fn embedding_recall(
        &self,
        embedder: &Arc<dyn Embedder>,
        query: &str,
        candidates: &[MemoryRecord],
    ) -> Result<Option<RecallMatch>, BackendError> {
        let mut texts = vec![query.to_string()];
        texts.extend(candidates.iter().map(|r| r.utterance.clone()));
        let vectors = self.embed_cached(embedder, texts).await?;

        let Some((query_vec, rest)) = vectors.split_first() else {
            return Ok(None);
        };

        // later records win ties
        let best = candidates
            .iter()
            .zip(rest)
            .map(|(record, vec)| (record, cosine_similarity(query_vec, vec)))
            .fold(None::<(&MemoryRecord, f32)>, |best, (record, score)| match best {
                Some((_, s)) if s > score => best,
                _ => Some((record, score)),
            });

        Ok(best
            .filter(|(_, score)| *score >= RECALL_THRESHOLD)
            .map(|(record, score)| RecallMatch {
                record: record.clone(),
                score: score.clamp(0.0, 1.0),
            }))
    }

    /// Embeds `texts`, reusing cached vectors and computing the rest in one
    /// batch on the blocking pool.
    async fn embed_cached(
        &self,
        embedder: &Arc<dyn Embedder>,
        texts: Vec<String>,
    ) -> Result<Vec<Arc<Vec<f32>>>, BackendError> {
        let mut slots: Vec<Option<Arc<Vec<f32>>>> = {
            let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
            // a full scan must fit, or it evicts its own entries in order
            let wanted = texts.len().saturating_add(EMBEDDING_CACHE_SIZE);
            if cache.cap().get() < wanted {
                if let Some(cap) = NonZeroUsize::new(wanted) {
                    cache.resize(cap);
                }
            }
            texts.iter().map(|t| cache.get(t).cloned()).collect()
        };

        let missing: Vec<String> = texts
            .iter()
            .zip(&slots)
            .filter(|(_, slot)| slot.is_none())
            .map(|(t, _)| t.clone())
            .collect();

        if !missing.is_empty() {
            let model = Arc::clone(embedder);
            let batch = missing.clone();
            let computed = tokio::task::spawn_blocking(move || model.embed(&batch)).await??;
            if computed.len() != missing.len() {
                return Err(BackendError::Parse(format!(
                    "expected {} embeddings, got {}",
                    missing.len(),
                    computed.len()
                )));
            }

            let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
            let mut fresh = missing.into_iter().zip(computed);
            for (text, slot) in texts.iter().zip(slots.iter_mut()) {
                if slot.is_none() {
                    if let Some((key, vector)) = fresh.next() {
                        debug_assert_eq!(&key, text);
                        let vector = Arc::new(vector);
                        cache.put(key, Arc::clone(&vector));
                        *slot = Some(vector);
                    }
                }
            }
        }

        slots
            .into_iter()
            .map(|slot| slot.ok_or_else(|| BackendError::Parse("missing embedding".to_string())))
            .collect()
    }

    /// Appends a preference value; earlier values for the key are kept.
    pub async fn store_preference(&self, key: &str, value: &str) -> Result<Preference, AppError> {
        let mut conn = self.pool.acquire().await?;
        let preference = insert_preference(&mut conn, key, value).await?;

        info!("Preference stored: {}", key);
        Ok(preference)
    }

    pub async fn latest_preference(&self, key: &str) -> Result<Option<Preference>, AppError> {
        let row = sqlx::query_as::<_, PreferenceRow>(
            r#"
            SELECT key, value, created_at FROM preferences
            WHERE key = ?
            ORDER BY seq DESC
            LIMIT 1
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Preference::try_from).transpose()
    }
}

async fn insert_interaction(
    conn: &mut SqliteConnection,
    record: &MemoryRecord,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO interactions (id, utterance, intent, detection, entities, action_taken, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(record.id.to_string())
    .bind(&record.utterance)
    .bind(record.detection.intent.label())
    .bind(Json(&record.detection))
    .bind(Json(&record.entities))
    .bind(record.action_taken.as_str())
    .bind(record.timestamp.timestamp_millis())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn insert_preference(
    conn: &mut SqliteConnection,
    key: &str,
    value: &str,
) -> Result<Preference, sqlx::Error> {
    let now = Utc::now().trunc_subsecs(3);
    sqlx::query("INSERT INTO preferences (key, value, created_at) VALUES (?, ?, ?)")
        .bind(key)
        .bind(value)
        .bind(now.timestamp_millis())
        .execute(&mut *conn)
        .await?;

    Ok(Preference {
        key: key.to_string(),
        value: value.to_string(),
        timestamp: now,
    })
}

/// Best keyword overlap; later records win ties.
fn keyword_recall(query: &str, candidates: &[MemoryRecord]) -> Option<RecallMatch> {
    let query_keywords = keywords(query);
    if query_keywords.is_empty() {
        return None;
    }

    candidates
        .iter()
        .map(|record| (record, overlap_score(&query_keywords, &record.utterance)))
        .filter(|(_, score)| *score > 0.0)
        .fold(None::<(&MemoryRecord, f32)>, |best, (record, score)| match best {
            Some((_, s)) if s > score => best,
            _ => Some((record, score)),
        })
        .map(|(record, score)| RecallMatch {
            record: record.clone(),
            score,
        })
}
