use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use crate::brain::entities::EntitySet;
use crate::brain::intent::DetectionResult;
use crate::brain::planner::Action;
use crate::error::AppError;

/// One handled utterance. Never mutated once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub id: Uuid,
    pub utterance: String,
    pub detection: DetectionResult,
    pub entities: EntitySet,
    pub action_taken: Action,
    pub timestamp: DateTime<Utc>,
}

impl MemoryRecord {
    pub fn new(
        utterance: impl Into<String>,
        detection: DetectionResult,
        entities: EntitySet,
        action_taken: Action,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            utterance: utterance.into(),
            detection,
            entities,
            action_taken,
            // stored with millisecond precision
            timestamp: Utc::now().trunc_subsecs(3),
        }
    }
}

/// Best prior record for a recall query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecallMatch {
    pub record: MemoryRecord,
    /// Similarity in [0, 1]
    pub score: f32,
}

/// A stored preference value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preference {
    pub key: String,
    pub value: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
pub(crate) struct InteractionRow {
    pub id: String,
    pub utterance: String,
    pub detection: Json<DetectionResult>,
    pub entities: Json<EntitySet>,
    pub action_taken: String,
    pub created_at: i64,
}

impl TryFrom<InteractionRow> for MemoryRecord {
    type Error = AppError;

    fn try_from(row: InteractionRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Uuid::parse_str(&row.id)
                .map_err(|e| AppError::Validation(format!("bad record id '{}': {}", row.id, e)))?,
            utterance: row.utterance,
            detection: row.detection.0,
            entities: row.entities.0,
            action_taken: row.action_taken.parse().map_err(AppError::Validation)?,
            timestamp: from_millis(row.created_at)?,
        })
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct PreferenceRow {
    pub key: String,
    pub value: String,
    pub created_at: i64,
}

impl TryFrom<PreferenceRow> for Preference {
    type Error = AppError;

    fn try_from(row: PreferenceRow) -> Result<Self, Self::Error> {
        Ok(Self {
            key: row.key,
            value: row.value,
            timestamp: from_millis(row.created_at)?,
        })
    }
}

fn from_millis(millis: i64) -> Result<DateTime<Utc>, AppError> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| AppError::Validation(format!("timestamp out of range: {}", millis)))
}
