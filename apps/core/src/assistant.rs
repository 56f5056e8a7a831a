//! Request pipeline: extract → detect → plan → remember.

use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::brain::backends::BackendRegistry;
use crate::brain::dispatcher::DetectionDispatcher;
use crate::brain::entities::{EntityExtractor, EntitySet};
use crate::brain::intent::{BackendKind, DetectionResult, Intent};
use crate::brain::models::ModelHub;
use crate::brain::planner::{plan_detection, Action, ActionPlan, PlanContext, MEETING_PREFERENCE_KEY};
use crate::brain::rules::RuleMatcher;
use crate::config::{AppConfig, DEFAULT_CONFIDENCE_THRESHOLD};
use crate::error::AppError;
use crate::memory::{MemoryRecord, MemoryStore};

/// Everything produced for one utterance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantReply {
    pub record_id: Uuid,
    pub utterance: String,
    pub detection: DetectionResult,
    pub entities: EntitySet,
    pub plan: ActionPlan,
}

/// Side-by-side output of every backend for one utterance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comparison {
    pub utterance: String,
    pub entities: EntitySet,
    pub results: Vec<DetectionResult>,
}

pub struct Assistant {
    dispatcher: DetectionDispatcher,
    extractor: EntityExtractor,
    memory: MemoryStore,
    confidence_threshold: f32,
}

impl Assistant {
    pub fn new(dispatcher: DetectionDispatcher, memory: MemoryStore) -> Self {
        Self {
            dispatcher,
            extractor: EntityExtractor::new(),
            memory,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
        }
    }

    pub fn with_confidence_threshold(mut self, threshold: f32) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    /// Wires the dispatcher and the memory store from configuration and the
    /// loaded models.
    pub async fn from_config(config: &AppConfig, hub: &ModelHub) -> Result<Self, AppError> {
        let registry = BackendRegistry::from_hub(hub, &config.cloud());
        let dispatcher =
            DetectionDispatcher::new(RuleMatcher::new(), registry, config.backend_timeout());
        let memory = MemoryStore::open(&config.db_path)
            .await?
            .with_embedder(hub.embedder());

        info!("Backends available: {:?}", dispatcher.available());
        Ok(Self::new(dispatcher, memory).with_confidence_threshold(config.confidence_threshold))
    }

    pub fn dispatcher(&self) -> &DetectionDispatcher {
        &self.dispatcher
    }

    pub fn memory(&self) -> &MemoryStore {
        &self.memory
    }

    /// Handles one utterance with the requested backend.
    ///
    /// Backend failures degrade silently; storage failures are returned.
    #[instrument(skip(self, text), fields(backend = %backend))]
    pub async fn handle(&self, text: &str, backend: BackendKind) -> Result<AssistantReply, AppError> {
        let entities = self.extractor.extract(text);
        let detection = self.dispatcher.detect(text, backend).await;

        let ctx = self.plan_context(text, &detection).await?;
        let plan = plan_detection(&detection, &entities, &ctx, self.confidence_threshold);

        let record = MemoryRecord::new(text, detection.clone(), entities.clone(), plan.action);
        if plan.action == Action::StorePreference {
            self.memory
                .append_with_preference(&record, MEETING_PREFERENCE_KEY, text.trim())
                .await?;
        } else {
            self.memory.append(&record).await?;
        }

        info!(action = %plan.action, "{}", detection.summary());
        Ok(AssistantReply {
            record_id: record.id,
            utterance: text.to_string(),
            detection,
            entities,
            plan,
        })
    }

    /// Runs every backend on the same utterance. Nothing is stored.
    pub async fn compare(&self, text: &str) -> Comparison {
        Comparison {
            utterance: text.to_string(),
            entities: self.extractor.extract(text),
            results: self.dispatcher.compare(text).await,
        }
    }

    /// Reads what the planner needs from storage. Gated detections need
    /// nothing.
    async fn plan_context(
        &self,
        text: &str,
        detection: &DetectionResult,
    ) -> Result<PlanContext, AppError> {
        let mut ctx = PlanContext::default();
        if detection.confidence < self.confidence_threshold {
            return Ok(ctx);
        }

        match detection.intent {
            Intent::ScheduleMeeting => {
                ctx.meeting_preference = self
                    .memory
                    .latest_preference(MEETING_PREFERENCE_KEY)
                    .await?
                    .map(|p| p.value);
            }
            Intent::RetrieveTask => {
                ctx.recall = self.memory.retrieve(text).await?;
            }
            _ => {}
        }
        Ok(ctx)
    }
}
