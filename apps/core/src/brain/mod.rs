//! # Brain Module
//!
//! Intent detection, entity extraction and action planning.
//!
//! ## Components
//! - `rules`: ordered rule table (fast path, always available)
//! - `entities`: time and person spans
//! - `models`: shared local model handles
//! - `backends`: embedding, zero-shot and cloud classifiers
//! - `dispatcher`: backend selection with fallback to rules
//! - `planner`: intent → action and response

pub mod backends;
pub mod dispatcher;
pub mod entities;
pub mod intent;
pub mod models;
pub mod planner;
pub mod rules;

pub use dispatcher::DetectionDispatcher;
pub use entities::{Entity, EntityExtractor, EntityKind, EntitySet};
pub use intent::{BackendKind, DetectionResult, Intent};
pub use models::ModelHub;
pub use planner::{Action, ActionPlan, PlanContext};
pub use rules::RuleMatcher;
