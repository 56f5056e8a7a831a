//! NIXIN context engine: classifies an utterance into one of six intents,
//! extracts time and person entities, plans a canned action and keeps an
//! interaction memory.

pub mod assistant;
pub mod brain;
pub mod config;
pub mod error;
pub mod evaluation;
pub mod fs_manager;
pub mod memory;
pub mod preflight;
pub mod telemetry;

pub use assistant::{Assistant, AssistantReply, Comparison};
pub use config::AppConfig;
pub use error::{AppError, BackendError};

#[cfg(test)]
mod tests;
