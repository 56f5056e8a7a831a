use serde::Serialize;
use std::io;
use thiserror::Error;

/// Application-wide error type, consolidating all possible errors into a single enum.
#[derive(Debug, Error)]
pub enum AppError {
    /// Represents errors originating from the memory database, typically from `sqlx`.
    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),

    /// Represents a failure while applying the embedded schema migrations.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Represents standard input/output errors.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Represents data validation errors (e.g., invalid rule table format).
    #[error("Validation error: {0}")]
    Validation(String),

    /// Represents configuration-related errors (e.g., malformed environment variables).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Represents unexpected internal errors that indicate a bug.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// True when the error comes from the persistence layer.
    pub fn is_storage(&self) -> bool {
        matches!(self, AppError::Storage(_) | AppError::Migration(_))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Validation(format!("JSON error: {}", err))
    }
}

impl From<url::ParseError> for AppError {
    fn from(err: url::ParseError) -> Self {
        AppError::Config(format!("URL parse error: {}", err))
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Config(format!("Validation errors: {}", err))
    }
}

impl From<regex::Error> for AppError {
    fn from(err: regex::Error) -> Self {
        AppError::Validation(format!("Invalid pattern: {}", err))
    }
}

/// Failure kinds of a model-backed intent backend.
///
/// These never escape the dispatcher: each one turns into a degraded,
/// rule-based detection.
#[derive(Debug, Error, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum BackendError {
    /// The model or credential behind the backend is not available.
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    /// The call did not complete within its time bound.
    #[error("backend timed out: {0}")]
    Timeout(String),
    /// The raw model output could not be mapped to a known intent.
    #[error("backend output could not be parsed: {0}")]
    Parse(String),
}

impl From<tokio::time::error::Elapsed> for BackendError {
    fn from(err: tokio::time::error::Elapsed) -> Self {
        BackendError::Timeout(format!("Operation timed out: {}", err))
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            BackendError::Timeout(format!("HTTP request timed out: {}", err))
        } else if err.is_decode() {
            BackendError::Parse(format!("HTTP body could not be decoded: {}", err))
        } else {
            BackendError::Unavailable(format!("HTTP error: {}", err))
        }
    }
}

impl From<tokio::task::JoinError> for BackendError {
    fn from(err: tokio::task::JoinError) -> Self {
        BackendError::Unavailable(format!("Inference task failed: {}", err))
    }
}
