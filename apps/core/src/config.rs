//! Runtime configuration, read from the environment.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::LazyLock;
use std::time::Duration;
use url::Url;
use validator::Validate;

use crate::error::AppError;
use crate::fs_manager::PortablePathManager;

pub const DEFAULT_BACKEND_TIMEOUT_SECS: u64 = 20;
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.75;
pub const DEFAULT_CLOUD_MODEL: &str = "claude-3-5-sonnet-20241022";
pub const DEFAULT_CLOUD_BASE_URL: &str = "https://api.anthropic.com";

static DEFAULT_BASE_URL: LazyLock<Url> =
    LazyLock::new(|| Url::parse(DEFAULT_CLOUD_BASE_URL).expect("Invalid default base URL"));

/// Log output format of the binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "pretty" | "plain" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(AppError::Config(format!("unknown log format '{}'", other))),
        }
    }
}

/// Settings of the cloud intent backend.
#[derive(Clone)]
pub struct CloudSettings {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: Url,
    pub timeout: Duration,
}

impl fmt::Debug for CloudSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloudSettings")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("base_url", &self.base_url.as_str())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl CloudSettings {
    pub fn has_credential(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }
}

#[derive(Debug, Clone, Validate)]
pub struct AppConfig {
    pub paths: PortablePathManager,
    pub db_path: PathBuf,
    /// Per-call bound on model-backed detection
    #[validate(range(min = 1, max = 300))]
    pub backend_timeout_secs: u64,
    /// Detections below this confidence are answered with a clarification
    #[validate(range(min = 0.0, max = 1.0))]
    pub confidence_threshold: f32,
    pub embeddings_enabled: bool,
    pub zero_shot_enabled: bool,
    #[validate(length(min = 1))]
    pub cloud_model: String,
    pub cloud_base_url: Url,
    pub api_key: Option<String>,
    pub log_format: LogFormat,
}

impl AppConfig {
    /// Defaults rooted at `root`: no local models, no cloud credential.
    pub fn with_home(root: impl Into<PathBuf>) -> Self {
        let paths = PortablePathManager::new(root);
        Self {
            db_path: paths.default_db_path(),
            paths,
            backend_timeout_secs: DEFAULT_BACKEND_TIMEOUT_SECS,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            embeddings_enabled: false,
            zero_shot_enabled: false,
            cloud_model: DEFAULT_CLOUD_MODEL.to_string(),
            cloud_base_url: DEFAULT_BASE_URL.clone(),
            api_key: None,
            log_format: LogFormat::Pretty,
        }
    }

    /// Reads the `NIXIN_*` variables and `ANTHROPIC_API_KEY`.
    ///
    /// Unset variables take their defaults; malformed ones are an error.
    pub fn from_env() -> Result<Self, AppError> {
        let paths = PortablePathManager::discover();
        let db_path = match var("NIXIN_DB_PATH") {
            Some(path) => PathBuf::from(path),
            None => paths.default_db_path(),
        };
        let cloud_base_url = match var("NIXIN_CLOUD_BASE_URL") {
            Some(raw) => Url::parse(raw.trim())?,
            None => DEFAULT_BASE_URL.clone(),
        };

        let config = Self {
            paths,
            db_path,
            backend_timeout_secs: parse_var("NIXIN_BACKEND_TIMEOUT_SECS", DEFAULT_BACKEND_TIMEOUT_SECS)?,
            confidence_threshold: parse_var("NIXIN_CONFIDENCE_THRESHOLD", DEFAULT_CONFIDENCE_THRESHOLD)?,
            embeddings_enabled: flag_var("NIXIN_EMBEDDINGS", true)?,
            zero_shot_enabled: flag_var("NIXIN_ZERO_SHOT", true)?,
            cloud_model: var("NIXIN_CLOUD_MODEL").unwrap_or_else(|| DEFAULT_CLOUD_MODEL.to_string()),
            cloud_base_url,
            api_key: var("ANTHROPIC_API_KEY"),
            log_format: var("NIXIN_LOG_FORMAT").as_deref().unwrap_or("").parse()?,
        };

        // NaN slips through the range check and would disable the clarify gate
        if !config.confidence_threshold.is_finite() {
            return Err(AppError::Config(format!(
                "NIXIN_CONFIDENCE_THRESHOLD must be a number in [0, 1], got {}",
                config.confidence_threshold
            )));
        }
        config.validate()?;
        if !matches!(config.cloud_base_url.scheme(), "http" | "https") {
            return Err(AppError::Config(format!(
                "NIXIN_CLOUD_BASE_URL must be http(s), got '{}'",
                config.cloud_base_url
            )));
        }
        Ok(config)
    }

    pub fn backend_timeout(&self) -> Duration {
        Duration::from_secs(self.backend_timeout_secs)
    }

    pub fn models_dir(&self) -> PathBuf {
        self.paths.models_dir()
    }

    pub fn cloud(&self) -> CloudSettings {
        CloudSettings {
            api_key: self.api_key.clone(),
            model: self.cloud_model.clone(),
            base_url: self.cloud_base_url.clone(),
            timeout: self.backend_timeout(),
        }
    }
}

/// Non-empty value of an environment variable.
fn var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_var<T: FromStr>(name: &str, default: T) -> Result<T, AppError>
where
    T::Err: fmt::Display,
{
    match var(name) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| AppError::Config(format!("{}='{}': {}", name, raw, e))),
    }
}

fn flag_var(name: &str, default: bool) -> Result<bool, AppError> {
    match var(name).map(|v| v.trim().to_lowercase()) {
        None => Ok(default),
        Some(v) => match v.as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(AppError::Config(format!("{}='{}' is not a boolean", name, v))),
        },
    }
}
