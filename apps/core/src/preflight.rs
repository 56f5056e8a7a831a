//! Preflight Check System
//!
//! Verifies every component the engine depends on before serving requests
//! and reports which detection backends will answer without degrading.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::brain::backends::BackendRegistry;
use crate::brain::intent::BackendKind;
use crate::brain::models::ModelHub;
use crate::config::AppConfig;
use crate::memory::MemoryStore;

/// Result of a single check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    pub name: String,
    pub passed: bool,
    pub message: String,
    pub details: Option<String>,
}

impl CheckResult {
    fn pass(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            passed: true,
            message: message.to_string(),
            details: None,
        }
    }

    fn fail(name: &str, message: &str, details: Option<String>) -> Self {
        Self {
            name: name.to_string(),
            passed: false,
            message: message.to_string(),
            details,
        }
    }
}

/// Complete preflight check report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreflightReport {
    pub all_passed: bool,
    pub checks: Vec<CheckResult>,
    pub ready_to_start: bool,
    /// Backends that will answer without falling back
    pub available_backends: Vec<BackendKind>,
    pub summary: String,
}

/// Performs all preflight checks and returns a report.
pub async fn run_preflight(config: &AppConfig, hub: &ModelHub) -> PreflightReport {
    info!("Running preflight checks");

    let registry = BackendRegistry::from_hub(hub, &config.cloud());
    let available_backends: Vec<BackendKind> = std::iter::once(BackendKind::RuleBased)
        .chain(registry.kinds())
        .collect();

    let checks = vec![
        check_directories(config),
        check_database(config).await,
        check_model(
            "embedding_model",
            config.embeddings_enabled,
            "NIXIN_EMBEDDINGS",
            hub.embedder().map(|m| m.name().to_string()),
        ),
        check_model(
            "zero_shot_model",
            config.zero_shot_enabled,
            "NIXIN_ZERO_SHOT",
            hub.zero_shot().map(|m| m.name().to_string()),
        ),
        check_cloud_credential(config),
        check_backends(&available_backends),
    ];

    let all_passed = checks.iter().all(|c| c.passed);
    let critical_passed = checks
        .iter()
        .filter(|c| is_critical_check(&c.name))
        .all(|c| c.passed);

    let summary = if all_passed {
        "All checks passed. Every backend is available.".to_string()
    } else if critical_passed {
        "Some backends are unavailable; requests for them will fall back to rules.".to_string()
    } else {
        "Critical checks failed. The engine cannot start.".to_string()
    };

    for check in &checks {
        if check.passed {
            info!("  ✅ {}: {}", check.name, check.message);
        } else {
            warn!("  ❌ {}: {}", check.name, check.message);
            if let Some(details) = &check.details {
                warn!("      Details: {}", details);
            }
        }
    }
    info!("Summary: {}", summary);

    PreflightReport {
        all_passed,
        checks,
        ready_to_start: critical_passed,
        available_backends,
        summary,
    }
}

fn is_critical_check(name: &str) -> bool {
    matches!(name, "directories" | "database")
}

// --- Individual Checks ---

fn check_directories(config: &AppConfig) -> CheckResult {
    let paths = &config.paths;
    let missing_before: Vec<String> = [paths.data_dir(), paths.db_dir(), paths.models_dir()]
        .iter()
        .filter(|p| !p.exists())
        .map(|p| p.display().to_string())
        .collect();

    match paths.init() {
        Ok(()) if missing_before.is_empty() => {
            CheckResult::pass("directories", "All directories exist")
        }
        Ok(()) => CheckResult::pass(
            "directories",
            &format!("Created missing directories: {}", missing_before.join(", ")),
        ),
        Err(e) => CheckResult::fail(
            "directories",
            "Failed to create directories",
            Some(e.to_string()),
        ),
    }
}

async fn check_database(config: &AppConfig) -> CheckResult {
    let store = match MemoryStore::open(&config.db_path).await {
        Ok(store) => store,
        Err(e) => {
            return CheckResult::fail(
                "database",
                "Cannot open memory database",
                Some(format!("{:?}: {}", config.db_path, e)),
            )
        }
    };

    match store.len().await {
        Ok(count) => CheckResult::pass(
            "database",
            &format!("Memory database OK ({} interactions)", count),
        ),
        Err(e) => CheckResult::fail("database", "Memory database unreadable", Some(e.to_string())),
    }
}

fn check_model(name: &str, enabled: bool, switch: &str, loaded: Option<String>) -> CheckResult {
    match (enabled, loaded) {
        (_, Some(model)) => CheckResult::pass(name, &format!("Loaded {}", model)),
        (false, None) => CheckResult::fail(
            name,
            "Disabled",
            Some(format!("Set {}=true to load it", switch)),
        ),
        (true, None) => CheckResult::fail(
            name,
            "Model failed to load",
            Some("See the startup log for the loader error".to_string()),
        ),
    }
}

fn check_cloud_credential(config: &AppConfig) -> CheckResult {
    if config.cloud().has_credential() {
        CheckResult::pass(
            "cloud_credential",
            &format!("API key present (model {})", config.cloud_model),
        )
    } else {
        CheckResult::fail(
            "cloud_credential",
            "ANTHROPIC_API_KEY not set",
            Some("Cloud requests will fall back to rules".to_string()),
        )
    }
}

fn check_backends(available: &[BackendKind]) -> CheckResult {
    let names: Vec<&str> = available.iter().map(|k| k.display_name()).collect();
    CheckResult::pass(
        "backends",
        &format!("{}/{} available: {}", available.len(), BackendKind::ALL.len(), names.join(", ")),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_preflight_without_models() {
        let tmp = tempfile::tempdir().unwrap();
        let config = AppConfig::with_home(tmp.path());

        let report = run_preflight(&config, &ModelHub::empty()).await;

        assert!(report.ready_to_start);
        assert!(!report.all_passed);
        assert_eq!(report.available_backends, vec![BackendKind::RuleBased]);
        assert!(config.paths.db_dir().is_dir());

        let names: Vec<_> = report.checks.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "directories",
                "database",
                "embedding_model",
                "zero_shot_model",
                "cloud_credential",
                "backends"
            ]
        );
        let cloud = report.checks.iter().find(|c| c.name == "cloud_credential").unwrap();
        assert!(!cloud.passed);
    }

    #[tokio::test]
    async fn test_cloud_key_registers_backend() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = AppConfig::with_home(tmp.path());
        config.api_key = Some("sk-test".to_string());

        let report = run_preflight(&config, &ModelHub::empty()).await;
        assert_eq!(
            report.available_backends,
            vec![BackendKind::RuleBased, BackendKind::Cloud]
        );
    }
}
