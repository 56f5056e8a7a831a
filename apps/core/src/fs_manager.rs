use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable overriding the application root.
pub const HOME_VAR: &str = "NIXIN_HOME";

/// Resolves the on-disk layout under one root directory:
/// `<root>/data/db` for the memory database, `<root>/data/models` for the
/// local model cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortablePathManager {
    root: PathBuf,
}

impl PortablePathManager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root from `NIXIN_HOME`, else the directory of the executable.
    pub fn discover() -> Self {
        if let Some(home) = std::env::var_os(HOME_VAR).filter(|v| !v.is_empty()) {
            return Self::new(home);
        }
        Self::new(Self::exe_root())
    }

    fn exe_root() -> PathBuf {
        match std::env::current_exe() {
            Ok(mut path) => {
                path.pop(); // remove exe name
                #[cfg(debug_assertions)]
                {
                    // target/debug → workspace root → apps/core
                    let mut workspace = path.clone();
                    workspace.pop();
                    workspace.pop();
                    let core_path = workspace.join("apps").join("core");
                    if core_path.exists() {
                        return core_path;
                    }
                }
                path
            }
            Err(e) => {
                warn!("Failed to get current exe path: {}. Falling back to current_dir.", e);
                std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
            }
        }
    }

    pub fn root_dir(&self) -> &Path {
        &self.root
    }

    /// Main data directory (./data).
    pub fn data_dir(&self) -> PathBuf {
        self.root.join("data")
    }

    /// Database directory (./data/db).
    pub fn db_dir(&self) -> PathBuf {
        self.data_dir().join("db")
    }

    /// Model cache directory (./data/models).
    pub fn models_dir(&self) -> PathBuf {
        self.data_dir().join("models")
    }

    pub fn default_db_path(&self) -> PathBuf {
        self.db_dir().join("memory.db")
    }

    /// Creates the data, db and models directories if missing.
    pub fn init(&self) -> Result<(), std::io::Error> {
        for dir in [self.data_dir(), self.db_dir(), self.models_dir()] {
            if !dir.exists() {
                info!("Creating directory: {:?}", dir);
                fs::create_dir_all(&dir)?;
            }
        }
        Ok(())
    }
}
