//! Configuration for the editor, job store and course repository.

use crate::error::{EditError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// File name of the configuration inside a config directory.
pub const CONFIG_FILE: &str = "config.toml";

/// Top-level configuration, read from `config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub jobs: JobsConfig,

    #[serde(default)]
    pub locks: LockConfig,

    #[serde(default)]
    pub repository: RepositoryConfig,

    #[serde(default)]
    pub editor: EditorConfig,

    #[serde(default)]
    pub permissions: PermissionsConfig,
}

impl Config {
    /// Load configuration from `<dir>/config.toml`, or defaults if absent.
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(CONFIG_FILE);
        if path.exists() {
            let content = fs::read_to_string(&path)
                .map_err(|e| EditError::Config(format!("failed to read config: {}", e)))?;
            toml::from_str(&content)
                .map_err(|e| EditError::Config(format!("failed to parse config: {}", e)))
        } else {
            Ok(Config::default())
        }
    }

    /// Save configuration to `<dir>/config.toml`.
    pub fn save(&self, dir: &Path) -> Result<()> {
        let path = dir.join(CONFIG_FILE);
        let content = toml::to_string_pretty(self)
            .map_err(|e| EditError::Config(format!("failed to serialize config: {}", e)))?;
        fs::write(&path, content)
            .map_err(|e| EditError::Config(format!("failed to write config: {}", e)))?;
        Ok(())
    }
}

/// Job store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JobsConfig {
    /// Path of the redb job database, relative to the config directory
    /// unless absolute (default: `jobs.redb`).
    pub database: PathBuf,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from("jobs.redb"),
        }
    }
}

impl JobsConfig {
    /// Resolves the database path against the config directory.
    pub fn database_path(&self, dir: &Path) -> PathBuf {
        if self.database.is_absolute() {
            self.database.clone()
        } else {
            dir.join(&self.database)
        }
    }
}

/// Course lock configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    /// How long an orchestration waits for its course (default: 30).
    pub timeout_secs: u64,

    /// Poll interval for the cross-process lock file (default: 10).
    pub poll_interval_ms: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            poll_interval_ms: 10,
        }
    }
}

impl LockConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Snapshot repository configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoryConfig {
    /// Remote store root. Each course syncs to `<remote_root>/<course-id>`.
    /// When unset, commits are only recorded locally.
    pub remote_root: Option<PathBuf>,

    /// Author recorded when no user is known (default: `ced`).
    pub author_fallback: String,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            remote_root: None,
            author_fallback: "ced".to_string(),
        }
    }
}

/// Editor behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Treat deleting a missing path as a no-op (default: false).
    pub tolerate_missing_delete: bool,

    /// Highest `_copyN` suffix tried when naming a copy (default: 100).
    pub max_copy_suffix: u32,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            tolerate_missing_delete: false,
            max_copy_suffix: 100,
        }
    }
}

/// Inputs for the static permission oracle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PermissionsConfig {
    /// Every user may edit every unprotected course (default: true).
    pub allow_all: bool,

    /// Users allowed to edit when `allow_all` is false.
    pub editors: Vec<String>,

    /// Courses that are never editable.
    pub protected_courses: Vec<String>,
}

impl Default for PermissionsConfig {
    fn default() -> Self {
        Self {
            allow_all: true,
            editors: Vec::new(),
            protected_courses: Vec::new(),
        }
    }
}
