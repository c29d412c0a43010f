//! Configuration for the hive binary.

use anyhow::{Context, Result};
use hive_storage::LedgerConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable overriding the database URL.
pub const DATABASE_URL_ENV: &str = "HIVE_DATABASE_URL";

/// Environment variable overriding the log root.
pub const LOG_ROOT_ENV: &str = "HIVE_LOG_ROOT";

/// Settings shared by every subcommand.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HiveConfig {
    /// Ledger connection (`database_url`, `max_connections`)
    #[serde(flatten)]
    pub ledger: LedgerConfig,

    /// Directory under which worker log directories are sharded
    pub log_root: PathBuf,
}

impl Default for HiveConfig {
    fn default() -> Self {
        Self {
            ledger: LedgerConfig::default(),
            log_root: PathBuf::from("hive_logs"),
        }
    }
}

impl HiveConfig {
    /// Read a JSON config file, or start from defaults when there is none.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Apply overrides from the process environment.
    pub fn with_env(self) -> Self {
        self.with_env_from(|name| std::env::var(name).ok())
    }

    fn with_env_from(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = var(DATABASE_URL_ENV).filter(|v| !v.is_empty()) {
            self.ledger.database_url = url;
        }
        if let Some(root) = var(LOG_ROOT_ENV).filter(|v| !v.is_empty()) {
            self.log_root = PathBuf::from(root);
        }
        self
    }
}
