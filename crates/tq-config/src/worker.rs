use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::LoadedConfig;

pub const DEFAULT_DB_URL_ENV: &str = "TQ_DATABASE_URL";

/// Typed view over the keys the worker reads. Missing keys take defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct WorkerConfig {
    pub worker: WorkerSection,
    pub db: DbSection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerSection {
    /// Sleep between the end of one cycle and the start of the next.
    pub poll_interval_ms: u64,
}

impl Default for WorkerSection {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DbSection {
    /// NAME of the env var holding the connection URL (never the URL itself).
    pub url_env: String,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl Default for DbSection {
    fn default() -> Self {
        Self {
            url_env: DEFAULT_DB_URL_ENV.to_string(),
            max_connections: 10,
            acquire_timeout_secs: 5,
        }
    }
}

impl WorkerConfig {
    /// Deserialize from a merged config document and check value ranges.
    pub fn from_loaded(loaded: &LoadedConfig) -> Result<Self> {
        let cfg: WorkerConfig = serde_json::from_value(loaded.config_json.clone())
            .context("worker config has wrong shape")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.worker.poll_interval_ms == 0 {
            bail!("worker.poll_interval_ms must be > 0");
        }
        if self.db.max_connections == 0 {
            bail!("db.max_connections must be > 0");
        }
        if self.db.acquire_timeout_secs == 0 {
            bail!("db.acquire_timeout_secs must be > 0");
        }
        if self.db.url_env.trim().is_empty() {
            bail!("db.url_env must name an environment variable");
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.worker.poll_interval_ms)
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.db.acquire_timeout_secs)
    }
}
