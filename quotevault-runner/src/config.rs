//! Pipeline configuration, loaded from TOML.
//!
//! Every field has a default, so an empty file (or no file) is a valid
//! configuration. CLI flags are applied on top by the binary.
//!
//! ```toml
//! [fetch]
//! call_delay_ms = 500
//!
//! [fetch.retry]
//! max_retries = 5
//! base_delay_ms = 10000
//!
//! [schedule]
//! symbol_delay_ms = 3000
//! skip_failed = false
//!
//! [storage]
//! data_dir = "data/prices"
//! ledger_path = "data/download_progress.json"
//! format = "csv"
//!
//! [indicators]
//! min_rows = 100
//!
//! [window]
//! lookback_days = 1825
//! interval = "1d"
//! ```

use quotevault_core::data::{DatasetFormat, FetchConfig};
use quotevault_core::domain::WindowPolicy;
use quotevault_core::indicators::AugmentConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Pause between two symbols that went through the pipeline.
    pub symbol_delay_ms: u64,
    /// Also skip symbols the ledger lists as failed.
    pub skip_failed: bool,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            symbol_delay_ms: 3_000,
            skip_failed: false,
        }
    }
}

impl ScheduleConfig {
    pub fn symbol_delay(&self) -> Duration {
        Duration::from_millis(self.symbol_delay_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    pub ledger_path: PathBuf,
    pub format: DatasetFormat,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data/prices"),
            ledger_path: PathBuf::from("data/download_progress.json"),
            format: DatasetFormat::Csv,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub fetch: FetchConfig,
    pub schedule: ScheduleConfig,
    pub storage: StorageConfig,
    pub indicators: AugmentConfig,
    pub window: WindowPolicy,
}

impl PipelineConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let (Some(start), Some(end)) = (self.window.start, self.window.end) {
            if start > end {
                return Err(ConfigError::Invalid(format!(
                    "window start {start} is after end {end}"
                )));
            }
        }
        if self.window.lookback_days <= 0 {
            return Err(ConfigError::Invalid(format!(
                "lookback_days must be positive, got {}",
                self.window.lookback_days
            )));
        }
        if self.indicators.min_rows == 0 {
            return Err(ConfigError::Invalid("indicators.min_rows must be at least 1".into()));
        }
        if self.fetch.retry.max_retries > 31 {
            return Err(ConfigError::Invalid(format!(
                "fetch.retry.max_retries {} exceeds 31",
                self.fetch.retry.max_retries
            )));
        }
        Ok(())
    }
}
