//! Application configuration.
//!
//! Loaded from a TOML file with serde defaults so a partial file, or no file
//! at all, yields a working configuration. `validate()` catches the
//! misconfigurations that would otherwise surface as confusing runtime
//! failures.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{AnalysisError, Result};

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Directory scanned for session datasets.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    /// Directory uploaded files are written to.
    #[serde(default = "default_upload_dir")]
    pub upload_dir: String,
    /// SQLite database path for sessions and analysis history.
    #[serde(default = "default_db_path")]
    pub db_path: String,
    /// Upload size ceiling in megabytes.
    #[serde(default = "default_max_file_size_mb")]
    pub max_file_size_mb: u64,
    /// Shared API key; checked only when `require_auth` is set.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Require callers to present the API key.
    #[serde(default)]
    pub require_auth: bool,
    /// Metric columns callers may request.
    #[serde(default = "default_valid_metrics")]
    pub valid_metrics: Vec<String>,
}

fn default_data_dir() -> String {
    "data".to_string()
}

fn default_upload_dir() -> String {
    "uploads".to_string()
}

fn default_db_path() -> String {
    "data/qstorm.db".to_string()
}

fn default_max_file_size_mb() -> u64 {
    200
}

fn default_valid_metrics() -> Vec<String> {
    [
        "売上金額",
        "粗利額",
        "売上数量",
        "客数",
        "客単価",
        "粗利率",
        "坪売上",
        "人時売上",
        "在庫金額",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            upload_dir: default_upload_dir(),
            db_path: default_db_path(),
            max_file_size_mb: default_max_file_size_mb(),
            api_key: None,
            require_auth: false,
            valid_metrics: default_valid_metrics(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file and validate it.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        let content = fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| AnalysisError::Config(e.to_string()))?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Reject configurations that would fail in confusing ways later.
    pub fn validate(&self) -> Result<()> {
        if !(1..=1000).contains(&self.max_file_size_mb) {
            return Err(AnalysisError::Config(format!(
                "max_file_size_mb must be 1-1000, got {}",
                self.max_file_size_mb
            )));
        }
        if self.valid_metrics.is_empty() {
            return Err(AnalysisError::Config(
                "valid_metrics must not be empty".to_string(),
            ));
        }
        if self.require_auth {
            match &self.api_key {
                None => {
                    return Err(AnalysisError::Config(
                        "api_key is required when require_auth is set".to_string(),
                    ))
                }
                Some(key) if key.len() < 20 => {
                    return Err(AnalysisError::Config(
                        "api_key is too short (minimum 20 characters)".to_string(),
                    ))
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    /// Upload size ceiling in bytes.
    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb * 1024 * 1024
    }
}
