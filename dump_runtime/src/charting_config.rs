//! Settings for turning a directory of game logs into chart data.
//!
//! Loaded from `charting_config.json` with support for environment variable overrides.

use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::Arc,
};

use serde::Deserialize;
use thiserror::Error;

use crate::config_loader::load_with_env_path;

pub const BUILTIN_CHARTING_CONFIG: &str = include_str!("data/charting_config.json");

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ChartingConfig {
    /// File name patterns matched inside a log directory.
    pub log_globs: Vec<String>,
    /// Metrics kept in exported ledgers; empty keeps every metric.
    pub metrics: Vec<String>,
    /// Log and skip tokens the ledger rejects instead of failing the run.
    pub skip_rejected: bool,
}

impl Default for ChartingConfig {
    fn default() -> Self {
        Self {
            log_globs: vec!["AI_*.log".to_string(), "freeorion.log".to_string()],
            metrics: Vec::new(),
            skip_rejected: true,
        }
    }
}

impl ChartingConfig {
    pub fn builtin() -> Arc<Self> {
        Arc::new(
            serde_json::from_str(BUILTIN_CHARTING_CONFIG)
                .expect("builtin charting config should parse"),
        )
    }

    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn from_file(path: &Path) -> Result<Self, ChartingConfigError> {
        let contents =
            fs::read_to_string(path).map_err(|source| ChartingConfigError::ReadFailed {
                path: path.to_path_buf(),
                source,
            })?;
        let config = ChartingConfig::from_json_str(&contents)?;
        Ok(config)
    }
}

#[derive(Debug, Error)]
pub enum ChartingConfigError {
    #[error("failed to parse charting config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to read charting config from {path:?}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone)]
pub struct ChartingConfigMetadata {
    path: Option<PathBuf>,
}

impl ChartingConfigMetadata {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    pub fn path(&self) -> Option<&PathBuf> {
        self.path.as_ref()
    }
}

/// Loads the config named by `CHARTING_CONFIG_PATH`, falling back to the
/// builtin settings when the variable is unset or the file does not load.
pub fn load_charting_config_from_env() -> (Arc<ChartingConfig>, ChartingConfigMetadata) {
    load_with_env_path(
        "CHARTING_CONFIG_PATH",
        "charting_config",
        ChartingConfig::builtin,
        ChartingConfig::from_file,
        ChartingConfigMetadata::new,
    )
}
