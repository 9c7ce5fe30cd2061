use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tweetguard_core::config::CoreConfig;

/// CLI configuration that can be loaded from a JSON file
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CliConfig {
    /// Custom socket path for daemon communication
    #[serde(skip_serializing_if = "Option::is_none")]
    pub socket_path: Option<PathBuf>,

    /// Directory holding the store; overrides `engine.dataDir`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,

    /// Page fixture the daemon drives instead of a live browser
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fixture: Option<PathBuf>,

    /// Skip every engine wait (fixture runs)
    #[serde(default)]
    pub instant: bool,

    /// Engine settings: base URL, abort marker, restart cap, timings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engine: Option<CoreConfig>,
}

impl CliConfig {
    /// Load config from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: CliConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Serialize config to JSON for passing to daemon
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).context("Failed to serialize config")
    }

    /// Deserialize config from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to deserialize config")
    }

    /// Engine configuration with the top-level data dir applied.
    pub fn core_config(&self) -> CoreConfig {
        let mut core = self.engine.clone().unwrap_or_default();
        if let Some(ref dir) = self.data_dir {
            core.data_dir = dir.clone();
        }
        core
    }
}
