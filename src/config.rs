//! Engine configuration. Static settings load once from a JSON file;
//! runtime settings (mode, toggle, manual lists) are mutable at runtime and
//! delivered to the engine through a watch subscription.

use crate::policy::EnforcementMode;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Data directory (store database).
    pub data_dir: PathBuf,
    /// Path to the model weight JSON; built-in weights when absent.
    pub model_path: Option<PathBuf>,
    /// Feature extraction parameters.
    pub features: FeaturesConfig,
    /// Timeout for rule-sink and persistence calls (ms).
    pub io_timeout_ms: u64,
    /// Initial runtime settings (mutable afterwards via subscription).
    pub settings: RuntimeSettings,
    /// Logging.
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeaturesConfig {
    /// Trailing window for the frequency feature (ms).
    pub window_ms: i64,
    /// Cap on concurrently tracked domains in the window map.
    pub max_domains: usize,
}

/// Externally mutable configuration surface: enforcement mode, engine
/// toggle, and the manual allow/block lists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeSettings {
    pub enabled: bool,
    pub mode: EnforcementMode,
    pub allow_list: Vec<String>,
    pub block_list: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    pub level: String,
    pub json: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".ztfw"),
            model_path: None,
            features: FeaturesConfig::default(),
            io_timeout_ms: 5_000,
            settings: RuntimeSettings::default(),
            log: LogConfig::default(),
        }
    }
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self {
            window_ms: crate::features::WINDOW_MS,
            max_domains: 512,
        }
    }
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            mode: EnforcementMode::Balanced,
            allow_list: Vec::new(),
            block_list: Vec::new(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: true,
        }
    }
}

impl EngineConfig {
    /// Load from JSON file if present; otherwise return defaults.
    pub fn load(path: &std::path::Path) -> Self {
        if path.exists() {
            if let Ok(data) = std::fs::read_to_string(path) {
                if let Ok(c) = serde_json::from_str::<EngineConfig>(&data) {
                    return c;
                }
            }
        }
        Self::default()
    }

    pub fn io_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.io_timeout_ms)
    }
}
