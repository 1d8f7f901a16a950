use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Persistence Gateway configuration (spec §4.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Directory backing the default file-based gateway implementation
    /// (tasks, locks, profiles, decision/reinforcement logs as JSON).
    #[serde(default = "default_state_path")]
    pub state_path: PathBuf,
    /// Retry policy applied to every gateway operation (spec §4.2: "bounded
    /// retry with exponential backoff (base 100 ms, factor 2, max 5
    /// attempts, jitter)").
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            state_path: default_state_path(),
            retry: RetryConfig::default(),
        }
    }
}

fn default_state_path() -> PathBuf {
    PathBuf::from("./state")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_factor")]
    pub factor: f64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: default_base_delay_ms(),
            factor: default_factor(),
            max_attempts: default_max_attempts(),
        }
    }
}

fn default_base_delay_ms() -> u64 {
    100
}
fn default_factor() -> f64 {
    2.0
}
fn default_max_attempts() -> u32 {
    5
}
