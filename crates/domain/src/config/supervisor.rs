use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A single configured tool-server process (spec §3 `ToolServer`, §4.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolServerConfig {
    pub id: String,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Values may reference host env as `${NAME}`; unresolved placeholders
    /// fail the server at boot, not the process (spec §4.3).
    #[serde(default)]
    pub env: HashMap<String, String>,
}

/// Process Supervisor configuration (spec §4.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorConfig {
    #[serde(default)]
    pub servers: Vec<ToolServerConfig>,
    /// `MCP_SERVER_START_TIMEOUT_SECONDS` (default 60s).
    #[serde(default = "default_start_timeout_seconds")]
    pub start_timeout_seconds: u64,
    /// Up to 3 restarts within this window before the server parks in
    /// `stopped`.
    #[serde(default = "default_max_restarts")]
    pub max_restarts: u32,
    #[serde(default = "default_restart_window_seconds")]
    pub restart_window_seconds: u64,
    /// stderr ring buffer size in bytes (8 KiB per spec §4.3).
    #[serde(default = "default_stderr_ring_buffer_bytes")]
    pub stderr_ring_buffer_bytes: usize,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            servers: Vec::new(),
            start_timeout_seconds: default_start_timeout_seconds(),
            max_restarts: default_max_restarts(),
            restart_window_seconds: default_restart_window_seconds(),
            stderr_ring_buffer_bytes: default_stderr_ring_buffer_bytes(),
        }
    }
}

fn default_start_timeout_seconds() -> u64 {
    60
}
fn default_max_restarts() -> u32 {
    3
}
fn default_restart_window_seconds() -> u64 {
    300
}
fn default_stderr_ring_buffer_bytes() -> usize {
    8 * 1024
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_4_3() {
        let cfg = SupervisorConfig::default();
        assert_eq!(cfg.start_timeout_seconds, 60);
        assert_eq!(cfg.max_restarts, 3);
        assert_eq!(cfg.restart_window_seconds, 300);
        assert_eq!(cfg.stderr_ring_buffer_bytes, 8192);
    }

    #[test]
    fn env_placeholder_value_preserved_unresolved() {
        let json = r#"{"id":"flaky","command":"run","env":{"TOKEN":"${API_TOKEN}"}}"#;
        let cfg: ToolServerConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.env.get("TOKEN").unwrap(), "${API_TOKEN}");
    }
}
