use serde::{Deserialize, Serialize};

/// Tool Registry & Capability Router configuration (spec §4.4, §5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolRouterConfig {
    /// Per-call deadline in seconds (spec §5 timeouts table: tool call 60s).
    #[serde(default = "default_call_timeout_seconds")]
    pub call_timeout_seconds: u64,
}

impl Default for ToolRouterConfig {
    fn default() -> Self {
        Self {
            call_timeout_seconds: default_call_timeout_seconds(),
        }
    }
}

fn default_call_timeout_seconds() -> u64 {
    60
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_call_timeout_matches_spec_5() {
        assert_eq!(ToolRouterConfig::default().call_timeout_seconds, 60);
    }
}
