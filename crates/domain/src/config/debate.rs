use serde::{Deserialize, Serialize};

/// Debate Dispatcher configuration (spec §4.7, §6.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebateConfig {
    /// `HER_AUTONOMOUS_MAX_STEPS` (default 16).
    #[serde(default = "default_autonomous_max_steps")]
    pub autonomous_max_steps: usize,
    /// Per-step execution deadline, default 60s (spec §4.7 point 4).
    #[serde(default = "default_step_timeout_seconds")]
    pub step_timeout_seconds: u64,
    /// Sandbox command deadline (spec §6.2 `sandbox_command_timeout`).
    #[serde(default = "default_sandbox_command_timeout_seconds")]
    pub sandbox_command_timeout_seconds: u64,
    /// Resource ceilings surfaced in the `Resource` error kind (spec §7).
    #[serde(default = "default_sandbox_cpu_time_limit_seconds")]
    pub sandbox_cpu_time_limit_seconds: u64,
    #[serde(default = "default_sandbox_memory_limit_mb")]
    pub sandbox_memory_limit_mb: u64,
}

impl Default for DebateConfig {
    fn default() -> Self {
        Self {
            autonomous_max_steps: default_autonomous_max_steps(),
            step_timeout_seconds: default_step_timeout_seconds(),
            sandbox_command_timeout_seconds: default_sandbox_command_timeout_seconds(),
            sandbox_cpu_time_limit_seconds: default_sandbox_cpu_time_limit_seconds(),
            sandbox_memory_limit_mb: default_sandbox_memory_limit_mb(),
        }
    }
}

fn default_autonomous_max_steps() -> usize {
    16
}
fn default_step_timeout_seconds() -> u64 {
    60
}
fn default_sandbox_command_timeout_seconds() -> u64 {
    60
}
fn default_sandbox_cpu_time_limit_seconds() -> u64 {
    30
}
fn default_sandbox_memory_limit_mb() -> u64 {
    512
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_4_7() {
        let cfg = DebateConfig::default();
        assert_eq!(cfg.autonomous_max_steps, 16);
        assert_eq!(cfg.step_timeout_seconds, 60);
        assert_eq!(cfg.sandbox_command_timeout_seconds, 60);
    }
}
