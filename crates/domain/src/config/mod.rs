mod clock;
mod debate;
mod intent;
mod llm;
mod memory;
mod persistence;
mod scheduler;
mod supervisor;
mod tool_router;
mod transport;

pub use clock::ClockConfig;
pub use debate::DebateConfig;
pub use intent::IntentConfig;
pub use llm::{
    AuthConfig, AuthMode, FallbackConfig, LlmConfig, LlmStartupPolicy, ProviderConfig,
    ProviderKind, RoleConfig,
};
pub use memory::MemoryConfig;
pub use persistence::{PersistenceConfig, RetryConfig};
pub use scheduler::SchedulerConfig;
pub use supervisor::{SupervisorConfig, ToolServerConfig};
pub use tool_router::ToolRouterConfig;
pub use transport::TransportConfig;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::expr::cron::validate_cron;

/// Top-level configuration aggregate for the autonomy core process.
///
/// Each section owns its own defaults and deserializes independently, so a
/// config file can supply any subset of sections (or none at all).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub clock: ClockConfig,
    #[serde(default)]
    pub persistence: PersistenceConfig,
    #[serde(default)]
    pub supervisor: SupervisorConfig,
    #[serde(default)]
    pub tool_router: ToolRouterConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub intent: IntentConfig,
    #[serde(default)]
    pub debate: DebateConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub llm: LlmConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigSeverity {
    Error,
    Warning,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARNING",
        };
        write!(f, "[{}] {}: {}", tag, self.field, self.message)
    }
}

fn err(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError {
        severity: ConfigSeverity::Error,
        field: field.to_string(),
        message: message.into(),
    }
}

fn warn(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError {
        severity: ConfigSeverity::Warning,
        field: field.to_string(),
        message: message.into(),
    }
}

impl Config {
    /// Validates the closed configuration surface (spec §6.2) plus the
    /// structural invariants each section's type can't express on its own.
    /// Does not mutate; callers decide whether `Error`-severity issues abort
    /// startup.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut issues = Vec::new();

        if !(0.0..=1.0).contains(&self.intent.action_intent_threshold) {
            issues.push(err(
                "intent.action_intent_threshold",
                "must be between 0.0 and 1.0",
            ));
        }

        if self.debate.autonomous_max_steps == 0 {
            issues.push(err(
                "debate.autonomous_max_steps",
                "must allow at least one step",
            ));
        }
        if self.debate.sandbox_command_timeout_seconds == 0 {
            issues.push(err(
                "debate.sandbox_command_timeout_seconds",
                "must be positive",
            ));
        }

        if self.supervisor.start_timeout_seconds == 0 {
            issues.push(err(
                "supervisor.start_timeout_seconds",
                "must be positive",
            ));
        }
        let mut seen_ids = std::collections::HashSet::new();
        for server in &self.supervisor.servers {
            if server.id.is_empty() {
                issues.push(err("supervisor.servers[].id", "must not be empty"));
                continue;
            }
            if !seen_ids.insert(server.id.clone()) {
                issues.push(err(
                    "supervisor.servers[].id",
                    format!("duplicate server id '{}'", server.id),
                ));
            }
        }

        if self.scheduler.state_publish_min_interval_seconds == 0 {
            issues.push(warn(
                "scheduler.state_publish_min_interval_seconds",
                "0 disables the publish-interval floor; state snapshots \
                 will be emitted on every tick",
            ));
        }
        if self.scheduler.workflow_http_timeout_seconds == 0 {
            issues.push(err(
                "scheduler.workflow_http_timeout_seconds",
                "must be positive",
            ));
        }
        if self.scheduler.event_queue_max_size == 0 {
            issues.push(err(
                "scheduler.event_queue_max_size",
                "must allow at least one queued event",
            ));
        }

        if self.transport.telegram_public_rate_limit_per_minute == 0 {
            issues.push(warn(
                "transport.telegram_public_rate_limit_per_minute",
                "0 disables the upstream throttle signal entirely",
            ));
        }

        for provider in &self.llm.providers {
            if provider.id.is_empty() {
                issues.push(err("llm.providers[].id", "must not be empty"));
            }
            if provider.base_url.is_empty() {
                issues.push(err(
                    "llm.providers[].base_url",
                    format!("provider '{}' has no base_url", provider.id),
                ));
            } else if !provider.base_url.starts_with("http://")
                && !provider.base_url.starts_with("https://")
            {
                issues.push(err(
                    "llm.providers[].base_url",
                    format!("provider '{}' base_url must be http(s)", provider.id),
                ));
            }
        }
        if self.llm.startup_policy == LlmStartupPolicy::RequireOne && self.llm.providers.is_empty()
        {
            issues.push(err(
                "llm.startup_policy",
                "require_one set but no providers are configured",
            ));
        }

        if let Some(seed_path) = &self.scheduler.seed_path {
            if seed_path.as_os_str().is_empty() {
                issues.push(err("scheduler.seed_path", "must not be an empty path"));
            }
        }

        issues
    }
}

/// Validates a standalone cron expression against the same 5-field grammar
/// the scheduler's cron triggers use (spec §4.5). Exposed here so config
/// files authoring tasks ahead of time can be checked the same way the
/// scheduler would check them at trigger-creation time.
pub fn validate_cron_expression(expr: &str) -> Result<(), String> {
    validate_cron(expr).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        Config::default()
    }

    fn find_issue<'a>(issues: &'a [ConfigError], field_prefix: &str) -> Option<&'a ConfigError> {
        issues.iter().find(|i| i.field.starts_with(field_prefix))
    }

    #[test]
    fn default_config_has_no_errors() {
        let issues = valid_config().validate();
        let errors: Vec<_> = issues
            .iter()
            .filter(|i| i.severity == ConfigSeverity::Error)
            .collect();
        assert!(errors.is_empty(), "unexpected errors: {:?}", errors);
    }

    #[test]
    fn rejects_out_of_range_action_intent_threshold() {
        let mut cfg = valid_config();
        cfg.intent.action_intent_threshold = 1.5;
        let issues = cfg.validate();
        assert!(find_issue(&issues, "intent.action_intent_threshold").is_some());
    }

    #[test]
    fn rejects_zero_autonomous_max_steps() {
        let mut cfg = valid_config();
        cfg.debate.autonomous_max_steps = 0;
        let issues = cfg.validate();
        assert!(find_issue(&issues, "debate.autonomous_max_steps").is_some());
    }

    #[test]
    fn rejects_duplicate_tool_server_ids() {
        let mut cfg = valid_config();
        cfg.supervisor.servers = vec![
            ToolServerConfig {
                id: "fs".into(),
                command: "fs-server".into(),
                args: vec![],
                env: Default::default(),
            },
            ToolServerConfig {
                id: "fs".into(),
                command: "fs-server-2".into(),
                args: vec![],
                env: Default::default(),
            },
        ];
        let issues = cfg.validate();
        let issue = find_issue(&issues, "supervisor.servers[].id").unwrap();
        assert_eq!(issue.severity, ConfigSeverity::Error);
    }

    #[test]
    fn warns_on_zero_state_publish_interval() {
        let mut cfg = valid_config();
        cfg.scheduler.state_publish_min_interval_seconds = 0;
        let issues = cfg.validate();
        let issue = find_issue(&issues, "scheduler.state_publish_min_interval_seconds").unwrap();
        assert_eq!(issue.severity, ConfigSeverity::Warning);
    }

    #[test]
    fn rejects_non_http_provider_base_url() {
        let mut cfg = valid_config();
        cfg.llm.providers.push(ProviderConfig {
            id: "local".into(),
            kind: ProviderKind::OpenaiCompat,
            base_url: "ftp://example.com".into(),
            auth: AuthConfig::default(),
            default_model: None,
        });
        let issues = cfg.validate();
        assert!(find_issue(&issues, "llm.providers[].base_url").is_some());
    }

    #[test]
    fn require_one_without_providers_is_an_error() {
        let mut cfg = valid_config();
        cfg.llm.startup_policy = LlmStartupPolicy::RequireOne;
        let issues = cfg.validate();
        assert!(find_issue(&issues, "llm.startup_policy").is_some());
    }

    #[test]
    fn config_error_display_matches_bracketed_format() {
        let issue = err("x.y", "broken");
        assert_eq!(format!("{}", issue), "[ERROR] x.y: broken");
    }

    #[test]
    fn validate_cron_expression_rejects_wrong_field_count() {
        assert!(validate_cron_expression("* * *").is_err());
    }

    #[test]
    fn validate_cron_expression_accepts_standard_form() {
        assert!(validate_cron_expression("*/5 * * * *").is_ok());
    }

    #[test]
    fn toml_round_trip_deserializes_partial_document() {
        let doc = r#"
            [intent]
            action_intent_threshold = 0.9

            [debate]
            autonomous_max_steps = 8
        "#;
        let cfg: Config = toml::from_str(doc).unwrap();
        assert_eq!(cfg.intent.action_intent_threshold, 0.9);
        assert_eq!(cfg.debate.autonomous_max_steps, 8);
        assert_eq!(cfg.scheduler.tick_seconds, 1);
    }
}
