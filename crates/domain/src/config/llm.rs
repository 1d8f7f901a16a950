use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// LLM provider registry configuration (spec §4.7 "Model calls", §6.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_timeout_ms")]
    pub default_timeout_ms: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// `allow_none` (default) boots even with zero providers configured;
    /// debate dispatches fail with a `Resource` error until credentials
    /// are supplied. `require_one` aborts startup instead.
    #[serde(default)]
    pub startup_policy: LlmStartupPolicy,
    /// Model roles: planner, skeptic, verifier (+ custom). Key is the role
    /// name referenced by the debate dispatcher (spec §4.7).
    #[serde(default)]
    pub roles: HashMap<String, RoleConfig>,
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: default_timeout_ms(),
            max_retries: default_max_retries(),
            startup_policy: LlmStartupPolicy::default(),
            roles: HashMap::new(),
            providers: Vec::new(),
        }
    }
}

/// Controls how a missing LLM provider set is handled at boot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LlmStartupPolicy {
    #[default]
    AllowNone,
    RequireOne,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleConfig {
    /// Format: "provider_id/model_name".
    pub model: String,
    #[serde(default)]
    pub require_tools: bool,
    #[serde(default)]
    pub fallbacks: Vec<FallbackConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackConfig {
    pub model: String,
    #[serde(default)]
    pub require_tools: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub id: String,
    pub kind: ProviderKind,
    pub base_url: String,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub default_model: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    OpenaiCompat,
    Anthropic,
    Google,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AuthConfig {
    #[serde(default)]
    pub mode: AuthMode,
    /// Header name (e.g. "Authorization", "x-api-key").
    #[serde(default)]
    pub header: Option<String>,
    /// Header value prefix (e.g. "Bearer ").
    #[serde(default)]
    pub prefix: Option<String>,
    /// Env var containing the key, resolved at startup.
    #[serde(default)]
    pub env: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    #[default]
    ApiKey,
    None,
}

fn default_timeout_ms() -> u64 {
    20_000
}
fn default_max_retries() -> u32 {
    2
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_has_no_providers() {
        let cfg = LlmConfig::default();
        assert!(cfg.providers.is_empty());
        assert_eq!(cfg.startup_policy, LlmStartupPolicy::AllowNone);
    }

    #[test]
    fn provider_config_deserializes() {
        let json = r#"{
            "id": "anthropic",
            "kind": "anthropic",
            "base_url": "https://api.anthropic.com",
            "auth": { "mode": "api_key", "header": "x-api-key", "env": "ANTHROPIC_API_KEY" }
        }"#;
        let cfg: ProviderConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.kind, ProviderKind::Anthropic);
        assert_eq!(cfg.auth.env.as_deref(), Some("ANTHROPIC_API_KEY"));
    }

    #[test]
    fn role_config_fallback_chain_deserializes() {
        let json = r#"{
            "model": "anthropic/claude-opus",
            "fallbacks": [{ "model": "anthropic/claude-sonnet" }]
        }"#;
        let cfg: RoleConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.fallbacks.len(), 1);
    }
}
