use serde::{Deserialize, Serialize};

/// Clock & Timezone Service configuration (spec §4.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClockConfig {
    /// Timezone assumed when a user has none recorded and none was
    /// supplied (spec §4.6: "falls back to the user's recorded timezone,
    /// else UTC").
    #[serde(default = "default_fallback_timezone")]
    pub fallback_timezone: String,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            fallback_timezone: default_fallback_timezone(),
        }
    }
}

fn default_fallback_timezone() -> String {
    "UTC".into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_fallback_is_utc() {
        assert_eq!(ClockConfig::default().fallback_timezone, "UTC");
    }

    #[test]
    fn deserialize_missing_field_uses_default() {
        let cfg: ClockConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.fallback_timezone, "UTC");
    }
}
