use serde::{Deserialize, Serialize};

/// Persistence-backed conversation memory lookup (spec §6.2 `memory_strict_mode`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// When true, a failed memory lookup fails the enclosing request
    /// (`Resource` error). When false, the request proceeds with an
    /// empty memory window.
    #[serde(default)]
    pub strict_mode: bool,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self { strict_mode: false }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_non_strict() {
        assert!(!MemoryConfig::default().strict_mode);
    }

    #[test]
    fn deserialize_missing_field_uses_default() {
        let cfg: MemoryConfig = serde_json::from_str("{}").unwrap();
        assert!(!cfg.strict_mode);
    }
}
