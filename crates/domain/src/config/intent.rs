use serde::{Deserialize, Serialize};

/// Intent Classifier & Interpreter configuration (spec §4.6, §6.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentConfig {
    /// `HER_ACTION_INTENT_THRESHOLD` (default 0.8). Minimum confidence to
    /// leave chat mode for an `action_request`.
    #[serde(default = "default_action_intent_threshold")]
    pub action_intent_threshold: f64,
}

impl Default for IntentConfig {
    fn default() -> Self {
        Self {
            action_intent_threshold: default_action_intent_threshold(),
        }
    }
}

fn default_action_intent_threshold() -> f64 {
    0.8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_threshold_matches_spec() {
        assert_eq!(IntentConfig::default().action_intent_threshold, 0.8);
    }
}
