use serde::{Deserialize, Serialize};

/// Pass-through configuration for the external transport collaborator
/// (spec §1 "Collaborating systems"; §6.2 `telegram_public_rate_limit_per_minute`).
/// The transport itself is out of scope; this is the throttle signal it reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    #[serde(default = "default_telegram_public_rate_limit_per_minute")]
    pub telegram_public_rate_limit_per_minute: u32,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            telegram_public_rate_limit_per_minute: default_telegram_public_rate_limit_per_minute(),
        }
    }
}

fn default_telegram_public_rate_limit_per_minute() -> u32 {
    20
}
