//! `AutonomyProfile` (spec §3) and the proactive-dispatch bookkeeping types
//! from the relational DDL in spec §6.1.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

pub const ENGAGEMENT_MIN: f64 = 0.1;
pub const ENGAGEMENT_MAX: f64 = 1.0;
pub const INITIATIVE_MIN: f64 = 0.1;
pub const INITIATIVE_MAX: f64 = 1.0;
pub const REINFORCEMENT_STEP_CAP: f64 = 0.05;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutonomyProfile {
    pub user_id: String,
    pub engagement_score: f64,
    pub initiative_level: f64,
    pub last_proactive_at: Option<DateTime<Utc>>,
    pub messages_sent_today: u32,
    pub proactive_day: NaiveDate,
    pub error_count_today: u32,
    pub last_user_message_at: Option<DateTime<Utc>>,
    /// Upper bound on proactive messages per day, referenced by invariant 5
    /// in spec §8. Not reachable via config surface in §6.2 — a per-profile
    /// default, clamped to the 1..=3 slot range from the GLOSSARY.
    #[serde(default = "default_max_daily_proactive")]
    pub max_daily_proactive: u8,
}

fn default_max_daily_proactive() -> u8 {
    3
}

impl AutonomyProfile {
    pub fn new(user_id: impl Into<String>, today: NaiveDate) -> Self {
        Self {
            user_id: user_id.into(),
            engagement_score: ENGAGEMENT_MIN,
            initiative_level: INITIATIVE_MIN,
            last_proactive_at: None,
            messages_sent_today: 0,
            proactive_day: today,
            error_count_today: 0,
            last_user_message_at: None,
            max_daily_proactive: default_max_daily_proactive(),
        }
    }

    /// Clamp engagement/initiative to their documented bounds (spec §3,
    /// §8 Boundaries) and roll `messages_sent_today` over when the day
    /// changes.
    pub fn clamp_and_roll(&mut self, today: NaiveDate) {
        self.engagement_score = self.engagement_score.clamp(ENGAGEMENT_MIN, ENGAGEMENT_MAX);
        self.initiative_level = self.initiative_level.clamp(INITIATIVE_MIN, INITIATIVE_MAX);
        if self.proactive_day != today {
            self.proactive_day = today;
            self.messages_sent_today = 0;
            self.error_count_today = 0;
        }
    }

    /// Apply a bounded reinforcement delta (spec §4.7 point 5, §9 open
    /// question (c)): at most ±0.05 per event.
    pub fn apply_reinforcement(&mut self, engagement_delta: f64, initiative_delta: f64, today: NaiveDate) {
        let e = engagement_delta.clamp(-REINFORCEMENT_STEP_CAP, REINFORCEMENT_STEP_CAP);
        let i = initiative_delta.clamp(-REINFORCEMENT_STEP_CAP, REINFORCEMENT_STEP_CAP);
        self.engagement_score += e;
        self.initiative_level += i;
        self.clamp_and_roll(today);
    }
}

/// `proactive_daily_slots` row (spec §6.1): claiming a slot is a unique
/// insert, the canonical "not me" signal in a handover (§5).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ProactiveSlotKey {
    pub user_id: String,
    pub day_bucket: NaiveDate,
    pub slot: u8,
}

/// `proactive_message_audit` row (spec §6.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProactiveMessageAudit {
    pub proactive_id: uuid::Uuid,
    pub user_id: String,
    pub scheduled_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
    pub message_kind: String,
    pub mood: Option<String>,
    pub success: bool,
    pub day_bucket: NaiveDate,
    pub daily_slot: Option<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn today() -> NaiveDate {
        Utc::now().date_naive()
    }

    #[test]
    fn clamps_out_of_range_engagement() {
        let mut p = AutonomyProfile::new("u1", today());
        p.engagement_score = 5.0;
        p.initiative_level = -3.0;
        p.clamp_and_roll(today());
        assert_eq!(p.engagement_score, ENGAGEMENT_MAX);
        assert_eq!(p.initiative_level, INITIATIVE_MIN);
    }

    #[test]
    fn day_change_resets_daily_counters() {
        let mut p = AutonomyProfile::new("u1", today());
        p.messages_sent_today = 3;
        p.error_count_today = 2;
        let tomorrow = today() + Duration::days(1);
        p.clamp_and_roll(tomorrow);
        assert_eq!(p.messages_sent_today, 0);
        assert_eq!(p.error_count_today, 0);
        assert_eq!(p.proactive_day, tomorrow);
    }

    #[test]
    fn reinforcement_delta_is_capped() {
        let mut p = AutonomyProfile::new("u1", today());
        let before = p.engagement_score;
        p.apply_reinforcement(10.0, -10.0, today());
        assert!((p.engagement_score - (before + REINFORCEMENT_STEP_CAP)).abs() < 1e-9);
        assert_eq!(p.initiative_level, INITIATIVE_MIN);
    }
}
