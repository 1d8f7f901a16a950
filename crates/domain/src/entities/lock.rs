//! `TaskLock` (spec §3, §4.5 single-runner guarantee).

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskLock {
    pub name: String,
    pub holder_id: String,
    pub heartbeat_at: DateTime<Utc>,
    pub ttl_seconds: i64,
}

impl TaskLock {
    pub fn new(name: impl Into<String>, holder_id: impl Into<String>, ttl_seconds: i64, now: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            holder_id: holder_id.into(),
            heartbeat_at: now,
            ttl_seconds,
        }
    }

    /// "At most one holder per name at any wall-clock instant where
    /// `heartbeat_at+ttl > now`" (spec §3 invariant).
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.heartbeat_at + Duration::seconds(self.ttl_seconds) > now
    }

    pub fn refresh(&mut self, now: DateTime<Utc>) {
        self.heartbeat_at = now;
    }
}

pub const SCHEDULER_MAIN_LOCK: &str = "scheduler_main";
pub const SCHEDULER_LOCK_TTL_SECONDS: i64 = 30;
pub const SCHEDULER_HEARTBEAT_SECONDS: u64 = 10;

/// Key for the daily proactive dispatch slot lock (spec §5 shared-resource
/// policy): `proactive:{user_id}:{day}:{slot}`.
pub fn proactive_slot_lock_name(user_id: &str, day: chrono::NaiveDate, slot: u8) -> String {
    format!("proactive:{user_id}:{day}:{slot}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_is_live_within_ttl() {
        let now = Utc::now();
        let lock = TaskLock::new("scheduler_main", "runner-a", 30, now);
        assert!(lock.is_live(now + Duration::seconds(29)));
        assert!(!lock.is_live(now + Duration::seconds(31)));
    }

    #[test]
    fn refresh_extends_liveness() {
        let now = Utc::now();
        let mut lock = TaskLock::new("scheduler_main", "runner-a", 30, now);
        lock.refresh(now + Duration::seconds(25));
        assert!(lock.is_live(now + Duration::seconds(40)));
    }

    #[test]
    fn proactive_slot_key_format() {
        let day = chrono::NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        assert_eq!(proactive_slot_lock_name("u1", day, 2), "proactive:u1:2025-03-10:2");
    }
}
