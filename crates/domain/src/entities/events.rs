//! Append-only event streams: `DecisionEvent`, `ReinforcementEvent`, and the
//! `DebateTrace` emitted into the decision log (spec §3).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionEvent {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub user_id: Option<String>,
    pub source: String,
    pub summary: String,
    #[serde(default)]
    pub details: HashMap<String, Value>,
}

impl DecisionEvent {
    pub fn new(event_type: impl Into<String>, source: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            event_type: event_type.into(),
            user_id: None,
            source: source.into(),
            summary: summary.into(),
            details: HashMap::new(),
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReinforcementFlags {
    pub task_succeeded: bool,
    pub concise: bool,
    pub helpful: bool,
    pub emotionally_aligned: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReinforcementEvent {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub user_id: String,
    pub score: f64,
    pub flags: ReinforcementFlags,
    pub reasoning: String,
}

impl ReinforcementEvent {
    pub fn new(user_id: impl Into<String>, score: f64, flags: ReinforcementFlags, reasoning: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            user_id: user_id.into(),
            score: score.clamp(-1.0, 1.0),
            flags,
            reasoning: reasoning.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VerifierResult {
    Approve,
    Revise,
    Reject,
}

/// Emitted into the decision log for every `action_request` (spec §3, §4.7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebateTrace {
    pub request_id: Uuid,
    pub plan_text: String,
    pub plan_steps: usize,
    pub skeptic_notes: Vec<String>,
    pub verifier_result: VerifierResult,
    pub final_actions: Vec<String>,
    pub elapsed_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reinforcement_score_is_clamped() {
        let ev = ReinforcementEvent::new("u1", 5.0, ReinforcementFlags::default(), "test");
        assert_eq!(ev.score, 1.0);
        let ev = ReinforcementEvent::new("u1", -5.0, ReinforcementFlags::default(), "test");
        assert_eq!(ev.score, -1.0);
    }

    #[test]
    fn decision_event_builder_round_trips_details() {
        let ev = DecisionEvent::new("workflow_step_failed", "scheduler", "step failed")
            .with_user("u1")
            .with_detail("task_id", "t1");
        assert_eq!(ev.user_id.as_deref(), Some("u1"));
        assert_eq!(ev.details.get("task_id").and_then(|v| v.as_str()), Some("t1"));
    }
}
