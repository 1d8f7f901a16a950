//! The `Task` entity (spec §3) and its `WorkflowStep` body.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Discriminant for the trigger a task fires on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Trigger {
    Interval {
        interval_seconds: u64,
        anchor: DateTime<Utc>,
    },
    Cron {
        cron_expr: String,
        timezone: String,
    },
    OneShot {
        at_timestamp: DateTime<Utc>,
    },
}

impl Trigger {
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Trigger::Interval {
                interval_seconds, ..
            } => {
                if *interval_seconds < 1 {
                    return Err("interval_seconds must be >= 1".into());
                }
                Ok(())
            }
            Trigger::Cron { cron_expr, .. } => {
                crate::expr::cron::validate_cron(cron_expr).map_err(|e| e.to_string())
            }
            Trigger::OneShot { .. } => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Interval,
    Cron,
    OneShot,
    Workflow,
    Reminder,
}

/// One step of a workflow task's body (spec §3, §4.5 point 3).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum WorkflowStep {
    /// Refresh `source` from the task's `source_url`.
    Fetch,
    /// Evaluate `expr` and bind to `state[key]` for this run only.
    Set { key: String, expr: String },
    /// Same as `Set`, but the binding is persisted across task runs.
    SetState { key: String, expr: String },
    /// If `when` evaluates truthy, deliver rendered `message`.
    Notify {
        #[serde(rename = "when")]
        when: String,
        message: String,
    },
    /// Invoke a tool through the Capability Router; result bound to
    /// `state[target]`.
    ToolCall {
        target: String,
        server: String,
        tool: String,
        #[serde(default)]
        args: HashMap<String, Value>,
    },
}

/// The `Task` entity (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub owner_user: String,
    pub kind: TaskKind,
    pub trigger: Trigger,
    pub enabled: bool,
    #[serde(default)]
    pub payload: HashMap<String, Value>,
    #[serde(default)]
    pub steps: Vec<WorkflowStep>,
    pub last_run_at: Option<DateTime<Utc>>,
    pub next_run_at: Option<DateTime<Utc>>,
    pub last_result: Option<String>,
    #[serde(default)]
    pub failure_count: u32,
    #[serde(default)]
    pub disabled_reason: Option<String>,
    /// Workflow `set_state` bindings, persisted across runs.
    #[serde(default)]
    pub state: HashMap<String, Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A task auto-disables once its failure budget is exhausted (§4.5 point 4).
pub const FAILURE_BUDGET: u32 = 10;

impl Task {
    /// `payload.source_url`, used by the `fetch` step and initial source
    /// fetch (§4.5 point 3, §9 open question (b): scope limited to this
    /// field only).
    pub fn source_url(&self) -> Option<&str> {
        self.payload.get("source_url").and_then(|v| v.as_str())
    }

    pub fn record_success(&mut self, now: DateTime<Utc>, next_run_at: Option<DateTime<Utc>>) {
        self.last_run_at = Some(now);
        self.next_run_at = next_run_at;
        self.failure_count = 0;
        self.updated_at = now;
    }

    /// Record a failed fire; auto-disable once the failure budget is
    /// exhausted (spec §4.5 point 4).
    pub fn record_failure(&mut self, now: DateTime<Utc>, next_run_at: Option<DateTime<Utc>>) {
        self.last_run_at = Some(now);
        self.next_run_at = next_run_at;
        self.failure_count += 1;
        if self.failure_count > FAILURE_BUDGET {
            self.enabled = false;
            self.disabled_reason = Some("failure_budget_exhausted".into());
        }
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Task {
        Task {
            id: "t1".into(),
            owner_user: "u1".into(),
            kind: TaskKind::Interval,
            trigger: Trigger::Interval {
                interval_seconds: 300,
                anchor: Utc::now(),
            },
            enabled: true,
            payload: HashMap::new(),
            steps: vec![],
            last_run_at: None,
            next_run_at: None,
            last_result: None,
            failure_count: 0,
            disabled_reason: None,
            state: HashMap::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn failure_budget_disables_task() {
        let mut t = sample();
        for _ in 0..FAILURE_BUDGET {
            t.record_failure(Utc::now(), None);
        }
        assert!(t.enabled, "should still be enabled at exactly the budget");
        t.record_failure(Utc::now(), None);
        assert!(!t.enabled);
        assert_eq!(t.disabled_reason.as_deref(), Some("failure_budget_exhausted"));
    }

    #[test]
    fn success_resets_failure_count() {
        let mut t = sample();
        t.record_failure(Utc::now(), None);
        t.record_failure(Utc::now(), None);
        assert_eq!(t.failure_count, 2);
        t.record_success(Utc::now(), None);
        assert_eq!(t.failure_count, 0);
    }

    #[test]
    fn interval_trigger_rejects_sub_second() {
        let trigger = Trigger::Interval {
            interval_seconds: 0,
            anchor: Utc::now(),
        };
        assert!(trigger.validate().is_err());
    }

    #[test]
    fn source_url_reads_payload() {
        let mut t = sample();
        t.payload
            .insert("source_url".into(), Value::String("https://example.com".into()));
        assert_eq!(t.source_url(), Some("https://example.com"));
    }
}
