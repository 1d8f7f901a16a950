//! `ToolServer` and `ToolSchema` (spec §3, §4.3 FSM).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ServerStatus {
    Pending,
    Starting,
    Running,
    Failed,
    Stopped,
}

impl ServerStatus {
    /// Validate a transition against the FSM in spec §4.3. Returns `true`
    /// when `self -> next` is a legal edge.
    pub fn can_transition_to(self, next: ServerStatus) -> bool {
        use ServerStatus::*;
        matches!(
            (self, next),
            (Pending, Starting)
                | (Starting, Running)
                | (Starting, Failed)
                | (Running, Failed)
                | (Running, Stopped)
                | (Failed, Starting) // retry(n < max)
                | (Failed, Stopped) // retry_exhausted
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    pub server_name: String,
    pub tool_name: String,
    pub description: String,
    pub input_schema: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolServer {
    pub name: String,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    pub status: ServerStatus,
    #[serde(default)]
    pub tools: Vec<ToolSchema>,
    pub last_error: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub startup_deadline: Option<DateTime<Utc>>,
    /// Restarts within the current 5-minute retry window (§4.3).
    #[serde(default)]
    pub restart_count: u32,
    /// stderr ring buffer, capped at 8 KiB (§4.3), newest bytes last.
    #[serde(default)]
    pub stderr_tail: String,
}

impl ToolServer {
    /// Invariant from spec §3 / §8.6: tools is non-empty only when
    /// status=running; non-running servers have no tools.
    pub fn enforce_tools_invariant(&mut self) {
        if self.status != ServerStatus::Running {
            self.tools.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fsm_allows_documented_edges() {
        assert!(ServerStatus::Pending.can_transition_to(ServerStatus::Starting));
        assert!(ServerStatus::Starting.can_transition_to(ServerStatus::Running));
        assert!(ServerStatus::Starting.can_transition_to(ServerStatus::Failed));
        assert!(ServerStatus::Running.can_transition_to(ServerStatus::Failed));
        assert!(ServerStatus::Running.can_transition_to(ServerStatus::Stopped));
        assert!(ServerStatus::Failed.can_transition_to(ServerStatus::Starting));
        assert!(ServerStatus::Failed.can_transition_to(ServerStatus::Stopped));
    }

    #[test]
    fn fsm_rejects_undocumented_edges() {
        assert!(!ServerStatus::Pending.can_transition_to(ServerStatus::Running));
        assert!(!ServerStatus::Stopped.can_transition_to(ServerStatus::Starting));
        assert!(!ServerStatus::Running.can_transition_to(ServerStatus::Pending));
    }

    #[test]
    fn non_running_server_has_no_tools() {
        let mut server = ToolServer {
            name: "flaky".into(),
            command: "echo".into(),
            args: vec![],
            env: HashMap::new(),
            status: ServerStatus::Running,
            tools: vec![ToolSchema {
                server_name: "flaky".into(),
                tool_name: "ping".into(),
                description: String::new(),
                input_schema: Value::Null,
            }],
            last_error: None,
            started_at: None,
            startup_deadline: None,
            restart_count: 0,
            stderr_tail: String::new(),
        };
        server.status = ServerStatus::Failed;
        server.enforce_tools_invariant();
        assert!(server.tools.is_empty());
    }
}
