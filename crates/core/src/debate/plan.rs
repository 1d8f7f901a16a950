//! Planner stage (spec §4.7 point 1): the only stage that calls an LLM.
//! Asks the `planner` role for a bounded, ordered list of steps and parses
//! its response as a closed `PlanStep` list, rejecting anything that
//! doesn't fit the closed shape rather than trying to repair it.
//!
//! Each step is either a `(server, tool)` pair, a `reply` step that speaks
//! back to the user with no tool call, or a `done` step that terminates
//! the loop (spec §4.7 points 1 and 4).

use ac_domain::{Error, ErrorKind, Message, Result};
use ac_providers::traits::{ChatRequest, LlmProvider};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlanStep {
    Tool {
        server: String,
        tool: String,
        #[serde(default)]
        args: HashMap<String, Value>,
        rationale: String,
    },
    Reply {
        text: String,
    },
    Done,
}

impl PlanStep {
    /// A stable, human-readable label for tracing and skeptic/verifier
    /// messages, independent of the variant's shape.
    pub fn label(&self) -> String {
        match self {
            PlanStep::Tool { server, tool, .. } => format!("{server}/{tool}"),
            PlanStep::Reply { .. } => "reply".to_string(),
            PlanStep::Done => "done".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct PlanResponse {
    steps: Vec<PlanStep>,
}

const PLANNER_SYSTEM_PROMPT: &str = r#"You turn a user's goal into an ordered list of steps.
Respond with JSON only, of the exact shape:
{"steps": [
  {"type": "tool", "server": "...", "tool": "...", "args": {...}, "rationale": "..."},
  {"type": "reply", "text": "..."},
  {"type": "done"}
]}
Use only tools that exist. End the plan with a "done" step once the goal is met.
Keep the plan as short as the goal allows. If revision feedback is given, address it."#;

/// Calls the `planner` role with `goal_text` and the list of tools
/// currently available, truncating to `max_steps` (spec §4.7 point 1:
/// "bounded by `autonomous_max_steps`"). `feedback`, when present, is the
/// Verifier's reason for asking for a revision (spec §4.7 point 3: "revise
/// (loop once)") and is appended to the user turn so the Planner can
/// address it directly.
pub async fn plan(
    provider: &Arc<dyn LlmProvider>,
    model: Option<&str>,
    goal_text: &str,
    available_tools: &[String],
    max_steps: usize,
    feedback: Option<&str>,
) -> Result<Vec<PlanStep>> {
    let mut user_turn = format!(
        "Goal: {goal_text}\nAvailable tools: {}",
        available_tools.join(", ")
    );
    if let Some(reason) = feedback {
        user_turn.push_str(&format!(
            "\nYour previous plan was sent back for revision: {reason}\nRevise the plan to address this."
        ));
    }

    let request = ChatRequest {
        messages: vec![Message::system(PLANNER_SYSTEM_PROMPT), Message::user(user_turn)],
        json_mode: true,
        model: model.map(|m| m.to_string()),
        ..Default::default()
    };

    let response = provider.chat(&request).await?;
    let parsed: PlanResponse = serde_json::from_str(&response.content).map_err(|e| {
        Error::surfaced(
            ErrorKind::Domain,
            "I couldn't turn that into a plan",
            format!("planner returned non-conforming JSON: {e}"),
        )
    })?;

    let mut steps = parsed.steps;
    steps.truncate(max_steps);
    Ok(steps)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_response_parses_minimal_shape() {
        let raw = r#"{"steps":[{"type":"tool","server":"fs","tool":"read","args":{"path":"x"},"rationale":"inspect"}]}"#;
        let parsed: PlanResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.steps.len(), 1);
        assert!(matches!(&parsed.steps[0], PlanStep::Tool { server, .. } if server == "fs"));
    }

    #[test]
    fn plan_response_parses_reply_and_done_steps() {
        let raw = r#"{"steps":[{"type":"reply","text":"on it"},{"type":"done"}]}"#;
        let parsed: PlanResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.steps.len(), 2);
        assert!(matches!(&parsed.steps[0], PlanStep::Reply { text } if text == "on it"));
        assert!(matches!(&parsed.steps[1], PlanStep::Done));
    }
}
