//! Execute stage (spec §4.7 point 4): dispatches one approved plan step
//! through the Tool Registry under a per-step deadline and records the
//! outcome as a `DecisionEvent`. Transient failures are retried once with
//! a fresh deadline; `reply`/`done` steps never touch the tool router.

use std::time::Duration;

use ac_domain::entities::DecisionEvent;
use ac_mcp_client::McpError;
use ac_mcp_client::TransportError;
use ac_tool_router::{ToolRouter, ToolRouterError};

use super::plan::PlanStep;

pub struct StepOutcome {
    pub succeeded: bool,
    pub summary: String,
    /// Whether executing this step should end the debate loop — set for a
    /// `done` step (spec §4.7 point 4: "A `done` step terminates the loop").
    pub terminal: bool,
}

/// Whether `err` is the kind of failure spec §4.7's Failure semantics calls
/// for retrying once: a timeout or a transport-level hiccup, as opposed to
/// a durable rejection like invalid args or an unavailable server.
fn is_transient(err: &ToolRouterError) -> bool {
    matches!(
        err,
        ToolRouterError::Timeout { .. }
            | ToolRouterError::Mcp(McpError::Transport(TransportError::Timeout))
            | ToolRouterError::Mcp(McpError::Transport(TransportError::Io(_)))
            | ToolRouterError::Mcp(McpError::Transport(TransportError::ProcessExited))
    )
}

pub async fn execute_step(
    tool_router: &ToolRouter,
    user_id: &str,
    step: &PlanStep,
    timeout: Duration,
) -> (StepOutcome, DecisionEvent) {
    match step {
        PlanStep::Tool { server, tool, args, .. } => {
            let value = serde_json::Value::Object(args.clone().into_iter().collect());
            let mut attempt = 0u32;
            loop {
                attempt += 1;
                match tool_router.call(server, tool, value.clone(), Some(timeout)).await {
                    Ok(result) => {
                        let summary = format!("{server}/{tool} succeeded");
                        let event =
                            DecisionEvent::new("debate_step_executed", "debate_dispatcher", summary.clone())
                                .with_user(user_id)
                                .with_detail("server", server.clone())
                                .with_detail("tool", tool.clone())
                                .with_detail("result", result);
                        return (
                            StepOutcome {
                                succeeded: true,
                                summary,
                                terminal: false,
                            },
                            event,
                        );
                    }
                    Err(e) if attempt == 1 && is_transient(&e) => {
                        tracing::warn!(%server, %tool, error = %e, "transient step failure, retrying once");
                        continue;
                    }
                    Err(e) => {
                        let summary = format!("{server}/{tool} failed: {e}");
                        let event =
                            DecisionEvent::new("debate_step_failed", "debate_dispatcher", summary.clone())
                                .with_user(user_id)
                                .with_detail("server", server.clone())
                                .with_detail("tool", tool.clone());
                        return (
                            StepOutcome {
                                succeeded: false,
                                summary,
                                terminal: false,
                            },
                            event,
                        );
                    }
                }
            }
        }
        PlanStep::Reply { text } => {
            let summary = format!("replied: {text}");
            let event = DecisionEvent::new("debate_step_reply", "debate_dispatcher", summary.clone())
                .with_user(user_id)
                .with_detail("text", text.clone());
            (
                StepOutcome {
                    succeeded: true,
                    summary,
                    terminal: false,
                },
                event,
            )
        }
        PlanStep::Done => {
            let summary = "plan completed".to_string();
            let event = DecisionEvent::new("debate_step_done", "debate_dispatcher", summary.clone())
                .with_user(user_id);
            (
                StepOutcome {
                    succeeded: true,
                    summary,
                    terminal: true,
                },
                event,
            )
        }
    }
}
