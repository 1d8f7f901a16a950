//! Debate Dispatcher (spec §4.7): turns a classified `action_request` into
//! a bounded, reviewed, and executed sequence of tool calls, then folds
//! the outcome back into the user's autonomy profile.
//!
//! Plan → Skeptic → Verifier → Execute → Reinforce. Only Plan calls an
//! LLM; Skeptic and Verifier are deterministic so the pipeline's safety
//! behavior doesn't depend on a model's mood that day.

mod execute;
mod plan;
mod reinforce;
mod skeptic;
mod verify;

use std::sync::Arc;
use std::time::{Duration, Instant};

use ac_clock::Clock;
use ac_domain::config::DebateConfig;
use ac_domain::entities::{DebateTrace, DecisionEvent, VerifierResult};
use ac_persistence::PersistenceGateway;
use ac_providers::registry::ProviderRegistry;
use ac_tool_router::ToolRouter;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::notification::Notification;

pub use plan::PlanStep;

/// A finished debate's result, returned to whatever triggered it (the
/// conversational turn handler in the outer system) as well as logged.
pub struct DebateOutcome {
    pub trace: DebateTrace,
    pub final_message: String,
}

pub struct DebateDispatcher {
    llm: Arc<ProviderRegistry>,
    tool_router: Arc<ToolRouter>,
    gateway: Arc<dyn PersistenceGateway>,
    clock: Arc<dyn Clock>,
    config: DebateConfig,
    notify_tx: mpsc::Sender<Notification>,
}

impl DebateDispatcher {
    pub fn new(
        llm: Arc<ProviderRegistry>,
        tool_router: Arc<ToolRouter>,
        gateway: Arc<dyn PersistenceGateway>,
        clock: Arc<dyn Clock>,
        config: DebateConfig,
        notify_tx: mpsc::Sender<Notification>,
    ) -> Arc<Self> {
        Arc::new(Self {
            llm,
            tool_router,
            gateway,
            clock,
            config,
            notify_tx,
        })
    }

    /// Runs the full pipeline for one classified `action_request`.
    pub async fn run(&self, user_id: &str, goal_text: &str) -> ac_domain::Result<DebateOutcome> {
        let started = Instant::now();
        let request_id = Uuid::new_v4();

        let provider = self.llm.for_role("planner").ok_or_else(|| {
            ac_domain::Error::surfaced(
                ac_domain::ErrorKind::Resource,
                "I don't have a planner available right now",
                "no provider registered for role 'planner'",
            )
        })?;
        let model = self.llm.model_for_role("planner");

        let available_tools: Vec<String> = self
            .tool_router
            .list_tools()
            .await
            .into_iter()
            .map(|t| format!("{}/{}", t.server_name, t.tool_name))
            .collect();

        let mut steps = plan::plan(
            &provider,
            model,
            goal_text,
            &available_tools,
            self.config.autonomous_max_steps,
            None,
        )
        .await?;

        // Skeptic/Verifier gate the whole plan before any step executes
        // (spec §4.7 point 3). A plan that comes back clean runs as-is; one
        // that asks for revision gets exactly one replan-and-reverify pass
        // before the debate gives up on it; a hard rejection never reaches
        // the Planner again.
        let (mut plan_verdict, mut skeptic_notes, mut plan_reason) = self.verify_plan(&steps);
        if plan_verdict == VerifierResult::Revise {
            tracing::info!(%request_id, reason = %plan_reason, "plan sent back for revision");
            let revised = plan::plan(
                &provider,
                model,
                goal_text,
                &available_tools,
                self.config.autonomous_max_steps,
                Some(&plan_reason),
            )
            .await?;
            let (revised_verdict, revised_notes, revised_reason) = self.verify_plan(&revised);
            steps = revised;
            plan_verdict = revised_verdict;
            skeptic_notes = revised_notes;
            plan_reason = revised_reason;
            if plan_verdict != VerifierResult::Approve {
                // Still not approved after the single allowed revision pass
                // rejects the whole debate (spec §4.7 point 3).
                plan_verdict = VerifierResult::Reject;
            }
        }

        let plan_text = steps.iter().map(describe_step).collect::<Vec<_>>().join("\n");
        let plan_steps = steps.len();

        let mut final_actions = Vec::new();
        let mut all_succeeded = true;
        let overall_result = plan_verdict;

        if overall_result == VerifierResult::Approve {
            for step in &steps {
                let (outcome, event) = execute::execute_step(
                    &self.tool_router,
                    user_id,
                    step,
                    Duration::from_secs(self.config.step_timeout_seconds),
                )
                .await;
                if let Err(e) = self.gateway.append_decision(event).await {
                    tracing::error!(error = %e, "failed to record debate step event");
                }
                let terminal = outcome.terminal;
                final_actions.push(outcome.summary.clone());
                if !outcome.succeeded {
                    all_succeeded = false;
                }
                if terminal {
                    break;
                }
            }
        } else {
            final_actions.push(format!("plan {overall_result:?}: {plan_reason}"));
            all_succeeded = false;
        }

        let trace = DebateTrace {
            request_id,
            plan_text,
            plan_steps,
            skeptic_notes,
            verifier_result: overall_result,
            final_actions: final_actions.clone(),
            elapsed_ms: started.elapsed().as_millis() as u64,
        };

        let summary_event = DecisionEvent::new(
            "debate_completed",
            "debate_dispatcher",
            format!("debate {request_id} finished with {overall_result:?}"),
        )
        .with_user(user_id)
        .with_detail("trace", serde_json::to_value(&trace).unwrap_or_default());
        if let Err(e) = self.gateway.append_decision(summary_event).await {
            tracing::error!(error = %e, "failed to record debate summary event");
        }

        let today = self.clock.now_utc().date_naive();
        let reinforcement = reinforce::build_event(
            user_id,
            overall_result,
            all_succeeded,
            format!("debate {request_id}: {overall_result:?}"),
        );
        if let Ok(Some(mut profile)) = self.gateway.load_profile(user_id).await {
            reinforce::apply(&mut profile, &reinforcement, today);
            if let Err(e) = self.gateway.save_profile(profile).await {
                tracing::error!(error = %e, "failed to persist reinforced profile");
            }
        }

        let final_message = match overall_result {
            VerifierResult::Approve if all_succeeded => {
                format!("Done. {}", final_actions.join("; "))
            }
            VerifierResult::Approve => {
                format!("Partially done. {}", final_actions.join("; "))
            }
            VerifierResult::Revise => {
                format!("I held off on part of this plan. {}", final_actions.join("; "))
            }
            VerifierResult::Reject => {
                format!("I won't carry this out as planned. {}", final_actions.join("; "))
            }
        };

        if self
            .notify_tx
            .send(Notification::debate(user_id.to_string(), final_message.clone()))
            .await
            .is_err()
        {
            tracing::warn!(%request_id, "notification channel closed after debate completion");
        }

        Ok(DebateOutcome { trace, final_message })
    }

    /// Runs Skeptic then Verifier over every step of `steps` and folds the
    /// per-step verdicts into one plan-level verdict: a single `Reject`
    /// anywhere rejects the whole plan outright; otherwise a single
    /// `Revise` anywhere sends the whole plan back; only a plan with no
    /// objections at all is approved (spec §4.7 point 3).
    fn verify_plan(&self, steps: &[PlanStep]) -> (VerifierResult, Vec<String>, String) {
        let mut skeptic_notes = Vec::new();
        let mut verdict = VerifierResult::Approve;
        let mut reasons = Vec::new();

        for (idx, step) in steps.iter().enumerate() {
            let steps_remaining = self.config.autonomous_max_steps.saturating_sub(idx);
            let notes = skeptic::review(step, steps_remaining);
            let (step_verdict, reason) = verify::check(step, &notes);
            skeptic_notes.extend(notes);

            match step_verdict {
                VerifierResult::Reject => {
                    verdict = VerifierResult::Reject;
                    reasons.push(reason);
                }
                VerifierResult::Revise if verdict != VerifierResult::Reject => {
                    verdict = VerifierResult::Revise;
                    reasons.push(reason);
                }
                _ => {}
            }
        }

        (verdict, skeptic_notes, reasons.join("; "))
    }
}

/// Renders one step for the `DebateTrace.plan_text` audit field, covering
/// every closed `PlanStep` variant.
fn describe_step(step: &PlanStep) -> String {
    match step {
        PlanStep::Tool { server, tool, rationale, .. } => format!("{server}/{tool}: {rationale}"),
        PlanStep::Reply { text } => format!("reply: {text}"),
        PlanStep::Done => "done".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ac_clock::SystemClock;
    use ac_domain::config::{LlmConfig, PersistenceConfig, RetryConfig, SupervisorConfig};
    use ac_mcp_client::McpManager;
    use ac_persistence::FileGateway;

    async fn dispatcher(dir: &std::path::Path) -> Arc<DebateDispatcher> {
        let gateway_cfg = PersistenceConfig {
            state_path: dir.to_path_buf(),
            retry: RetryConfig::default(),
        };
        let gateway: Arc<dyn PersistenceGateway> =
            Arc::new(FileGateway::new(&gateway_cfg, Duration::from_secs(10)));
        let manager = Arc::new(McpManager::from_config(&SupervisorConfig::default()).await);
        let tool_router = Arc::new(ToolRouter::new(manager, Duration::from_secs(30)));
        let llm = Arc::new(ProviderRegistry::from_config(&LlmConfig::default()).unwrap());
        let (tx, _rx) = mpsc::channel(16);
        DebateDispatcher::new(
            llm,
            tool_router,
            gateway,
            Arc::new(SystemClock),
            DebateConfig::default(),
            tx,
        )
    }

    #[tokio::test]
    async fn missing_planner_role_surfaces_resource_error() {
        let dir = tempfile::tempdir().unwrap();
        let dispatcher = dispatcher(dir.path()).await;
        let result = dispatcher.run("u1", "restart the deploy").await;
        let err = result.expect_err("no planner role configured");
        assert_eq!(err.kind(), ac_domain::ErrorKind::Resource);
    }

    fn tool_step(server: &str, tool: &str) -> PlanStep {
        PlanStep::Tool {
            server: server.into(),
            tool: tool.into(),
            args: std::collections::HashMap::new(),
            rationale: "because".into(),
        }
    }

    #[tokio::test]
    async fn a_rejected_later_step_rejects_the_whole_plan_before_any_step_runs() {
        let dir = tempfile::tempdir().unwrap();
        let dispatcher = dispatcher(dir.path()).await;
        let mut args = std::collections::HashMap::new();
        args.insert("path".into(), serde_json::Value::String("/etc/passwd".into()));
        let steps = vec![
            tool_step("fs", "read_file"),
            PlanStep::Tool {
                server: "fs".into(),
                tool: "read_file".into(),
                args,
                rationale: "because".into(),
            },
        ];
        let (verdict, _, _) = dispatcher.verify_plan(&steps);
        assert_eq!(verdict, VerifierResult::Reject);
    }

    #[tokio::test]
    async fn a_clean_plan_is_approved_as_a_whole() {
        let dir = tempfile::tempdir().unwrap();
        let dispatcher = dispatcher(dir.path()).await;
        let steps = vec![tool_step("fs", "read_file"), PlanStep::Done];
        let (verdict, notes, _) = dispatcher.verify_plan(&steps);
        assert_eq!(verdict, VerifierResult::Approve);
        assert!(notes.is_empty());
    }
}
