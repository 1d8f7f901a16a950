//! Inbound message router (spec §9): the transport-facing counterpart to
//! the outbound notification channel. A transport layer (out of scope per
//! spec §1) owns the sender half of this channel and pushes one
//! [`InboundMessage`] per user turn; [`spawn_router`] owns the receiver and
//! drives classify → gate on confidence → dispatch to the Scheduler Engine
//! or the Debate Dispatcher, the same way `main.rs`'s notification consumer
//! owns the paired outbound channel's receiver.

use ac_persistence::PersistenceGateway;
use tokio::sync::mpsc;

use crate::intent::Intent;
use crate::notification::Notification;
use crate::state::AppState;

/// One inbound conversational turn waiting to be classified and routed.
#[derive(Debug)]
pub struct InboundMessage {
    pub user_id: String,
    pub text: String,
    pub user_timezone: Option<String>,
    pub source_url: Option<String>,
}

/// Spawns the consumer loop that drains `intent_rx` for the lifetime of the
/// process. Returned handle is tracked alongside the scheduler's and
/// debate's tasks so `main.rs` can abort it on shutdown.
pub fn spawn_router(state: AppState, mut intent_rx: mpsc::Receiver<InboundMessage>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(message) = intent_rx.recv().await {
            route_one(&state, message).await;
        }
    })
}

/// Classifies one inbound message and dispatches it to the right
/// component (spec §4.6 / §4.7). `chat` never reaches either component: it
/// stays in the transport's own conversational turn, which this router has
/// no opinion about.
async fn route_one(state: &AppState, message: InboundMessage) {
    let now = state.clock.now_utc();
    let result = state.intent_classifier.classify(
        &message.text,
        now,
        message.user_timezone.as_deref(),
        message.source_url.as_deref(),
    );

    if let Some(event) = result.timezone_event {
        if let Err(e) = state.gateway.append_decision(event).await {
            tracing::error!(error = %e, "failed to record timezone-resolution decision event");
        }
    }

    match result.intent {
        Intent::Chat => {
            tracing::debug!(user_id = %message.user_id, confidence = result.confidence, "intent classified as chat");
        }
        Intent::ScheduleQuery => {
            let reply = match state.scheduler.list_tasks().await {
                Ok(tasks) => {
                    let mine: Vec<String> = tasks
                        .into_iter()
                        .filter(|t| t.owner_user == message.user_id && t.enabled)
                        .map(|t| format!("{} (kind={:?}, next_run_at={:?})", t.id, t.kind, t.next_run_at))
                        .collect();
                    if mine.is_empty() {
                        "you have no scheduled tasks".to_string()
                    } else {
                        mine.join("; ")
                    }
                }
                Err(e) => format!("I couldn't look up your schedule: {e}"),
            };
            if state
                .notify_tx
                .send(Notification::scheduler(message.user_id.clone(), reply))
                .await
                .is_err()
            {
                tracing::warn!(user_id = %message.user_id, "notification channel closed after schedule query");
            }
        }
        Intent::ScheduleAdd(draft) => {
            let reply = match state.scheduler.add_from_intent(message.user_id.clone(), draft).await {
                Ok(task) => format!("scheduled (next_run_at={:?})", task.next_run_at),
                Err(e) => format!("I couldn't set that up: {e}"),
            };
            if state
                .notify_tx
                .send(Notification::scheduler(message.user_id.clone(), reply))
                .await
                .is_err()
            {
                tracing::warn!(user_id = %message.user_id, "notification channel closed after schedule add");
            }
        }
        Intent::ActionRequest { goal_text } => {
            if let Err(e) = state.debate_dispatcher.run(&message.user_id, &goal_text).await {
                tracing::error!(user_id = %message.user_id, error = %e, "debate dispatch failed");
                if state
                    .notify_tx
                    .send(Notification::debate(
                        message.user_id.clone(),
                        "I ran into a problem working on that".to_string(),
                    ))
                    .await
                    .is_err()
                {
                    tracing::warn!(user_id = %message.user_id, "notification channel closed after debate failure");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ac_clock::SystemClock;
    use ac_domain::config::{LlmConfig, PersistenceConfig, RetryConfig, SupervisorConfig};
    use ac_domain::Config;
    use ac_mcp_client::McpManager;
    use ac_persistence::FileGateway;
    use ac_providers::registry::ProviderRegistry;
    use ac_tool_router::ToolRouter;
    use std::sync::Arc;
    use std::time::Duration;

    async fn state(dir: &std::path::Path) -> AppState {
        let config = Arc::new(Config::default());
        let gateway_cfg = PersistenceConfig {
            state_path: dir.to_path_buf(),
            retry: RetryConfig::default(),
        };
        let gateway: Arc<dyn PersistenceGateway> =
            Arc::new(FileGateway::new(&gateway_cfg, Duration::from_secs(10)));
        let clock: Arc<dyn ac_clock::Clock> = Arc::new(SystemClock);
        let manager = Arc::new(McpManager::from_config(&SupervisorConfig::default()).await);
        let tool_router = Arc::new(ToolRouter::new(manager.clone(), Duration::from_secs(30)));
        let llm = Arc::new(ProviderRegistry::from_config(&LlmConfig::default()).unwrap());
        let (notify_tx, _notify_rx) = mpsc::channel(16);
        let scheduler = crate::scheduler::SchedulerEngine::new(
            config.scheduler.clone(),
            clock.clone(),
            gateway.clone(),
            tool_router.clone(),
            notify_tx.clone(),
            "test-node".into(),
        );
        let intent_classifier = Arc::new(crate::intent::IntentClassifier::new(&config.intent, &config.clock));
        let debate_dispatcher = crate::debate::DebateDispatcher::new(
            llm.clone(),
            tool_router.clone(),
            gateway.clone(),
            clock.clone(),
            config.debate.clone(),
            notify_tx.clone(),
        );
        AppState {
            config,
            clock,
            gateway,
            mcp: manager,
            tool_router,
            llm,
            notify_tx,
            node_id: "test-node".into(),
            scheduler,
            intent_classifier,
            debate_dispatcher,
        }
    }

    #[tokio::test]
    async fn schedule_add_message_persists_a_task() {
        let dir = tempfile::tempdir().unwrap();
        let st = state(dir.path()).await;
        route_one(
            &st,
            InboundMessage {
                user_id: "u1".into(),
                text: "remind me in 10 minutes to check the oven".into(),
                user_timezone: Some("UTC".into()),
                source_url: None,
            },
        )
        .await;
        let tasks = st.scheduler.list_tasks().await.unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].owner_user, "u1");
    }

    #[tokio::test]
    async fn chat_message_dispatches_nowhere() {
        let dir = tempfile::tempdir().unwrap();
        let st = state(dir.path()).await;
        route_one(
            &st,
            InboundMessage {
                user_id: "u1".into(),
                text: "hey, how's it going?".into(),
                user_timezone: Some("UTC".into()),
                source_url: None,
            },
        )
        .await;
        assert!(st.scheduler.list_tasks().await.unwrap().is_empty());
    }
}
