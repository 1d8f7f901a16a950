//! Composition root (spec §9): builds every component leaf-first — Clock,
//! Persistence Gateway, Process Supervisor, Tool Registry, LLM provider
//! registry, Scheduler Engine, Intent Classifier, Debate Dispatcher — and
//! assembles the result into one `AppState`. Nothing downstream of this
//! module reaches back into a config file or environment variable; every
//! dependency flows in as an already-constructed `Arc`.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use ac_clock::{Clock, SystemClock};
use ac_domain::config::SchedulerConfig;
use ac_domain::entities::{Task, TaskKind, Trigger, WorkflowStep};
use ac_domain::Config;
use ac_mcp_client::McpManager;
use ac_persistence::{FileGateway, PersistenceGateway};
use ac_providers::registry::ProviderRegistry;
use ac_tool_router::ToolRouter;
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::debate::DebateDispatcher;
use crate::intent::IntentClassifier;
use crate::notification::Notification;
use crate::router::InboundMessage;
use crate::scheduler::SchedulerEngine;
use crate::state::AppState;

/// Bound on the outbound notification channel. Scheduler ticks and debates
/// both publish into this; a slow or absent transport consumer backs up
/// here rather than unboundedly, matching the event-queue cap idiom in
/// `SchedulerConfig::event_queue_max_size`.
const NOTIFICATION_CHANNEL_CAPACITY: usize = 1024;

/// Bound on the inbound intent channel, mirroring the outbound channel's
/// cap — a transport that outpaces classification backs up here rather
/// than unboundedly.
const INTENT_CHANNEL_CAPACITY: usize = 1024;

/// One entry of the optional YAML task-seed overlay (spec §4.5
/// "Persistence": tasks may be seeded from a file at boot). Mirrors `Task`
/// but omits the fields only the scheduler itself ever sets.
#[derive(Debug, Deserialize)]
struct TaskSeed {
    id: String,
    owner_user: String,
    kind: TaskKind,
    trigger: Trigger,
    #[serde(default = "default_true")]
    enabled: bool,
    #[serde(default)]
    payload: HashMap<String, Value>,
    #[serde(default)]
    steps: Vec<WorkflowStep>,
}

fn default_true() -> bool {
    true
}

/// Builds the full dependency graph and returns the `AppState` the CLI's
/// `serve` command runs, plus the `notify_rx` half of the outbound
/// notification channel and the `intent_rx` half of the inbound intent
/// channel, for a transport layer to consume and drive respectively (spec
/// §9: neither component holds a reference back to the transport).
pub async fn build_app_state(
    config: Config,
    node_id: String,
) -> anyhow::Result<(AppState, mpsc::Receiver<Notification>, mpsc::Receiver<InboundMessage>)> {
    let config = Arc::new(config);

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    tracing::info!("clock service ready");

    let gateway: Arc<dyn PersistenceGateway> = Arc::new(FileGateway::new(
        &config.persistence,
        Duration::from_secs(config.scheduler.state_publish_min_interval_seconds),
    ));
    tracing::info!(state_path = %config.persistence.state_path.display(), "persistence gateway ready");

    let mcp = Arc::new(McpManager::from_config(&config.supervisor).await);
    tracing::info!(servers = ?mcp.server_ids(), "process supervisor booted");

    let tool_router = Arc::new(ToolRouter::new(
        mcp.clone(),
        Duration::from_secs(config.tool_router.call_timeout_seconds),
    ));
    tracing::info!("tool registry ready");

    let llm = Arc::new(ProviderRegistry::from_config(&config.llm)?);
    tracing::info!(
        providers = llm.list_providers().len(),
        init_errors = llm.init_errors().len(),
        "LLM provider registry ready"
    );

    let (notify_tx, notify_rx) = mpsc::channel(NOTIFICATION_CHANNEL_CAPACITY);
    let (intent_tx, intent_rx) = mpsc::channel(INTENT_CHANNEL_CAPACITY);

    seed_tasks(&config.scheduler, clock.as_ref(), gateway.as_ref()).await?;

    let scheduler = SchedulerEngine::new(
        config.scheduler.clone(),
        clock.clone(),
        gateway.clone(),
        tool_router.clone(),
        notify_tx.clone(),
        node_id.clone(),
    );
    tracing::info!(%node_id, "scheduler engine ready");

    let intent_classifier = Arc::new(IntentClassifier::new(&config.intent, &config.clock));

    let debate_dispatcher = DebateDispatcher::new(
        llm.clone(),
        tool_router.clone(),
        gateway.clone(),
        clock.clone(),
        config.debate.clone(),
        notify_tx.clone(),
    );

    let state = AppState {
        config,
        clock,
        gateway,
        mcp,
        tool_router,
        llm,
        notify_tx,
        intent_tx,
        node_id,
        scheduler,
        intent_classifier,
        debate_dispatcher,
    };

    Ok((state, notify_rx, intent_rx))
}

/// Loads `scheduler.seed_path`, if set, and inserts any task whose id isn't
/// already present. Idempotent across restarts: a task already in the
/// gateway (because the scheduler has since mutated it) is left alone
/// rather than reset to its seed definition.
async fn seed_tasks(
    config: &SchedulerConfig,
    clock: &dyn Clock,
    gateway: &dyn PersistenceGateway,
) -> anyhow::Result<()> {
    let Some(path) = &config.seed_path else {
        return Ok(());
    };
    if !path.exists() {
        tracing::warn!(path = %path.display(), "scheduler seed_path configured but file does not exist, skipping");
        return Ok(());
    }

    let seeds = read_seed_file(path).await?;
    let existing: std::collections::HashSet<String> = gateway
        .load_tasks()
        .await?
        .into_iter()
        .map(|t| t.id)
        .collect();

    let mut seeded = 0usize;
    for seed in seeds {
        if existing.contains(&seed.id) {
            continue;
        }
        if let Err(e) = seed.trigger.validate() {
            tracing::warn!(task_id = %seed.id, error = %e, "skipping seed task with invalid trigger");
            continue;
        }
        let now = Utc::now();
        let next_run_at = match clock.next_fire(&seed.trigger, now) {
            Ok(next) => next,
            Err(e) => {
                tracing::warn!(task_id = %seed.id, error = %e, "skipping seed task with unresolvable trigger");
                continue;
            }
        };
        let task = Task {
            id: seed.id,
            owner_user: seed.owner_user,
            kind: seed.kind,
            trigger: seed.trigger,
            enabled: seed.enabled,
            payload: seed.payload,
            steps: seed.steps,
            last_run_at: None,
            next_run_at,
            last_result: None,
            failure_count: 0,
            disabled_reason: None,
            state: HashMap::new(),
            created_at: now,
            updated_at: now,
        };
        gateway.save_task(task).await?;
        seeded += 1;
    }
    if seeded > 0 {
        tracing::info!(count = seeded, path = %path.display(), "seeded tasks from overlay file");
    }
    Ok(())
}

async fn read_seed_file(path: &Path) -> anyhow::Result<Vec<TaskSeed>> {
    let path = path.to_path_buf();
    let contents = tokio::task::spawn_blocking(move || std::fs::read_to_string(&path)).await??;
    let seeds: Vec<TaskSeed> = serde_yaml::from_str(&contents)?;
    Ok(seeds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ac_domain::config::{PersistenceConfig, RetryConfig};

    fn gateway(dir: &std::path::Path) -> FileGateway {
        let cfg = PersistenceConfig {
            state_path: dir.to_path_buf(),
            retry: RetryConfig::default(),
        };
        FileGateway::new(&cfg, Duration::from_secs(10))
    }

    #[tokio::test]
    async fn seed_tasks_is_a_no_op_without_seed_path() {
        let dir = tempfile::tempdir().unwrap();
        let gw = gateway(dir.path());
        let config = SchedulerConfig::default();
        seed_tasks(&config, &SystemClock, &gw).await.unwrap();
        assert!(gw.load_tasks().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn seed_tasks_loads_yaml_overlay() {
        let dir = tempfile::tempdir().unwrap();
        let gw = gateway(dir.path());
        let seed_path = dir.path().join("seed.yaml");
        std::fs::write(
            &seed_path,
            r#"
- id: water-plants
  owner_user: u1
  kind: reminder
  trigger:
    kind: one_shot
    at_timestamp: "2030-01-01T00:00:00Z"
"#,
        )
        .unwrap();
        let mut config = SchedulerConfig::default();
        config.seed_path = Some(seed_path);
        seed_tasks(&config, &SystemClock, &gw).await.unwrap();
        let tasks = gw.load_tasks().await.unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].id, "water-plants");
        assert!(tasks[0].next_run_at.is_some());
    }

    #[tokio::test]
    async fn seed_tasks_skips_ids_already_present() {
        let dir = tempfile::tempdir().unwrap();
        let gw = gateway(dir.path());
        gw.save_task(Task {
            id: "water-plants".into(),
            owner_user: "u1".into(),
            kind: TaskKind::Reminder,
            trigger: Trigger::OneShot {
                at_timestamp: Utc::now(),
            },
            enabled: false,
            payload: HashMap::new(),
            steps: vec![],
            last_run_at: Some(Utc::now()),
            next_run_at: None,
            last_result: None,
            failure_count: 3,
            disabled_reason: None,
            state: HashMap::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        })
        .await
        .unwrap();

        let seed_path = dir.path().join("seed.yaml");
        std::fs::write(
            &seed_path,
            r#"
- id: water-plants
  owner_user: u1
  kind: reminder
  trigger:
    kind: one_shot
    at_timestamp: "2030-01-01T00:00:00Z"
"#,
        )
        .unwrap();
        let mut config = SchedulerConfig::default();
        config.seed_path = Some(seed_path);
        seed_tasks(&config, &SystemClock, &gw).await.unwrap();
        let tasks = gw.load_tasks().await.unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].failure_count, 3, "existing task left untouched");
    }
}
