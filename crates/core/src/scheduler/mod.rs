//! Scheduler Engine (spec §4.5): single-runner lock, fire-loop tick, and
//! per-task dispatch. A dedicated task holds the `scheduler_main` lock and
//! heartbeats it; a second task ticks on a fixed interval and only acts
//! while this process holds the lock, so exactly one node in a multi-node
//! deployment fires tasks at a time.

mod workflow;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ac_clock::Clock;
use ac_domain::config::SchedulerConfig;
use ac_domain::entities::{DecisionEvent, Task, TaskKind};
use ac_domain::{Error, ErrorKind};
use ac_persistence::PersistenceGateway;
use ac_tool_router::ToolRouter;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::intent::ScheduleDraft;
use crate::notification::Notification;

const SCHEDULER_LOCK_NAME: &str = "scheduler_main";

pub struct SchedulerEngine {
    config: SchedulerConfig,
    clock: Arc<dyn Clock>,
    gateway: Arc<dyn PersistenceGateway>,
    tool_router: Arc<ToolRouter>,
    notify_tx: mpsc::Sender<Notification>,
    node_id: String,
    active: AtomicBool,
    http: reqwest::Client,
}

impl SchedulerEngine {
    pub fn new(
        config: SchedulerConfig,
        clock: Arc<dyn Clock>,
        gateway: Arc<dyn PersistenceGateway>,
        tool_router: Arc<ToolRouter>,
        notify_tx: mpsc::Sender<Notification>,
        node_id: String,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            clock,
            gateway,
            tool_router,
            notify_tx,
            node_id,
            active: AtomicBool::new(false),
            http: reqwest::Client::new(),
        })
    }

    /// Spawns the lock-holding task and the fire-loop tick task. Both run
    /// for the lifetime of the process; callers hold the returned handles
    /// only to join them on shutdown.
    pub fn spawn(self: &Arc<Self>) -> (JoinHandle<()>, JoinHandle<()>) {
        let lock_task = {
            let this = self.clone();
            tokio::spawn(async move { this.lock_loop().await })
        };
        let tick_task = {
            let this = self.clone();
            tokio::spawn(async move { this.tick_loop().await })
        };
        (lock_task, tick_task)
    }

    async fn lock_loop(self: Arc<Self>) {
        loop {
            match self
                .gateway
                .acquire_lock(SCHEDULER_LOCK_NAME, self.config.lock_ttl_seconds, &self.node_id)
                .await
            {
                Ok(true) => {
                    tracing::info!(node_id = %self.node_id, "scheduler lock acquired");
                    self.active.store(true, Ordering::SeqCst);
                    self.hold_lock().await;
                    self.active.store(false, Ordering::SeqCst);
                    tracing::warn!(node_id = %self.node_id, "scheduler lock lost, retrying");
                }
                Ok(false) => {}
                Err(e) => tracing::error!(error = %e, "failed to acquire scheduler lock"),
            }
            tokio::time::sleep(Duration::from_secs(self.config.heartbeat_seconds.max(1))).await;
        }
    }

    async fn hold_lock(&self) {
        let period = Duration::from_secs(self.config.heartbeat_seconds.max(1));
        loop {
            tokio::time::sleep(period).await;
            match self.gateway.heartbeat_lock(SCHEDULER_LOCK_NAME, &self.node_id).await {
                Ok(true) => continue,
                Ok(false) => return,
                Err(e) => {
                    tracing::error!(error = %e, "scheduler lock heartbeat failed");
                    return;
                }
            }
        }
    }

    async fn tick_loop(self: Arc<Self>) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.config.tick_seconds.max(1)));
        loop {
            interval.tick().await;
            if self.active.load(Ordering::SeqCst) {
                if let Err(e) = self.tick().await {
                    tracing::error!(error = %e, "scheduler tick failed");
                }
            }
        }
    }

    /// One fire-loop tick: loads due tasks, advances each one's
    /// `next_run_at` before executing it (spec §4.5 point 2: crash between
    /// advance and execute reruns nothing, never loops), then publishes a
    /// rate-limited snapshot of upcoming work.
    pub async fn tick(&self) -> ac_domain::Result<()> {
        let now = self.clock.now_utc();
        let tasks = self.gateway.load_tasks().await?;
        let mut due: Vec<Task> = tasks
            .into_iter()
            .filter(|t| t.enabled && t.next_run_at.map(|n| n <= now).unwrap_or(false))
            .collect();
        due.sort_by(|a, b| a.id.cmp(&b.id));

        for mut task in due {
            self.fire(&mut task, now).await;
        }

        self.publish_snapshot(now).await?;
        Ok(())
    }

    /// Admin surface backing the `/schedule` commands (spec §4.5
    /// Contract: "Supports immediate ad-hoc run, enable/disable, add,
    /// remove"). Tasks remain exclusively owned by the Scheduler Engine
    /// (spec §5 shared-resource policy) — callers go through these
    /// methods rather than the gateway directly.
    pub async fn list_tasks(&self) -> ac_domain::Result<Vec<Task>> {
        self.gateway.load_tasks().await
    }

    pub async fn add_task(&self, mut task: Task) -> ac_domain::Result<Task> {
        let now = self.clock.now_utc();
        task.created_at = now;
        task.updated_at = now;
        if task.next_run_at.is_none() {
            task.next_run_at = self.clock.next_fire(&task.trigger, now).map_err(|e| {
                Error::surfaced(ErrorKind::Domain, "that schedule isn't valid", e.to_string())
            })?;
        }
        self.gateway.save_task(task.clone()).await?;
        Ok(task)
    }

    /// Validates, persists, and confirms a `schedule_add` intent (spec
    /// §4.5 "Natural-language intent"): rejects with
    /// [`Error::AmbiguousIntent`] when the draft's trigger — and by
    /// extension its timezone/at-time — can't be resolved to a concrete
    /// next fire time with confidence, rather than silently scheduling
    /// something the user didn't mean.
    pub async fn add_from_intent(&self, owner_user: String, draft: ScheduleDraft) -> ac_domain::Result<Task> {
        draft
            .trigger
            .validate()
            .map_err(|e| Error::AmbiguousIntent(format!("couldn't resolve that schedule: {e}")))?;

        let now = self.clock.now_utc();
        let next_run_at = self
            .clock
            .next_fire(&draft.trigger, now)
            .map_err(|e| Error::AmbiguousIntent(format!("couldn't resolve that schedule: {e}")))?
            .ok_or_else(|| {
                Error::AmbiguousIntent("that time is already in the past".to_string())
            })?;

        let task = Task {
            id: Uuid::new_v4().to_string(),
            owner_user,
            kind: draft.kind,
            trigger: draft.trigger,
            enabled: true,
            payload: draft.payload,
            steps: draft.steps,
            last_run_at: None,
            next_run_at: Some(next_run_at),
            last_result: None,
            failure_count: 0,
            disabled_reason: None,
            state: std::collections::HashMap::new(),
            created_at: now,
            updated_at: now,
        };
        self.gateway.save_task(task.clone()).await?;
        Ok(task)
    }

    pub async fn remove_task(&self, id: &str) -> ac_domain::Result<()> {
        self.gateway.delete_task(id).await
    }

    async fn load_one(&self, id: &str) -> ac_domain::Result<Task> {
        self.gateway
            .load_tasks()
            .await?
            .into_iter()
            .find(|t| t.id == id)
            .ok_or_else(|| Error::NotFound(format!("task '{id}'")))
    }

    pub async fn set_enabled(&self, id: &str, enabled: bool) -> ac_domain::Result<Task> {
        let mut task = self.load_one(id).await?;
        task.enabled = enabled;
        task.updated_at = self.clock.now_utc();
        self.gateway.save_task(task.clone()).await?;
        Ok(task)
    }

    /// Backs `schedule set`: replaces an existing task's trigger and
    /// recomputes `next_run_at`, without disturbing its id, steps, or
    /// accumulated `failure_count`.
    pub async fn set_trigger(&self, id: &str, trigger: ac_domain::entities::Trigger) -> ac_domain::Result<Task> {
        trigger
            .validate()
            .map_err(|e| Error::surfaced(ErrorKind::Domain, "that schedule isn't valid", e))?;
        let mut task = self.load_one(id).await?;
        let now = self.clock.now_utc();
        task.next_run_at = self.clock.next_fire(&trigger, now).map_err(|e| {
            Error::surfaced(ErrorKind::Domain, "that schedule isn't valid", e.to_string())
        })?;
        task.trigger = trigger;
        task.updated_at = now;
        self.gateway.save_task(task.clone()).await?;
        Ok(task)
    }

    /// Fires `id` immediately regardless of `next_run_at`, exactly the way
    /// the regular fire loop would (spec §4.5 "immediate ad-hoc run").
    pub async fn run_now(&self, id: &str) -> ac_domain::Result<Task> {
        let mut task = self.load_one(id).await?;
        let now = self.clock.now_utc();
        self.fire(&mut task, now).await;
        Ok(task)
    }

    async fn fire(&self, task: &mut Task, now: DateTime<Utc>) {
        let next = match self.clock.next_fire(&task.trigger, now) {
            Ok(next) => next,
            Err(e) => {
                tracing::error!(task_id = %task.id, error = %e, "failed to compute next fire time");
                None
            }
        };
        task.next_run_at = next;
        task.updated_at = now;
        if let Err(e) = self.gateway.save_task(task.clone()).await {
            tracing::error!(task_id = %task.id, error = %e, "failed to persist advanced schedule");
            return;
        }

        match self.dispatch(task).await {
            Ok(()) => task.record_success(now, task.next_run_at),
            Err(e) => {
                task.record_failure(now, task.next_run_at);
                let event = DecisionEvent::new("workflow_step_failed", "scheduler", e.to_string())
                    .with_detail("task_id", task.id.clone());
                if let Err(log_err) = self.gateway.append_decision(event).await {
                    tracing::error!(task_id = %task.id, error = %log_err, "failed to record decision event");
                }
            }
        }

        if matches!(task.kind, TaskKind::OneShot) {
            task.enabled = false;
        }
        if let Err(e) = self.gateway.save_task(task.clone()).await {
            tracing::error!(task_id = %task.id, error = %e, "failed to persist task outcome");
        }
    }

    async fn dispatch(&self, task: &mut Task) -> ac_domain::Result<()> {
        match task.kind {
            TaskKind::Interval | TaskKind::Cron | TaskKind::Reminder | TaskKind::OneShot => {
                let message = task
                    .payload
                    .get("message")
                    .and_then(|v| v.as_str())
                    .unwrap_or("your scheduled task fired")
                    .to_string();
                self.notify_tx
                    .send(Notification::scheduler(task.owner_user.clone(), message))
                    .await
                    .map_err(|_| {
                        Error::surfaced(
                            ErrorKind::Resource,
                            "could not deliver your reminder right now",
                            "notification channel closed",
                        )
                    })
            }
            TaskKind::Workflow => {
                let outcome = workflow::run_workflow(
                    task,
                    &self.http,
                    &self.tool_router,
                    Duration::from_secs(self.config.workflow_http_timeout_seconds),
                    self.config.workflow_http_retries,
                    Duration::from_secs(self.config.workflow_step_timeout_seconds),
                )
                .await?;
                task.state.extend(outcome.persisted_state);
                for text in outcome.notifications {
                    if self
                        .notify_tx
                        .send(Notification::scheduler(task.owner_user.clone(), text))
                        .await
                        .is_err()
                    {
                        tracing::warn!(task_id = %task.id, "notification channel closed mid-workflow");
                    }
                }
                Ok(())
            }
        }
    }

    async fn publish_snapshot(&self, now: DateTime<Utc>) -> ac_domain::Result<()> {
        let tasks = self.gateway.load_tasks().await?;
        let mut upcoming: Vec<serde_json::Value> = tasks
            .iter()
            .filter(|t| t.enabled)
            .map(|t| {
                serde_json::json!({
                    "id": t.id,
                    "owner_user": t.owner_user,
                    "kind": t.kind,
                    "next_run_at": t.next_run_at,
                })
            })
            .collect();
        upcoming.sort_by_key(|v| v["next_run_at"].as_str().unwrap_or_default().to_string());
        self.gateway
            .publish_state(serde_json::json!({ "generated_at": now, "upcoming_tasks": upcoming }))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ac_clock::SystemClock;
    use ac_domain::entities::Trigger;
    use ac_mcp_client::McpManager;
    use ac_persistence::FileGateway;
    use std::collections::HashMap;

    fn gateway(dir: &std::path::Path) -> Arc<dyn PersistenceGateway> {
        let cfg = ac_domain::config::PersistenceConfig {
            state_path: dir.to_path_buf(),
            retry: ac_domain::config::RetryConfig::default(),
        };
        Arc::new(FileGateway::new(&cfg, Duration::from_secs(10)))
    }

    async fn engine(dir: &std::path::Path) -> Arc<SchedulerEngine> {
        let manager = Arc::new(McpManager::from_config(&ac_domain::config::SupervisorConfig::default()).await);
        let router = Arc::new(ToolRouter::new(manager, Duration::from_secs(30)));
        let (tx, _rx) = mpsc::channel(16);
        SchedulerEngine::new(
            SchedulerConfig::default(),
            Arc::new(SystemClock),
            gateway(dir),
            router,
            tx,
            "test-node".into(),
        )
    }

    fn reminder_task(id: &str, due: DateTime<Utc>) -> Task {
        let now = Utc::now();
        let mut payload = HashMap::new();
        payload.insert("message".into(), serde_json::Value::String("water the plants".into()));
        Task {
            id: id.into(),
            owner_user: "u1".into(),
            kind: TaskKind::OneShot,
            trigger: Trigger::OneShot { at_timestamp: due },
            enabled: true,
            payload,
            steps: vec![],
            last_run_at: None,
            next_run_at: Some(due),
            last_result: None,
            failure_count: 0,
            disabled_reason: None,
            state: HashMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn due_one_shot_task_notifies_and_disables() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path()).await;
        let now = Utc::now();
        engine.gateway.save_task(reminder_task("t1", now)).await.unwrap();

        engine.tick().await.unwrap();

        let tasks = engine.gateway.load_tasks().await.unwrap();
        let t = tasks.iter().find(|t| t.id == "t1").unwrap();
        assert!(!t.enabled, "one-shot task should disable itself after firing");
        assert!(t.last_run_at.is_some());
    }

    #[tokio::test]
    async fn not_yet_due_task_is_left_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path()).await;
        let future = Utc::now() + chrono::Duration::hours(1);
        engine.gateway.save_task(reminder_task("t2", future)).await.unwrap();

        engine.tick().await.unwrap();

        let tasks = engine.gateway.load_tasks().await.unwrap();
        let t = tasks.iter().find(|t| t.id == "t2").unwrap();
        assert!(t.enabled);
        assert!(t.last_run_at.is_none());
    }

    #[tokio::test]
    async fn add_task_computes_next_run_at_when_absent() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path()).await;
        let mut task = reminder_task("t3", Utc::now() + chrono::Duration::hours(1));
        task.next_run_at = None;
        let saved = engine.add_task(task).await.unwrap();
        assert!(saved.next_run_at.is_some());
        assert_eq!(engine.list_tasks().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn remove_task_deletes_it() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path()).await;
        engine
            .gateway
            .save_task(reminder_task("t4", Utc::now() + chrono::Duration::hours(1)))
            .await
            .unwrap();
        engine.remove_task("t4").await.unwrap();
        assert!(engine.list_tasks().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn set_enabled_toggles_flag() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path()).await;
        engine
            .gateway
            .save_task(reminder_task("t5", Utc::now() + chrono::Duration::hours(1)))
            .await
            .unwrap();
        let updated = engine.set_enabled("t5", false).await.unwrap();
        assert!(!updated.enabled);
    }

    #[tokio::test]
    async fn set_enabled_unknown_task_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path()).await;
        let err = engine.set_enabled("missing", false).await.unwrap_err();
        assert_eq!(err.kind(), ac_domain::ErrorKind::Domain);
    }

    #[tokio::test]
    async fn run_now_fires_regardless_of_next_run_at() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path()).await;
        let future = Utc::now() + chrono::Duration::hours(1);
        engine.gateway.save_task(reminder_task("t6", future)).await.unwrap();
        engine.run_now("t6").await.unwrap();
        let tasks = engine.gateway.load_tasks().await.unwrap();
        let t = tasks.iter().find(|t| t.id == "t6").unwrap();
        assert!(t.last_run_at.is_some());
    }

    #[tokio::test]
    async fn set_trigger_rejects_invalid_interval() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path()).await;
        engine
            .gateway
            .save_task(reminder_task("t7", Utc::now() + chrono::Duration::hours(1)))
            .await
            .unwrap();
        let result = engine
            .set_trigger(
                "t7",
                Trigger::Interval {
                    interval_seconds: 0,
                    anchor: Utc::now(),
                },
            )
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn add_from_intent_persists_a_resolvable_draft() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path()).await;
        let draft = ScheduleDraft {
            kind: TaskKind::Interval,
            trigger: Trigger::Interval {
                interval_seconds: 60,
                anchor: Utc::now(),
            },
            steps: vec![],
            payload: HashMap::new(),
        };
        let task = engine.add_from_intent("u1".into(), draft).await.unwrap();
        assert!(task.next_run_at.is_some());
        assert_eq!(engine.list_tasks().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn add_from_intent_rejects_an_invalid_trigger_as_ambiguous() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path()).await;
        let draft = ScheduleDraft {
            kind: TaskKind::Interval,
            trigger: Trigger::Interval {
                interval_seconds: 0,
                anchor: Utc::now(),
            },
            steps: vec![],
            payload: HashMap::new(),
        };
        let err = engine.add_from_intent("u1".into(), draft).await.unwrap_err();
        assert!(matches!(err, ac_domain::Error::AmbiguousIntent(_)));
    }

    #[tokio::test]
    async fn set_trigger_updates_next_run_at() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path()).await;
        engine
            .gateway
            .save_task(reminder_task("t8", Utc::now() + chrono::Duration::hours(1)))
            .await
            .unwrap();
        let anchor = Utc::now() + chrono::Duration::minutes(5);
        let updated = engine
            .set_trigger(
                "t8",
                Trigger::Interval {
                    interval_seconds: 60,
                    anchor,
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.next_run_at, Some(anchor));
    }
}
