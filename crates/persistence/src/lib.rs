//! Durable storage for tasks, locks, decision/reinforcement logs, autonomy
//! profiles, and scheduler state snapshots (spec §4.2).

mod retry;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex as StdMutex;
use std::time::{Duration, Instant};

use ac_domain::config::{PersistenceConfig, RetryConfig};
use ac_domain::entities::{AutonomyProfile, DecisionEvent, TaskLock};
use ac_domain::{Error, Result, Task};
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

/// Every mutating operation is idempotent where the table in spec §4.2
/// says so, and every operation is wrapped in the bounded retry policy by
/// the implementation, not by callers.
#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    async fn save_task(&self, task: Task) -> Result<()>;
    async fn load_tasks(&self) -> Result<Vec<Task>>;
    async fn delete_task(&self, id: &str) -> Result<()>;
    async fn acquire_lock(&self, name: &str, ttl_seconds: i64, holder: &str) -> Result<bool>;
    async fn heartbeat_lock(&self, name: &str, holder: &str) -> Result<bool>;
    async fn append_decision(&self, event: DecisionEvent) -> Result<()>;
    async fn save_profile(&self, profile: AutonomyProfile) -> Result<()>;
    async fn load_profile(&self, user_id: &str) -> Result<Option<AutonomyProfile>>;
    /// Writes a KV snapshot of scheduler state, rate-limited by the
    /// configured min-interval. Returns `false` when the write was
    /// skipped because the floor hasn't elapsed yet.
    async fn publish_state(&self, snapshot: serde_json::Value) -> Result<bool>;
}

/// Caps the in-memory decision-event ring buffer mirrored alongside the
/// durable append-only log (spec §4.2: "optionally mirrored to KV ring
/// buffer").
const DECISION_RING_BUFFER_CAP: usize = 1000;

struct FileGatewayState {
    tasks: HashMap<String, Task>,
    locks: HashMap<String, TaskLock>,
    profiles: HashMap<String, AutonomyProfile>,
    decision_ring: std::collections::VecDeque<DecisionEvent>,
}

/// Default `PersistenceGateway` backed by JSON files under a state
/// directory. No pack crate depends on sqlx/redis/postgres, so this is
/// the concrete backend; the trait boundary is where a networked store
/// would slot in later.
pub struct FileGateway {
    state_dir: PathBuf,
    retry: RetryConfig,
    state_publish_min_interval: Duration,
    inner: RwLock<FileGatewayState>,
    last_publish: StdMutex<Option<Instant>>,
}

impl FileGateway {
    pub fn new(config: &PersistenceConfig, state_publish_min_interval: Duration) -> Self {
        let state_dir = config.state_path.clone();
        let inner = FileGatewayState {
            tasks: Self::load_json(&state_dir, "tasks.json").unwrap_or_default(),
            locks: Self::load_json(&state_dir, "locks.json").unwrap_or_default(),
            profiles: Self::load_json(&state_dir, "profiles.json").unwrap_or_default(),
            decision_ring: std::collections::VecDeque::new(),
        };
        Self {
            state_dir,
            retry: config.retry.clone(),
            state_publish_min_interval,
            inner: RwLock::new(inner),
            last_publish: StdMutex::new(None),
        }
    }

    fn load_json<T: serde::de::DeserializeOwned>(dir: &Path, file: &str) -> Option<T> {
        let data = std::fs::read_to_string(dir.join(file)).ok()?;
        serde_json::from_str(&data).ok()
    }

    async fn persist_tasks(&self, tasks: &HashMap<String, Task>) -> Result<()> {
        self.write_json("tasks.json", tasks).await
    }

    async fn persist_locks(&self, locks: &HashMap<String, TaskLock>) -> Result<()> {
        self.write_json("locks.json", locks).await
    }

    async fn persist_profiles(&self, profiles: &HashMap<String, AutonomyProfile>) -> Result<()> {
        self.write_json("profiles.json", profiles).await
    }

    async fn write_json<T: serde::Serialize>(&self, file: &str, value: &T) -> Result<()> {
        let json = serde_json::to_string_pretty(value)?;
        let path = self.state_dir.join(file);
        tokio::task::spawn_blocking(move || {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, json)
        })
        .await
        .map_err(|e| Error::Other(e.to_string()))??;
        Ok(())
    }

    async fn append_decision_log(&self, event: &DecisionEvent) -> Result<()> {
        let line = serde_json::to_string(event)? + "\n";
        let path = self.state_dir.join("decisions.jsonl");
        tokio::task::spawn_blocking(move || {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            use std::io::Write;
            let mut f = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)?;
            f.write_all(line.as_bytes())
        })
        .await
        .map_err(|e| Error::Other(e.to_string()))??;
        Ok(())
    }
}

#[async_trait]
impl PersistenceGateway for FileGateway {
    async fn save_task(&self, task: Task) -> Result<()> {
        retry::with_retry(&self.retry, || {
            let task = task.clone();
            async move {
                let mut guard = self.inner.write().await;
                if let Some(existing) = guard.tasks.get(&task.id) {
                    if existing.updated_at > task.updated_at {
                        return Err(Error::Conflict(format!(
                            "task {} has a newer updated_at on disk",
                            task.id
                        )));
                    }
                }
                guard.tasks.insert(task.id.clone(), task);
                let snapshot = guard.tasks.clone();
                drop(guard);
                self.persist_tasks(&snapshot).await
            }
        })
        .await
    }

    async fn load_tasks(&self) -> Result<Vec<Task>> {
        let guard = self.inner.read().await;
        Ok(guard.tasks.values().cloned().collect())
    }

    async fn delete_task(&self, id: &str) -> Result<()> {
        retry::with_retry(&self.retry, || async move {
            let mut guard = self.inner.write().await;
            guard.tasks.remove(id);
            let snapshot = guard.tasks.clone();
            drop(guard);
            self.persist_tasks(&snapshot).await
        })
        .await
    }

    async fn acquire_lock(&self, name: &str, ttl_seconds: i64, holder: &str) -> Result<bool> {
        retry::with_retry(&self.retry, || async move {
            let now = Utc::now();
            let mut guard = self.inner.write().await;
            let acquired = match guard.locks.get(name) {
                Some(existing) if existing.holder_id == holder => true,
                Some(existing) if existing.is_live(now) => false,
                _ => true,
            };
            if acquired {
                guard
                    .locks
                    .insert(name.to_string(), TaskLock::new(name, holder, ttl_seconds, now));
                let snapshot = guard.locks.clone();
                drop(guard);
                self.persist_locks(&snapshot).await?;
            }
            Ok(acquired)
        })
        .await
    }

    async fn heartbeat_lock(&self, name: &str, holder: &str) -> Result<bool> {
        retry::with_retry(&self.retry, || async move {
            let now = Utc::now();
            let mut guard = self.inner.write().await;
            match guard.locks.get_mut(name) {
                Some(lock) if lock.holder_id == holder && lock.is_live(now) => {
                    lock.refresh(now);
                    let snapshot = guard.locks.clone();
                    drop(guard);
                    self.persist_locks(&snapshot).await?;
                    Ok(true)
                }
                _ => Ok(false),
            }
        })
        .await
    }

    async fn append_decision(&self, event: DecisionEvent) -> Result<()> {
        retry::with_retry(&self.retry, || {
            let event = event.clone();
            async move {
                self.append_decision_log(&event).await?;
                let mut guard = self.inner.write().await;
                guard.decision_ring.push_back(event);
                while guard.decision_ring.len() > DECISION_RING_BUFFER_CAP {
                    guard.decision_ring.pop_front();
                }
                Ok(())
            }
        })
        .await
    }

    async fn save_profile(&self, profile: AutonomyProfile) -> Result<()> {
        retry::with_retry(&self.retry, || {
            let profile = profile.clone();
            async move {
                let mut guard = self.inner.write().await;
                guard.profiles.insert(profile.user_id.clone(), profile);
                let snapshot = guard.profiles.clone();
                drop(guard);
                self.persist_profiles(&snapshot).await
            }
        })
        .await
    }

    async fn load_profile(&self, user_id: &str) -> Result<Option<AutonomyProfile>> {
        let guard = self.inner.read().await;
        Ok(guard.profiles.get(user_id).cloned())
    }

    async fn publish_state(&self, snapshot: serde_json::Value) -> Result<bool> {
        {
            let mut last = self.last_publish.lock().unwrap();
            let now = Instant::now();
            if let Some(prev) = *last {
                if now.duration_since(prev) < self.state_publish_min_interval {
                    return Ok(false);
                }
            }
            *last = Some(now);
        }
        retry::with_retry(&self.retry, || {
            let snapshot = snapshot.clone();
            async move { self.write_json("scheduler_state.json", &snapshot).await }
        })
        .await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ac_domain::entities::{Trigger, TaskKind};
    use std::collections::HashMap as Map;

    fn config(dir: &Path) -> PersistenceConfig {
        PersistenceConfig {
            state_path: dir.to_path_buf(),
            retry: RetryConfig {
                base_delay_ms: 1,
                factor: 1.0,
                max_attempts: 1,
            },
        }
    }

    fn sample_task(id: &str) -> Task {
        let now = Utc::now();
        Task {
            id: id.to_string(),
            owner_user: "u1".into(),
            kind: TaskKind::Interval,
            trigger: Trigger::Interval {
                interval_seconds: 60,
                anchor: now,
            },
            enabled: true,
            payload: Map::new(),
            steps: vec![],
            last_run_at: None,
            next_run_at: None,
            last_result: None,
            failure_count: 0,
            disabled_reason: None,
            state: Map::new(),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn save_and_load_task_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let gw = FileGateway::new(&config(dir.path()), Duration::from_secs(10));
        gw.save_task(sample_task("t1")).await.unwrap();
        let tasks = gw.load_tasks().await.unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].id, "t1");
    }

    #[tokio::test]
    async fn save_task_rejects_stale_updated_at() {
        let dir = tempfile::tempdir().unwrap();
        let gw = FileGateway::new(&config(dir.path()), Duration::from_secs(10));
        let mut t = sample_task("t1");
        gw.save_task(t.clone()).await.unwrap();
        t.updated_at = t.updated_at - chrono::Duration::seconds(5);
        let err = gw.save_task(t).await.unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[tokio::test]
    async fn delete_task_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let gw = FileGateway::new(&config(dir.path()), Duration::from_secs(10));
        gw.save_task(sample_task("t1")).await.unwrap();
        gw.delete_task("t1").await.unwrap();
        gw.delete_task("t1").await.unwrap();
        assert!(gw.load_tasks().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn acquire_lock_is_exclusive_until_expiry() {
        let dir = tempfile::tempdir().unwrap();
        let gw = FileGateway::new(&config(dir.path()), Duration::from_secs(10));
        assert!(gw.acquire_lock("scheduler_main", 30, "node-a").await.unwrap());
        assert!(!gw.acquire_lock("scheduler_main", 30, "node-b").await.unwrap());
        assert!(gw.acquire_lock("scheduler_main", 30, "node-a").await.unwrap());
    }

    #[tokio::test]
    async fn heartbeat_fails_once_lock_is_lost_to_another_holder() {
        let dir = tempfile::tempdir().unwrap();
        let gw = FileGateway::new(&config(dir.path()), Duration::from_secs(10));
        gw.acquire_lock("scheduler_main", 30, "node-a").await.unwrap();
        assert!(gw.heartbeat_lock("scheduler_main", "node-a").await.unwrap());
        assert!(!gw.heartbeat_lock("scheduler_main", "node-b").await.unwrap());
    }

    #[tokio::test]
    async fn publish_state_is_rate_limited() {
        let dir = tempfile::tempdir().unwrap();
        let gw = FileGateway::new(&config(dir.path()), Duration::from_secs(60));
        assert!(gw.publish_state(serde_json::json!({"tick": 1})).await.unwrap());
        assert!(!gw.publish_state(serde_json::json!({"tick": 2})).await.unwrap());
    }

    #[tokio::test]
    async fn save_and_load_profile_upserts_by_user_id() {
        let dir = tempfile::tempdir().unwrap();
        let gw = FileGateway::new(&config(dir.path()), Duration::from_secs(10));
        assert!(gw.load_profile("u1").await.unwrap().is_none());
        let profile = AutonomyProfile::new("u1", Utc::now().date_naive());
        gw.save_profile(profile).await.unwrap();
        assert!(gw.load_profile("u1").await.unwrap().is_some());
    }
}
