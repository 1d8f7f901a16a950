use serde::{Deserialize, Serialize};

/// Scheduler Engine configuration (spec §4.5, §5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Fire-loop tick interval, default 1s (spec §4.5 "Fire loop (per
    /// tick, default 1 s)").
    #[serde(default = "default_tick_seconds")]
    pub tick_seconds: u64,
    /// `scheduler_main` lock TTL, default 30s (spec §4.5).
    #[serde(default = "default_lock_ttl_seconds")]
    pub lock_ttl_seconds: i64,
    /// Heartbeat refresh interval, default 10s (spec §4.5).
    #[serde(default = "default_heartbeat_seconds")]
    pub heartbeat_seconds: u64,
    /// `HER_SCHEDULER_STATE_PUBLISH_MIN_INTERVAL_SECONDS`, default 10
    /// (spec §5, §6.2 `scheduler_state_min_publish_interval`).
    #[serde(default = "default_state_publish_min_interval_seconds")]
    pub state_publish_min_interval_seconds: u64,
    /// Worker pool size for per-task workflow execution, default 8
    /// (spec §5).
    #[serde(default = "default_workflow_worker_pool_size")]
    pub workflow_worker_pool_size: usize,
    /// Workflow step deadline, default 30s (spec §5 timeouts table).
    #[serde(default = "default_workflow_step_timeout_seconds")]
    pub workflow_step_timeout_seconds: u64,
    /// HTTP fetch timeout + retries for `source_url` (spec §5, §6.2
    /// `workflow_http_timeout`, `workflow_http_retries`).
    #[serde(default = "default_workflow_http_timeout_seconds")]
    pub workflow_http_timeout_seconds: u64,
    #[serde(default = "default_workflow_http_retries")]
    pub workflow_http_retries: u32,
    /// `HER_WORKFLOW_EVENT_QUEUE_MAX_SIZE`, default 5000 (spec §5).
    #[serde(default = "default_event_queue_max_size")]
    pub event_queue_max_size: usize,
    /// Optional YAML overlay seeding initial tasks at boot (spec §4.5
    /// "Persistence").
    #[serde(default)]
    pub seed_path: Option<std::path::PathBuf>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_seconds: default_tick_seconds(),
            lock_ttl_seconds: default_lock_ttl_seconds(),
            heartbeat_seconds: default_heartbeat_seconds(),
            state_publish_min_interval_seconds: default_state_publish_min_interval_seconds(),
            workflow_worker_pool_size: default_workflow_worker_pool_size(),
            workflow_step_timeout_seconds: default_workflow_step_timeout_seconds(),
            workflow_http_timeout_seconds: default_workflow_http_timeout_seconds(),
            workflow_http_retries: default_workflow_http_retries(),
            event_queue_max_size: default_event_queue_max_size(),
            seed_path: None,
        }
    }
}

fn default_tick_seconds() -> u64 {
    1
}
fn default_lock_ttl_seconds() -> i64 {
    30
}
fn default_heartbeat_seconds() -> u64 {
    10
}
fn default_state_publish_min_interval_seconds() -> u64 {
    10
}
fn default_workflow_worker_pool_size() -> usize {
    8
}
fn default_workflow_step_timeout_seconds() -> u64 {
    30
}
fn default_workflow_http_timeout_seconds() -> u64 {
    12
}
fn default_workflow_http_retries() -> u32 {
    2
}
fn default_event_queue_max_size() -> usize {
    5000
}
