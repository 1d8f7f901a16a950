//! A single supervised tool server: owns its transport, drives the
//! `ServerStatus` FSM (spec §4.3), and tracks restarts within the
//! 5-minute retry window.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use ac_domain::{ServerStatus, ToolSchema, ToolServer};
use ac_domain::config::{SupervisorConfig, ToolServerConfig};
use chrono::Utc;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::env::resolve_env;
use crate::protocol::{initialize_params, McpToolDef, ToolsListResult};
use crate::transport::{McpTransport, StdioTransport, TransportError};

#[derive(Debug, thiserror::Error)]
pub enum McpError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unresolved env placeholder: {0}")]
    UnresolvedEnv(String),

    #[error("startup_timeout")]
    StartupTimeout,

    #[error("tool server rejected handshake: {0}")]
    HandshakeRejected(String),

    #[error("tool server is not running (status: {0:?})")]
    NotRunning(ServerStatus),

    #[error("tool server exhausted its restart budget")]
    RestartBudgetExhausted,
}

/// A tool server under supervision. `state` mirrors the `ToolServer`
/// domain entity; `transport` is populated only while `state.status` is
/// `running` (spec §3 invariant: a server has a live transport iff it is
/// running).
pub struct ManagedServer {
    config: ToolServerConfig,
    supervisor: SupervisorConfig,
    state: RwLock<ToolServer>,
    transport: RwLock<Option<Arc<dyn McpTransport>>>,
    restart_log: RwLock<VecDeque<chrono::DateTime<Utc>>>,
}

impl ManagedServer {
    pub fn new(config: ToolServerConfig, supervisor: SupervisorConfig) -> Self {
        let state = ToolServer {
            name: config.id.clone(),
            command: config.command.clone(),
            args: config.args.clone(),
            env: config.env.clone(),
            status: ServerStatus::Pending,
            tools: Vec::new(),
            last_error: None,
            started_at: None,
            startup_deadline: None,
            restart_count: 0,
            stderr_tail: String::new(),
        };
        Self {
            config,
            supervisor,
            state: RwLock::new(state),
            transport: RwLock::new(None),
            restart_log: RwLock::new(VecDeque::new()),
        }
    }

    pub async fn snapshot(&self) -> ToolServer {
        let mut snap = self.state.read().await.clone();
        if let Some(transport) = self.transport.read().await.as_ref() {
            snap.stderr_tail = transport.stderr_tail();
        }
        snap
    }

    async fn set_status(&self, status: ServerStatus) {
        let mut state = self.state.write().await;
        if !state.status.can_transition_to(status) {
            tracing::warn!(
                server = %self.config.id,
                from = ?state.status,
                to = ?status,
                "rejected illegal server status transition"
            );
            return;
        }
        state.status = status;
        state.enforce_tools_invariant();
    }

    /// Boots the server: resolves env, spawns the transport, and runs the
    /// three-step MCP handshake under the configured startup timeout. On
    /// any failure the server lands in `failed` with `last_error` set; it
    /// never panics the caller.
    pub async fn boot(self: &Arc<Self>) {
        self.set_status(ServerStatus::Starting).await;
        {
            let mut state = self.state.write().await;
            state.startup_deadline =
                Some(Utc::now() + chrono::Duration::seconds(self.supervisor.start_timeout_seconds as i64));
        }

        let resolved_env = match resolve_env(&self.config.env) {
            Ok(env) => env,
            Err(err) => {
                self.fail(err.as_last_error()).await;
                return;
            }
        };

        let timeout = Duration::from_secs(self.supervisor.start_timeout_seconds);
        let result = tokio::time::timeout(timeout, self.spawn_and_handshake(&resolved_env)).await;

        match result {
            Ok(Ok(tools)) => {
                let mut state = self.state.write().await;
                state.tools = tools;
                state.started_at = Some(Utc::now());
                state.last_error = None;
                drop(state);
                self.set_status(ServerStatus::Running).await;
                self.clone().spawn_exit_watcher();
            }
            Ok(Err(err)) => self.fail(err.to_string()).await,
            Err(_) => self.fail(McpError::StartupTimeout.to_string()).await,
        }
    }

    /// Polls the transport for liveness while the server is running and
    /// drives the restart-or-park decision the moment it dies
    /// unexpectedly. A graceful `shutdown()` call moves status to
    /// `stopped` first, which this loop treats as its own exit signal.
    fn spawn_exit_watcher(self: Arc<Self>) {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_millis(500));
            loop {
                interval.tick().await;
                let status = self.state.read().await.status;
                if status != ServerStatus::Running {
                    return;
                }
                let alive = match self.transport.read().await.as_ref() {
                    Some(t) => t.is_alive(),
                    None => false,
                };
                if !alive {
                    self.handle_unexpected_exit().await;
                    return;
                }
            }
        });
    }

    async fn spawn_and_handshake(
        &self,
        resolved_env: &std::collections::HashMap<String, String>,
    ) -> Result<Vec<ToolSchema>, McpError> {
        let transport = StdioTransport::spawn(
            &self.config,
            resolved_env,
            self.supervisor.stderr_ring_buffer_bytes,
        )?;
        let transport: Arc<dyn McpTransport> = Arc::new(transport);
        *self.transport.write().await = Some(transport.clone());

        let init = initialize_params();
        let init_resp = transport
            .send_request("initialize", Some(serde_json::to_value(&init)?))
            .await?;
        if init_resp.is_error() {
            return Err(McpError::HandshakeRejected(format!("{:?}", init_resp.error)));
        }

        transport.send_notification("notifications/initialized").await?;

        let list_resp = transport.send_request("tools/list", None).await?;
        let list_value = list_resp
            .into_result()
            .map_err(|e| McpError::HandshakeRejected(e.to_string()))?;
        let parsed: ToolsListResult = serde_json::from_value(list_value)?;

        Ok(parsed
            .tools
            .into_iter()
            .map(|t: McpToolDef| ToolSchema {
                server_name: self.config.id.clone(),
                tool_name: t.name,
                description: t.description,
                input_schema: t.input_schema,
            })
            .collect())
    }

    async fn fail(&self, reason: String) {
        {
            let mut state = self.state.write().await;
            state.last_error = Some(reason);
        }
        self.set_status(ServerStatus::Failed).await;
    }

    /// True when the last in-window restart budget has not yet been used
    /// up (spec §4.3: up to `max_restarts` within `restart_window_seconds`,
    /// not counting shutdowns initiated for graceful stop).
    async fn restart_allowed(&self) -> bool {
        let now = Utc::now();
        let window = chrono::Duration::seconds(self.supervisor.restart_window_seconds as i64);
        let mut log = self.restart_log.write().await;
        while let Some(front) = log.front() {
            if now.signed_duration_since(*front) > window {
                log.pop_front();
            } else {
                break;
            }
        }
        log.len() < self.supervisor.max_restarts as usize
    }

    /// Called when the transport observes the child process has died
    /// unexpectedly. Restarts the server if budget remains, otherwise
    /// parks it in `stopped`.
    pub async fn handle_unexpected_exit(self: &Arc<Self>) {
        if !self.restart_allowed().await {
            self.set_status(ServerStatus::Failed).await;
            self.set_status(ServerStatus::Stopped).await;
            return;
        }
        {
            let mut log = self.restart_log.write().await;
            log.push_back(Utc::now());
        }
        {
            let mut state = self.state.write().await;
            state.restart_count += 1;
        }
        self.set_status(ServerStatus::Failed).await;
        self.boot().await;
    }

    /// Graceful shutdown: restarts are not incremented, and the server
    /// moves straight from whatever state it is in to `stopped`.
    pub async fn shutdown(&self) {
        if let Some(transport) = self.transport.write().await.take() {
            transport.shutdown().await;
        }
        let mut state = self.state.write().await;
        state.status = ServerStatus::Stopped;
        state.enforce_tools_invariant();
    }

    pub async fn transport(&self) -> Option<Arc<dyn McpTransport>> {
        self.transport.read().await.clone()
    }

    pub fn id(&self) -> &str {
        &self.config.id
    }

    /// A server is usable for tool calls only while `running` and its
    /// transport reports itself alive.
    pub async fn is_available(&self) -> bool {
        let status = self.state.read().await.status;
        if status != ServerStatus::Running {
            return false;
        }
        match self.transport.read().await.as_ref() {
            Some(t) => t.is_alive(),
            None => false,
        }
    }

    pub async fn invoke_tool(&self, tool_name: &str, args: Value) -> Result<Value, McpError> {
        let status = self.state.read().await.status;
        if status != ServerStatus::Running {
            return Err(McpError::NotRunning(status));
        }
        let transport = self
            .transport
            .read()
            .await
            .clone()
            .ok_or(McpError::NotRunning(status))?;
        let params = serde_json::json!({ "name": tool_name, "arguments": args });
        let resp = transport.send_request("tools/call", Some(params)).await?;
        resp.into_result()
            .map_err(|e| McpError::HandshakeRejected(e.to_string()))
    }
}
