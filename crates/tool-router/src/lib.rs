//! Tool Registry & Capability Router (spec §4.4). Wraps the Process
//! Supervisor's managed servers with argument validation, per-call
//! deadlines, and FIFO ordering for same-(server, tool) calls issued by
//! one request.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use ac_domain::ToolSchema;
use ac_mcp_client::{McpError, McpManager};
use serde_json::Value;
use tokio::sync::{Mutex as AsyncMutex, RwLock};

/// Pseudo-server name for the built-in sandboxed command executor (spec
/// §4.7 point 4's "sandbox" collaborator), dispatched in-process rather
/// than through a supervised MCP server.
const LOCAL_SERVER: &str = "local";
const LOCAL_EXEC_TOOL: &str = "exec";

#[derive(Debug, thiserror::Error)]
pub enum ToolRouterError {
    #[error("tool server '{0}' is not available")]
    ToolUnavailable(String),

    #[error("arguments for '{server}/{tool}' do not match the cached schema: {reason}")]
    InvalidArgs {
        server: String,
        tool: String,
        reason: String,
    },

    #[error("call to '{server}/{tool}' exceeded its deadline")]
    Timeout { server: String, tool: String },

    #[error(transparent)]
    Mcp(#[from] McpError),
}

/// Key identifying a (server, tool) pair for the FIFO-ordering lock.
type CallKey = (String, String);

pub struct ToolRouter {
    manager: Arc<McpManager>,
    default_timeout: Duration,
    call_locks: RwLock<HashMap<CallKey, Arc<AsyncMutex<()>>>>,
}

impl ToolRouter {
    pub fn new(manager: Arc<McpManager>, default_timeout: Duration) -> Self {
        Self {
            manager,
            default_timeout,
            call_locks: RwLock::new(HashMap::new()),
        }
    }

    async fn lock_for(&self, key: &CallKey) -> Arc<AsyncMutex<()>> {
        if let Some(lock) = self.call_locks.read().await.get(key) {
            return lock.clone();
        }
        let mut locks = self.call_locks.write().await;
        locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    async fn cached_schema(&self, server: &str, tool: &str) -> Option<ToolSchema> {
        let managed = self.manager.server(server)?;
        managed
            .snapshot()
            .await
            .tools
            .into_iter()
            .find(|t| t.tool_name == tool)
    }

    fn validate_args(schema: &ToolSchema, args: &Value) -> Result<(), String> {
        let compiled = jsonschema::JSONSchema::compile(&schema.input_schema)
            .map_err(|e| format!("schema compile error: {e}"))?;
        let errors: Vec<String> = compiled
            .validate(args)
            .err()
            .map(|errs| errs.map(|e| e.to_string()).collect())
            .unwrap_or_default();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors.join("; "))
        }
    }

    /// Invokes `tool` on `server` with `args`, enforcing availability,
    /// schema validity, and `deadline` (defaults to the router's
    /// configured timeout). Calls addressing the same (server, tool)
    /// pair are serialized to preserve FIFO ordering within a request.
    pub async fn call(
        &self,
        server: &str,
        tool: &str,
        args: Value,
        deadline: Option<Duration>,
    ) -> Result<Value, ToolRouterError> {
        if server == LOCAL_SERVER && tool == LOCAL_EXEC_TOOL {
            return self.call_local_exec(args, deadline).await;
        }

        let managed = self
            .manager
            .server(server)
            .ok_or_else(|| ToolRouterError::ToolUnavailable(server.to_string()))?;
        if !managed.is_available().await {
            return Err(ToolRouterError::ToolUnavailable(server.to_string()));
        }

        let schema = self
            .cached_schema(server, tool)
            .await
            .ok_or_else(|| ToolRouterError::ToolUnavailable(server.to_string()))?;
        Self::validate_args(&schema, &args).map_err(|reason| ToolRouterError::InvalidArgs {
            server: server.to_string(),
            tool: tool.to_string(),
            reason,
        })?;

        let key: CallKey = (server.to_string(), tool.to_string());
        let lock = self.lock_for(&key).await;
        let _guard = lock.lock().await;

        let timeout = deadline.unwrap_or(self.default_timeout);
        match tokio::time::timeout(timeout, managed.invoke_tool(tool, args)).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(ToolRouterError::Mcp(err)),
            Err(_) => {
                if let Some(transport) = managed.transport().await {
                    let _ = transport.send_notification("notifications/cancelled").await;
                }
                Err(ToolRouterError::Timeout {
                    server: server.to_string(),
                    tool: tool.to_string(),
                })
            }
        }
    }

    /// All tool schemas currently advertised across the supervised fleet,
    /// plus the built-in `local/exec` sandbox tool.
    pub async fn list_tools(&self) -> Vec<ToolSchema> {
        let mut tools = self.manager.discovered_tools().await;
        tools.push(local_exec_schema());
        tools
    }

    async fn call_local_exec(&self, args: Value, deadline: Option<Duration>) -> Result<Value, ToolRouterError> {
        Self::validate_args(&local_exec_schema(), &args).map_err(|reason| ToolRouterError::InvalidArgs {
            server: LOCAL_SERVER.to_string(),
            tool: LOCAL_EXEC_TOOL.to_string(),
            reason,
        })?;

        let key: CallKey = (LOCAL_SERVER.to_string(), LOCAL_EXEC_TOOL.to_string());
        let lock = self.lock_for(&key).await;
        let _guard = lock.lock().await;

        let mut req: ac_tools::ExecRequest = serde_json::from_value(args).map_err(|e| ToolRouterError::InvalidArgs {
            server: LOCAL_SERVER.to_string(),
            tool: LOCAL_EXEC_TOOL.to_string(),
            reason: e.to_string(),
        })?;
        let budget = deadline.unwrap_or(self.default_timeout);
        req.timeout_seconds = req.timeout_seconds.min(budget.as_secs().max(1));

        let result = ac_tools::exec(req).await;
        serde_json::to_value(result).map_err(|e| ToolRouterError::InvalidArgs {
            server: LOCAL_SERVER.to_string(),
            tool: LOCAL_EXEC_TOOL.to_string(),
            reason: e.to_string(),
        })
    }
}

/// Schema for the always-available `local/exec` sandbox tool (spec §4.7
/// point 4), advertised without needing a supervised process behind it.
fn local_exec_schema() -> ToolSchema {
    ToolSchema {
        server_name: LOCAL_SERVER.to_string(),
        tool_name: LOCAL_EXEC_TOOL.to_string(),
        description: "Run a shell command in a sandboxed subprocess with a hard timeout.".to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "command": { "type": "string" },
                "workdir": { "type": "string" },
                "env": { "type": "object" },
                "timeout_seconds": { "type": "integer" }
            },
            "required": ["command", "timeout_seconds"]
        }),
    }
}
