//! Process Supervisor (spec §4.3): owns the fleet of configured tool
//! servers, boots them in parallel, and exposes per-server snapshots and
//! tool invocation to the Tool Registry layer above it.

use std::collections::HashMap;
use std::sync::Arc;

use ac_domain::config::SupervisorConfig;
use ac_domain::ToolServer;
use futures_util::future::join_all;
use serde_json::Value;

use crate::server::{ManagedServer, McpError};

pub struct McpManager {
    servers: HashMap<String, Arc<ManagedServer>>,
}

impl McpManager {
    /// Constructs every configured server and boots them concurrently. A
    /// single slow or misbehaving server cannot delay the rest of the
    /// fleet past the shared startup timeout.
    pub async fn from_config(config: &SupervisorConfig) -> Self {
        let mut servers = HashMap::with_capacity(config.servers.len());
        for server_cfg in &config.servers {
            let managed = Arc::new(ManagedServer::new(server_cfg.clone(), config.clone()));
            servers.insert(server_cfg.id.clone(), managed);
        }

        let boots = servers
            .values()
            .cloned()
            .map(|server| async move { server.boot().await });
        join_all(boots).await;

        Self { servers }
    }

    pub fn server(&self, id: &str) -> Option<Arc<ManagedServer>> {
        self.servers.get(id).cloned()
    }

    pub fn server_ids(&self) -> Vec<String> {
        self.servers.keys().cloned().collect()
    }

    pub async fn snapshot_all(&self) -> Vec<ToolServer> {
        let mut out = Vec::with_capacity(self.servers.len());
        for server in self.servers.values() {
            out.push(server.snapshot().await);
        }
        out
    }

    /// All tool schemas currently advertised by servers in `running`
    /// status (spec §4.4: discovery happens on entering `running`).
    pub async fn discovered_tools(&self) -> Vec<ac_domain::ToolSchema> {
        let mut out = Vec::new();
        for server in self.servers.values() {
            out.extend(server.snapshot().await.tools);
        }
        out
    }

    pub async fn call_tool(
        &self,
        server_id: &str,
        tool_name: &str,
        args: Value,
    ) -> Result<Value, McpError> {
        let server = self
            .servers
            .get(server_id)
            .ok_or_else(|| McpError::NotRunning(ac_domain::ServerStatus::Stopped))?;
        server.invoke_tool(tool_name, args).await
    }

    /// Gracefully stops every server; restart counters are left untouched
    /// since these shutdowns are not unexpected exits (spec §4.3).
    pub async fn shutdown_all(&self) {
        let shutdowns = self.servers.values().map(|s| s.shutdown());
        join_all(shutdowns).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_config() -> SupervisorConfig {
        SupervisorConfig {
            servers: Vec::new(),
            start_timeout_seconds: 1,
            max_restarts: 3,
            restart_window_seconds: 300,
            stderr_ring_buffer_bytes: 8192,
        }
    }

    #[tokio::test]
    async fn manager_with_no_configured_servers_boots_cleanly() {
        let manager = McpManager::from_config(&empty_config()).await;
        assert!(manager.server_ids().is_empty());
        assert!(manager.snapshot_all().await.is_empty());
        assert!(manager.discovered_tools().await.is_empty());
    }

    #[tokio::test]
    async fn unknown_server_id_is_not_running() {
        let manager = McpManager::from_config(&empty_config()).await;
        let result = manager
            .call_tool("does-not-exist", "ping", serde_json::json!({}))
            .await;
        assert!(matches!(result, Err(McpError::NotRunning(_))));
    }

    #[tokio::test]
    async fn shutdown_all_on_empty_fleet_is_a_no_op() {
        let manager = McpManager::from_config(&empty_config()).await;
        manager.shutdown_all().await;
    }
}
