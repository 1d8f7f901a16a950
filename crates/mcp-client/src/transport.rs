//! Stdio transport: spawns a tool-server child process and speaks
//! newline-delimited JSON-RPC over its stdin/stdout. stderr is drained
//! into a capped ring buffer rather than discarded (spec §4.3).

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use ac_domain::config::ToolServerConfig;
use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout};
use tokio::sync::Mutex as AsyncMutex;

use crate::protocol::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};

const MAX_SKIP_LINES: usize = 1000;
const REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("tool server process has exited")]
    ProcessExited,

    #[error("timeout waiting for response")]
    Timeout,
}

#[async_trait]
pub trait McpTransport: Send + Sync {
    async fn send_request(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> Result<JsonRpcResponse, TransportError>;

    async fn send_notification(&self, method: &str) -> Result<(), TransportError>;

    fn is_alive(&self) -> bool;

    /// Last 8 KiB of stderr captured from the child process (newest last).
    fn stderr_tail(&self) -> String;

    async fn shutdown(&self);
}

/// Caps a ring buffer of captured stderr at `cap_bytes`, dropping from the
/// front (oldest output) once exceeded.
fn push_stderr(tail: &mut String, chunk: &str, cap_bytes: usize) {
    tail.push_str(chunk);
    tail.push('\n');
    if tail.len() > cap_bytes {
        let drop_to = tail.len() - cap_bytes;
        let boundary = tail
            .char_indices()
            .map(|(i, _)| i)
            .find(|&i| i >= drop_to)
            .unwrap_or(tail.len());
        tail.drain(..boundary);
    }
}

pub struct StdioTransport {
    stdin: AsyncMutex<ChildStdin>,
    stdout: AsyncMutex<BufReader<ChildStdout>>,
    child: AsyncMutex<Child>,
    request_lock: AsyncMutex<()>,
    next_id: AtomicU64,
    alive: AtomicBool,
    stderr_tail: Arc<Mutex<String>>,
}

impl StdioTransport {
    pub fn spawn(config: &ToolServerConfig, resolved_env: &std::collections::HashMap<String, String>, stderr_ring_bytes: usize) -> Result<Self, TransportError> {
        let mut cmd = tokio::process::Command::new(&config.command);
        cmd.args(&config.args)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped());

        for (key, value) in resolved_env {
            cmd.env(key, value);
        }

        let mut child = cmd.spawn()?;

        let stdin = child.stdin.take().ok_or_else(|| {
            TransportError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "failed to capture child stdin",
            ))
        })?;
        let stdout = child.stdout.take().ok_or_else(|| {
            TransportError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "failed to capture child stdout",
            ))
        })?;
        let stderr = child.stderr.take().ok_or_else(|| {
            TransportError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "failed to capture child stderr",
            ))
        })?;

        let stderr_tail = Arc::new(Mutex::new(String::new()));
        let stderr_tail_writer = stderr_tail.clone();
        tokio::spawn(async move {
            let mut reader = BufReader::new(stderr);
            let mut line = String::new();
            loop {
                line.clear();
                match reader.read_line(&mut line).await {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {
                        let mut tail = stderr_tail_writer.lock().unwrap();
                        push_stderr(&mut tail, line.trim_end(), stderr_ring_bytes);
                    }
                }
            }
        });

        Ok(Self {
            stdin: AsyncMutex::new(stdin),
            stdout: AsyncMutex::new(BufReader::new(stdout)),
            child: AsyncMutex::new(child),
            request_lock: AsyncMutex::new(()),
            next_id: AtomicU64::new(1),
            alive: AtomicBool::new(true),
            stderr_tail,
        })
    }

    fn next_request_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    async fn write_line(&self, json: &str) -> Result<(), TransportError> {
        if !self.alive.load(Ordering::SeqCst) {
            return Err(TransportError::ProcessExited);
        }
        let mut stdin = self.stdin.lock().await;
        stdin.write_all(json.as_bytes()).await?;
        stdin.write_all(b"\n").await?;
        stdin.flush().await?;
        Ok(())
    }

    async fn read_line(&self) -> Result<String, TransportError> {
        if !self.alive.load(Ordering::SeqCst) {
            return Err(TransportError::ProcessExited);
        }
        let mut stdout = self.stdout.lock().await;
        let mut skipped = 0usize;
        loop {
            let mut line = String::new();
            let bytes_read = stdout.read_line(&mut line).await?;
            if bytes_read == 0 {
                self.alive.store(false, Ordering::SeqCst);
                return Err(TransportError::ProcessExited);
            }
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            if trimmed.starts_with('{') {
                return Ok(trimmed.to_string());
            }
            skipped += 1;
            if skipped >= MAX_SKIP_LINES {
                self.alive.store(false, Ordering::SeqCst);
                return Err(TransportError::Io(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    "tool server produced too many non-JSON lines on stdout",
                )));
            }
        }
    }
}

#[async_trait]
impl McpTransport for StdioTransport {
    async fn send_request(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> Result<JsonRpcResponse, TransportError> {
        let _guard = self.request_lock.lock().await;
        let id = self.next_request_id();
        let req = JsonRpcRequest::new(id, method, params);
        let json = serde_json::to_string(&req)?;
        self.write_line(&json).await?;

        let result = tokio::time::timeout(REQUEST_TIMEOUT, async {
            loop {
                let line = self.read_line().await?;
                if let Ok(resp) = serde_json::from_str::<JsonRpcResponse>(&line) {
                    if resp.id == id {
                        return Ok(resp);
                    }
                }
            }
        })
        .await;

        match result {
            Ok(inner) => inner,
            Err(_) => Err(TransportError::Timeout),
        }
    }

    async fn send_notification(&self, method: &str) -> Result<(), TransportError> {
        let notif = JsonRpcNotification::new(method);
        let json = serde_json::to_string(&notif)?;
        self.write_line(&json).await
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    fn stderr_tail(&self) -> String {
        self.stderr_tail.lock().unwrap().clone()
    }

    async fn shutdown(&self) {
        self.alive.store(false, Ordering::SeqCst);
        let mut child = self.child.lock().await;
        {
            let mut stdin = self.stdin.lock().await;
            let _ = stdin.shutdown().await;
        }
        match tokio::time::timeout(std::time::Duration::from_secs(5), child.wait()).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => tracing::warn!(error = %e, "error waiting for tool server process"),
            Err(_) => {
                tracing::warn!("tool server did not exit within timeout, killing");
                let _ = child.kill().await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_stderr_caps_at_byte_limit() {
        let mut tail = String::new();
        for i in 0..50 {
            push_stderr(&mut tail, &format!("line {i}"), 64);
        }
        assert!(tail.len() <= 64 + "line 49\n".len());
        assert!(tail.ends_with("line 49\n"));
    }

    #[test]
    fn push_stderr_keeps_short_output_intact() {
        let mut tail = String::new();
        push_stderr(&mut tail, "hello", 1024);
        assert_eq!(tail, "hello\n");
    }
}
