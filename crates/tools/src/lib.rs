//! Sandboxed command executor used by the debate dispatcher's Execute
//! stage. A single foreground run per call: spawn, capture combined
//! stdout/stderr up to a capped buffer, enforce a hard wall-clock
//! timeout, and refuse to forward known-dangerous environment overrides.
//!
//! The container-based sandbox host itself (cgroup/namespace isolation)
//! is an external collaborator (spec §1); this crate only enforces the
//! wall-clock deadline and the env-var blocklist at the process-spawn
//! boundary.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

/// Environment variable names that are never forwarded to a sandboxed
/// command regardless of what the caller requests, since overriding them
/// can escape the sandbox (library injection, shell init hooks, altered
/// interpreter search paths).
const BLOCKED_ENV_VARS: &[&str] = &[
    "LD_PRELOAD",
    "LD_LIBRARY_PATH",
    "LD_AUDIT",
    "DYLD_INSERT_LIBRARIES",
    "DYLD_LIBRARY_PATH",
    "DYLD_FRAMEWORK_PATH",
    "PATH",
    "HOME",
    "USER",
    "SHELL",
    "SSH_AUTH_SOCK",
    "SSH_AGENT_PID",
    "PYTHONPATH",
    "PYTHONSTARTUP",
    "PYTHONHOME",
    "NODE_PATH",
    "NODE_OPTIONS",
    "RUBYLIB",
    "RUBYOPT",
    "PERL5LIB",
    "PERL5OPT",
    "CLASSPATH",
    "BASH_ENV",
    "ENV",
    "CDPATH",
    "IFS",
];

pub fn is_dangerous_env_var(name: &str) -> bool {
    let upper = name.to_ascii_uppercase();
    BLOCKED_ENV_VARS.contains(&upper.as_str())
}

/// Caps combined output at `max_chars`, dropping from the front once
/// exceeded and keeping the newest 75% to avoid thrashing on every push.
pub struct OutputBuffer {
    combined: String,
    max_chars: usize,
}

impl OutputBuffer {
    pub fn new(max_chars: usize) -> Self {
        Self {
            combined: String::new(),
            max_chars,
        }
    }

    pub fn push(&mut self, text: &str) {
        self.combined.push_str(text);
        if self.combined.len() > self.max_chars {
            let keep = self.max_chars * 3 / 4;
            let drain_to = self.combined.len() - keep;
            let mut boundary = drain_to;
            while boundary < self.combined.len() && !self.combined.is_char_boundary(boundary) {
                boundary += 1;
            }
            self.combined.drain(..boundary);
        }
    }

    pub fn into_string(self) -> String {
        self.combined
    }
}

const DEFAULT_MAX_OUTPUT_CHARS: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecStatus {
    Completed,
    TimedOut,
    Failed,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecRequest {
    pub command: String,
    #[serde(default)]
    pub workdir: Option<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// Hard wall-clock deadline for the whole call (spec §6.2
    /// `sandbox_command_timeout`).
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExecResult {
    pub status: ExecStatus,
    pub exit_code: Option<i32>,
    pub output: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Runs `req.command` under `sh -c`, enforcing the env blocklist and the
/// hard timeout. Never returns a Rust-level error: spawn failures and
/// blocked env vars are reported as `ExecStatus::Failed` with the reason
/// in `output`, matching the Resource error policy of aborting the step
/// while keeping whatever partial output was captured.
pub async fn exec(req: ExecRequest) -> ExecResult {
    let started_at = Utc::now();

    for key in req.env.keys() {
        if is_dangerous_env_var(key) {
            return ExecResult {
                status: ExecStatus::Failed,
                exit_code: None,
                output: format!("environment variable '{key}' is blocked by security policy"),
                started_at,
                finished_at: Utc::now(),
            };
        }
    }

    let mut cmd = Command::new("sh");
    cmd.arg("-c")
        .arg(&req.command)
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .stdin(std::process::Stdio::null());

    if let Some(ref workdir) = req.workdir {
        cmd.current_dir(workdir);
    }
    for (key, value) in &req.env {
        cmd.env(key, value);
    }

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            return ExecResult {
                status: ExecStatus::Failed,
                exit_code: None,
                output: format!("failed to spawn: {e}"),
                started_at,
                finished_at: Utc::now(),
            };
        }
    };

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let output = std::sync::Arc::new(tokio::sync::Mutex::new(OutputBuffer::new(
        DEFAULT_MAX_OUTPUT_CHARS,
    )));

    let stdout_buf = output.clone();
    let stdout_task = tokio::spawn(async move {
        if let Some(stdout) = stdout {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                let mut buf = stdout_buf.lock().await;
                buf.push(&line);
                buf.push("\n");
            }
        }
    });

    let stderr_buf = output.clone();
    let stderr_task = tokio::spawn(async move {
        if let Some(stderr) = stderr {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                let mut buf = stderr_buf.lock().await;
                buf.push(&line);
                buf.push("\n");
            }
        }
    });

    let timeout = std::time::Duration::from_secs(req.timeout_seconds.max(1));
    let status;
    let exit_code;

    match tokio::time::timeout(timeout, child.wait()).await {
        Ok(Ok(exit)) => {
            let _ = stdout_task.await;
            let _ = stderr_task.await;
            status = ExecStatus::Completed;
            exit_code = exit.code();
        }
        Ok(Err(e)) => {
            let _ = stdout_task.await;
            let _ = stderr_task.await;
            let mut buf = output.lock().await;
            buf.push(&format!("\n[process error: {e}]"));
            status = ExecStatus::Failed;
            exit_code = None;
        }
        Err(_) => {
            let _ = child.kill().await;
            stdout_task.abort();
            stderr_task.abort();
            let mut buf = output.lock().await;
            buf.push("\n[timed out]");
            status = ExecStatus::TimedOut;
            exit_code = None;
        }
    }

    let finished_at = Utc::now();
    let combined = std::sync::Arc::try_unwrap(output)
        .map(|m| m.into_inner().into_string())
        .unwrap_or_else(|arc| {
            // A reader task is still holding a clone (abort raced the
            // lock); fall back to a blocking read of whatever landed.
            futures_lite_lock(&arc)
        });

    ExecResult {
        status,
        exit_code,
        output: combined,
        started_at,
        finished_at,
    }
}

fn futures_lite_lock(buf: &std::sync::Arc<tokio::sync::Mutex<OutputBuffer>>) -> String {
    match buf.try_lock() {
        Ok(guard) => guard.combined.clone(),
        Err(_) => String::new(),
    }
}
