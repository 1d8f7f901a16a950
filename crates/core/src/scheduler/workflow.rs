//! Workflow step execution against the closed expression language (spec
//! §4.5 point 3). A workflow task's `source` is refreshed from
//! `payload.source_url` at the start of every run and again on each
//! explicit `fetch` step; `set` bindings live only for the run, `set_state`
//! bindings are merged back into the persisted `Task::state`.

use std::collections::HashMap;
use std::time::Duration;

use ac_domain::entities::{Task, WorkflowStep};
use ac_domain::expr::{self, EvalContext};
use ac_domain::{Error, ErrorKind, Result};
use ac_tool_router::ToolRouter;
use serde_json::Value;

/// Renders `{name}` placeholders in a notification message by looking the
/// name up first in `state`, then in `source`. Unknown names are left
/// untouched rather than erroring — the workflow step language has no
/// notion of "missing interpolation" as a hard failure.
pub fn render_template(message: &str, ctx: &EvalContext) -> String {
    let re = regex::Regex::new(r"\{([a-zA-Z_][a-zA-Z0-9_]*)\}").expect("static pattern");
    re.replace_all(message, |caps: &regex::Captures| {
        let name = &caps[1];
        let value = ctx.state.get(name).or_else(|| ctx.source.get(name));
        match value {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => caps[0].to_string(),
        }
    })
    .into_owned()
}

fn render_args(args: &HashMap<String, Value>, ctx: &EvalContext) -> Value {
    let mut rendered = serde_json::Map::new();
    for (k, v) in args {
        let value = match v {
            Value::String(s) => Value::String(render_template(s, ctx)),
            other => other.clone(),
        };
        rendered.insert(k.clone(), value);
    }
    Value::Object(rendered)
}

/// Fetches `url` as the run's `source` map (spec §4.5 point 3, §9 open
/// question (b): scope limited to `payload.source_url`). JSON bodies are
/// used as-is; anything else is wrapped under a single `text` key.
pub async fn fetch_source(
    http: &reqwest::Client,
    url: &str,
    timeout: Duration,
    retries: u32,
) -> Result<HashMap<String, Value>> {
    let mut attempt = 0;
    loop {
        let result = http.get(url).timeout(timeout).send().await;
        match result {
            Ok(resp) => {
                let is_json = resp
                    .headers()
                    .get("content-type")
                    .and_then(|v| v.to_str().ok())
                    .map(|ct| ct.contains("json"))
                    .unwrap_or(false);
                let body = resp.text().await.map_err(|e| Error::Http(e.to_string()))?;
                if is_json {
                    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(&body) {
                        return Ok(map.into_iter().collect());
                    }
                }
                let mut out = HashMap::new();
                out.insert("text".to_string(), Value::String(body));
                return Ok(out);
            }
            Err(e) => {
                attempt += 1;
                if attempt > retries {
                    return Err(Error::Http(e.to_string()));
                }
            }
        }
    }
}

/// Runs every step of `task.steps` in order against a fresh [`EvalContext`]
/// seeded from the persisted `task.state`. Returns the run-only/persisted
/// state split so the caller can merge `persisted` into `task.state` and
/// decide what, if anything, to notify.
pub struct WorkflowOutcome {
    pub persisted_state: HashMap<String, Value>,
    pub notifications: Vec<String>,
}

pub async fn run_workflow(
    task: &Task,
    http: &reqwest::Client,
    tool_router: &ToolRouter,
    http_timeout: Duration,
    http_retries: u32,
    step_timeout: Duration,
) -> Result<WorkflowOutcome> {
    let mut ctx = EvalContext {
        state: task.state.clone(),
        source: HashMap::new(),
        env: HashMap::new(),
    };
    if let Some(url) = task.source_url() {
        ctx.source = fetch_source(http, url, http_timeout, http_retries).await?;
    }

    let mut persisted_state = HashMap::new();
    let mut notifications = Vec::new();

    for step in &task.steps {
        match step {
            WorkflowStep::Fetch => {
                if let Some(url) = task.source_url() {
                    ctx.source = fetch_source(http, url, http_timeout, http_retries).await?;
                }
            }
            WorkflowStep::Set { key, expr } => {
                let value = expr::eval(expr, &ctx).map_err(|e| {
                    Error::surfaced(ErrorKind::Domain, "a schedule step failed", e.to_string())
                })?;
                ctx.state.insert(key.clone(), value);
            }
            WorkflowStep::SetState { key, expr } => {
                let value = expr::eval(expr, &ctx).map_err(|e| {
                    Error::surfaced(ErrorKind::Domain, "a schedule step failed", e.to_string())
                })?;
                ctx.state.insert(key.clone(), value.clone());
                persisted_state.insert(key.clone(), value);
            }
            WorkflowStep::Notify { when, message } => {
                let cond = expr::eval(when, &ctx).map_err(|e| {
                    Error::surfaced(ErrorKind::Domain, "a schedule step failed", e.to_string())
                })?;
                if expr_truthy(&cond) {
                    notifications.push(render_template(message, &ctx));
                }
            }
            WorkflowStep::ToolCall {
                target,
                server,
                tool,
                args,
            } => {
                let rendered_args = render_args(args, &ctx);
                let result = tokio::time::timeout(
                    step_timeout,
                    tool_router.call(server, tool, rendered_args, Some(step_timeout)),
                )
                .await
                .map_err(|_| Error::Timeout(format!("{server}/{tool}")))?
                .map_err(|e| Error::surfaced(ErrorKind::Resource, "a tool call failed", e.to_string()))?;
                ctx.state.insert(target.clone(), result);
            }
        }
    }

    Ok(WorkflowOutcome {
        persisted_state,
        notifications,
    })
}

fn expr_truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}
