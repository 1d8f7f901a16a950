//! Skeptic stage (spec §4.7 point 2): deterministic, rule-based review of a
//! single planned step. Kept out of the LLM entirely so its verdicts are
//! reproducible and testable without mocking a model response — only the
//! Planner talks to a provider.

use super::plan::PlanStep;

const DESTRUCTIVE_TOOL_VERBS: &[&str] = &["delete", "remove", "rm", "truncate", "drop", "wipe"];
const SENSITIVE_PATH_PREFIXES: &[&str] = &["/", "~", "/etc", "/root", "/home", "/var", "/usr"];
const UNBOUNDED_NETWORK_VERBS: &[&str] = &["fetch", "download", "request", "crawl", "scrape"];

fn is_destructive_fs(tool: &str, args: &std::collections::HashMap<String, serde_json::Value>) -> bool {
    let tool = tool.to_lowercase();
    if !DESTRUCTIVE_TOOL_VERBS.iter().any(|v| tool.contains(v)) {
        return false;
    }
    let path = args.get("path").and_then(|v| v.as_str()).unwrap_or("");
    let recursive = args.get("recursive").and_then(|v| v.as_bool()).unwrap_or(false);
    recursive || SENSITIVE_PATH_PREFIXES.iter().any(|p| path == *p || path.starts_with(&format!("{p}/")))
}

fn is_unbounded_network(tool: &str, args: &std::collections::HashMap<String, serde_json::Value>) -> bool {
    let tool = tool.to_lowercase();
    if !UNBOUNDED_NETWORK_VERBS.iter().any(|v| tool.contains(v)) {
        return false;
    }
    match args.get("url").and_then(|v| v.as_str()) {
        Some(url) => !(url.starts_with("http://") || url.starts_with("https://")),
        None => true,
    }
}

/// Returns every concern this step raises, or an empty vec when it's clean.
/// `steps_remaining` is the budget left counting this step, so a plan that
/// overruns `autonomous_max_steps` (spec §4.7 point 1) surfaces as a
/// skeptic note on the first step past the limit rather than a silent
/// truncation. `reply`/`done` steps carry no tool call, so only the
/// step-budget check applies to them.
pub fn review(step: &PlanStep, steps_remaining: usize) -> Vec<String> {
    let mut notes = Vec::new();
    if let PlanStep::Tool { server, tool, args, .. } = step {
        if is_destructive_fs(tool, args) {
            notes.push(format!(
                "{}/{} touches a sensitive or recursive filesystem path",
                server, tool
            ));
        }
        if is_unbounded_network(tool, args) {
            notes.push(format!(
                "{}/{} fetches from an unconstrained or non-HTTP(S) target",
                server, tool
            ));
        }
    }
    if steps_remaining == 0 {
        notes.push("plan has exceeded its step budget".to_string());
    }
    notes
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn step(tool: &str, args: HashMap<String, serde_json::Value>) -> PlanStep {
        PlanStep::Tool {
            server: "fs".into(),
            tool: tool.into(),
            args,
            rationale: "because".into(),
        }
    }

    #[test]
    fn recursive_delete_is_flagged() {
        let mut args = HashMap::new();
        args.insert("path".into(), serde_json::Value::String("/tmp/x".into()));
        args.insert("recursive".into(), serde_json::Value::Bool(true));
        let notes = review(&step("delete_dir", args), 5);
        assert_eq!(notes.len(), 1);
    }

    #[test]
    fn delete_under_workspace_is_clean() {
        let mut args = HashMap::new();
        args.insert("path".into(), serde_json::Value::String("/workspace/tmp/x".into()));
        let notes = review(&step("delete_file", args), 5);
        assert!(notes.is_empty());
    }

    #[test]
    fn non_http_fetch_target_is_flagged() {
        let mut args = HashMap::new();
        args.insert("url".into(), serde_json::Value::String("file:///etc/passwd".into()));
        let notes = review(&step("fetch_url", args), 5);
        assert_eq!(notes.len(), 1);
    }

    #[test]
    fn exhausted_budget_is_flagged_regardless_of_step() {
        let notes = review(&step("read_file", HashMap::new()), 0);
        assert_eq!(notes.len(), 1);
    }
}
