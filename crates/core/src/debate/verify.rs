//! Verifier stage (spec §4.7 point 3): a deterministic deny-list and
//! argument-shape check, independent of the Skeptic's softer concerns.
//! Like the Skeptic, this never calls a model — it exists to catch the
//! small set of things that must never execute, not to second-guess the
//! plan's judgment.

use super::plan::PlanStep;
use ac_domain::entities::VerifierResult;

const SHELL_METACHARACTERS: &[&str] = &[";", "|", "&", "`", "$(", "&&", "||", ">", "<"];
const DENY_PATTERNS: &[&str] = &["rm -rf", "eval(", "eval ", ":(){ :|:& };:"];
const ALLOWED_PATH_ROOT: &str = "/workspace";

fn string_args(step: &PlanStep) -> Vec<&str> {
    match step {
        PlanStep::Tool { args, rationale, .. } => args
            .values()
            .filter_map(|v| v.as_str())
            .chain(std::iter::once(rationale.as_str()))
            .collect(),
        PlanStep::Reply { text } => vec![text.as_str()],
        PlanStep::Done => Vec::new(),
    }
}

fn contains_deny_pattern(text: &str) -> bool {
    let lowered = text.to_lowercase();
    DENY_PATTERNS.iter().any(|p| lowered.contains(p))
        || SHELL_METACHARACTERS.iter().any(|m| text.contains(m))
}

fn has_path_escape(step: &PlanStep) -> bool {
    let PlanStep::Tool { args, .. } = step else {
        return false;
    };
    args.get("path")
        .and_then(|v| v.as_str())
        .map(|path| path.starts_with('/') && !path.starts_with(ALLOWED_PATH_ROOT))
        .unwrap_or(false)
}

/// Checks one step in isolation. `skeptic_notes` feeds the `Revise` branch:
/// a step with no hard violation but an open Skeptic concern asks the
/// Planner to reconsider rather than running or refusing outright.
pub fn check(step: &PlanStep, skeptic_notes: &[String]) -> (VerifierResult, String) {
    for text in string_args(step) {
        if contains_deny_pattern(text) {
            return (
                VerifierResult::Reject,
                format!("{} argument contains a denied pattern", step.label()),
            );
        }
    }
    if has_path_escape(step) {
        return (
            VerifierResult::Reject,
            format!("{} targets a path outside {ALLOWED_PATH_ROOT}", step.label()),
        );
    }
    if !skeptic_notes.is_empty() {
        return (
            VerifierResult::Revise,
            skeptic_notes.join("; "),
        );
    }
    (VerifierResult::Approve, String::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn step(tool: &str, args: HashMap<String, serde_json::Value>) -> PlanStep {
        PlanStep::Tool {
            server: "shell".into(),
            tool: tool.into(),
            args,
            rationale: "because".into(),
        }
    }

    #[test]
    fn shell_metacharacter_is_rejected() {
        let mut args = HashMap::new();
        args.insert("command".into(), serde_json::Value::String("ls; rm -rf /".into()));
        let (verdict, _) = check(&step("exec", args), &[]);
        assert_eq!(verdict, VerifierResult::Reject);
    }

    #[test]
    fn path_outside_workspace_is_rejected() {
        let mut args = HashMap::new();
        args.insert("path".into(), serde_json::Value::String("/etc/passwd".into()));
        let (verdict, _) = check(&step("read_file", args), &[]);
        assert_eq!(verdict, VerifierResult::Reject);
    }

    #[test]
    fn clean_step_with_skeptic_note_asks_for_revision() {
        let step = step("read_file", HashMap::new());
        let (verdict, reason) = check(&step, &["touches a sensitive path".to_string()]);
        assert_eq!(verdict, VerifierResult::Revise);
        assert!(!reason.is_empty());
    }

    #[test]
    fn clean_step_with_no_notes_is_approved() {
        let step = step("read_file", HashMap::new());
        let (verdict, _) = check(&step, &[]);
        assert_eq!(verdict, VerifierResult::Approve);
    }
}
