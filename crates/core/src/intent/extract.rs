//! Regex-based schedule extraction for the Intent Classifier (spec §4.6:
//! interval, daily-at, relative one-shot, weekday, and threshold-automation
//! patterns). Each `try_*` function either matches its shape or returns
//! `None`, so [`super::IntentClassifier::classify`] can try them in order.

use ac_domain::entities::{TaskKind, Trigger, WorkflowStep};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

pub struct ScheduleDraft {
    pub kind: TaskKind,
    pub trigger: Trigger,
    pub steps: Vec<WorkflowStep>,
    pub payload: HashMap<String, serde_json::Value>,
}

fn payload_with_message(message: &str) -> HashMap<String, serde_json::Value> {
    let mut payload = HashMap::new();
    payload.insert("message".into(), serde_json::Value::String(message.to_string()));
    payload
}

/// "remind me in 20 minutes to ..." / "in 2 hours remind me ..."
pub fn try_relative_one_shot(text: &str, now: DateTime<Utc>) -> Option<ScheduleDraft> {
    let re = regex::Regex::new(
        r"(?i)(?:remind me )?in\s+(\d+)\s*(minute|minutes|min|hour|hours|hr|day|days)\b(?:\s+to\s+(.+))?",
    )
    .ok()?;
    let caps = re.captures(text)?;
    let n: i64 = caps.get(1)?.as_str().parse().ok()?;
    let unit = caps.get(2)?.as_str().to_lowercase();
    let delta = match unit.as_str() {
        "minute" | "minutes" | "min" => Duration::minutes(n),
        "hour" | "hours" | "hr" => Duration::hours(n),
        "day" | "days" => Duration::days(n),
        _ => return None,
    };
    let message = caps
        .get(3)
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_else(|| text.trim().to_string());
    Some(ScheduleDraft {
        kind: TaskKind::Reminder,
        trigger: Trigger::OneShot {
            at_timestamp: now + delta,
        },
        steps: Vec::new(),
        payload: payload_with_message(&message),
    })
}

/// "every 15 minutes remind me ..." / "every 2 hours check ..."
pub fn try_interval(text: &str, now: DateTime<Utc>) -> Option<ScheduleDraft> {
    let re = regex::Regex::new(
        r"(?i)every\s+(\d+)\s*(second|seconds|sec|minute|minutes|min|hour|hours|hr|day|days)\b(?:\s+(?:to\s+)?(.+))?",
    )
    .ok()?;
    let caps = re.captures(text)?;
    let n: u64 = caps.get(1)?.as_str().parse().ok()?;
    let unit = caps.get(2)?.as_str().to_lowercase();
    let seconds = match unit.as_str() {
        "second" | "seconds" | "sec" => n,
        "minute" | "minutes" | "min" => n * 60,
        "hour" | "hours" | "hr" => n * 3600,
        "day" | "days" => n * 86400,
        _ => return None,
    };
    let message = caps
        .get(3)
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_else(|| text.trim().to_string());
    Some(ScheduleDraft {
        kind: TaskKind::Interval,
        trigger: Trigger::Interval {
            interval_seconds: seconds.max(1),
            anchor: now,
        },
        steps: Vec::new(),
        payload: payload_with_message(&message),
    })
}

const WEEKDAYS: [&str; 7] = [
    "sunday", "monday", "tuesday", "wednesday", "thursday", "friday", "saturday",
];

/// "every day at 9:00" / "every day at 9:00 America/New_York ..."
pub fn try_daily_at(text: &str) -> Option<ScheduleDraft> {
    let re = regex::Regex::new(
        r"(?i)every day at\s+(\d{1,2}):(\d{2})(?:\s+([A-Za-z_]+/[A-Za-z_]+))?(?:\s+(.+))?",
    )
    .ok()?;
    let caps = re.captures(text)?;
    let hour: u32 = caps.get(1)?.as_str().parse().ok()?;
    let minute: u32 = caps.get(2)?.as_str().parse().ok()?;
    if hour > 23 || minute > 59 {
        return None;
    }
    let tz = caps.get(3).map(|m| m.as_str().to_string()).unwrap_or_else(|| "UTC".into());
    let message = caps
        .get(4)
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_else(|| text.trim().to_string());
    Some(ScheduleDraft {
        kind: TaskKind::Cron,
        trigger: Trigger::Cron {
            cron_expr: ac_clock::daily_at_cron(hour, minute),
            timezone: tz,
        },
        steps: Vec::new(),
        payload: payload_with_message(&message),
    })
}

/// "every monday at 9:00" style weekday-scoped reminders.
pub fn try_weekday_at(text: &str) -> Option<ScheduleDraft> {
    let re = regex::Regex::new(
        r"(?i)every\s+(sunday|monday|tuesday|wednesday|thursday|friday|saturday)s?\s+at\s+(\d{1,2}):(\d{2})(?:\s+([A-Za-z_]+/[A-Za-z_]+))?(?:\s+(.+))?",
    )
    .ok()?;
    let caps = re.captures(text)?;
    let weekday_name = caps.get(1)?.as_str().to_lowercase();
    let weekday = WEEKDAYS.iter().position(|d| *d == weekday_name)?;
    let hour: u32 = caps.get(2)?.as_str().parse().ok()?;
    let minute: u32 = caps.get(3)?.as_str().parse().ok()?;
    if hour > 23 || minute > 59 {
        return None;
    }
    let tz = caps.get(4).map(|m| m.as_str().to_string()).unwrap_or_else(|| "UTC".into());
    let message = caps
        .get(5)
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_else(|| text.trim().to_string());
    let cron_expr = format!("{} {} * * {}", minute, hour, weekday);
    Some(ScheduleDraft {
        kind: TaskKind::Cron,
        trigger: Trigger::Cron {
            cron_expr,
            timezone: tz,
        },
        steps: Vec::new(),
        payload: payload_with_message(&message),
    })
}

/// "when bitcoin rises 2% from current price" style threshold automations
/// (spec §8 scenario 1). Builds the exact fetch/set/notify step sequence
/// the expression language's BTC-rule tests exercise.
pub fn try_threshold(text: &str, source_url: &str) -> Option<ScheduleDraft> {
    let re = regex::Regex::new(
        r#"(?i)when\s+([a-z0-9_.\[\]"]+)\s+(rises|drops|increases|decreases)\s+(?:by\s+)?(\d+(?:\.\d+)?)\s*%"#,
    )
    .ok()?;
    let caps = re.captures(text)?;
    let metric_path = caps.get(1)?.as_str();
    let direction = caps.get(2)?.as_str().to_lowercase();
    let percent: f64 = caps.get(3)?.as_str().parse().ok()?;

    let extract_expr = format!("float(source{})", bracket_path(metric_path));
    let comparator = if direction.starts_with("ris") || direction.starts_with("incr") {
        ">="
    } else {
        "<="
    };
    let signed_percent = if comparator == ">=" { percent } else { -percent };
    let guard = format!(
        r#"state["last_value"] and (({extract} - float(state["last_value"])) / float(state["last_value"]) * 100) {comparator} {signed_percent}"#,
        extract = extract_expr,
    );

    let mut payload = HashMap::new();
    payload.insert("source_url".into(), serde_json::Value::String(source_url.to_string()));

    Some(ScheduleDraft {
        kind: TaskKind::Workflow,
        trigger: Trigger::Interval {
            interval_seconds: 300,
            anchor: Utc::now(),
        },
        steps: vec![
            WorkflowStep::Fetch,
            WorkflowStep::Set {
                key: "current_value".into(),
                expr: extract_expr.clone(),
            },
            WorkflowStep::Notify {
                when: guard,
                message: format!("{metric_path} {direction} {percent}%, now {{current_value}}"),
            },
            WorkflowStep::SetState {
                key: "last_value".into(),
                expr: extract_expr,
            },
        ],
        payload,
    })
}

fn bracket_path(path: &str) -> String {
    path.split('.')
        .map(|segment| format!("[\"{segment}\"]"))
        .collect::<Vec<_>>()
        .join("")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_one_shot_parses_minutes() {
        let now = Utc::now();
        let d = try_relative_one_shot("remind me in 20 minutes to stretch", now).unwrap();
        assert!(matches!(d.kind, TaskKind::Reminder));
        if let Trigger::OneShot { at_timestamp } = d.trigger {
            assert!(at_timestamp > now);
        } else {
            panic!("expected one-shot trigger");
        }
        assert_eq!(
            d.payload.get("message").and_then(|v| v.as_str()),
            Some("stretch")
        );
    }

    #[test]
    fn interval_parses_every_n_minutes() {
        let now = Utc::now();
        let d = try_interval("every 15 minutes check the server", now).unwrap();
        if let Trigger::Interval { interval_seconds, .. } = d.trigger {
            assert_eq!(interval_seconds, 900);
        } else {
            panic!("expected interval trigger");
        }
    }

    #[test]
    fn daily_at_parses_hour_minute_and_timezone() {
        let d = try_daily_at("every day at 9:05 America/New_York good morning").unwrap();
        if let Trigger::Cron { cron_expr, timezone } = d.trigger {
            assert_eq!(cron_expr, "5 9 * * *");
            assert_eq!(timezone, "America/New_York");
        } else {
            panic!("expected cron trigger");
        }
    }

    #[test]
    fn weekday_at_resolves_weekday_field() {
        let d = try_weekday_at("every monday at 8:00 stand-up").unwrap();
        if let Trigger::Cron { cron_expr, .. } = d.trigger {
            assert!(cron_expr.ends_with(" 1"));
        } else {
            panic!("expected cron trigger");
        }
    }

    #[test]
    fn threshold_builds_fetch_set_notify_set_state_sequence() {
        let d = try_threshold(
            "when bitcoin.usd rises 2% from current price",
            "https://api.example.test/price",
        )
        .unwrap();
        assert!(matches!(d.kind, TaskKind::Workflow));
        assert_eq!(d.steps.len(), 4);
        assert!(matches!(d.steps[0], WorkflowStep::Fetch));
        assert!(matches!(d.steps[1], WorkflowStep::Set { .. }));
        assert!(matches!(d.steps[2], WorkflowStep::Notify { .. }));
        assert!(matches!(d.steps[3], WorkflowStep::SetState { .. }));
    }

    #[test]
    fn threshold_none_direction_uses_negative_comparator() {
        let d = try_threshold("when bitcoin.usd drops 5% from current price", "https://x").unwrap();
        if let WorkflowStep::Notify { when, .. } = &d.steps[2] {
            assert!(when.contains("<="));
            assert!(when.contains("-5"));
        } else {
            panic!("expected notify step");
        }
    }
}
