//! Intent Classifier & Interpreter (spec §4.6): turns a raw inbound message
//! into one of `{chat, schedule_query, schedule_add, action_request}`,
//! with a confidence score gating the transition out of chat mode.

mod extract;

pub use extract::ScheduleDraft;

use ac_domain::config::{ClockConfig, IntentConfig};
use ac_domain::entities::DecisionEvent;
use chrono::{DateTime, Utc};

/// The classified intent, carrying whatever extra data each kind needs to
/// act on (spec §4.6).
#[derive(Debug)]
pub enum Intent {
    Chat,
    ScheduleQuery,
    ScheduleAdd(ScheduleDraft),
    ActionRequest { goal_text: String },
}

impl std::fmt::Debug for ScheduleDraft {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScheduleDraft")
            .field("kind", &self.kind)
            .field("trigger", &self.trigger)
            .field("steps", &self.steps.len())
            .finish()
    }
}

/// Result of a single classification pass, including the decision event the
/// caller should persist when a timezone had to be resolved.
pub struct ClassifyResult {
    pub intent: Intent,
    pub confidence: f64,
    pub language: String,
    pub timezone: String,
    pub timezone_event: Option<DecisionEvent>,
}

const ACTION_VERBS: &[&str] = &[
    "run", "execute", "delete", "remove", "create", "send", "search", "browse",
    "download", "install", "deploy", "restart", "fetch", "open", "write", "build",
    "scrape", "kill", "update", "upgrade", "push", "pull", "clone",
];

const QUERY_PHRASES: &[&str] = &[
    "what's scheduled",
    "what is scheduled",
    "list my",
    "show my",
    "my reminders",
    "my tasks",
    "next run",
    "upcoming",
    "when is my",
];

/// Rough per-language stopword sets for the heuristic language guess. A
/// full language-ID model is out of scope (spec Non-goals); this is enough
/// to route template text back in the user's own language.
const STOPWORDS: &[(&str, &[&str])] = &[
    (
        "en",
        &["the", "is", "and", "to", "a", "of", "you", "please", "me"],
    ),
    (
        "es",
        &["el", "la", "de", "que", "y", "por favor", "me", "para"],
    ),
    (
        "fr",
        &["le", "la", "de", "et", "que", "vous", "s'il", "pour"],
    ),
    (
        "de",
        &["der", "die", "und", "das", "ist", "bitte", "für", "zu"],
    ),
];

pub struct IntentClassifier {
    action_intent_threshold: f64,
    fallback_timezone: String,
}

impl IntentClassifier {
    pub fn new(intent: &IntentConfig, clock: &ClockConfig) -> Self {
        Self {
            action_intent_threshold: intent.action_intent_threshold,
            fallback_timezone: clock.fallback_timezone.clone(),
        }
    }

    fn detect_language(&self, text: &str) -> String {
        let lowered = text.to_lowercase();
        let words: Vec<&str> = lowered.split_whitespace().collect();
        let mut best = ("en", 0usize);
        for (lang, stop) in STOPWORDS {
            let hits = words.iter().filter(|w| stop.contains(w)).count();
            if hits > best.1 {
                best = (lang, hits);
            }
        }
        best.0.to_string()
    }

    /// Resolves the timezone to evaluate schedule expressions in: the
    /// user's recorded timezone if present, else the configured fallback
    /// (spec §4.6: "falls back to the user's recorded timezone, else UTC").
    fn resolve_timezone(&self, user_timezone: Option<&str>) -> (String, Option<DecisionEvent>) {
        match user_timezone {
            Some(tz) => (tz.to_string(), None),
            None => {
                let event = DecisionEvent::new(
                    "timezone_conversion",
                    "intent_classifier",
                    format!("no recorded timezone, falling back to {}", self.fallback_timezone),
                )
                .with_detail("resolved_timezone", self.fallback_timezone.clone());
                (self.fallback_timezone.clone(), Some(event))
            }
        }
    }

    fn action_confidence(&self, text: &str) -> f64 {
        let lowered = text.to_lowercase();
        let hits = ACTION_VERBS.iter().filter(|v| lowered.contains(*v)).count();
        if hits == 0 {
            return 0.0;
        }
        (0.55 + 0.15 * hits as f64).min(0.97)
    }

    fn is_schedule_query(&self, text: &str) -> bool {
        let lowered = text.to_lowercase();
        QUERY_PHRASES.iter().any(|p| lowered.contains(p))
    }

    /// Classifies `text` against the closed intent set (spec §4.6).
    /// `user_timezone` is the caller's recorded IANA zone, if any.
    /// `source_url` is used only when building a threshold-automation
    /// `schedule_add` draft that needs a fetch target.
    pub fn classify(
        &self,
        text: &str,
        now: DateTime<Utc>,
        user_timezone: Option<&str>,
        source_url: Option<&str>,
    ) -> ClassifyResult {
        let language = self.detect_language(text);
        let (timezone, timezone_event) = self.resolve_timezone(user_timezone);

        if let Some(draft) = extract::try_relative_one_shot(text, now)
            .or_else(|| extract::try_interval(text, now))
            .or_else(|| extract::try_weekday_at(text))
            .or_else(|| extract::try_daily_at(text))
            .or_else(|| source_url.and_then(|url| extract::try_threshold(text, url)))
        {
            return ClassifyResult {
                intent: Intent::ScheduleAdd(draft),
                confidence: 0.9,
                language,
                timezone,
                timezone_event,
            };
        }

        if self.is_schedule_query(text) {
            return ClassifyResult {
                intent: Intent::ScheduleQuery,
                confidence: 0.85,
                language,
                timezone,
                timezone_event,
            };
        }

        let action_confidence = self.action_confidence(text);
        if action_confidence >= self.action_intent_threshold {
            return ClassifyResult {
                intent: Intent::ActionRequest {
                    goal_text: text.to_string(),
                },
                confidence: action_confidence,
                language,
                timezone,
                timezone_event,
            };
        }

        // Below-threshold action signal or no signal at all stays in chat
        // mode (spec §4.6: action_request requires c >= threshold to leave
        // chat mode).
        ClassifyResult {
            intent: Intent::Chat,
            confidence: 1.0 - action_confidence,
            language,
            timezone,
            timezone_event,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier(threshold: f64) -> IntentClassifier {
        IntentClassifier::new(
            &IntentConfig {
                action_intent_threshold: threshold,
            },
            &ClockConfig::default(),
        )
    }

    #[test]
    fn plain_greeting_is_chat() {
        let c = classifier(0.8);
        let result = c.classify("hey, how's it going?", Utc::now(), Some("UTC"), None);
        assert!(matches!(result.intent, Intent::Chat));
    }

    #[test]
    fn reminder_phrase_is_schedule_add() {
        let c = classifier(0.8);
        let result = c.classify("remind me in 10 minutes to check the oven", Utc::now(), Some("UTC"), None);
        assert!(matches!(result.intent, Intent::ScheduleAdd(_)));
    }

    #[test]
    fn listing_phrase_is_schedule_query() {
        let c = classifier(0.8);
        let result = c.classify("what's scheduled for tomorrow?", Utc::now(), Some("UTC"), None);
        assert!(matches!(result.intent, Intent::ScheduleQuery));
    }

    #[test]
    fn strong_action_verb_density_crosses_threshold() {
        let c = classifier(0.8);
        let result = c.classify(
            "please run the deploy script and restart the service",
            Utc::now(),
            Some("UTC"),
            None,
        );
        assert!(matches!(result.intent, Intent::ActionRequest { .. }));
        assert!(result.confidence >= 0.8);
    }

    #[test]
    fn weak_action_signal_below_threshold_stays_chat() {
        let c = classifier(0.8);
        let result = c.classify("could you maybe open a window sometime?", Utc::now(), Some("UTC"), None);
        assert!(matches!(result.intent, Intent::Chat));
    }

    #[test]
    fn missing_user_timezone_falls_back_and_logs_event() {
        let c = classifier(0.8);
        let result = c.classify("hello", Utc::now(), None, None);
        assert_eq!(result.timezone, "UTC");
        assert!(result.timezone_event.is_some());
        assert_eq!(
            result.timezone_event.unwrap().event_type,
            "timezone_conversion"
        );
    }

    #[test]
    fn present_user_timezone_does_not_log_an_event() {
        let c = classifier(0.8);
        let result = c.classify("hello", Utc::now(), Some("Europe/Paris"), None);
        assert_eq!(result.timezone, "Europe/Paris");
        assert!(result.timezone_event.is_none());
    }
}
