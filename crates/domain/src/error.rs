//! Shared error type and the five-kind error taxonomy used across all
//! Autonomy Core crates.

use uuid::Uuid;

/// The error-handling-policy kind from the design's error taxonomy.
/// This is orthogonal to the Rust error enum below: it decides retry
/// policy and user/operator messaging, not how the error is represented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Network timeout, 5xx, KV/SQL connection loss. Bounded retry.
    Transient,
    /// Invalid task spec, unknown tool, schema mismatch, expression out of
    /// grammar. No retry; surfaced to the user.
    Domain,
    /// Verifier rejection, deny-listed command, quota exceeded. No retry;
    /// audited; user message is a refusal.
    Safety,
    /// Step budget exhausted, sandbox CPU/memory ceiling. Abort step, keep
    /// partial results.
    Resource,
    /// Corrupted persistent state, missing required schema. Refuse writes.
    Fatal,
}

/// Shared error type used across all Autonomy Core crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP: {0}")]
    Http(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("provider {provider}: {message}")]
    Provider { provider: String, message: String },

    #[error("config: {0}")]
    Config(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    /// Raised by the Scheduler Engine when a `schedule_add` intent's
    /// timezone or at-time cannot be resolved to a concrete next fire time
    /// with confidence (spec §4.5 "Natural-language intent").
    #[error("ambiguous intent: {0}")]
    AmbiguousIntent(String),

    #[error("{kind:?}: {operator_message} [{correlation_id}]")]
    Surfaced {
        kind: ErrorKind,
        user_message: String,
        operator_message: String,
        correlation_id: Uuid,
    },

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Build a [`Error::Surfaced`] with a fresh correlation id — the
    /// standard boundary-crossing error every component in §7 produces.
    pub fn surfaced(
        kind: ErrorKind,
        user_message: impl Into<String>,
        operator_message: impl Into<String>,
    ) -> Self {
        Error::Surfaced {
            kind,
            user_message: user_message.into(),
            operator_message: operator_message.into(),
            correlation_id: Uuid::new_v4(),
        }
    }

    /// The error-kind classification, used by callers to decide retry
    /// policy per §7. Errors without an explicit kind are treated as
    /// `Domain` (no retry, surface as-is) except IO/HTTP/Timeout, which are
    /// `Transient`.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Io(_) | Error::Http(_) | Error::Timeout(_) => ErrorKind::Transient,
            Error::Surfaced { kind, .. } => *kind,
            Error::Conflict(_) => ErrorKind::Domain,
            Error::NotFound(_) => ErrorKind::Domain,
            _ => ErrorKind::Domain,
        }
    }

    /// Whether this error's kind is eligible for the bounded retry policy
    /// in §4.2 / §7 (transient only).
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }
}

pub type Result<T> = std::result::Result<T, Error>;
