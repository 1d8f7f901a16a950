//! The outbound notification channel the Scheduler Engine and Debate
//! Dispatcher publish into. Transport delivery (Telegram, etc.) is an
//! external collaborator (spec §1, §6.1); this crate only owns the sender
//! half so a transport layer can be wired in without this crate holding a
//! reference back to it.

use serde::Serialize;

/// A message ready for delivery to a user, produced by a fired task or a
/// completed debate.
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub user_id: String,
    pub text: String,
    pub source: NotificationSource,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationSource {
    Scheduler,
    Debate,
}

impl Notification {
    pub fn scheduler(user_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            text: text.into(),
            source: NotificationSource::Scheduler,
        }
    }

    pub fn debate(user_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            text: text.into(),
            source: NotificationSource::Debate,
        }
    }
}
