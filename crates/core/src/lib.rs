//! Autonomy Core: the Scheduler Engine, Intent Classifier, and Debate
//! Dispatcher that sit behind a conversational assistant, plus the
//! bootstrap and CLI that wire them to the persistence, process
//! supervision, and tool-routing layers underneath.

pub mod bootstrap;
pub mod cli;
pub mod debate;
pub mod intent;
pub mod notification;
pub mod router;
pub mod scheduler;
pub mod state;

pub use notification::{Notification, NotificationSource};
pub use state::AppState;
