//! Shared application state, handed to the Scheduler Engine, the Intent
//! Classifier, and the Debate Dispatcher alike. Assembled once in
//! [`crate::bootstrap::build_app_state`].

use std::sync::Arc;

use ac_clock::Clock;
use ac_domain::Config;
use ac_mcp_client::McpManager;
use ac_persistence::PersistenceGateway;
use ac_providers::registry::ProviderRegistry;
use ac_tool_router::ToolRouter;
use tokio::sync::mpsc;

use crate::debate::DebateDispatcher;
use crate::intent::IntentClassifier;
use crate::notification::Notification;
use crate::router::InboundMessage;
use crate::scheduler::SchedulerEngine;

/// Everything the running process needs, `Arc`-wrapped so cloning `AppState`
/// is cheap and every background task can hold its own copy.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub clock: Arc<dyn Clock>,
    pub gateway: Arc<dyn PersistenceGateway>,
    pub mcp: Arc<McpManager>,
    pub tool_router: Arc<ToolRouter>,
    pub llm: Arc<ProviderRegistry>,
    pub notify_tx: mpsc::Sender<Notification>,
    /// Sender half of the inbound intent channel (spec §9): a transport
    /// layer owns its own clone of this and pushes one [`InboundMessage`]
    /// per user turn; [`crate::router::spawn_router`] owns the paired
    /// receiver.
    pub intent_tx: mpsc::Sender<InboundMessage>,
    /// Identity this process presents when acquiring the scheduler lock
    /// (spec §4.5 point 1: "the node id that acquired the lock").
    pub node_id: String,
    pub scheduler: Arc<SchedulerEngine>,
    pub intent_classifier: Arc<IntentClassifier>,
    pub debate_dispatcher: Arc<DebateDispatcher>,
}
