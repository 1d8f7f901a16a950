pub mod env;
pub mod manager;
pub mod protocol;
pub mod server;
pub mod transport;

pub use manager::McpManager;
pub use server::{ManagedServer, McpError};
pub use transport::{McpTransport, StdioTransport, TransportError};
