pub mod config;
pub mod entities;
pub mod error;
pub mod expr;
pub mod message;
pub mod stream;

pub use config::Config;
pub use entities::*;
pub use error::{Error, ErrorKind, Result};
pub use message::{ContentPart, Message, MessageContent, Role, ToolCall, ToolDefinition};
pub use stream::{BoxStream, StreamEvent, Usage};
