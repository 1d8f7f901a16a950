//! LLM call layer (spec §4.7): provider-agnostic chat/embeddings traits,
//! adapters for OpenAI-compatible, Anthropic, and Google endpoints, and a
//! registry resolving configured providers to debate-dispatcher roles.

pub mod anthropic;
pub mod google;
pub mod openai_compat;
pub mod registry;
mod sse;
pub mod traits;
mod util;

pub use registry::{ProviderInitError, ProviderRegistry};
pub use traits::{ChatRequest, ChatResponse, EmbeddingsRequest, EmbeddingsResponse, LlmProvider};
