//! Chat-completion clients.
//!
//! - [`base_llm`] - The trait every client implements, plus message types
//! - [`providers`] - Concrete API integrations

pub mod base_llm;
pub mod providers;

pub use base_llm::{BaseLLM, BaseLLMState, CallOptions, LLMMessage, MessageRole};
