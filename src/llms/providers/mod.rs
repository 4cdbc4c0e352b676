//! LLM provider implementations.
//!
//! Each provider implements [`BaseLLM`](crate::llms::base_llm::BaseLLM) and
//! handles authentication, request formatting and error mapping for its API.

pub mod openai;

pub use openai::OpenAICompletion;
