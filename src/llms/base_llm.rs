//! Base trait for chat-completion clients.
//!
//! Agents only see [`BaseLLM`]; the OpenAI provider implements it against the
//! real API and tests substitute scripted fakes.

use std::fmt;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::types::usage_metrics::UsageMetrics;
use crate::utilities::errors::ServiceResult;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Default context window size in tokens.
pub const DEFAULT_CONTEXT_WINDOW_SIZE: usize = 4096;

/// Sampling temperature used for conversational replies.
pub const DEFAULT_TEMPERATURE: f64 = 0.7;

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

/// A single message in an LLM conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LLMMessage {
    pub role: MessageRole,
    pub content: String,
}

impl LLMMessage {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }
}

/// Per-call overrides.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallOptions {
    /// Maximum completion tokens.
    pub max_tokens: Option<u32>,
    /// Overrides the client's default temperature.
    pub temperature: Option<f64>,
}

// ---------------------------------------------------------------------------
// BaseLLM trait
// ---------------------------------------------------------------------------

/// Interface every chat-completion client implements.
#[async_trait]
pub trait BaseLLM: Send + Sync + fmt::Debug {
    /// Get the model identifier/name.
    fn model(&self) -> &str;

    /// Get the optional temperature setting.
    fn temperature(&self) -> Option<f64>;

    /// Get the provider name.
    fn provider(&self) -> &str {
        "openai"
    }

    /// Whether credentials are configured.
    fn is_available(&self) -> bool {
        true
    }

    /// Get the context window size for the LLM.
    fn get_context_window_size(&self) -> usize {
        DEFAULT_CONTEXT_WINDOW_SIZE
    }

    /// Send one chat-completion request and return the reply text.
    async fn acall(&self, messages: Vec<LLMMessage>, options: &CallOptions) -> ServiceResult<String>;

    /// Get a summary of token usage for this LLM instance.
    fn get_token_usage_summary(&self) -> UsageMetrics;
}

// ---------------------------------------------------------------------------
// Shared provider state
// ---------------------------------------------------------------------------

/// Fields common to provider implementations.
#[derive(Debug)]
pub struct BaseLLMState {
    pub model: String,
    pub temperature: Option<f64>,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    usage: Mutex<UsageMetrics>,
}

impl BaseLLMState {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            temperature: Some(DEFAULT_TEMPERATURE),
            api_key: None,
            base_url: None,
            usage: Mutex::new(UsageMetrics::new()),
        }
    }

    pub fn record_attempt(&self) {
        self.usage.lock().requests_made += 1;
    }

    pub fn record_failure(&self) {
        self.usage.lock().failed_requests += 1;
    }

    pub fn record_completion(&self, prompt_tokens: i64, completion_tokens: i64, cost_usd: f64) {
        self.usage
            .lock()
            .record_completion(prompt_tokens, completion_tokens, cost_usd);
    }

    pub fn get_token_usage_summary(&self) -> UsageMetrics {
        self.usage.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_serializes_lowercase_role() {
        let json = serde_json::to_value(LLMMessage::assistant("hi")).unwrap();
        assert_eq!(json, serde_json::json!({"role": "assistant", "content": "hi"}));
    }

    #[test]
    fn test_state_usage_tracking() {
        let state = BaseLLMState::new("gpt-4o");
        state.record_attempt();
        state.record_attempt();
        state.record_failure();
        state.record_completion(12, 8, 0.001);

        let usage = state.get_token_usage_summary();
        assert_eq!(usage.requests_made, 2);
        assert_eq!(usage.failed_requests, 1);
        assert_eq!(usage.successful_requests, 1);
        assert_eq!(usage.total_tokens, 20);
    }
}
