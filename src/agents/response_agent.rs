//! Reply generation over the chat-completion client.

use std::collections::HashMap;
use std::sync::Arc;

use tera::{Context, Tera};

use super::base_agent::{AgentProfile, BaseAgent};
use crate::llms::base_llm::{BaseLLM, CallOptions, LLMMessage};
use crate::services::slack::SlackMessage;
use crate::utilities::errors::{ServiceError, ServiceResult};
use crate::utilities::text_processing::format_conversation;
use crate::utilities::token_counter::ensure_messages_within_limit;

pub const FALLBACK_REPLY: &str = "I'm sorry, I couldn't generate a response for that.";

const SYSTEM_TEMPLATE: &str = "{{ system_prompt }}\
{% if user_context %}\n\nUser context: {{ user_context }}{% endif %}\
{% if linked_content %}\n\nRelevant information: {{ linked_content }}{% endif %}";

pub struct ResponseAgent {
    profile: AgentProfile,
    llm: Arc<dyn BaseLLM>,
    system_prompt: String,
    max_tokens_response: u32,
}

impl std::fmt::Debug for ResponseAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseAgent")
            .field("model", &self.llm.model())
            .field("max_tokens_response", &self.max_tokens_response)
            .finish_non_exhaustive()
    }
}

impl ResponseAgent {
    pub fn new(llm: Arc<dyn BaseLLM>, system_prompt: impl Into<String>, max_tokens_response: u32, verbose: bool) -> Self {
        Self {
            profile: AgentProfile::new("Response Generator", "AI conversation specialist")
                .with_verbose(verbose),
            llm,
            system_prompt: system_prompt.into(),
            max_tokens_response,
        }
    }

    pub fn llm(&self) -> &Arc<dyn BaseLLM> {
        &self.llm
    }

    /// System prompt with the optional user and linked-content sections.
    pub fn render_system_prompt(
        &self,
        user_context: Option<&str>,
        linked_content: Option<&str>,
    ) -> ServiceResult<String> {
        let mut context = Context::new();
        context.insert("system_prompt", &self.system_prompt);
        context.insert("user_context", &user_context.unwrap_or_default());
        context.insert("linked_content", &linked_content.unwrap_or_default());
        Tera::one_off(SYSTEM_TEMPLATE, &context, false)
            .map_err(|e| ServiceError::internal(format!("system prompt template: {}", e)))
    }

    /// Tokens available for the prompt: the context window minus the
    /// response reservation. Trimming keeps a further safety buffer.
    pub fn prompt_token_budget(&self) -> usize {
        self.llm
            .get_context_window_size()
            .saturating_sub(self.max_tokens_response as usize)
    }

    pub fn format_conversation(
        &self,
        messages: &[SlackMessage],
        display_names: &HashMap<String, String>,
        bot_user_id: &str,
    ) -> Vec<LLMMessage> {
        format_conversation(messages, display_names, bot_user_id)
    }

    /// System prompt, history and the current prompt, trimmed to budget.
    pub fn build_messages(
        &self,
        prompt: &str,
        history: Vec<LLMMessage>,
        user_context: Option<&str>,
        linked_content: Option<&str>,
    ) -> ServiceResult<Vec<LLMMessage>> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(LLMMessage::system(self.render_system_prompt(user_context, linked_content)?));
        messages.extend(history);
        messages.push(LLMMessage::user(prompt));
        Ok(ensure_messages_within_limit(messages, self.prompt_token_budget()))
    }

    /// One completion call; an empty completion becomes [`FALLBACK_REPLY`].
    pub async fn generate_response(
        &self,
        prompt: &str,
        history: Vec<LLMMessage>,
        user_context: Option<&str>,
        linked_content: Option<&str>,
    ) -> ServiceResult<String> {
        let messages = self.build_messages(prompt, history, user_context, linked_content)?;
        log::debug!("Generating response from {} messages", messages.len());
        let options = CallOptions {
            max_tokens: Some(self.max_tokens_response),
            temperature: None,
        };
        let reply = self.llm.acall(messages, &options).await?;
        let reply = reply.trim();
        if reply.is_empty() {
            log::warn!("Model returned an empty completion");
            return Ok(FALLBACK_REPLY.to_string());
        }
        Ok(reply.to_string())
    }
}

impl BaseAgent for ResponseAgent {
    fn profile(&self) -> &AgentProfile {
        &self.profile
    }
}
