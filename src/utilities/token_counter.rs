//! Length-based token estimation and history trimming.
//!
//! Token counts are estimated from character length rather than a real
//! tokenizer; the estimate only has to be close enough to keep a request
//! under the model's context window.

use crate::llms::base_llm::{LLMMessage, MessageRole};

/// Characters per estimated token.
pub const CHARS_PER_TOKEN: usize = 4;
/// Per-message framing overhead.
pub const TOKENS_PER_MESSAGE: usize = 3;
/// Every reply is primed with `<|start|>assistant<|message|>`.
pub const REPLY_PRIMING_TOKENS: usize = 3;
/// Headroom kept free when trimming history.
pub const SAFETY_BUFFER_TOKENS: usize = 100;
/// Cost charged per history message while trimming.
const TRIM_MESSAGE_OVERHEAD: usize = 4;

/// Estimate the token count of a string (`ceil(chars / 4)`).
pub fn count_tokens(text: &str) -> usize {
    let chars = text.chars().count();
    (chars + CHARS_PER_TOKEN - 1) / CHARS_PER_TOKEN
}

/// Estimate the token count of a full chat request.
pub fn count_message_tokens(messages: &[LLMMessage]) -> usize {
    let body: usize = messages
        .iter()
        .map(|m| TOKENS_PER_MESSAGE + count_tokens(&m.content))
        .sum();
    body + REPLY_PRIMING_TOKENS
}

/// Trim a conversation so that it fits within `max_tokens`.
///
/// System messages are always kept and placed first. The remaining budget,
/// less [`SAFETY_BUFFER_TOKENS`], is filled with the most recent non-system
/// messages, which keep their chronological order.
pub fn ensure_messages_within_limit(messages: Vec<LLMMessage>, max_tokens: usize) -> Vec<LLMMessage> {
    if count_message_tokens(&messages) <= max_tokens {
        return messages;
    }

    let (system, rest): (Vec<LLMMessage>, Vec<LLMMessage>) = messages
        .into_iter()
        .partition(|m| m.role == MessageRole::System);

    let system_tokens: usize = system.iter().map(|m| count_tokens(&m.content)).sum();
    let available = max_tokens
        .saturating_sub(system_tokens)
        .saturating_sub(SAFETY_BUFFER_TOKENS);

    let mut used = 0;
    let mut kept = Vec::new();
    for message in rest.into_iter().rev() {
        let cost = count_tokens(&message.content) + TRIM_MESSAGE_OVERHEAD;
        if used + cost > available {
            break;
        }
        used += cost;
        kept.push(message);
    }
    kept.reverse();

    log::debug!(
        "Trimmed conversation to {} system + {} recent messages ({} tokens budget)",
        system.len(),
        kept.len(),
        available
    );

    let mut result = system;
    result.extend(kept);
    result
}
