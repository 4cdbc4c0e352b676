//! Text helpers: command argument extraction, URL discovery, mention
//! cleanup, word-capped truncation and Slack history formatting.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::llms::base_llm::LLMMessage;
use crate::services::slack::SlackMessage;

static NICKNAME_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)\b(?:call\s+me|my\s+(?:nick)?name\s+is|i\s+am|i'm)\s+([A-Za-z0-9_\-]+)",
        r"(?i)\bnickname(?:\s*:\s*|\s+is\s+|\s+)([A-Za-z0-9_\-]+)",
        r"(?i)\bname(?:\s*:\s*|\s+is\s+|\s+)([A-Za-z0-9_\-]+)",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static TODO_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?im)\btodo:\s*(.+)$",
        r"(?im)remember\s+to\s+(.+)$",
        r"(?im)don't\s+forget\s+to\s+(.+)$",
        r"(?im)note\s+to\s+self:?\s+(.+)$",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static URL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"https?://(?:www\.)?[-a-zA-Z0-9@:%._+~#=]{1,256}\.[a-zA-Z0-9()]{1,6}\b[-a-zA-Z0-9()@:%_+.~#?&/=]*"#)
        .unwrap()
});

/// Slack wraps links as `<https://example.com|label>`.
static SLACK_LINK: Lazy<Regex> = Lazy::new(|| Regex::new(r"<(https?://[^|>]+)(?:\|[^>]*)?>").unwrap());

static USER_MENTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"<@[A-Z0-9]+(?:\|[^>]*)?>").unwrap());

static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Extract a nickname from phrases such as "call me X" or "my name is X".
pub fn extract_nickname(text: &str) -> Option<String> {
    NICKNAME_PATTERNS.iter().find_map(|re| {
        re.captures(text).map(|caps| {
            let nickname = caps[1].trim().to_string();
            log::debug!("Extracted nickname: {}", nickname);
            nickname
        })
    })
}

/// Extract a todo item from phrases such as "todo: X" or "remember to X".
pub fn extract_todo(text: &str) -> Option<String> {
    TODO_PATTERNS.iter().find_map(|re| {
        re.captures(text)
            .map(|caps| caps[1].trim().to_string())
            .filter(|todo| !todo.is_empty())
    })
}

/// Find the distinct http(s) URLs in `text`, in order of first appearance.
///
/// Slack link markup is unwrapped first; trailing punctuation is dropped.
pub fn extract_urls(text: &str) -> Vec<String> {
    let unwrapped = SLACK_LINK.replace_all(text, "$1");
    let mut urls: Vec<String> = Vec::new();
    for m in URL_PATTERN.find_iter(&unwrapped) {
        let url = m.as_str().trim_end_matches(['.', ',', ';', ':', ')']).to_string();
        if !urls.contains(&url) {
            urls.push(url);
        }
    }
    urls
}

/// Remove `<@U…>` mention tokens and collapse the remaining whitespace.
pub fn strip_mentions(text: &str) -> String {
    let without = USER_MENTION.replace_all(text, " ");
    WHITESPACE_RUN.replace_all(without.trim(), " ").into_owned()
}

/// Cut `text` to at most `max_words` words.
///
/// Returns the text unchanged when it is short enough, otherwise the first
/// `max_words` words followed by `...`.
pub fn truncate_words(text: &str, max_words: usize) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() <= max_words {
        return text.trim().to_string();
    }
    format!("{}...", words[..max_words].join(" "))
}

/// Number of whitespace-separated words.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Convert Slack history into chat messages.
///
/// Messages posted by the bot become `assistant` turns; everything else is a
/// `user` turn prefixed with the author's display name when one is known.
/// Messages without an author or with blank text are skipped.
pub fn format_conversation(
    messages: &[SlackMessage],
    display_names: &HashMap<String, String>,
    bot_user_id: &str,
) -> Vec<LLMMessage> {
    let formatted: Vec<LLMMessage> = messages
        .iter()
        .filter_map(|msg| {
            let user = msg.user.as_deref()?;
            let text = msg.text.as_deref()?;
            if text.trim().is_empty() {
                return None;
            }
            if user == bot_user_id {
                return Some(LLMMessage::assistant(text));
            }
            Some(match display_names.get(user) {
                Some(name) => LLMMessage::user(format!("{}: {}", name, text)),
                None => LLMMessage::user(text),
            })
        })
        .collect();

    log::debug!("Formatted {} Slack messages for the LLM", formatted.len());
    formatted
}
