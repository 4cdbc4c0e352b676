//! Slack Events API payloads.
//!
//! Envelopes arrive over HTTP at `/slack/events`. Mentions, thread replies
//! and direct messages are all reduced to one [`InboundMessage`].

use serde::{Deserialize, Serialize};

use crate::utilities::text_processing::strip_mentions;

/// Outer Events API envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SlackEnvelope {
    /// Sent once when the request URL is configured.
    UrlVerification { challenge: String },
    EventCallback {
        event: SlackEvent,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        event_id: Option<String>,
    },
    #[serde(other)]
    Unknown,
}

/// Inner event types we react to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SlackEvent {
    AppMention(AppMentionEvent),
    Message(MessageEvent),
    ReactionAdded(ReactionAddedEvent),
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppMentionEvent {
    pub user: String,
    pub text: String,
    pub channel: String,
    pub ts: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_ts: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default)]
    pub text: String,
    pub channel: String,
    /// im, channel, group or mpim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_type: Option<String>,
    pub ts: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_ts: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_id: Option<String>,
}

impl MessageEvent {
    pub fn is_direct_message(&self) -> bool {
        self.channel.starts_with('D') || self.channel_type.as_deref() == Some("im")
    }

    pub fn is_bot_message(&self) -> bool {
        self.bot_id.is_some() || self.subtype.as_deref() == Some("bot_message")
    }

    pub fn is_message_changed(&self) -> bool {
        self.subtype.as_deref() == Some("message_changed")
    }

    pub fn is_message_deleted(&self) -> bool {
        self.subtype.as_deref() == Some("message_deleted")
    }

    /// A reply inside an existing thread (not the thread parent).
    pub fn is_thread_reply(&self) -> bool {
        self.thread_ts.as_deref().is_some_and(|t| t != self.ts)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReactionAddedEvent {
    #[serde(default)]
    pub user: String,
    pub reaction: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_user: Option<String>,
    #[serde(default)]
    pub item: ReactionItem,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReactionItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ts: Option<String>,
}

/// How a message reached the bot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Mention,
    ThreadReply,
    DirectMessage,
}

/// A user message the bot should answer, with mentions removed from `text`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InboundMessage {
    pub channel: String,
    pub user: String,
    pub text: String,
    pub ts: String,
    pub thread_ts: Option<String>,
}

impl InboundMessage {
    /// Replies go into the existing thread, or start one under `ts`.
    pub fn reply_thread_ts(&self) -> &str {
        self.thread_ts.as_deref().unwrap_or(&self.ts)
    }

    pub fn is_thread_reply(&self) -> bool {
        self.thread_ts.as_deref().is_some_and(|t| t != self.ts)
    }
}

impl SlackEvent {
    /// Reduce the event to an answerable message.
    ///
    /// Thread replies that mention the bot are skipped here since Slack also
    /// delivers them as `app_mention`. Whether the bot takes part in a thread
    /// is the caller's decision, so `ThreadReply` messages still need that
    /// check. Bot messages, edits and deletions yield `None`.
    pub fn to_inbound(&self, bot_user_id: &str) -> Option<(InboundMessage, Origin)> {
        match self {
            SlackEvent::AppMention(e) => {
                let text = strip_mentions(&e.text);
                Some((
                    InboundMessage {
                        channel: e.channel.clone(),
                        user: e.user.clone(),
                        text,
                        ts: e.ts.clone(),
                        thread_ts: e.thread_ts.clone(),
                    },
                    Origin::Mention,
                ))
            }
            SlackEvent::Message(e) => {
                if e.is_bot_message() || e.is_message_changed() || e.is_message_deleted() || e.subtype.is_some() {
                    return None;
                }
                let user = e.user.as_deref()?;
                if user == bot_user_id {
                    return None;
                }
                let origin = if e.is_direct_message() {
                    Origin::DirectMessage
                } else if e.is_thread_reply() && !e.text.contains(&format!("<@{}", bot_user_id)) {
                    Origin::ThreadReply
                } else {
                    return None;
                };
                Some((
                    InboundMessage {
                        channel: e.channel.clone(),
                        user: user.to_string(),
                        text: strip_mentions(&e.text),
                        ts: e.ts.clone(),
                        thread_ts: e.thread_ts.clone(),
                    },
                    origin,
                ))
            }
            SlackEvent::ReactionAdded(_) | SlackEvent::Unknown => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const BOT: &str = "UBOT";

    fn parse(value: serde_json::Value) -> SlackEnvelope {
        serde_json::from_value(value).unwrap()
    }

    fn event(value: serde_json::Value) -> SlackEvent {
        match parse(json!({"type": "event_callback", "event": value})) {
            SlackEnvelope::EventCallback { event, .. } => event,
            other => panic!("unexpected envelope {:?}", other),
        }
    }

    #[test]
    fn test_url_verification() {
        match parse(json!({"type": "url_verification", "challenge": "abc", "token": "t"})) {
            SlackEnvelope::UrlVerification { challenge } => assert_eq!(challenge, "abc"),
            other => panic!("unexpected envelope {:?}", other),
        }
    }

    #[test]
    fn test_unknown_types_are_tolerated() {
        assert!(matches!(parse(json!({"type": "app_rate_limited"})), SlackEnvelope::Unknown));
        assert!(matches!(event(json!({"type": "team_join", "user": {}})), SlackEvent::Unknown));
    }

    #[test]
    fn test_mention_and_thread_reply_yield_same_triple() {
        let mention = event(json!({
            "type": "app_mention",
            "user": "U1",
            "text": "<@UBOT> what is the plan?",
            "channel": "C1",
            "ts": "200.1",
            "thread_ts": "100.0"
        }));
        let reply = event(json!({
            "type": "message",
            "user": "U1",
            "text": "what is the plan?",
            "channel": "C1",
            "ts": "200.1",
            "thread_ts": "100.0"
        }));

        let (a, origin_a) = mention.to_inbound(BOT).unwrap();
        let (b, origin_b) = reply.to_inbound(BOT).unwrap();
        assert_eq!(origin_a, Origin::Mention);
        assert_eq!(origin_b, Origin::ThreadReply);
        assert_eq!((&a.channel, &a.user, &a.text), (&b.channel, &b.user, &b.text));
        assert_eq!(a.reply_thread_ts(), "100.0");
    }

    #[test]
    fn test_top_level_mention_starts_thread() {
        let (msg, _) = event(json!({
            "type": "app_mention",
            "user": "U1",
            "text": "<@UBOT|chatdsj>   hello  ",
            "channel": "C1",
            "ts": "300.5"
        }))
        .to_inbound(BOT)
        .unwrap();
        assert_eq!(msg.text, "hello");
        assert_eq!(msg.reply_thread_ts(), "300.5");
        assert!(!msg.is_thread_reply());
    }

    #[test]
    fn test_ignored_messages() {
        let bot = event(json!({"type": "message", "bot_id": "B1", "text": "hi", "channel": "C1", "ts": "1", "thread_ts": "0"}));
        let edit = event(json!({"type": "message", "subtype": "message_changed", "channel": "C1", "ts": "1"}));
        let top_level = event(json!({"type": "message", "user": "U1", "text": "hi", "channel": "C1", "ts": "1"}));
        let mentions_bot = event(json!({
            "type": "message", "user": "U1", "text": "<@UBOT> hi", "channel": "C1", "ts": "2", "thread_ts": "1"
        }));
        let own = event(json!({"type": "message", "user": "UBOT", "text": "hi", "channel": "D1", "ts": "1"}));

        for e in [bot, edit, top_level, mentions_bot, own] {
            assert!(e.to_inbound(BOT).is_none(), "{:?}", e);
        }
    }

    #[test]
    fn test_direct_message() {
        let (msg, origin) = event(json!({
            "type": "message", "user": "U1", "text": "hey", "channel": "D42", "channel_type": "im", "ts": "5.0"
        }))
        .to_inbound(BOT)
        .unwrap();
        assert_eq!(origin, Origin::DirectMessage);
        assert_eq!(msg.text, "hey");
    }

    #[test]
    fn test_reaction_event_parses() {
        match event(json!({
            "type": "reaction_added",
            "user": "U1",
            "reaction": "thumbsup",
            "item_user": "UBOT",
            "item": {"type": "message", "channel": "C1", "ts": "9.9"}
        })) {
            SlackEvent::ReactionAdded(r) => {
                assert_eq!(r.reaction, "thumbsup");
                assert_eq!(r.item.ts.as_deref(), Some("9.9"));
            }
            other => panic!("unexpected event {:?}", other),
        }
    }
}
