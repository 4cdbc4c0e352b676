//! Slack-facing agent: posting, history gathering and display names.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::base_agent::{AgentProfile, BaseAgent};
use crate::services::slack::events::InboundMessage;
use crate::services::slack::stats::{ChannelStats, ChannelStatsTracker};
use crate::services::slack::{SlackApi, SlackMessage};
use crate::utilities::errors::ServiceResult;
use crate::utilities::text_processing::strip_mentions;

/// Channel history fetched for an ordinary top-level question.
pub const DEFAULT_HISTORY_LIMIT: usize = 100;
/// Channel history fetched when the user asks about the past.
pub const EXTENDED_HISTORY_LIMIT: usize = 1000;
/// Thread history fetched for questions inside a thread.
pub const THREAD_HISTORY_LIMIT: usize = 1000;

const HISTORY_KEYWORDS: [&str; 5] = ["previous", "before", "earlier", "past", "history"];

pub const ACKNOWLEDGEMENT: &str = "I heard you! I'm working on a response... 🧠";

pub struct SlackAgent {
    profile: AgentProfile,
    slack: Arc<dyn SlackApi>,
    stats: ChannelStatsTracker,
}

impl std::fmt::Debug for SlackAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackAgent")
            .field("name", &self.profile.name)
            .finish_non_exhaustive()
    }
}

impl SlackAgent {
    pub fn new(slack: Arc<dyn SlackApi>, verbose: bool) -> Self {
        Self {
            profile: AgentProfile::new("Slack Interface Specialist", "Slack communication expert")
                .with_verbose(verbose),
            slack,
            stats: ChannelStatsTracker::new(),
        }
    }

    pub fn is_available(&self) -> bool {
        self.slack.is_available()
    }

    pub async fn bot_user_id(&self) -> ServiceResult<String> {
        self.slack.bot_user_id().await
    }

    pub async fn send_message(&self, channel: &str, text: &str, thread_ts: Option<&str>) -> ServiceResult<String> {
        self.slack.post_message(channel, text, thread_ts).await
    }

    /// Post the "working on it" note; failures are logged, not raised.
    pub async fn acknowledge(&self, message: &InboundMessage) {
        if let Err(e) = self
            .slack
            .post_ephemeral(&message.channel, &message.user, ACKNOWLEDGEMENT, message.thread_ts.as_deref())
            .await
        {
            log::warn!("Could not send acknowledgement to {}: {}", message.user, e);
        }
    }

    /// Display name for `user_id`; lookup failures fall back to `User {id}`.
    pub async fn get_user_display_name(&self, user_id: &str) -> String {
        match self.slack.user_info(user_id).await {
            Ok(user) => user.display_name(),
            Err(e) => {
                log::warn!("Could not resolve display name for {}: {}", user_id, e);
                format!("User {}", user_id)
            }
        }
    }

    pub fn clean_prompt_text(&self, text: &str) -> String {
        strip_mentions(text)
    }

    pub fn history_limit_for(prompt: &str) -> usize {
        let lower = prompt.to_lowercase();
        if HISTORY_KEYWORDS.iter().any(|k| lower.contains(k)) {
            EXTENDED_HISTORY_LIMIT
        } else {
            DEFAULT_HISTORY_LIMIT
        }
    }

    /// Conversation around `message`, deduplicated by `ts`, oldest first.
    ///
    /// Top-level questions read the channel only; thread questions read the
    /// channel and the whole thread.
    pub async fn fetch_conversation(&self, message: &InboundMessage) -> ServiceResult<Vec<SlackMessage>> {
        let (channel_history, thread_history) = match message.thread_ts.as_deref() {
            None => {
                let limit = Self::history_limit_for(&message.text);
                (self.slack.channel_history(&message.channel, limit).await?, Vec::new())
            }
            Some(thread_ts) => (
                self.slack
                    .channel_history(&message.channel, DEFAULT_HISTORY_LIMIT)
                    .await?,
                self.slack
                    .thread_history(&message.channel, thread_ts, THREAD_HISTORY_LIMIT)
                    .await?,
            ),
        };

        Ok(merge_histories(channel_history, thread_history))
    }

    /// Display names for every author in `messages`.
    pub async fn display_names_for(&self, messages: &[SlackMessage]) -> HashMap<String, String> {
        let mut names = HashMap::new();
        for user in messages.iter().filter_map(|m| m.user.as_deref()) {
            if !names.contains_key(user) {
                let name = self.get_user_display_name(user).await;
                names.insert(user.to_string(), name);
            }
        }
        names
    }

    pub fn has_replied_in_thread(&self, channel: &str, thread_ts: &str) -> bool {
        self.slack.has_replied_in_thread(channel, thread_ts)
    }

    pub fn update_channel_stats(&self, channel: &str, user: &str) {
        self.stats.record_message(channel, user);
    }

    pub fn channel_stats(&self, channel: &str) -> ChannelStats {
        self.stats.get(channel)
    }
}

impl BaseAgent for SlackAgent {
    fn profile(&self) -> &AgentProfile {
        &self.profile
    }
}

/// Concatenate, drop repeated `ts` values and sort by numeric timestamp.
pub fn merge_histories(channel: Vec<SlackMessage>, thread: Vec<SlackMessage>) -> Vec<SlackMessage> {
    let mut seen = HashSet::new();
    let mut merged: Vec<SlackMessage> = channel
        .into_iter()
        .chain(thread)
        .filter(|m| !m.ts.is_empty() && seen.insert(m.ts.clone()))
        .collect();
    merged.sort_by(|a, b| a.ts_value().total_cmp(&b.ts_value()));
    merged
}
