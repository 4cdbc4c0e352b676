//! Per-channel activity counters.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;

/// Snapshot of one channel's activity.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelStats {
    pub message_count: u64,
    pub user_count: usize,
    pub last_activity: Option<DateTime<Utc>>,
    pub user_message_counts: HashMap<String, u64>,
}

#[derive(Debug, Default)]
struct ChannelEntry {
    message_count: u64,
    users: HashSet<String>,
    last_activity: Option<DateTime<Utc>>,
    user_message_counts: HashMap<String, u64>,
}

#[derive(Debug, Default)]
pub struct ChannelStatsTracker {
    channels: RwLock<HashMap<String, ChannelEntry>>,
}

impl ChannelStatsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_message(&self, channel: &str, user: &str) {
        let mut channels = self.channels.write();
        let entry = channels.entry(channel.to_string()).or_default();
        entry.message_count += 1;
        entry.users.insert(user.to_string());
        entry.last_activity = Some(Utc::now());
        *entry.user_message_counts.entry(user.to_string()).or_insert(0) += 1;
    }

    /// Stats for `channel`; an unseen channel reports zeros.
    pub fn get(&self, channel: &str) -> ChannelStats {
        self.channels
            .read()
            .get(channel)
            .map(|entry| ChannelStats {
                message_count: entry.message_count,
                user_count: entry.users.len(),
                last_activity: entry.last_activity,
                user_message_counts: entry.user_message_counts.clone(),
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_messages_and_distinct_users() {
        let tracker = ChannelStatsTracker::new();
        tracker.record_message("C1", "U1");
        tracker.record_message("C1", "U1");
        tracker.record_message("C1", "U2");
        tracker.record_message("C2", "U3");

        let stats = tracker.get("C1");
        assert_eq!(stats.message_count, 3);
        assert_eq!(stats.user_count, 2);
        assert_eq!(stats.user_message_counts["U1"], 2);
        assert!(stats.last_activity.is_some());

        assert_eq!(tracker.get("C9"), ChannelStats::default());
    }
}
