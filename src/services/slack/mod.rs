//! Slack Web API client.
//!
//! [`SlackApi`] is the seam the agents depend on; [`SlackWebClient`] is the
//! production implementation over `https://slack.com/api`.

pub mod events;
pub mod signature;
pub mod stats;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::utilities::errors::{ServiceError, ServiceResult};
use crate::utilities::metrics::Metrics;

pub const SLACK_API_BASE: &str = "https://slack.com/api";
/// Largest page Slack returns for history calls.
pub const HISTORY_PAGE_SIZE: usize = 100;
/// Threads remembered for [`SlackApi::has_replied_in_thread`]; the thread
/// with the oldest bot reply is forgotten first.
pub const DEFAULT_THREAD_CAPACITY: usize = 10_000;

/// One message as returned by the conversations APIs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlackMessage {
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    pub ts: String,
    #[serde(default)]
    pub thread_ts: Option<String>,
    #[serde(default)]
    pub bot_id: Option<String>,
}

impl SlackMessage {
    pub fn new(user: impl Into<String>, text: impl Into<String>, ts: impl Into<String>) -> Self {
        Self {
            user: Some(user.into()),
            text: Some(text.into()),
            ts: ts.into(),
            thread_ts: None,
            bot_id: None,
        }
    }

    /// Numeric timestamp for ordering; malformed values sort first.
    pub fn ts_value(&self) -> f64 {
        parse_ts(&self.ts)
    }
}

fn parse_ts(ts: &str) -> f64 {
    ts.parse().unwrap_or(0.0)
}

/// The parts of `users.info` the bot uses.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SlackUser {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub real_name: Option<String>,
    #[serde(default)]
    pub profile: SlackProfile,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SlackProfile {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub real_name: Option<String>,
}

impl SlackUser {
    /// `display_name`, then `real_name`, then `name`, then `User {id}`.
    pub fn display_name(&self) -> String {
        [
            self.profile.display_name.as_deref(),
            self.profile.real_name.as_deref(),
            self.real_name.as_deref(),
            self.name.as_deref(),
        ]
        .into_iter()
        .flatten()
        .find(|n| !n.trim().is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("User {}", self.id))
    }
}

/// Slack operations used by the bot.
#[async_trait]
pub trait SlackApi: Send + Sync {
    /// Whether a bot token is configured.
    fn is_available(&self) -> bool;

    /// The bot's own user id (`auth.test`).
    async fn bot_user_id(&self) -> ServiceResult<String>;

    /// Post a message, optionally into a thread. Returns the message `ts`.
    async fn post_message(&self, channel: &str, text: &str, thread_ts: Option<&str>) -> ServiceResult<String>;

    /// Post a message only `user` can see.
    async fn post_ephemeral(
        &self,
        channel: &str,
        user: &str,
        text: &str,
        thread_ts: Option<&str>,
    ) -> ServiceResult<()>;

    /// Up to `limit` most recent channel messages, newest first.
    async fn channel_history(&self, channel: &str, limit: usize) -> ServiceResult<Vec<SlackMessage>>;

    /// Up to `limit` messages of one thread, oldest first.
    async fn thread_history(&self, channel: &str, thread_ts: &str, limit: usize) -> ServiceResult<Vec<SlackMessage>>;

    async fn user_info(&self, user_id: &str) -> ServiceResult<SlackUser>;

    /// Whether the bot has posted into `thread_ts` of `channel`.
    fn has_replied_in_thread(&self, channel: &str, thread_ts: &str) -> bool;
}

/// Production [`SlackApi`] over the Web API.
#[derive(Debug)]
pub struct SlackWebClient {
    token: Option<String>,
    base_url: String,
    http: reqwest::Client,
    bot_user_id: RwLock<Option<String>>,
    user_cache: DashMap<String, SlackUser>,
    /// `channel:thread_ts` of threads the bot has posted into, mapped to the
    /// latest bot message `ts`.
    bot_message_ts: DashMap<String, String>,
    thread_capacity: usize,
    metrics: Option<Arc<Metrics>>,
}

impl SlackWebClient {
    pub fn new(token: Option<String>) -> Self {
        if token.is_none() {
            log::warn!("Slack bot token not provided, Slack calls will fail");
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self {
            token,
            base_url: SLACK_API_BASE.to_string(),
            http,
            bot_user_id: RwLock::new(None),
            user_cache: DashMap::new(),
            bot_message_ts: DashMap::new(),
            thread_capacity: DEFAULT_THREAD_CAPACITY,
            metrics: None,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn with_thread_capacity(mut self, capacity: usize) -> Self {
        self.thread_capacity = capacity.max(1);
        self
    }

    fn remember_reply(&self, key: String, ts: String) {
        self.bot_message_ts.insert(key, ts);
        if self.bot_message_ts.len() <= self.thread_capacity {
            return;
        }
        let oldest = self
            .bot_message_ts
            .iter()
            .min_by(|a, b| parse_ts(a.value()).total_cmp(&parse_ts(b.value())))
            .map(|entry| entry.key().clone());
        if let Some(key) = oldest {
            log::debug!("Forgetting bot thread {}", key);
            self.bot_message_ts.remove(&key);
        }
    }

    fn thread_key(channel: &str, thread_ts: Option<&str>) -> String {
        format!("{}:{}", channel, thread_ts.unwrap_or("main"))
    }

    async fn call(&self, api_method: &str, request: ApiRequest<'_>) -> ServiceResult<Value> {
        let token = self
            .token
            .as_deref()
            .ok_or_else(|| ServiceError::slack("Slack bot token is not configured"))?;
        if let Some(ref m) = self.metrics {
            m.track_api_call("slack");
        }

        let url = format!("{}/{}", self.base_url, api_method);
        let builder = match request {
            ApiRequest::Json(body) => self.http.post(&url).json(body),
            ApiRequest::Query(params) => self.http.get(&url).query(params),
        };

        let result = async {
            let response = builder
                .bearer_auth(token)
                .send()
                .await
                .map_err(|e| ServiceError::slack(format!("{} failed: {}", api_method, e)))?;
            let status = response.status();
            let body: Value = response
                .json()
                .await
                .map_err(|e| ServiceError::slack(format!("{} returned invalid JSON ({}): {}", api_method, status, e)))?;
            if body.get("ok").and_then(Value::as_bool) != Some(true) {
                let error = body.get("error").and_then(Value::as_str).unwrap_or("unknown_error");
                return Err(ServiceError::slack(format!("{}: {}", api_method, error)));
            }
            Ok(body)
        }
        .await;

        if let Err(ref e) = result {
            log::error!("Slack API error: {}", e);
            if let Some(ref m) = self.metrics {
                m.track_error("slack");
            }
        }
        result
    }

    async fn paginate(
        &self,
        api_method: &str,
        base_params: Vec<(&str, String)>,
        limit: usize,
    ) -> ServiceResult<Vec<SlackMessage>> {
        let mut messages: Vec<SlackMessage> = Vec::new();
        let mut cursor: Option<String> = None;

        while messages.len() < limit {
            let page = (limit - messages.len()).min(HISTORY_PAGE_SIZE);
            let mut params = base_params.clone();
            params.push(("limit", page.to_string()));
            if let Some(ref c) = cursor {
                params.push(("cursor", c.clone()));
            }

            let body = self.call(api_method, ApiRequest::Query(&params)).await?;
            let batch: Vec<SlackMessage> = body
                .get("messages")
                .cloned()
                .map(serde_json::from_value)
                .transpose()
                .map_err(|e| ServiceError::slack(format!("{}: malformed messages: {}", api_method, e)))?
                .unwrap_or_default();
            let fetched = batch.len();
            messages.extend(batch);

            cursor = body
                .pointer("/response_metadata/next_cursor")
                .and_then(Value::as_str)
                .filter(|c| !c.is_empty())
                .map(str::to_string);
            if cursor.is_none() || fetched == 0 {
                break;
            }
        }

        messages.truncate(limit);
        log::debug!("{} returned {} messages", api_method, messages.len());
        Ok(messages)
    }
}

enum ApiRequest<'a> {
    Json(&'a Value),
    Query(&'a [(&'a str, String)]),
}

#[async_trait]
impl SlackApi for SlackWebClient {
    fn is_available(&self) -> bool {
        self.token.is_some()
    }

    async fn bot_user_id(&self) -> ServiceResult<String> {
        let cached = self.bot_user_id.read().clone();
        if let Some(id) = cached {
            return Ok(id);
        }
        let body = self.call("auth.test", ApiRequest::Json(&json!({}))).await?;
        let id = body
            .get("user_id")
            .and_then(Value::as_str)
            .ok_or_else(|| ServiceError::slack("auth.test response without user_id"))?
            .to_string();
        log::info!("Slack bot user id: {}", id);
        *self.bot_user_id.write() = Some(id.clone());
        Ok(id)
    }

    async fn post_message(&self, channel: &str, text: &str, thread_ts: Option<&str>) -> ServiceResult<String> {
        let mut payload = json!({ "channel": channel, "text": text });
        if let Some(ts) = thread_ts {
            payload["thread_ts"] = json!(ts);
        }
        let body = self.call("chat.postMessage", ApiRequest::Json(&payload)).await?;
        let ts = body
            .get("ts")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        self.remember_reply(Self::thread_key(channel, thread_ts), ts.clone());
        Ok(ts)
    }

    async fn post_ephemeral(
        &self,
        channel: &str,
        user: &str,
        text: &str,
        thread_ts: Option<&str>,
    ) -> ServiceResult<()> {
        let mut payload = json!({ "channel": channel, "user": user, "text": text });
        if let Some(ts) = thread_ts {
            payload["thread_ts"] = json!(ts);
        }
        self.call("chat.postEphemeral", ApiRequest::Json(&payload))
            .await
            .map(|_| ())
    }

    async fn channel_history(&self, channel: &str, limit: usize) -> ServiceResult<Vec<SlackMessage>> {
        self.paginate(
            "conversations.history",
            vec![("channel", channel.to_string())],
            limit,
        )
        .await
    }

    async fn thread_history(&self, channel: &str, thread_ts: &str, limit: usize) -> ServiceResult<Vec<SlackMessage>> {
        self.paginate(
            "conversations.replies",
            vec![("channel", channel.to_string()), ("ts", thread_ts.to_string())],
            limit,
        )
        .await
    }

    async fn user_info(&self, user_id: &str) -> ServiceResult<SlackUser> {
        if let Some(cached) = self.user_cache.get(user_id) {
            return Ok(cached.clone());
        }
        let params = [("user", user_id.to_string())];
        let body = self.call("users.info", ApiRequest::Query(&params)).await?;
        let user: SlackUser = serde_json::from_value(body.get("user").cloned().unwrap_or(Value::Null))
            .map_err(|e| ServiceError::slack(format!("users.info: malformed user: {}", e)))?;
        self.user_cache.insert(user_id.to_string(), user.clone());
        Ok(user)
    }

    fn has_replied_in_thread(&self, channel: &str, thread_ts: &str) -> bool {
        self.bot_message_ts
            .contains_key(&Self::thread_key(channel, Some(thread_ts)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> SlackWebClient {
        SlackWebClient::new(Some("xoxb-test".into())).with_base_url(server.uri())
    }

    #[test]
    fn test_display_name_fallbacks() {
        let mut user = SlackUser {
            id: "U1".into(),
            ..Default::default()
        };
        assert_eq!(user.display_name(), "User U1");
        user.name = Some("dana".into());
        assert_eq!(user.display_name(), "dana");
        user.profile.real_name = Some("Dana Smith".into());
        assert_eq!(user.display_name(), "Dana Smith");
        user.profile.display_name = Some("".into());
        assert_eq!(user.display_name(), "Dana Smith");
        user.profile.display_name = Some("DJ".into());
        assert_eq!(user.display_name(), "DJ");
    }

    #[tokio::test]
    async fn test_unconfigured_client_fails_without_network() {
        let client = SlackWebClient::new(None);
        assert!(!client.is_available());
        let err = client.post_message("C1", "hi", None).await.unwrap_err();
        assert!(matches!(err, ServiceError::Slack { .. }));
    }

    #[tokio::test]
    async fn test_post_message_records_thread() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat.postMessage"))
            .and(header("authorization", "Bearer xoxb-test"))
            .and(body_partial_json(json!({"channel": "C1", "thread_ts": "111.1"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true, "ts": "222.2"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server);
        let ts = client.post_message("C1", "hello", Some("111.1")).await.unwrap();
        assert_eq!(ts, "222.2");
        assert!(client.has_replied_in_thread("C1", "111.1"));
        assert!(!client.has_replied_in_thread("C1", "333.3"));
    }

    #[tokio::test]
    async fn test_thread_memory_is_capped() {
        let server = MockServer::start().await;
        for (channel, ts) in [("C1", "100.1"), ("C2", "200.1"), ("C3", "300.1")] {
            Mock::given(method("POST"))
                .and(path("/chat.postMessage"))
                .and(body_partial_json(json!({"channel": channel})))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true, "ts": ts})))
                .mount(&server)
                .await;
        }

        let client = client(&server).with_thread_capacity(2);
        client.post_message("C1", "a", Some("100.0")).await.unwrap();
        client.post_message("C2", "b", Some("200.0")).await.unwrap();
        client.post_message("C3", "c", Some("300.0")).await.unwrap();

        assert!(!client.has_replied_in_thread("C1", "100.0"));
        assert!(client.has_replied_in_thread("C2", "200.0"));
        assert!(client.has_replied_in_thread("C3", "300.0"));
    }

    #[tokio::test]
    async fn test_api_error_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat.postMessage"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"ok": false, "error": "channel_not_found"})),
            )
            .mount(&server)
            .await;

        let err = client(&server).post_message("C404", "hi", None).await.unwrap_err();
        assert!(err.to_string().contains("channel_not_found"));
    }

    #[tokio::test]
    async fn test_history_paginates_until_limit() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/conversations.history"))
            .and(query_param("cursor", "next"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "messages": [{"user": "U2", "text": "second page", "ts": "1.0"}],
                "response_metadata": {"next_cursor": ""}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/conversations.history"))
            .and(query_param("limit", "100"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "messages": [
                    {"user": "U1", "text": "newest", "ts": "3.0"},
                    {"bot_id": "B1", "text": "bot says", "ts": "2.0"}
                ],
                "response_metadata": {"next_cursor": "next"}
            })))
            .mount(&server)
            .await;

        let history = client(&server).channel_history("C1", 150).await.unwrap();
        let texts: Vec<_> = history.iter().filter_map(|m| m.text.as_deref()).collect();
        assert_eq!(texts, vec!["newest", "bot says", "second page"]);
        assert_eq!(history[1].user, None);
    }

    #[tokio::test]
    async fn test_user_info_is_cached() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users.info"))
            .and(query_param("user", "U1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "user": {"id": "U1", "name": "dana", "profile": {"display_name": "DJ"}}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server);
        assert_eq!(client.user_info("U1").await.unwrap().display_name(), "DJ");
        assert_eq!(client.user_info("U1").await.unwrap().display_name(), "DJ");
    }

    #[tokio::test]
    async fn test_bot_user_id_is_cached() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth.test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true, "user_id": "UBOT"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server);
        assert_eq!(client.bot_user_id().await.unwrap(), "UBOT");
        assert_eq!(client.bot_user_id().await.unwrap(), "UBOT");
    }
}
