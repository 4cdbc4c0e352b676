//! In-process fakes for the external services, shared by unit tests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::agents::{ContentAgent, MemoryAgent, ResponseAgent, SlackAgent, TodoAgent};
use crate::crew::CrewManager;
use crate::llms::base_llm::{BaseLLM, CallOptions, LLMMessage};
use crate::memory::storage::InMemoryStore;
use crate::server::AppState;
use crate::services::content::{ContentService, PageFetcher};
use crate::services::slack::{SlackApi, SlackMessage, SlackProfile, SlackUser};
use crate::types::usage_metrics::UsageMetrics;
use crate::utilities::errors::{ServiceError, ServiceResult};
use crate::utilities::metrics::Metrics;

pub const BOT_USER_ID: &str = "UBOT";
pub const SIGNING_SECRET: &str = "8f742231b10e8888abcd99yyyzzz85a5";
pub const ARTICLE_URL: &str = "https://example.com/post";

/// One recorded outbound Slack call.
#[derive(Debug, Clone, PartialEq)]
pub enum SlackCall {
    BotUserId,
    PostMessage { channel: String, text: String, thread_ts: Option<String> },
    PostEphemeral { channel: String, user: String, text: String },
    ChannelHistory { channel: String, limit: usize },
    ThreadHistory { channel: String, thread_ts: String, limit: usize },
    UserInfo { user: String },
}

#[derive(Debug, Default)]
pub struct FakeSlack {
    pub calls: Mutex<Vec<SlackCall>>,
    pub channel_messages: Mutex<Vec<SlackMessage>>,
    pub thread_messages: Mutex<Vec<SlackMessage>>,
    pub display_names: HashMap<String, String>,
    pub threads_replied: Mutex<Vec<(String, String)>>,
    pub fail_posts: bool,
}

impl FakeSlack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, id: &str, display_name: &str) -> Self {
        self.display_names.insert(id.to_string(), display_name.to_string());
        self
    }

    pub fn calls(&self) -> Vec<SlackCall> {
        self.calls.lock().clone()
    }

    pub fn posted_texts(&self) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                SlackCall::PostMessage { text, .. } => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: SlackCall) {
        self.calls.lock().push(call);
    }
}

#[async_trait]
impl SlackApi for FakeSlack {
    fn is_available(&self) -> bool {
        true
    }

    async fn bot_user_id(&self) -> ServiceResult<String> {
        self.record(SlackCall::BotUserId);
        Ok(BOT_USER_ID.to_string())
    }

    async fn post_message(&self, channel: &str, text: &str, thread_ts: Option<&str>) -> ServiceResult<String> {
        self.record(SlackCall::PostMessage {
            channel: channel.to_string(),
            text: text.to_string(),
            thread_ts: thread_ts.map(str::to_string),
        });
        if self.fail_posts {
            return Err(ServiceError::slack("chat.postMessage: channel_not_found"));
        }
        if let Some(ts) = thread_ts {
            self.threads_replied.lock().push((channel.to_string(), ts.to_string()));
        }
        Ok("9999.0001".to_string())
    }

    async fn post_ephemeral(
        &self,
        channel: &str,
        user: &str,
        text: &str,
        _thread_ts: Option<&str>,
    ) -> ServiceResult<()> {
        self.record(SlackCall::PostEphemeral {
            channel: channel.to_string(),
            user: user.to_string(),
            text: text.to_string(),
        });
        Ok(())
    }

    async fn channel_history(&self, channel: &str, limit: usize) -> ServiceResult<Vec<SlackMessage>> {
        self.record(SlackCall::ChannelHistory { channel: channel.to_string(), limit });
        Ok(self.channel_messages.lock().clone())
    }

    async fn thread_history(&self, channel: &str, thread_ts: &str, limit: usize) -> ServiceResult<Vec<SlackMessage>> {
        self.record(SlackCall::ThreadHistory {
            channel: channel.to_string(),
            thread_ts: thread_ts.to_string(),
            limit,
        });
        Ok(self.thread_messages.lock().clone())
    }

    async fn user_info(&self, user_id: &str) -> ServiceResult<SlackUser> {
        self.record(SlackCall::UserInfo { user: user_id.to_string() });
        Ok(SlackUser {
            id: user_id.to_string(),
            name: None,
            real_name: None,
            profile: SlackProfile {
                display_name: self.display_names.get(user_id).cloned(),
                real_name: None,
            },
        })
    }

    fn has_replied_in_thread(&self, channel: &str, thread_ts: &str) -> bool {
        self.threads_replied
            .lock()
            .iter()
            .any(|(c, t)| c == channel && t == thread_ts)
    }
}

/// Scripted LLM: returns `reply` (or fails) and records every request.
#[derive(Debug)]
pub struct FakeLLM {
    pub reply: Option<String>,
    pub requests: Mutex<Vec<Vec<LLMMessage>>>,
    pub context_window: usize,
}

impl FakeLLM {
    pub fn replying(reply: impl Into<String>) -> Self {
        Self {
            reply: Some(reply.into()),
            requests: Mutex::new(Vec::new()),
            context_window: 128_000,
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: None,
            requests: Mutex::new(Vec::new()),
            context_window: 128_000,
        }
    }

    pub fn last_request(&self) -> Option<Vec<LLMMessage>> {
        self.requests.lock().last().cloned()
    }
}

#[async_trait]
impl BaseLLM for FakeLLM {
    fn model(&self) -> &str {
        "fake-model"
    }

    fn temperature(&self) -> Option<f64> {
        None
    }

    fn get_context_window_size(&self) -> usize {
        self.context_window
    }

    async fn acall(&self, messages: Vec<LLMMessage>, _options: &CallOptions) -> ServiceResult<String> {
        self.requests.lock().push(messages);
        self.reply
            .clone()
            .ok_or_else(|| ServiceError::llm("OpenAI API error (500): upstream unavailable"))
    }

    fn get_token_usage_summary(&self) -> UsageMetrics {
        UsageMetrics::new()
    }
}

/// Serves fixed HTML per URL.
#[derive(Debug, Default)]
pub struct StaticFetcher {
    pub pages: HashMap<String, String>,
}

impl StaticFetcher {
    pub fn with_page(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(url.to_string(), html.to_string());
        self
    }
}

#[async_trait]
impl PageFetcher for StaticFetcher {
    async fn fetch(&self, url: &str) -> ServiceResult<String> {
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| ServiceError::content(format!("{} returned 404 Not Found", url)))
    }
}

/// An article page with enough prose for extraction.
pub fn article_html(title: &str, sentences: usize) -> String {
    let body: String = (1..=sentences)
        .map(|i| format!("<p>Paragraph {} explains one more detail about the topic at considerable length.</p>", i))
        .collect();
    format!("<html><head><title>{}</title></head><body><main>{}</main></body></html>", title, body)
}

/// Application state wired to fakes and an in-memory store.
///
/// [`ARTICLE_URL`] serves a "Deep Dive" article.
pub fn app_state(slack: FakeSlack, llm: FakeLLM) -> (AppState, Arc<FakeSlack>, Arc<InMemoryStore>) {
    let slack = Arc::new(slack);
    let llm: Arc<dyn BaseLLM> = Arc::new(llm);
    let store = Arc::new(InMemoryStore::new());
    let metrics = Arc::new(Metrics::new());

    let fetcher = StaticFetcher::default().with_page(ARTICLE_URL, &article_html("Deep Dive", 20));
    let content = ContentAgent::new(ContentService::new(Arc::new(fetcher)), Some(llm.clone()), false);
    let crew = CrewManager::new(
        SlackAgent::new(slack.clone(), false),
        MemoryAgent::new(store.clone(), false),
        ResponseAgent::new(llm, "You are ChatDSJ.", 100, false),
        Arc::new(content),
        TodoAgent::new(store.clone(), false),
        metrics.clone(),
        false,
    );
    let state = AppState::new(Arc::new(crew), store.clone(), metrics, SIGNING_SECRET, false);
    (state, slack, store)
}
