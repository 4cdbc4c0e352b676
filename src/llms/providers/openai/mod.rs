//! OpenAI Chat Completions provider.
//!
//! Direct integration with `POST {base}/chat/completions` over `reqwest`:
//! bearer authentication, request timeout, retry with exponential backoff on
//! transport errors, 429 and 5xx responses, and usage/cost accounting.

pub mod pricing;

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::llms::base_llm::{BaseLLM, BaseLLMState, CallOptions, LLMMessage};
use crate::types::usage_metrics::UsageMetrics;
use crate::utilities::errors::{ServiceError, ServiceResult};

/// Default OpenAI endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI chat-completion client.
#[derive(Debug)]
pub struct OpenAICompletion {
    /// Shared base LLM state.
    pub state: BaseLLMState,
    /// Organization ID for multi-tenant access.
    pub organization: Option<String>,
    /// Request timeout in seconds.
    pub timeout: f64,
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry; doubled on each subsequent retry.
    pub retry_delay: Duration,
    /// Maximum tokens in response when the caller sets none.
    pub max_tokens: Option<u32>,
    client: reqwest::Client,
}

impl OpenAICompletion {
    /// Create a new OpenAI completion provider.
    ///
    /// A missing `api_key` leaves the provider unavailable; calls then fail
    /// with [`ServiceError::Llm`] without touching the network.
    pub fn new(model: impl Into<String>, api_key: Option<String>, base_url: Option<String>) -> Self {
        let mut state = BaseLLMState::new(model);
        state.api_key = api_key.filter(|k| !k.trim().is_empty());
        state.base_url = base_url;

        Self {
            state,
            organization: None,
            timeout: 120.0,
            max_retries: 2,
            retry_delay: Duration::from_secs(1),
            max_tokens: None,
            client: reqwest::Client::new(),
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn with_organization(mut self, organization: Option<String>) -> Self {
        self.organization = organization;
        self
    }

    /// Get the API base URL.
    pub fn api_base_url(&self) -> String {
        self.state
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string()
    }

    /// Build the request body for the Chat Completions API.
    pub fn build_request_body(&self, messages: &[LLMMessage], options: &CallOptions) -> Value {
        let mut body = serde_json::json!({
            "model": self.state.model,
            "messages": messages,
        });

        if let Some(temp) = options.temperature.or(self.state.temperature) {
            body["temperature"] = serde_json::json!(temp);
        }
        if let Some(max_tokens) = options.max_tokens.or(self.max_tokens) {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        body
    }

    /// Extract the reply text and record token usage.
    fn parse_completions_response(&self, response: &Value) -> ServiceResult<String> {
        let message = response
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|choice| choice.get("message"))
            .ok_or_else(|| ServiceError::llm("No choices in OpenAI response"))?;

        let content = message
            .get("content")
            .and_then(|c| c.as_str())
            .unwrap_or("")
            .to_string();

        if let Some(usage) = response.get("usage") {
            let prompt = usage.get("prompt_tokens").and_then(|v| v.as_i64()).unwrap_or(0);
            let completion = usage
                .get("completion_tokens")
                .and_then(|v| v.as_i64())
                .unwrap_or(0);
            let cost = pricing::estimate_cost(&self.state.model, prompt, completion);
            log::debug!(
                "OpenAI token usage: prompt={}, completion={}, cost=${:.5}",
                prompt,
                completion,
                cost
            );
            self.state.record_completion(prompt, completion, cost);
        } else {
            self.state.record_completion(0, 0, 0.0);
        }

        Ok(content)
    }
}

#[async_trait]
impl BaseLLM for OpenAICompletion {
    fn model(&self) -> &str {
        &self.state.model
    }

    fn temperature(&self) -> Option<f64> {
        self.state.temperature
    }

    fn is_available(&self) -> bool {
        self.state.api_key.is_some()
    }

    fn get_context_window_size(&self) -> usize {
        let model = &self.state.model;
        if model.contains("gpt-4o") || model.contains("gpt-4-turbo") || model.contains("o1") {
            128_000
        } else if model.contains("gpt-4.1") {
            1_047_576
        } else if model.contains("gpt-4-32k") {
            32_768
        } else if model.contains("gpt-4") {
            8_192
        } else if model.contains("gpt-3.5-turbo-16k") {
            16_384
        } else {
            4_096
        }
    }

    async fn acall(&self, messages: Vec<LLMMessage>, options: &CallOptions) -> ServiceResult<String> {
        log::debug!(
            "OpenAICompletion.acall: model={}, messages={}",
            self.state.model,
            messages.len(),
        );

        let api_key = self
            .state
            .api_key
            .as_ref()
            .ok_or_else(|| ServiceError::llm("OpenAI API key not set (OPENAI_API_KEY)"))?;

        let body = self.build_request_body(&messages, options);
        let endpoint = format!("{}/chat/completions", self.api_base_url());

        let mut last_error = ServiceError::llm("OpenAI API call failed after all retries");
        let mut retry_delay = self.retry_delay;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                log::warn!("OpenAI API retry attempt {} after {:?}", attempt, retry_delay);
                tokio::time::sleep(retry_delay).await;
                retry_delay *= 2;
            }
            self.state.record_attempt();

            let mut request = self
                .client
                .post(&endpoint)
                .timeout(Duration::from_secs_f64(self.timeout))
                .bearer_auth(api_key);
            if let Some(ref org) = self.organization {
                request = request.header("OpenAI-Organization", org);
            }

            let response = match request.json(&body).send().await {
                Ok(resp) => resp,
                Err(e) => {
                    last_error = ServiceError::llm(format!("request failed: {}", e));
                    continue;
                }
            };

            let status = response.status();

            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                last_error = ServiceError::llm("Rate limited by OpenAI API (429)");
                continue;
            }

            if status.is_server_error() {
                last_error = ServiceError::llm(format!("OpenAI API server error: {}", status));
                continue;
            }

            let response_text = match response.text().await {
                Ok(text) => text,
                Err(e) => {
                    last_error = ServiceError::llm(format!("failed to read response: {}", e));
                    continue;
                }
            };

            if status.is_client_error() {
                self.state.record_failure();
                return Err(ServiceError::llm(format!(
                    "OpenAI API error ({}): {}",
                    status, response_text
                )));
            }

            let response_json: Value = serde_json::from_str(&response_text).map_err(|e| {
                self.state.record_failure();
                ServiceError::llm(format!(
                    "Failed to parse OpenAI response: {} - Body: {}",
                    e,
                    response_text.chars().take(500).collect::<String>()
                ))
            })?;

            return self.parse_completions_response(&response_json);
        }

        self.state.record_failure();
        log::error!("OpenAI request failed after {} attempts", self.max_retries + 1);
        Err(last_error)
    }

    fn get_token_usage_summary(&self) -> UsageMetrics {
        self.state.get_token_usage_summary()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(server: &MockServer) -> OpenAICompletion {
        OpenAICompletion::new("gpt-4o", Some("sk-test".into()), Some(server.uri()))
            .with_retry_delay(Duration::from_millis(5))
    }

    #[test]
    fn test_request_body() {
        let llm = OpenAICompletion::new("gpt-4o", Some("k".into()), None).with_max_tokens(1500);
        let body = llm.build_request_body(&[LLMMessage::user("hi")], &CallOptions::default());
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["temperature"], 0.7);
        assert_eq!(body["max_tokens"], 1500);
        assert_eq!(body["messages"][0]["role"], "user");

        let body = llm.build_request_body(
            &[],
            &CallOptions {
                max_tokens: Some(10),
                temperature: Some(0.0),
            },
        );
        assert_eq!(body["max_tokens"], 10);
        assert_eq!(body["temperature"], 0.0);
    }

    #[test]
    fn test_unavailable_without_key() {
        let llm = OpenAICompletion::new("gpt-4o", Some("  ".into()), None);
        assert!(!llm.is_available());
        assert_eq!(llm.api_base_url(), DEFAULT_BASE_URL);
    }

    #[tokio::test]
    async fn test_missing_key_fails_without_request() {
        let llm = OpenAICompletion::new("gpt-4o", None, Some("http://127.0.0.1:9".into()));
        let err = llm
            .acall(vec![LLMMessage::user("hi")], &CallOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Llm { .. }));
        assert_eq!(llm.get_token_usage_summary().requests_made, 0);
    }

    #[tokio::test]
    async fn test_successful_completion_tracks_usage() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "Hello!"}}],
                "usage": {"prompt_tokens": 1000, "completion_tokens": 1000, "total_tokens": 2000}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let llm = provider(&server);
        let reply = llm
            .acall(vec![LLMMessage::user("hi")], &CallOptions::default())
            .await
            .unwrap();

        assert_eq!(reply, "Hello!");
        let usage = llm.get_token_usage_summary();
        assert_eq!(usage.total_tokens, 2000);
        assert_eq!(usage.successful_requests, 1);
        assert!((usage.estimated_cost_usd - 0.04).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_retries_server_errors_then_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let llm = provider(&server);
        let err = llm
            .acall(vec![LLMMessage::user("hi")], &CallOptions::default())
            .await
            .unwrap_err();

        assert!(err.to_string().contains("server error"));
        let usage = llm.get_token_usage_summary();
        assert_eq!(usage.requests_made, 3);
        assert_eq!(usage.failed_requests, 1);
    }

    #[tokio::test]
    async fn test_client_error_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .expect(1)
            .mount(&server)
            .await;

        let err = provider(&server)
            .acall(vec![LLMMessage::user("hi")], &CallOptions::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("401"));
    }
}
