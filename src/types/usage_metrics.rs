//! Token usage and request accounting for the chat-completion client.

use serde::{Deserialize, Serialize};

/// Accumulated usage for one LLM client.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageMetrics {
    /// Total number of tokens used.
    pub total_tokens: i64,
    /// Number of tokens used in prompts.
    pub prompt_tokens: i64,
    /// Number of tokens used in completions.
    pub completion_tokens: i64,
    /// Requests attempted, counting each retry.
    pub requests_made: i64,
    /// Number of successful requests made.
    pub successful_requests: i64,
    /// Requests that failed after exhausting retries.
    pub failed_requests: i64,
    /// Estimated spend in USD.
    pub estimated_cost_usd: f64,
}

impl UsageMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add usage metrics from another UsageMetrics object.
    pub fn add_usage_metrics(&mut self, other: &UsageMetrics) {
        self.total_tokens += other.total_tokens;
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.requests_made += other.requests_made;
        self.successful_requests += other.successful_requests;
        self.failed_requests += other.failed_requests;
        self.estimated_cost_usd += other.estimated_cost_usd;
    }

    /// Usage accumulated after the `earlier` snapshot was taken.
    pub fn since(&self, earlier: &UsageMetrics) -> UsageMetrics {
        UsageMetrics {
            total_tokens: self.total_tokens - earlier.total_tokens,
            prompt_tokens: self.prompt_tokens - earlier.prompt_tokens,
            completion_tokens: self.completion_tokens - earlier.completion_tokens,
            requests_made: self.requests_made - earlier.requests_made,
            successful_requests: self.successful_requests - earlier.successful_requests,
            failed_requests: self.failed_requests - earlier.failed_requests,
            estimated_cost_usd: self.estimated_cost_usd - earlier.estimated_cost_usd,
        }
    }

    /// Record one successful completion with its token counts and cost.
    pub fn record_completion(&mut self, prompt_tokens: i64, completion_tokens: i64, cost_usd: f64) {
        self.prompt_tokens += prompt_tokens;
        self.completion_tokens += completion_tokens;
        self.total_tokens += prompt_tokens + completion_tokens;
        self.successful_requests += 1;
        self.estimated_cost_usd += cost_usd;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_merge() {
        let mut a = UsageMetrics::new();
        a.requests_made = 1;
        a.record_completion(100, 20, 0.5);

        let mut b = UsageMetrics::new();
        b.requests_made = 2;
        b.failed_requests = 1;
        b.record_completion(10, 5, 0.25);

        a.add_usage_metrics(&b);
        assert_eq!(a.total_tokens, 135);
        assert_eq!(a.prompt_tokens, 110);
        assert_eq!(a.requests_made, 3);
        assert_eq!(a.successful_requests, 2);
        assert_eq!(a.failed_requests, 1);
        assert_eq!(a.estimated_cost_usd, 0.75);

        let delta = a.since(&b);
        assert_eq!(delta.total_tokens, 120);
        assert_eq!(delta.requests_made, 1);
        assert_eq!(delta.failed_requests, 0);
    }
}
