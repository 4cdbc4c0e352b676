//! In-process performance counters.
//!
//! Tracks execution-time samples per category, API call counts per external
//! service and error counts per category. Exposed through `GET /metrics`.

use std::collections::{HashMap, VecDeque};
use std::time::Instant;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

/// Samples kept per execution-time category.
const MAX_SAMPLES: usize = 1000;
/// Executions slower than this are logged.
const SLOW_EXECUTION_MS: f64 = 1000.0;

/// Execution-time statistics for one category, in milliseconds.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ExecutionStats {
    pub count: usize,
    pub min_ms: f64,
    pub max_ms: f64,
    pub mean_ms: f64,
    pub median_ms: f64,
    /// Only reported with at least 20 samples.
    pub p95_ms: Option<f64>,
}

/// Snapshot returned by [`Metrics::summary`].
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSummary {
    pub time_since_reset_seconds: f64,
    pub total_api_calls: u64,
    pub total_errors: u64,
    pub error_rate: f64,
    pub execution_times: HashMap<String, ExecutionStats>,
    pub api_calls: HashMap<String, u64>,
    pub errors: HashMap<String, u64>,
}

#[derive(Debug)]
struct MetricsInner {
    execution_times: HashMap<String, VecDeque<f64>>,
    api_calls: HashMap<String, u64>,
    errors: HashMap<String, u64>,
    last_reset: DateTime<Utc>,
}

impl MetricsInner {
    fn new() -> Self {
        Self {
            execution_times: HashMap::new(),
            api_calls: HashMap::new(),
            errors: HashMap::new(),
            last_reset: Utc::now(),
        }
    }
}

/// Thread-safe metrics registry, shared through `Arc`.
#[derive(Debug)]
pub struct Metrics {
    inner: Mutex<MetricsInner>,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MetricsInner::new()),
        }
    }

    /// Record one execution-time sample.
    pub fn track_execution_time(&self, category: &str, time_ms: f64) {
        if time_ms > SLOW_EXECUTION_MS {
            log::warn!("Slow execution: {} took {:.2}ms", category, time_ms);
        }
        let mut inner = self.inner.lock();
        let samples = inner.execution_times.entry(category.to_string()).or_default();
        samples.push_back(time_ms);
        while samples.len() > MAX_SAMPLES {
            samples.pop_front();
        }
    }

    pub fn track_api_call(&self, service: &str) {
        *self.inner.lock().api_calls.entry(service.to_string()).or_insert(0) += 1;
    }

    pub fn track_error(&self, category: &str) {
        *self.inner.lock().errors.entry(category.to_string()).or_insert(0) += 1;
    }

    /// Start a timer that records into `category` when dropped.
    pub fn timer<'a>(&'a self, category: &'a str) -> ExecutionTimer<'a> {
        ExecutionTimer {
            metrics: self,
            category,
            started: Instant::now(),
        }
    }

    /// Execution statistics for every category with samples.
    pub fn execution_stats(&self) -> HashMap<String, ExecutionStats> {
        let inner = self.inner.lock();
        inner
            .execution_times
            .iter()
            .filter_map(|(cat, samples)| stats_for(samples).map(|s| (cat.clone(), s)))
            .collect()
    }

    pub fn summary(&self) -> MetricsSummary {
        let execution_times = self.execution_stats();
        let inner = self.inner.lock();
        let total_api_calls: u64 = inner.api_calls.values().sum();
        let total_errors: u64 = inner.errors.values().sum();
        let error_rate = if total_api_calls > 0 {
            total_errors as f64 / total_api_calls as f64
        } else {
            0.0
        };
        MetricsSummary {
            time_since_reset_seconds: (Utc::now() - inner.last_reset).num_milliseconds() as f64
                / 1000.0,
            total_api_calls,
            total_errors,
            error_rate,
            execution_times,
            api_calls: inner.api_calls.clone(),
            errors: inner.errors.clone(),
        }
    }

    pub fn reset(&self) {
        *self.inner.lock() = MetricsInner::new();
        log::info!("Metrics have been reset");
    }
}

fn stats_for(samples: &VecDeque<f64>) -> Option<ExecutionStats> {
    if samples.is_empty() {
        return None;
    }
    let mut sorted: Vec<f64> = samples.iter().copied().collect();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let count = sorted.len();
    let median_ms = if count % 2 == 0 {
        (sorted[count / 2 - 1] + sorted[count / 2]) / 2.0
    } else {
        sorted[count / 2]
    };
    Some(ExecutionStats {
        count,
        min_ms: sorted[0],
        max_ms: sorted[count - 1],
        mean_ms: sorted.iter().sum::<f64>() / count as f64,
        median_ms,
        p95_ms: (count >= 20).then(|| sorted[(count as f64 * 0.95) as usize]),
    })
}

/// Guard returned by [`Metrics::timer`].
pub struct ExecutionTimer<'a> {
    metrics: &'a Metrics,
    category: &'a str,
    started: Instant,
}

impl Drop for ExecutionTimer<'_> {
    fn drop(&mut self) {
        let elapsed_ms = self.started.elapsed().as_secs_f64() * 1000.0;
        self.metrics.track_execution_time(self.category, elapsed_ms);
    }
}
