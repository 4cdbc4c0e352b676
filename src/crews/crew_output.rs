//! Result of one crew run.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::tasks::task_output::TaskOutput;
use crate::types::usage_metrics::UsageMetrics;

/// The reply a chain produced, with the output of every stage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrewOutput {
    /// Text posted back to the user.
    pub raw: String,
    /// Output of each stage in execution order.
    pub tasks_output: Vec<TaskOutput>,
    /// Chat-model usage incurred by this run.
    pub token_usage: UsageMetrics,
}

impl CrewOutput {
    pub fn new(raw: String, tasks_output: Vec<TaskOutput>, token_usage: UsageMetrics) -> Self {
        Self {
            raw,
            tasks_output,
            token_usage,
        }
    }

    /// Names of the stages that ran, in order.
    pub fn stage_names(&self) -> Vec<&str> {
        self.tasks_output.iter().map(|t| t.name.as_str()).collect()
    }
}

impl fmt::Display for CrewOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_and_stage_names() {
        let output = CrewOutput::new(
            "hello".into(),
            vec![TaskOutput::new("a".into(), "desc".into(), "agent".into(), "x".into())],
            UsageMetrics::new(),
        );
        assert_eq!(output.to_string(), "hello");
        assert_eq!(output.stage_names(), vec!["a"]);
    }
}
