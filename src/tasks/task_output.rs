//! Task output representation.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The result of one task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskOutput {
    pub name: String,
    pub description: String,
    /// First ten words of the description.
    pub summary: String,
    /// Raw output of the task.
    pub raw: String,
    /// Role of the agent that executed the task.
    pub agent: String,
}

impl TaskOutput {
    pub fn new(name: String, description: String, agent: String, raw: String) -> Self {
        let summary = Self::generate_summary(&description);
        Self {
            name,
            description,
            summary,
            raw,
            agent,
        }
    }

    /// First 10 words + "...".
    fn generate_summary(description: &str) -> String {
        let excerpt: String = description
            .split_whitespace()
            .take(10)
            .collect::<Vec<&str>>()
            .join(" ");
        format!("{}...", excerpt)
    }
}

impl fmt::Display for TaskOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_is_first_ten_words() {
        let output = TaskOutput::new(
            "t".into(),
            "one two three four five six seven eight nine ten eleven".into(),
            "agent".into(),
            "raw".into(),
        );
        assert_eq!(output.summary, "one two three four five six seven eight nine ten...");
        assert_eq!(output.to_string(), "raw");
    }
}
