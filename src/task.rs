//! A unit of work assigned to one agent.
//!
//! The crew pipeline wraps each stage around a [`Task`]; the task carries the
//! human-readable description used in verbose logs and records its own
//! timing and [`TaskOutput`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::tasks::task_output::TaskOutput;

/// Represents a task to be executed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier for the task.
    pub id: Uuid,
    /// Short machine name, e.g. `fetch_context`.
    pub name: String,
    /// Descriptive text detailing the task's purpose.
    pub description: String,
    /// Clear definition of expected task outcome.
    pub expected_output: String,
    /// Role of the agent responsible for execution.
    pub agent: Option<String>,
    /// Result of the last execution.
    pub output: Option<TaskOutput>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,

    #[serde(skip)]
    original_description: Option<String>,
    #[serde(skip)]
    original_expected_output: Option<String>,
}

impl Task {
    pub fn new(name: impl Into<String>, description: impl Into<String>, expected_output: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: description.into(),
            expected_output: expected_output.into(),
            agent: None,
            output: None,
            start_time: None,
            end_time: None,
            original_description: None,
            original_expected_output: None,
        }
    }

    /// Assign the agent by role.
    pub fn with_agent(mut self, role: impl Into<String>) -> Self {
        self.agent = Some(role.into());
        self
    }

    /// Description and expected output joined the way they are logged.
    pub fn prompt(&self) -> String {
        format!("{}\nExpected Output: {}", self.description, self.expected_output)
    }

    /// Replace `{key}` placeholders in the description and expected output.
    ///
    /// Interpolation always starts from the original text, so calling this
    /// repeatedly with different inputs does not compound.
    pub fn interpolate_inputs(&mut self, inputs: &HashMap<String, String>) {
        if self.original_description.is_none() {
            self.original_description = Some(self.description.clone());
        }
        if self.original_expected_output.is_none() {
            self.original_expected_output = Some(self.expected_output.clone());
        }
        if inputs.is_empty() {
            return;
        }
        if let Some(ref orig_desc) = self.original_description {
            self.description = interpolate_string(orig_desc, inputs);
        }
        if let Some(ref orig_expected) = self.original_expected_output {
            self.expected_output = interpolate_string(orig_expected, inputs);
        }
    }

    pub fn mark_started(&mut self) {
        self.start_time = Some(Utc::now());
        self.end_time = None;
    }

    /// Record the stage result and close the timing window.
    pub fn complete(&mut self, raw: impl Into<String>) -> &TaskOutput {
        self.end_time = Some(Utc::now());
        let output = TaskOutput::new(
            self.name.clone(),
            self.description.clone(),
            self.agent.clone().unwrap_or_default(),
            raw.into(),
        );
        self.output.insert(output)
    }

    /// Execution duration in seconds, if both start and end times are set.
    pub fn execution_duration(&self) -> Option<f64> {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => Some((end - start).num_milliseconds() as f64 / 1000.0),
            _ => None,
        }
    }
}

impl std::fmt::Display for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Task({})", self.name)
    }
}

fn interpolate_string(template: &str, inputs: &HashMap<String, String>) -> String {
    let mut result = template.to_string();
    for (key, value) in inputs {
        let pattern = format!("{{{}}}", key);
        result = result.replace(&pattern, value);
    }
    result
}
