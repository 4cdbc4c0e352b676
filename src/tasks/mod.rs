//! Task definitions for each pipeline stage, grouped by the agent that runs them.

pub mod assistant_tasks;
pub mod memory_tasks;
pub mod response_tasks;
pub mod slack_tasks;
pub mod task_output;

pub use task_output::TaskOutput;
