//! Agents used by the crew.
//!
//! Each agent owns one concern (Slack, user memory, reply generation,
//! link summaries, TODOs) and exposes it as plain async methods. Every
//! agent implements [`BaseAgent`] so the crew can log and describe it.

pub mod base_agent;
pub mod content_agent;
pub mod memory_agent;
pub mod response_agent;
pub mod slack_agent;
pub mod todo_agent;

pub use base_agent::{AgentProfile, BaseAgent};
pub use content_agent::{ContentAgent, ContentSummary};
pub use memory_agent::MemoryAgent;
pub use response_agent::ResponseAgent;
pub use slack_agent::SlackAgent;
pub use todo_agent::{TodoAgent, TodoCommand};
