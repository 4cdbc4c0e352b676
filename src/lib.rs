//! # ChatDSJ
//!
//! A Slack assistant that answers mentions with a chat-completion model,
//! remembers per-user names, preferences and facts, keeps TODO lists and
//! summarizes linked pages. Records live in Notion, or in memory when Notion
//! is not configured.
//!
//! Incoming Slack events are verified and handed to the
//! [`CrewManager`](crew::CrewManager), which classifies the request and runs
//! a chain of agent stages. The same records are exposed over a small REST
//! surface (see [`server`]).

pub mod agents;
pub mod crew;
pub mod crews;
pub mod llms;
pub mod memory;
pub mod server;
pub mod services;
pub mod settings;
pub mod task;
pub mod tasks;
pub mod types;
pub mod utilities;

#[cfg(test)]
pub mod testing;

pub use crew::{CrewManager, Intent};
pub use crews::crew_output::CrewOutput;
pub use llms::base_llm::BaseLLM;
pub use settings::Settings;
pub use task::Task;
pub use tasks::task_output::TaskOutput;
pub use utilities::errors::{ServiceError, ServiceResult};

/// Crate version reported by `/health`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
