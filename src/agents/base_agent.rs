//! Shared agent identity.
//!
//! Every agent carries a name and role; the crew uses them to label the
//! stages it runs.

use std::fmt;

/// Identity data common to all agents.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentProfile {
    pub name: String,
    pub role: String,
    pub verbose: bool,
}

impl AgentProfile {
    pub fn new(name: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            role: role.into(),
            verbose: false,
        }
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

/// Common interface of the bot's agents.
pub trait BaseAgent: Send + Sync + fmt::Debug {
    fn profile(&self) -> &AgentProfile;

    fn name(&self) -> &str {
        &self.profile().name
    }

    fn role(&self) -> &str {
        &self.profile().role
    }

    /// Log each task this agent runs.
    fn verbose(&self) -> bool {
        self.profile().verbose
    }
}
