//! Reply generation stages.

use crate::task::Task;

pub fn format_history(agent_role: &str) -> Task {
    Task::new(
        "format_history",
        "Format the conversation history for the chat model. Replace user IDs with \
         display names, mark the bot's own messages as assistant turns and keep the \
         history within the token budget. The system message stays first.",
        "A chronologically ordered list of chat messages with system, user and \
         assistant roles.",
    )
    .with_agent(agent_role)
}

pub fn generate_response(agent_role: &str) -> Task {
    Task::new(
        "generate_response",
        "Generate a response to the user's message. Send the formatted conversation \
         history, the user-specific context and the current query to the chat model. \
         The response should be contextually appropriate, helpful and personalized.",
        "The assistant's reply, formatted for Slack.",
    )
    .with_agent(agent_role)
}
