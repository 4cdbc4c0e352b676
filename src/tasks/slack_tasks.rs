//! Slack-side stages of the question chain.

use crate::task::Task;

pub fn process_mention(agent_role: &str) -> Task {
    Task::new(
        "process_mention",
        "Process a mention in Slack. This involves acknowledging the mention, \
         extracting the user's query, and preparing for response generation. \
         Send an acknowledgment message to let the user know their message is \
         being processed.",
        "A processed Slack mention with acknowledgment sent: the channel, the \
         user, the message text with mentions removed and the thread timestamp \
         if the message was in a thread.",
    )
    .with_agent(agent_role)
}

pub fn fetch_context(agent_role: &str) -> Task {
    Task::new(
        "fetch_context",
        "Fetch the relevant conversation context from Slack. For thread mentions, \
         fetch the entire thread. For channel mentions, fetch recent messages in \
         the channel. Format the messages appropriately for context.",
        "The relevant conversation history ordered chronologically, with user \
         display names and message content.",
    )
    .with_agent(agent_role)
}

pub fn send_response(agent_role: &str) -> Task {
    Task::new(
        "send_response",
        "Send a response to a Slack channel or thread. If the original message \
         was in a thread, the response goes to that thread. Otherwise it starts \
         a thread on the original message.",
        "A confirmation that the response was sent to Slack, with the channel, \
         the thread timestamp and the response text.",
    )
    .with_agent(agent_role)
}
