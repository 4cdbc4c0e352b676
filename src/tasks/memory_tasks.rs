//! Stages backed by the user memory store.

use crate::task::Task;

pub fn check_nickname_command(agent_role: &str) -> Task {
    Task::new(
        "check_nickname_command",
        "Check if a user's message contains a nickname command such as 'call me X', \
         'my name is X' or an explicit nickname command. If one is detected, \
         extract the requested nickname from the message.",
        "Whether a nickname command is present and the extracted nickname.",
    )
    .with_agent(agent_role)
}

pub fn store_nickname(agent_role: &str) -> Task {
    Task::new(
        "handle_nickname",
        "Store the nickname requested by {user_id} in their user record. Create the \
         record if the user doesn't have one yet, otherwise update the nickname field.",
        "A confirmation that repeats the stored nickname.",
    )
    .with_agent(agent_role)
}

pub fn fetch_user_context(agent_role: &str) -> Task {
    Task::new(
        "fetch_user_context",
        "Fetch user-specific context for {user_id}: the preferred name, stored notes \
         and remembered facts. If the user has no record yet, fall back to the \
         Slack display name.",
        "A short description of who the assistant is talking to, suitable for the \
         system prompt.",
    )
    .with_agent(agent_role)
}
