//! Single-stage chains: links, TODOs and explicit memory requests.

use crate::task::Task;

pub fn summarize_content(agent_role: &str) -> Task {
    Task::new(
        "summarize_content",
        "Extract the content behind {url} and summarize it in at most {max_words} words.",
        "A titled summary of the linked page with its source type and reading time.",
    )
    .with_agent(agent_role)
}

pub fn manage_todos(agent_role: &str) -> Task {
    Task::new(
        "manage_todos",
        "Interpret the user's TODO command: add, list, complete or delete an item \
         in their TODO list.",
        "A confirmation of the change or the requested list of TODO items.",
    )
    .with_agent(agent_role)
}

pub fn write_memory(agent_role: &str) -> Task {
    Task::new(
        "write_memory",
        "Store the fact the user asked to be remembered in their user record.",
        "A confirmation repeating the remembered fact.",
    )
    .with_agent(agent_role)
}

pub fn query_memory(agent_role: &str) -> Task {
    Task::new(
        "query_memory",
        "Describe everything stored about the user: nickname, preferences and \
         remembered facts.",
        "A bulleted description of the user's stored memory.",
    )
    .with_agent(agent_role)
}
