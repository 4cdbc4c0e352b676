//! TODO commands typed in Slack.

use std::sync::Arc;

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

use super::base_agent::{AgentProfile, BaseAgent};
use crate::memory::records::{NewTodo, Priority, TodoPatch, TodoRecord};
use crate::memory::storage::RecordStore;
use crate::utilities::errors::ServiceResult;
use crate::utilities::text_processing::extract_todo;

const LIST_KEYWORDS: [&str; 4] = ["list todos", "show todos", "my todos", "get todos"];
const ADD_KEYWORDS: [&str; 3] = ["add todo", "create todo", "new todo"];
const COMPLETE_KEYWORDS: [&str; 4] = ["complete todo", "finish todo", "mark todo", "done todo"];
const DELETE_KEYWORDS: [&str; 2] = ["delete todo", "remove todo"];

static DUE_DATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bdue(?:\s+on)?:?\s+(\d{4}-\d{2}-\d{2})").unwrap());
static PRIORITY: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bpriority:?\s+(high|medium|low)\b").unwrap());
static ADD_COMMAND: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)\b(?:add|create|new)\s+todo\b(.*)$").unwrap());
static ITEM_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d+)\b").unwrap());

pub const HELP_TEXT: &str = "I couldn't understand your todo request. Try 'add todo: [task]', 'list todos', 'complete todo [number]', or 'delete todo [number]'.";

/// Which items a list command shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TodoFilter {
    All,
    Completed,
    Pending,
}

impl TodoFilter {
    fn as_done(self) -> Option<bool> {
        match self {
            TodoFilter::All => None,
            TodoFilter::Completed => Some(true),
            TodoFilter::Pending => Some(false),
        }
    }
}

/// A parsed TODO command.
#[derive(Debug, Clone, PartialEq)]
pub enum TodoCommand {
    List(TodoFilter),
    Add(NewTodo),
    /// 1-based position in the pending list.
    Complete(Option<usize>),
    Delete(Option<usize>),
    Help,
}

impl TodoCommand {
    /// Whether `prompt` reads as a TODO command at all.
    pub fn matches(prompt: &str) -> bool {
        let lower = prompt.to_lowercase();
        [&LIST_KEYWORDS[..], &ADD_KEYWORDS[..], &COMPLETE_KEYWORDS[..], &DELETE_KEYWORDS[..]]
            .iter()
            .flat_map(|group| group.iter().copied())
            .any(|k| lower.contains(k))
            || extract_todo(prompt).is_some()
    }

    pub fn parse(prompt: &str) -> TodoCommand {
        let lower = prompt.to_lowercase();
        let has = |keywords: &[&str]| keywords.iter().any(|k| lower.contains(k));

        if has(&LIST_KEYWORDS) {
            let filter = if lower.contains("incomplete") || lower.contains("pending") || lower.contains("not done") {
                TodoFilter::Pending
            } else if lower.contains("completed") {
                TodoFilter::Completed
            } else {
                TodoFilter::All
            };
            return TodoCommand::List(filter);
        }

        if let Some(caps) = ADD_COMMAND.captures(prompt) {
            let text = Self::strip_options(&caps[1]);
            let text = text.trim_start_matches(':').trim();
            if text.is_empty() {
                return TodoCommand::Help;
            }
            return TodoCommand::Add(NewTodo {
                text: text.to_string(),
                due_date: Self::due_date(prompt),
                priority: Self::priority(prompt),
            });
        }

        if has(&COMPLETE_KEYWORDS) {
            return TodoCommand::Complete(Self::item_number(&lower));
        }
        if has(&DELETE_KEYWORDS) {
            return TodoCommand::Delete(Self::item_number(&lower));
        }

        match extract_todo(prompt) {
            Some(text) => TodoCommand::Add(NewTodo {
                text: Self::strip_options(&text).trim().to_string(),
                due_date: Self::due_date(prompt),
                priority: Self::priority(prompt),
            }),
            None => TodoCommand::Help,
        }
    }

    fn strip_options(text: &str) -> String {
        let without_due = DUE_DATE.replace_all(text, "");
        let without_priority = PRIORITY.replace_all(&without_due, "");
        without_priority
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .trim_end_matches([',', ';'])
            .to_string()
    }

    fn due_date(text: &str) -> Option<NaiveDate> {
        DUE_DATE
            .captures(text)
            .and_then(|caps| NaiveDate::parse_from_str(&caps[1], "%Y-%m-%d").ok())
    }

    fn priority(text: &str) -> Priority {
        PRIORITY
            .captures(text)
            .and_then(|caps| caps[1].parse().ok())
            .unwrap_or_default()
    }

    fn item_number(lower: &str) -> Option<usize> {
        ITEM_NUMBER
            .captures(lower)
            .and_then(|caps| caps[1].parse().ok())
            .filter(|n| *n > 0)
    }
}

pub struct TodoAgent {
    profile: AgentProfile,
    store: Arc<dyn RecordStore>,
}

impl std::fmt::Debug for TodoAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TodoAgent").finish_non_exhaustive()
    }
}

impl TodoAgent {
    pub fn new(store: Arc<dyn RecordStore>, verbose: bool) -> Self {
        Self {
            profile: AgentProfile::new("Todo Manager", "Task and todo management specialist")
                .with_verbose(verbose),
            store,
        }
    }

    /// Run the command in `prompt` for `user_id` and describe the outcome.
    pub async fn handle_todo_command(&self, prompt: &str, user_id: &str) -> ServiceResult<String> {
        let command = TodoCommand::parse(prompt);
        log::debug!("Todo command for {}: {:?}", user_id, command);
        match command {
            TodoCommand::List(filter) => self.list(user_id, filter).await,
            TodoCommand::Add(new) => {
                let todo = self.store.create_todo(user_id, new.validated()?).await?;
                Ok(format!("Added todo: {}{}", todo.text, describe_extras(&todo)))
            }
            TodoCommand::Complete(Some(n)) => {
                let Some(todo) = self.pending_item(user_id, n).await? else {
                    return Ok(no_such_item(n));
                };
                let patch = TodoPatch {
                    done: Some(true),
                    ..Default::default()
                };
                let todo = self.store.update_todo(user_id, &todo.id, patch).await?;
                Ok(format!("Marked todo {} as complete: {}", n, todo.text))
            }
            TodoCommand::Delete(Some(n)) => {
                let Some(todo) = self.pending_item(user_id, n).await? else {
                    return Ok(no_such_item(n));
                };
                self.store.delete_todo(user_id, &todo.id).await?;
                Ok(format!("Deleted todo {}: {}", n, todo.text))
            }
            TodoCommand::Complete(None) => Ok(
                "To mark a todo as complete, please specify the todo number. For example: 'complete todo 3'".to_string(),
            ),
            TodoCommand::Delete(None) => {
                Ok("To delete a todo, please specify the todo number. For example: 'delete todo 3'".to_string())
            }
            TodoCommand::Help => Ok(HELP_TEXT.to_string()),
        }
    }

    async fn pending_item(&self, user_id: &str, n: usize) -> ServiceResult<Option<TodoRecord>> {
        let pending = self.store.list_todos(user_id, Some(false)).await?;
        Ok(pending.into_iter().nth(n - 1))
    }

    async fn list(&self, user_id: &str, filter: TodoFilter) -> ServiceResult<String> {
        let todos = self.store.list_todos(user_id, filter.as_done()).await?;
        if todos.is_empty() {
            return Ok(match filter {
                TodoFilter::All => "You don't have any todos",
                TodoFilter::Completed => "You don't have any completed todos",
                TodoFilter::Pending => "You don't have any pending todos",
            }
            .to_string());
        }

        let status = match filter {
            TodoFilter::All => "",
            TodoFilter::Completed => " completed",
            TodoFilter::Pending => " pending",
        };
        let mut lines = vec![format!("Here are your{} todos:", status)];
        for (i, todo) in todos.iter().enumerate() {
            let mark = if todo.done { "✅" } else { "⬜" };
            lines.push(format!("{}. {} {}{}", i + 1, mark, todo.text, describe_extras(todo)));
        }
        Ok(lines.join("\n"))
    }
}

fn describe_extras(todo: &TodoRecord) -> String {
    let mut extras = Vec::new();
    if todo.priority != Priority::Medium {
        extras.push(format!("priority {}", todo.priority));
    }
    if let Some(due) = todo.due_date {
        extras.push(format!("due {}", due));
    }
    if extras.is_empty() {
        String::new()
    } else {
        format!(" ({})", extras.join(", "))
    }
}

fn no_such_item(n: usize) -> String {
    format!("I couldn't find pending todo number {}. Say 'list todos' to see your items.", n)
}

impl BaseAgent for TodoAgent {
    fn profile(&self) -> &AgentProfile {
        &self.profile
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::storage::InMemoryStore;

    #[test]
    fn test_parse_commands() {
        assert_eq!(TodoCommand::parse("list todos"), TodoCommand::List(TodoFilter::All));
        assert_eq!(TodoCommand::parse("show todos completed"), TodoCommand::List(TodoFilter::Completed));
        assert_eq!(TodoCommand::parse("my todos that are not done"), TodoCommand::List(TodoFilter::Pending));
        assert_eq!(TodoCommand::parse("complete todo 2"), TodoCommand::Complete(Some(2)));
        assert_eq!(TodoCommand::parse("remove todo"), TodoCommand::Delete(None));
        assert_eq!(TodoCommand::parse("add todo"), TodoCommand::Help);
        assert_eq!(TodoCommand::parse("what's the weather"), TodoCommand::Help);
        assert!(!TodoCommand::matches("hello there"));
        assert!(TodoCommand::matches("add todo"));
        assert!(TodoCommand::matches("don't forget to call mom"));
    }

    #[test]
    fn test_parse_add_with_options() {
        let TodoCommand::Add(todo) = TodoCommand::parse("Add todo: File Taxes priority: high due on 2027-04-15") else {
            panic!("expected add");
        };
        assert_eq!(todo.text, "File Taxes");
        assert_eq!(todo.priority, Priority::High);
        assert_eq!(todo.due_date, NaiveDate::from_ymd_opt(2027, 4, 15));

        let TodoCommand::Add(todo) = TodoCommand::parse("remember to water the plants") else {
            panic!("expected add");
        };
        assert_eq!(todo.text, "water the plants");
        assert_eq!(todo.priority, Priority::Medium);
    }

    #[test]
    fn test_parse_add_after_non_ascii_text() {
        // "İ" grows by one byte when lowercased
        let TodoCommand::Add(todo) = TodoCommand::parse("İstanbul trip: ADD TODO: book the hotel") else {
            panic!("expected add");
        };
        assert_eq!(todo.text, "book the hotel");

        let TodoCommand::Add(todo) = TodoCommand::parse("create   todo Überweisung prüfen") else {
            panic!("expected add");
        };
        assert_eq!(todo.text, "Überweisung prüfen");
    }

    #[tokio::test]
    async fn test_add_list_complete_delete() {
        let agent = TodoAgent::new(Arc::new(InMemoryStore::new()), false);

        assert_eq!(
            agent.handle_todo_command("list todos", "U1").await.unwrap(),
            "You don't have any todos"
        );
        assert_eq!(
            agent.handle_todo_command("add todo buy milk", "U1").await.unwrap(),
            "Added todo: buy milk"
        );
        agent
            .handle_todo_command("add todo: ship release priority high", "U1")
            .await
            .unwrap();

        let listing = agent.handle_todo_command("show todos", "U1").await.unwrap();
        assert_eq!(
            listing,
            "Here are your todos:\n1. ⬜ buy milk\n2. ⬜ ship release (priority high)"
        );

        assert_eq!(
            agent.handle_todo_command("complete todo 1", "U1").await.unwrap(),
            "Marked todo 1 as complete: buy milk"
        );
        assert_eq!(
            agent.handle_todo_command("list todos pending", "U1").await.unwrap(),
            "Here are your pending todos:\n1. ⬜ ship release (priority high)"
        );
        assert_eq!(
            agent.handle_todo_command("delete todo 1", "U1").await.unwrap(),
            "Deleted todo 1: ship release"
        );
        assert!(agent
            .handle_todo_command("delete todo 7", "U1")
            .await
            .unwrap()
            .starts_with("I couldn't find pending todo number 7"));
    }
}
