//! Persistent record types: per-user memory, TODO items and link summaries.
//!
//! All records belong to a Slack user id. JSON field names are camelCase.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::utilities::errors::{ServiceError, ServiceResult};

// ---------------------------------------------------------------------------
// User memory
// ---------------------------------------------------------------------------

/// Per-user preference and memory record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub user_id: String,
    pub display_name: Option<String>,
    /// Nickname the user asked to be called by.
    pub preferred_name: Option<String>,
    #[serde(default)]
    pub preferences: Map<String, Value>,
    /// Remembered facts, oldest first.
    #[serde(default)]
    pub memory_facts: Vec<String>,
    /// Free-form notes kept on the user's page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl UserRecord {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            display_name: None,
            preferred_name: None,
            preferences: Map::new(),
            memory_facts: Vec::new(),
            notes: None,
        }
    }

    /// Name to address the user by: nickname first, then display name.
    pub fn addressed_as(&self) -> Option<&str> {
        self.preferred_name.as_deref().or(self.display_name.as_deref())
    }
}

/// Body of `PUT /users/me`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UserUpdate {
    pub display_name: Option<String>,
    pub preferred_name: Option<String>,
}

/// Body of `PUT /users/me/preferences`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PreferencesUpdate {
    /// Replaces the stored preference object.
    pub preferences: Option<Map<String, Value>>,
    /// Appended to the stored facts.
    #[serde(default)]
    pub memory_facts: Vec<String>,
}

// ---------------------------------------------------------------------------
// TODO items
// ---------------------------------------------------------------------------

/// TODO priority.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::Low => write!(f, "low"),
            Priority::Medium => write!(f, "medium"),
            Priority::High => write!(f, "high"),
        }
    }
}

impl FromStr for Priority {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" | "normal" => Ok(Priority::Medium),
            "high" | "urgent" => Ok(Priority::High),
            other => Err(ServiceError::validation(format!(
                "priority must be low, medium or high (got '{}')",
                other
            ))),
        }
    }
}

/// A TODO item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoRecord {
    pub id: String,
    pub user_id: String,
    pub text: String,
    pub due_date: Option<NaiveDate>,
    pub priority: Priority,
    pub done: bool,
    pub created_at: DateTime<Utc>,
}

/// Body of `POST /todos`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NewTodo {
    pub text: String,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub priority: Priority,
}

impl NewTodo {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            due_date: None,
            priority: Priority::default(),
        }
    }

    /// Trim the text and reject empty items.
    pub fn validated(mut self) -> ServiceResult<Self> {
        self.text = self.text.trim().to_string();
        if self.text.is_empty() {
            return Err(ServiceError::validation("todo text must not be empty"));
        }
        Ok(self)
    }
}

/// Body of `PATCH /todos/{id}`.
///
/// `dueDate: null` clears the due date; an absent `dueDate` keeps it.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TodoPatch {
    pub text: Option<String>,
    #[serde(default, with = "serde_with::rust::double_option")]
    pub due_date: Option<Option<NaiveDate>>,
    pub priority: Option<Priority>,
    pub done: Option<bool>,
}

impl TodoPatch {
    pub fn validated(mut self) -> ServiceResult<Self> {
        if let Some(text) = self.text.take() {
            let text = text.trim().to_string();
            if text.is_empty() {
                return Err(ServiceError::validation("todo text must not be empty"));
            }
            self.text = Some(text);
        }
        Ok(self)
    }

    /// Apply the patch to `todo` in place.
    pub fn apply(&self, todo: &mut TodoRecord) {
        if let Some(ref text) = self.text {
            todo.text = text.clone();
        }
        if let Some(due) = self.due_date {
            todo.due_date = due;
        }
        if let Some(priority) = self.priority {
            todo.priority = priority;
        }
        if let Some(done) = self.done {
            todo.done = done;
        }
    }
}

// ---------------------------------------------------------------------------
// Summaries
// ---------------------------------------------------------------------------

/// Output format of a generated summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryFormat {
    #[default]
    Markdown,
    Text,
    Html,
}

impl fmt::Display for SummaryFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SummaryFormat::Markdown => write!(f, "markdown"),
            SummaryFormat::Text => write!(f, "text"),
            SummaryFormat::Html => write!(f, "html"),
        }
    }
}

impl FromStr for SummaryFormat {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "markdown" | "md" => Ok(SummaryFormat::Markdown),
            "text" | "plain" => Ok(SummaryFormat::Text),
            "html" => Ok(SummaryFormat::Html),
            other => Err(ServiceError::validation(format!("unsupported format '{}'", other))),
        }
    }
}

/// A stored summary of linked content. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryRecord {
    pub id: String,
    pub user_id: String,
    pub url: String,
    pub title: String,
    pub summary: String,
    pub format: SummaryFormat,
    pub source_type: String,
    pub word_count: usize,
    pub created_at: DateTime<Utc>,
}

/// Fields supplied when storing a new summary.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSummary {
    pub user_id: String,
    pub url: String,
    pub title: String,
    pub summary: String,
    pub format: SummaryFormat,
    pub source_type: String,
    pub word_count: usize,
}

/// Body of `POST /summaries`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SummaryRequest {
    pub url: String,
    /// Word cap on the generated summary.
    #[serde(default)]
    pub max_length: Option<usize>,
    #[serde(default)]
    pub format: SummaryFormat,
}

/// Words used when a request does not set `maxLength`.
pub const DEFAULT_SUMMARY_WORDS: usize = 300;

impl SummaryRequest {
    pub fn max_words(&self) -> ServiceResult<usize> {
        match self.max_length {
            Some(0) => Err(ServiceError::validation("maxLength must be at least 1")),
            Some(n) => Ok(n),
            None => Ok(DEFAULT_SUMMARY_WORDS),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_todo_json_shape() {
        let todo = TodoRecord {
            id: "t1".into(),
            user_id: "U1".into(),
            text: "ship it".into(),
            due_date: NaiveDate::from_ymd_opt(2026, 11, 2),
            priority: Priority::High,
            done: false,
            created_at: DateTime::parse_from_rfc3339("2026-10-16T09:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
        };
        let json = serde_json::to_value(&todo).unwrap();
        assert_eq!(json["dueDate"], "2026-11-02");
        assert_eq!(json["priority"], "high");
        assert_eq!(json["userId"], "U1");
        assert_eq!(json["createdAt"], "2026-10-16T09:00:00Z");
    }

    #[test]
    fn test_new_todo_defaults_and_validation() {
        let todo: NewTodo = serde_json::from_str(r#"{"text": "  water plants "}"#).unwrap();
        assert_eq!(todo.priority, Priority::Medium);
        assert_eq!(todo.validated().unwrap().text, "water plants");

        assert!(NewTodo::new("   ").validated().is_err());
        assert!(serde_json::from_str::<NewTodo>(r#"{"text": "x", "priority": "extreme"}"#).is_err());
        assert!(serde_json::from_str::<NewTodo>(r#"{"text": "x", "dueDate": "tomorrow"}"#).is_err());
    }

    #[test]
    fn test_patch_apply() {
        let mut todo = TodoRecord {
            id: "t1".into(),
            user_id: "U1".into(),
            text: "old".into(),
            due_date: None,
            priority: Priority::Low,
            done: false,
            created_at: Utc::now(),
        };
        let patch: TodoPatch = serde_json::from_str(r#"{"done": true, "priority": "high"}"#).unwrap();
        patch.validated().unwrap().apply(&mut todo);
        assert!(todo.done);
        assert_eq!(todo.priority, Priority::High);
        assert_eq!(todo.text, "old");
    }

    #[test]
    fn test_patch_due_date_set_keep_and_clear() {
        let mut todo = TodoRecord {
            id: "t1".into(),
            user_id: "U1".into(),
            text: "renew passport".into(),
            due_date: None,
            priority: Priority::Medium,
            done: false,
            created_at: Utc::now(),
        };

        let set: TodoPatch = serde_json::from_str(r#"{"dueDate": "2026-12-01"}"#).unwrap();
        set.apply(&mut todo);
        assert_eq!(todo.due_date, NaiveDate::from_ymd_opt(2026, 12, 1));

        let keep: TodoPatch = serde_json::from_str(r#"{"done": true}"#).unwrap();
        assert_eq!(keep.due_date, None);
        keep.apply(&mut todo);
        assert_eq!(todo.due_date, NaiveDate::from_ymd_opt(2026, 12, 1));

        let clear: TodoPatch = serde_json::from_str(r#"{"dueDate": null}"#).unwrap();
        assert_eq!(clear.due_date, Some(None));
        clear.apply(&mut todo);
        assert_eq!(todo.due_date, None);
    }

    #[test]
    fn test_priority_parse() {
        assert_eq!("HIGH".parse::<Priority>().unwrap(), Priority::High);
        assert!("someday".parse::<Priority>().is_err());
    }

    #[test]
    fn test_summary_request_max_words() {
        let req: SummaryRequest =
            serde_json::from_str(r#"{"url": "https://example.com", "maxLength": 50}"#).unwrap();
        assert_eq!(req.max_words().unwrap(), 50);
        assert_eq!(req.format, SummaryFormat::Markdown);

        let req: SummaryRequest =
            serde_json::from_str(r#"{"url": "https://example.com", "maxLength": 0}"#).unwrap();
        assert!(req.max_words().is_err());
    }

    #[test]
    fn test_addressed_as_prefers_nickname() {
        let mut user = UserRecord::new("U1");
        assert_eq!(user.addressed_as(), None);
        user.display_name = Some("Dana S".into());
        assert_eq!(user.addressed_as(), Some("Dana S"));
        user.preferred_name = Some("DJ".into());
        assert_eq!(user.addressed_as(), Some("DJ"));
    }
}
