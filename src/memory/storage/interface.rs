//! Storage interface for user, TODO and summary records.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::memory::records::{
    NewSummary, NewTodo, SummaryRecord, TodoPatch, TodoRecord, UserRecord, UserUpdate,
};
use crate::utilities::errors::ServiceResult;

/// Persistence backend for every record the bot keeps.
///
/// Records are scoped by Slack user id; looking up a record that belongs to
/// another user behaves exactly like looking up one that does not exist.
/// There is no locking: concurrent writes to one record are last-write-wins.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Short backend name reported by the health endpoint.
    fn backend(&self) -> &'static str;

    // --- users ---

    /// Fetch a user's record, if one has been created.
    async fn get_user(&self, user_id: &str) -> ServiceResult<Option<UserRecord>>;

    /// Create or update the user's names.
    async fn upsert_user(&self, user_id: &str, update: UserUpdate) -> ServiceResult<UserRecord>;

    /// Replace the user's preference object, creating the record if needed.
    async fn set_preferences(
        &self,
        user_id: &str,
        preferences: Map<String, Value>,
    ) -> ServiceResult<UserRecord>;

    /// Append one fact to the user's memory, creating the record if needed.
    async fn append_memory_fact(&self, user_id: &str, fact: &str) -> ServiceResult<UserRecord>;

    /// The user's memory facts, oldest first.
    async fn list_memory_facts(&self, user_id: &str) -> ServiceResult<Vec<String>> {
        Ok(self
            .get_user(user_id)
            .await?
            .map(|u| u.memory_facts)
            .unwrap_or_default())
    }

    // --- todos ---

    async fn create_todo(&self, user_id: &str, todo: NewTodo) -> ServiceResult<TodoRecord>;

    /// Fails with `NotFound` for unknown ids and for other users' items.
    async fn get_todo(&self, user_id: &str, id: &str) -> ServiceResult<TodoRecord>;

    /// The user's items, oldest first, optionally filtered by `done`.
    async fn list_todos(&self, user_id: &str, done: Option<bool>) -> ServiceResult<Vec<TodoRecord>>;

    async fn update_todo(&self, user_id: &str, id: &str, patch: TodoPatch) -> ServiceResult<TodoRecord>;

    async fn delete_todo(&self, user_id: &str, id: &str) -> ServiceResult<()>;

    // --- summaries ---

    async fn create_summary(&self, summary: NewSummary) -> ServiceResult<SummaryRecord>;

    async fn get_summary(&self, user_id: &str, id: &str) -> ServiceResult<SummaryRecord>;

    /// The user's summaries, oldest first.
    async fn list_summaries(&self, user_id: &str) -> ServiceResult<Vec<SummaryRecord>>;
}
