//! Process-local record store.
//!
//! Backs the bot when Notion is not configured and drives the tests.
//! Records live only as long as the process.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::interface::RecordStore;
use crate::memory::records::{
    NewSummary, NewTodo, SummaryRecord, TodoPatch, TodoRecord, UserRecord, UserUpdate,
};
use crate::utilities::errors::{ServiceError, ServiceResult};

#[derive(Debug, Default)]
pub struct InMemoryStore {
    users: RwLock<HashMap<String, UserRecord>>,
    todos: RwLock<Vec<TodoRecord>>,
    summaries: RwLock<Vec<SummaryRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn update_user<F>(&self, user_id: &str, f: F) -> UserRecord
    where
        F: FnOnce(&mut UserRecord) + Send,
    {
        let mut users = self.users.write().await;
        let user = users
            .entry(user_id.to_string())
            .or_insert_with(|| UserRecord::new(user_id));
        f(user);
        user.clone()
    }
}

fn todo_not_found(id: &str) -> ServiceError {
    ServiceError::not_found(format!("todo {}", id))
}

#[async_trait]
impl RecordStore for InMemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn get_user(&self, user_id: &str) -> ServiceResult<Option<UserRecord>> {
        Ok(self.users.read().await.get(user_id).cloned())
    }

    async fn upsert_user(&self, user_id: &str, update: UserUpdate) -> ServiceResult<UserRecord> {
        Ok(self
            .update_user(user_id, |user| {
                if let Some(name) = update.display_name {
                    user.display_name = Some(name);
                }
                if let Some(name) = update.preferred_name {
                    user.preferred_name = Some(name);
                }
            })
            .await)
    }

    async fn set_preferences(
        &self,
        user_id: &str,
        preferences: Map<String, Value>,
    ) -> ServiceResult<UserRecord> {
        Ok(self
            .update_user(user_id, |user| user.preferences = preferences)
            .await)
    }

    async fn append_memory_fact(&self, user_id: &str, fact: &str) -> ServiceResult<UserRecord> {
        let fact = fact.trim().to_string();
        Ok(self
            .update_user(user_id, |user| user.memory_facts.push(fact))
            .await)
    }

    async fn create_todo(&self, user_id: &str, todo: NewTodo) -> ServiceResult<TodoRecord> {
        let record = TodoRecord {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            text: todo.text,
            due_date: todo.due_date,
            priority: todo.priority,
            done: false,
            created_at: Utc::now(),
        };
        self.todos.write().await.push(record.clone());
        Ok(record)
    }

    async fn get_todo(&self, user_id: &str, id: &str) -> ServiceResult<TodoRecord> {
        self.todos
            .read()
            .await
            .iter()
            .find(|t| t.id == id && t.user_id == user_id)
            .cloned()
            .ok_or_else(|| todo_not_found(id))
    }

    async fn list_todos(&self, user_id: &str, done: Option<bool>) -> ServiceResult<Vec<TodoRecord>> {
        Ok(self
            .todos
            .read()
            .await
            .iter()
            .filter(|t| t.user_id == user_id)
            .filter(|t| done.map_or(true, |d| t.done == d))
            .cloned()
            .collect())
    }

    async fn update_todo(&self, user_id: &str, id: &str, patch: TodoPatch) -> ServiceResult<TodoRecord> {
        let mut todos = self.todos.write().await;
        let todo = todos
            .iter_mut()
            .find(|t| t.id == id && t.user_id == user_id)
            .ok_or_else(|| todo_not_found(id))?;
        patch.apply(todo);
        Ok(todo.clone())
    }

    async fn delete_todo(&self, user_id: &str, id: &str) -> ServiceResult<()> {
        let mut todos = self.todos.write().await;
        let before = todos.len();
        todos.retain(|t| !(t.id == id && t.user_id == user_id));
        if todos.len() == before {
            return Err(todo_not_found(id));
        }
        Ok(())
    }

    async fn create_summary(&self, summary: NewSummary) -> ServiceResult<SummaryRecord> {
        let record = SummaryRecord {
            id: Uuid::new_v4().to_string(),
            user_id: summary.user_id,
            url: summary.url,
            title: summary.title,
            summary: summary.summary,
            format: summary.format,
            source_type: summary.source_type,
            word_count: summary.word_count,
            created_at: Utc::now(),
        };
        self.summaries.write().await.push(record.clone());
        Ok(record)
    }

    async fn get_summary(&self, user_id: &str, id: &str) -> ServiceResult<SummaryRecord> {
        self.summaries
            .read()
            .await
            .iter()
            .find(|s| s.id == id && s.user_id == user_id)
            .cloned()
            .ok_or_else(|| ServiceError::not_found(format!("summary {}", id)))
    }

    async fn list_summaries(&self, user_id: &str) -> ServiceResult<Vec<SummaryRecord>> {
        Ok(self
            .summaries
            .read()
            .await
            .iter()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect())
    }
}
