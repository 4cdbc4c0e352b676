//! Notion-backed record store.
//!
//! Users, TODO items and summaries each live in their own Notion database.
//! Pages are matched to their owner through the `SlackUserID` rich-text
//! property. Memory facts are bulleted items on the user's page.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::{json, Map, Value};
use uuid::Uuid;

use super::interface::RecordStore;
use crate::memory::records::{
    NewSummary, NewTodo, Priority, SummaryFormat, SummaryRecord, TodoPatch, TodoRecord, UserRecord,
    UserUpdate,
};
use crate::services::notion::{
    block_text, bulleted_item, equals_filter, property_text, render_block, rich_text_property,
    title_property, NotionClient,
};
use crate::utilities::errors::{ServiceError, ServiceResult};

const SLACK_USER_ID: &str = "SlackUserID";

/// Database ids used by [`NotionStore`].
#[derive(Debug, Clone, PartialEq)]
pub struct NotionDatabases {
    pub users: String,
    pub todos: Option<String>,
    pub summaries: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NotionStore {
    client: NotionClient,
    databases: NotionDatabases,
}

impl NotionStore {
    pub fn new(client: NotionClient, databases: NotionDatabases) -> Self {
        Self { client, databases }
    }

    fn todo_db(&self) -> ServiceResult<&str> {
        self.databases
            .todos
            .as_deref()
            .ok_or_else(|| ServiceError::notion("TODO database is not configured (NOTION_TODO_DB_ID)"))
    }

    fn summary_db(&self) -> ServiceResult<&str> {
        self.databases.summaries.as_deref().ok_or_else(|| {
            ServiceError::notion("summary database is not configured (NOTION_SUMMARY_DB_ID)")
        })
    }

    async fn find_user_page(&self, user_id: &str) -> ServiceResult<Option<Value>> {
        let pages = self
            .client
            .query_database(
                &self.databases.users,
                json!({ "filter": equals_filter(SLACK_USER_ID, user_id), "page_size": 1 }),
            )
            .await?;
        let page = pages.into_iter().next();
        match page {
            Some(ref p) => log::debug!(
                "Found Notion page for user {}: {}",
                user_id,
                p["id"].as_str().unwrap_or_default()
            ),
            None => log::debug!("No Notion page found for user {}", user_id),
        }
        Ok(page)
    }

    /// Id of the user's page, creating an empty page on first write.
    async fn ensure_user_page(&self, user_id: &str, display_name: Option<&str>) -> ServiceResult<String> {
        if let Some(page) = self.find_user_page(user_id).await? {
            return page_id(&page);
        }
        let properties = json!({
            SLACK_USER_ID: rich_text_property(user_id),
            "SlackDisplayName": title_property(display_name.unwrap_or(user_id)),
        });
        let page = self
            .client
            .create_page(&self.databases.users, properties, Vec::new())
            .await?;
        log::info!("Created Notion user page for {}", user_id);
        page_id(&page)
    }

    async fn user_from_page(&self, user_id: &str, page: &Value) -> ServiceResult<UserRecord> {
        let props = &page["properties"];
        let mut user = UserRecord::new(user_id);
        user.display_name = property_text(props, "SlackDisplayName");
        user.preferred_name = property_text(props, "Nickname");
        if let Some(raw) = property_text(props, "Preferences") {
            match serde_json::from_str::<Map<String, Value>>(&raw) {
                Ok(map) => user.preferences = map,
                Err(e) => log::warn!("Ignoring malformed Preferences for {}: {}", user_id, e),
            }
        }

        let blocks = self.client.list_block_children(&page_id(page)?).await?;
        let mut notes = Vec::new();
        for block in &blocks {
            match block_text(block) {
                Some(("bulleted_list_item", text)) => user.memory_facts.push(text),
                Some(_) => notes.extend(render_block(block)),
                None => {}
            }
            if block["has_children"].as_bool() == Some(true) {
                if let Some(child_id) = block["id"].as_str() {
                    let child = self.client.page_text(child_id).await?;
                    if !child.is_empty() {
                        notes.push(child);
                    }
                }
            }
        }
        if !notes.is_empty() {
            user.notes = Some(notes.join("\n"));
        }
        Ok(user)
    }

    async fn require_user(&self, user_id: &str) -> ServiceResult<UserRecord> {
        self.get_user(user_id)
            .await?
            .ok_or_else(|| ServiceError::internal(format!("user page for {} vanished", user_id)))
    }

    async fn owned_page(&self, user_id: &str, id: &str, kind: &str) -> ServiceResult<Value> {
        let not_found = || ServiceError::not_found(format!("{} {}", kind, id));
        if Uuid::parse_str(id).is_err() {
            return Err(not_found());
        }
        let page = self.client.retrieve_page(id).await?;
        let owner = property_text(&page["properties"], SLACK_USER_ID);
        if page["archived"].as_bool() == Some(true) || owner.as_deref() != Some(user_id) {
            return Err(not_found());
        }
        Ok(page)
    }
}

fn page_id(page: &Value) -> ServiceResult<String> {
    page["id"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| ServiceError::notion("page without id in response"))
}

fn created_time(page: &Value) -> DateTime<Utc> {
    page["created_time"]
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_else(Utc::now)
}

fn date_time_property(props: &Value, name: &str) -> Option<DateTime<Utc>> {
    props[name]["date"]["start"]
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|d| d.with_timezone(&Utc))
}

fn select_name(props: &Value, name: &str) -> Option<String> {
    props[name]["select"]["name"].as_str().map(str::to_string)
}

fn todo_properties_for_patch(patch: &TodoPatch) -> Value {
    let mut props = Map::new();
    if let Some(ref text) = patch.text {
        props.insert("Name".into(), title_property(text));
    }
    if let Some(due) = patch.due_date {
        let date = due.map(|d| json!({ "start": d.to_string() }));
        props.insert("Due".into(), json!({ "date": date }));
    }
    if let Some(priority) = patch.priority {
        props.insert("Priority".into(), json!({ "select": { "name": priority.to_string() } }));
    }
    if let Some(done) = patch.done {
        props.insert("Done".into(), json!({ "checkbox": done }));
    }
    Value::Object(props)
}

/// Map a TODO database page to a record.
pub fn todo_from_page(page: &Value) -> ServiceResult<TodoRecord> {
    let props = &page["properties"];
    Ok(TodoRecord {
        id: page_id(page)?,
        user_id: property_text(props, SLACK_USER_ID).unwrap_or_default(),
        text: property_text(props, "Name").unwrap_or_default(),
        due_date: props["Due"]["date"]["start"]
            .as_str()
            .and_then(|s| NaiveDate::parse_from_str(s.get(..10).unwrap_or(s), "%Y-%m-%d").ok()),
        priority: select_name(props, "Priority")
            .and_then(|p| p.parse().ok())
            .unwrap_or(Priority::Medium),
        done: props["Done"]["checkbox"].as_bool().unwrap_or(false),
        created_at: created_time(page),
    })
}

/// Map a summary database page to a record.
pub fn summary_from_page(page: &Value) -> ServiceResult<SummaryRecord> {
    let props = &page["properties"];
    Ok(SummaryRecord {
        id: page_id(page)?,
        user_id: property_text(props, SLACK_USER_ID).unwrap_or_default(),
        url: props["URL"]["url"].as_str().unwrap_or_default().to_string(),
        title: property_text(props, "Title").unwrap_or_default(),
        summary: property_text(props, "Summary").unwrap_or_default(),
        format: select_name(props, "Format")
            .and_then(|f| f.parse().ok())
            .unwrap_or(SummaryFormat::Markdown),
        source_type: select_name(props, "SourceType").unwrap_or_else(|| "webpage".to_string()),
        word_count: props["WordCount"]["number"].as_u64().unwrap_or(0) as usize,
        created_at: date_time_property(props, "CreatedAt").unwrap_or_else(|| created_time(page)),
    })
}

#[async_trait]
impl RecordStore for NotionStore {
    fn backend(&self) -> &'static str {
        "notion"
    }

    async fn get_user(&self, user_id: &str) -> ServiceResult<Option<UserRecord>> {
        match self.find_user_page(user_id).await? {
            Some(page) => Ok(Some(self.user_from_page(user_id, &page).await?)),
            None => Ok(None),
        }
    }

    async fn upsert_user(&self, user_id: &str, update: UserUpdate) -> ServiceResult<UserRecord> {
        let page_id = self
            .ensure_user_page(user_id, update.display_name.as_deref())
            .await?;

        let mut props = Map::new();
        if let Some(ref name) = update.display_name {
            props.insert("SlackDisplayName".into(), title_property(name));
        }
        if let Some(ref nickname) = update.preferred_name {
            props.insert("Nickname".into(), rich_text_property(nickname));
        }
        if !props.is_empty() {
            self.client.update_page(&page_id, Value::Object(props)).await?;
            log::info!("Updated Notion user page for {}", user_id);
        }
        self.require_user(user_id).await
    }

    async fn set_preferences(
        &self,
        user_id: &str,
        preferences: Map<String, Value>,
    ) -> ServiceResult<UserRecord> {
        let page_id = self.ensure_user_page(user_id, None).await?;
        let encoded = Value::Object(preferences).to_string();
        self.client
            .update_page(&page_id, json!({ "Preferences": rich_text_property(&encoded) }))
            .await?;
        self.require_user(user_id).await
    }

    async fn append_memory_fact(&self, user_id: &str, fact: &str) -> ServiceResult<UserRecord> {
        let page_id = self.ensure_user_page(user_id, None).await?;
        self.client
            .append_block_children(&page_id, vec![bulleted_item(fact.trim())])
            .await?;
        self.require_user(user_id).await
    }

    async fn create_todo(&self, user_id: &str, todo: NewTodo) -> ServiceResult<TodoRecord> {
        let mut props = json!({
            "Name": title_property(&todo.text),
            SLACK_USER_ID: rich_text_property(user_id),
            "Priority": { "select": { "name": todo.priority.to_string() } },
            "Done": { "checkbox": false },
        });
        if let Some(due) = todo.due_date {
            props["Due"] = json!({ "date": { "start": due.to_string() } });
        }
        let page = self.client.create_page(self.todo_db()?, props, Vec::new()).await?;
        todo_from_page(&page)
    }

    async fn get_todo(&self, user_id: &str, id: &str) -> ServiceResult<TodoRecord> {
        todo_from_page(&self.owned_page(user_id, id, "todo").await?)
    }

    async fn list_todos(&self, user_id: &str, done: Option<bool>) -> ServiceResult<Vec<TodoRecord>> {
        let mut filters = vec![equals_filter(SLACK_USER_ID, user_id)];
        if let Some(done) = done {
            filters.push(json!({ "property": "Done", "checkbox": { "equals": done } }));
        }
        let query = json!({
            "filter": { "and": filters },
            "sorts": [{ "timestamp": "created_time", "direction": "ascending" }],
        });
        self.client
            .query_database(self.todo_db()?, query)
            .await?
            .iter()
            .map(todo_from_page)
            .collect()
    }

    async fn update_todo(&self, user_id: &str, id: &str, patch: TodoPatch) -> ServiceResult<TodoRecord> {
        let page = self.owned_page(user_id, id, "todo").await?;
        let props = todo_properties_for_patch(&patch);
        if props.as_object().map_or(true, Map::is_empty) {
            return todo_from_page(&page);
        }
        let updated = self.client.update_page(id, props).await?;
        todo_from_page(&updated)
    }

    async fn delete_todo(&self, user_id: &str, id: &str) -> ServiceResult<()> {
        self.owned_page(user_id, id, "todo").await?;
        self.client.archive_page(id).await
    }

    async fn create_summary(&self, summary: NewSummary) -> ServiceResult<SummaryRecord> {
        let props = json!({
            "Title": title_property(&summary.title),
            "URL": { "url": summary.url },
            SLACK_USER_ID: rich_text_property(&summary.user_id),
            "Format": { "select": { "name": summary.format.to_string() } },
            "SourceType": { "select": { "name": summary.source_type } },
            "WordCount": { "number": summary.word_count },
            "Summary": rich_text_property(&summary.summary),
            "CreatedAt": { "date": { "start": Utc::now().to_rfc3339() } },
        });
        let page = self
            .client
            .create_page(self.summary_db()?, props, Vec::new())
            .await?;
        summary_from_page(&page)
    }

    async fn get_summary(&self, user_id: &str, id: &str) -> ServiceResult<SummaryRecord> {
        summary_from_page(&self.owned_page(user_id, id, "summary").await?)
    }

    async fn list_summaries(&self, user_id: &str) -> ServiceResult<Vec<SummaryRecord>> {
        let query = json!({
            "filter": equals_filter(SLACK_USER_ID, user_id),
            "sorts": [{ "timestamp": "created_time", "direction": "ascending" }],
        });
        self.client
            .query_database(self.summary_db()?, query)
            .await?
            .iter()
            .map(summary_from_page)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TODO_ID: &str = "2f1c8c1e-6f0b-4c38-9d56-0d7c0c7f5a11";

    fn todo_page(owner: &str) -> Value {
        json!({
            "id": TODO_ID,
            "created_time": "2026-10-16T09:00:00.000Z",
            "archived": false,
            "properties": {
                "Name": {"type": "title", "title": [{"plain_text": "renew passport"}]},
                "SlackUserID": {"type": "rich_text", "rich_text": [{"plain_text": owner}]},
                "Due": {"type": "date", "date": {"start": "2026-12-01"}},
                "Priority": {"type": "select", "select": {"name": "high"}},
                "Done": {"type": "checkbox", "checkbox": false}
            }
        })
    }

    fn store(server: &MockServer) -> NotionStore {
        NotionStore::new(
            NotionClient::new("secret").with_base_url(server.uri()),
            NotionDatabases {
                users: "users-db".into(),
                todos: Some("todo-db".into()),
                summaries: None,
            },
        )
    }

    #[test]
    fn test_todo_from_page() {
        let todo = todo_from_page(&todo_page("U1")).unwrap();
        assert_eq!(todo.id, TODO_ID);
        assert_eq!(todo.user_id, "U1");
        assert_eq!(todo.text, "renew passport");
        assert_eq!(todo.due_date, NaiveDate::from_ymd_opt(2026, 12, 1));
        assert_eq!(todo.priority, Priority::High);
        assert!(!todo.done);
    }

    #[test]
    fn test_patch_properties_only_include_changes() {
        let props = todo_properties_for_patch(&TodoPatch {
            done: Some(true),
            ..Default::default()
        });
        assert_eq!(props, json!({"Done": {"checkbox": true}}));

        let props = todo_properties_for_patch(&TodoPatch {
            due_date: Some(None),
            ..Default::default()
        });
        assert_eq!(props, json!({"Due": {"date": null}}));
    }

    #[tokio::test]
    async fn test_get_todo_of_other_user_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/pages/{}", TODO_ID)))
            .respond_with(ResponseTemplate::new(200).set_body_json(todo_page("U2")))
            .mount(&server)
            .await;

        let store = store(&server);
        let err = store.get_todo("U1", TODO_ID).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound { .. }));
        assert!(store.get_todo("U2", TODO_ID).await.is_ok());
    }

    #[tokio::test]
    async fn test_malformed_id_is_not_found_without_request() {
        let server = MockServer::start().await;
        let err = store(&server).get_todo("U1", "not-an-id").await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound { .. }));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_summary_writes_created_at() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/pages"))
            .and(body_partial_json(json!({"parent": {"database_id": "summary-db"}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "summary-page",
                "created_time": "2026-10-16T09:00:00.000Z",
                "properties": {
                    "Title": {"type": "title", "title": [{"plain_text": "Deep Dive"}]},
                    "SlackUserID": {"type": "rich_text", "rich_text": [{"plain_text": "U1"}]},
                    "URL": {"type": "url", "url": "https://example.com/post"},
                    "Summary": {"type": "rich_text", "rich_text": [{"plain_text": "Short."}]},
                    "WordCount": {"type": "number", "number": 42},
                    "CreatedAt": {"type": "date", "date": {"start": "2026-10-16T10:30:00+00:00"}}
                }
            })))
            .mount(&server)
            .await;

        let store = NotionStore::new(
            NotionClient::new("secret").with_base_url(server.uri()),
            NotionDatabases {
                users: "users-db".into(),
                todos: None,
                summaries: Some("summary-db".into()),
            },
        );
        let record = store
            .create_summary(NewSummary {
                user_id: "U1".into(),
                url: "https://example.com/post".into(),
                title: "Deep Dive".into(),
                summary: "Short.".into(),
                format: SummaryFormat::Markdown,
                source_type: "webpage".into(),
                word_count: 42,
            })
            .await
            .unwrap();
        assert_eq!(record.created_at.to_rfc3339(), "2026-10-16T10:30:00+00:00");

        let requests = server.received_requests().await.unwrap();
        let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
        let start = body["properties"]["CreatedAt"]["date"]["start"].as_str().unwrap();
        assert!(DateTime::parse_from_rfc3339(start).is_ok());
    }

    #[tokio::test]
    async fn test_missing_summary_database_is_reported() {
        let server = MockServer::start().await;
        let err = store(&server).list_summaries("U1").await.unwrap_err();
        assert!(err.to_string().contains("NOTION_SUMMARY_DB_ID"));
    }

    #[tokio::test]
    async fn test_get_user_reads_properties_and_facts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/databases/users-db/query"))
            .and(body_partial_json(json!({"filter": {"property": "SlackUserID"}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [{
                    "id": "user-page",
                    "properties": {
                        "SlackDisplayName": {"type": "title", "title": [{"plain_text": "Dana"}]},
                        "Nickname": {"type": "rich_text", "rich_text": [{"plain_text": "DJ"}]},
                        "Preferences": {"type": "rich_text", "rich_text": [{"plain_text": "{\"tone\":\"brief\"}"}]}
                    }
                }],
                "has_more": false
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/blocks/user-page/children"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [
                    {"id": "b1", "type": "paragraph", "paragraph": {"rich_text": [{"plain_text": "Works on the data team"}]}, "has_children": false},
                    {"id": "b2", "type": "bulleted_list_item", "bulleted_list_item": {"rich_text": [{"plain_text": "likes tea"}]}, "has_children": false}
                ],
                "has_more": false
            })))
            .mount(&server)
            .await;

        let user = store(&server).get_user("U1").await.unwrap().unwrap();
        assert_eq!(user.display_name.as_deref(), Some("Dana"));
        assert_eq!(user.preferred_name.as_deref(), Some("DJ"));
        assert_eq!(user.preferences["tone"], "brief");
        assert_eq!(user.memory_facts, vec!["likes tea".to_string()]);
        assert_eq!(user.notes.as_deref(), Some("Works on the data team"));
    }
}
