//! Notion REST API client.
//!
//! Thin wrapper over the endpoints the record store needs: database query,
//! page create/retrieve/update and block children list/append. Vendor
//! failures surface as [`ServiceError::Notion`].

use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};
use serde_json::{json, Value};

use crate::utilities::errors::{ServiceError, ServiceResult};
use crate::utilities::metrics::Metrics;

pub const NOTION_API_BASE: &str = "https://api.notion.com/v1";
pub const NOTION_VERSION: &str = "2022-06-28";
/// Largest `content` Notion accepts in one rich-text segment.
pub const RICH_TEXT_LIMIT: usize = 2000;

#[derive(Debug, Clone)]
pub struct NotionClient {
    token: String,
    base_url: String,
    http: reqwest::Client,
    metrics: Option<Arc<Metrics>>,
}

impl NotionClient {
    pub fn new(token: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self {
            token: token.into(),
            base_url: NOTION_API_BASE.to_string(),
            http,
            metrics: None,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    async fn send(&self, method: reqwest::Method, path: &str, body: Option<&Value>) -> ServiceResult<Value> {
        if let Some(ref m) = self.metrics {
            m.track_api_call("notion");
        }
        let url = format!("{}{}", self.base_url, path);
        let mut request = self
            .http
            .request(method, &url)
            .bearer_auth(&self.token)
            .header("Notion-Version", NOTION_VERSION);
        if let Some(body) = body {
            request = request.json(body);
        }

        let result = async {
            let response = request
                .send()
                .await
                .map_err(|e| ServiceError::notion(format!("request to {} failed: {}", path, e)))?;
            let status = response.status();
            let text = response
                .text()
                .await
                .map_err(|e| ServiceError::notion(format!("failed to read response: {}", e)))?;
            if status == reqwest::StatusCode::NOT_FOUND {
                return Err(ServiceError::not_found(format!("Notion object at {}", path)));
            }
            if !status.is_success() {
                return Err(ServiceError::notion(format!("{} {}: {}", status.as_u16(), path, text)));
            }
            serde_json::from_str::<Value>(&text)
                .map_err(|e| ServiceError::notion(format!("invalid JSON from {}: {}", path, e)))
        }
        .await;

        if let Err(ref e) = result {
            log::error!("Notion API call failed: {}", e);
            if let Some(ref m) = self.metrics {
                m.track_error("notion");
            }
        }
        result
    }

    /// Query a database, following `next_cursor` until every page is read.
    pub async fn query_database(&self, database_id: &str, query: Value) -> ServiceResult<Vec<Value>> {
        let path = format!("/databases/{}/query", database_id);
        let mut results = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let mut body = query.clone();
            if let Some(ref c) = cursor {
                body["start_cursor"] = json!(c);
            }
            let response = self.send(reqwest::Method::POST, &path, Some(&body)).await?;
            results.extend(
                response
                    .get("results")
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default(),
            );
            cursor = next_cursor(&response);
            if cursor.is_none() {
                break;
            }
        }
        Ok(results)
    }

    pub async fn retrieve_page(&self, page_id: &str) -> ServiceResult<Value> {
        self.send(reqwest::Method::GET, &format!("/pages/{}", page_id), None)
            .await
    }

    /// Create a page under `database_id`.
    pub async fn create_page(&self, database_id: &str, properties: Value, children: Vec<Value>) -> ServiceResult<Value> {
        let mut body = json!({
            "parent": {"database_id": database_id},
            "properties": properties,
        });
        if !children.is_empty() {
            body["children"] = Value::Array(children);
        }
        self.send(reqwest::Method::POST, "/pages", Some(&body)).await
    }

    pub async fn update_page(&self, page_id: &str, properties: Value) -> ServiceResult<Value> {
        let body = json!({ "properties": properties });
        self.send(reqwest::Method::PATCH, &format!("/pages/{}", page_id), Some(&body))
            .await
    }

    /// Notion has no hard delete; archived pages disappear from queries.
    pub async fn archive_page(&self, page_id: &str) -> ServiceResult<()> {
        let body = json!({ "archived": true });
        self.send(reqwest::Method::PATCH, &format!("/pages/{}", page_id), Some(&body))
            .await
            .map(|_| ())
    }

    /// All children of a block or page, following pagination.
    pub async fn list_block_children(&self, block_id: &str) -> ServiceResult<Vec<Value>> {
        let mut blocks = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let mut path = format!("/blocks/{}/children?page_size=100", block_id);
            if let Some(ref c) = cursor {
                path.push_str(&format!("&start_cursor={}", c));
            }
            let response = self.send(reqwest::Method::GET, &path, None).await?;
            blocks.extend(
                response
                    .get("results")
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default(),
            );
            cursor = next_cursor(&response);
            if cursor.is_none() {
                break;
            }
        }
        Ok(blocks)
    }

    pub async fn append_block_children(&self, block_id: &str, children: Vec<Value>) -> ServiceResult<()> {
        let body = json!({ "children": children });
        self.send(
            reqwest::Method::PATCH,
            &format!("/blocks/{}/children", block_id),
            Some(&body),
        )
        .await
        .map(|_| ())
    }

    /// Render a page (or block) and all nested children as plain text.
    pub fn page_text<'a>(&'a self, block_id: &'a str) -> BoxFuture<'a, ServiceResult<String>> {
        async move {
            let blocks = self.list_block_children(block_id).await?;
            let mut lines = Vec::new();
            for block in &blocks {
                if let Some(line) = render_block(block) {
                    lines.push(line);
                }
                if block.get("has_children").and_then(Value::as_bool) == Some(true) {
                    if let Some(child_id) = block.get("id").and_then(Value::as_str) {
                        match self.page_text(child_id).await {
                            Ok(child) if !child.is_empty() => lines.push(child),
                            Ok(_) => {}
                            Err(e) => log::error!("Error processing child blocks: {}", e),
                        }
                    }
                }
            }
            Ok(lines.join("\n"))
        }
        .boxed()
    }
}

fn next_cursor(response: &Value) -> Option<String> {
    if response.get("has_more").and_then(Value::as_bool) != Some(true) {
        return None;
    }
    response
        .get("next_cursor")
        .and_then(Value::as_str)
        .map(str::to_string)
}

// ---------------------------------------------------------------------------
// Block and property helpers
// ---------------------------------------------------------------------------

/// Block types rendered as text.
const TEXT_BLOCKS: [&str; 6] = [
    "paragraph",
    "heading_1",
    "heading_2",
    "heading_3",
    "bulleted_list_item",
    "numbered_list_item",
];

/// Concatenated `plain_text` of a rich-text array.
pub fn rich_text_plain(rich_text: &Value) -> String {
    rich_text
        .as_array()
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| p.get("plain_text").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default()
}

/// Block type and its plain text, for text-bearing blocks.
pub fn block_text(block: &Value) -> Option<(&str, String)> {
    let block_type = block.get("type").and_then(Value::as_str)?;
    if !TEXT_BLOCKS.contains(&block_type) {
        return None;
    }
    let text = rich_text_plain(block.get(block_type)?.get("rich_text")?);
    if text.is_empty() {
        return None;
    }
    Some((block_type, text))
}

/// One rendered line: headings as `# `, bullets as `• `, numbered items as `- `.
pub fn render_block(block: &Value) -> Option<String> {
    let (block_type, text) = block_text(block)?;
    Some(match block_type {
        t if t.starts_with("heading") => format!("# {}", text),
        "bulleted_list_item" => format!("• {}", text),
        "numbered_list_item" => format!("- {}", text),
        _ => text,
    })
}

/// Rich-text value, split into segments Notion accepts.
pub fn rich_text(content: &str) -> Value {
    let chars: Vec<char> = content.chars().collect();
    let segments: Vec<Value> = chars
        .chunks(RICH_TEXT_LIMIT)
        .map(|chunk| {
            let s: String = chunk.iter().collect();
            json!({"type": "text", "text": {"content": s}})
        })
        .collect();
    Value::Array(segments)
}

pub fn rich_text_property(content: &str) -> Value {
    json!({ "rich_text": rich_text(content) })
}

pub fn title_property(content: &str) -> Value {
    json!({ "title": rich_text(content) })
}

pub fn bulleted_item(content: &str) -> Value {
    json!({
        "object": "block",
        "type": "bulleted_list_item",
        "bulleted_list_item": { "rich_text": rich_text(content) }
    })
}

/// Plain text of a `title` or `rich_text` property.
pub fn property_text(properties: &Value, name: &str) -> Option<String> {
    let prop = properties.get(name)?;
    let text = prop
        .get("rich_text")
        .or_else(|| prop.get("title"))
        .map(rich_text_plain)?;
    (!text.is_empty()).then_some(text)
}

/// Filter matching pages whose rich-text `property` equals `value`.
pub fn equals_filter(property: &str, value: &str) -> Value {
    json!({ "property": property, "rich_text": { "equals": value } })
}
