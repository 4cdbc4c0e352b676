//! Axum routes for the REST surface.
//!
//! # Routes
//!
//! - `POST /slack/events`                 — Slack Events API webhook
//! - `GET|PUT /users/me`                  — caller's user record
//! - `GET|PUT /users/me/preferences`      — preferences and remembered facts
//! - `GET|POST /summaries`, `GET /summaries/:id`
//! - `GET|POST /todos`, `GET|PATCH|DELETE /todos/:id`
//! - `GET /health` (alias `/healthz`)     — liveness and vendor availability
//! - `GET /metrics`                       — execution, API call and error counters
//!
//! The caller of the record routes is named by the `X-Slack-User-Id` header.

use std::sync::Arc;

use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequestParts, Path, Query, State},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::slack_events::slack_events_handler;
use crate::crew::CrewManager;
use crate::memory::records::{
    NewTodo, PreferencesUpdate, SummaryRecord, SummaryRequest, TodoPatch, TodoRecord, UserRecord, UserUpdate,
};
use crate::memory::storage::RecordStore;
use crate::utilities::errors::{ServiceError, ServiceResult};
use crate::utilities::metrics::Metrics;

pub const CALLER_HEADER: &str = "x-slack-user-id";

/// Shared application state for the HTTP server.
#[derive(Clone)]
pub struct AppState {
    pub crew: Arc<CrewManager>,
    pub store: Arc<dyn RecordStore>,
    pub metrics: Arc<Metrics>,
    /// Slack signing secret for `/slack/events`.
    pub signing_secret: Arc<str>,
    pub notion_available: bool,
}

impl AppState {
    pub fn new(
        crew: Arc<CrewManager>,
        store: Arc<dyn RecordStore>,
        metrics: Arc<Metrics>,
        signing_secret: &str,
        notion_available: bool,
    ) -> Self {
        Self {
            crew,
            store,
            metrics,
            signing_secret: Arc::from(signing_secret),
            notion_available,
        }
    }
}

/// Build the axum router with all routes.
pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/slack/events", post(slack_events_handler))
        .route("/users/me", get(get_user_handler).put(put_user_handler))
        .route(
            "/users/me/preferences",
            get(get_preferences_handler).put(put_preferences_handler),
        )
        .route("/summaries", get(list_summaries_handler).post(create_summary_handler))
        .route("/summaries/:id", get(get_summary_handler))
        .route("/todos", get(list_todos_handler).post(create_todo_handler))
        .route(
            "/todos/:id",
            get(get_todo_handler)
                .patch(update_todo_handler)
                .delete(delete_todo_handler),
        )
        .route("/health", get(health_handler))
        .route("/healthz", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = match self {
            ServiceError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            ServiceError::Validation { .. } => StatusCode::BAD_REQUEST,
            ServiceError::NotFound { .. } => StatusCode::NOT_FOUND,
            ServiceError::Slack { .. }
            | ServiceError::Notion { .. }
            | ServiceError::Llm { .. }
            | ServiceError::Content { .. } => StatusCode::BAD_GATEWAY,
            ServiceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            log::error!("Request failed: {}", self);
        } else {
            log::debug!("Request rejected: {}", self);
        }
        let message = match &self {
            ServiceError::Unauthorized { message }
            | ServiceError::Validation { message }
            | ServiceError::NotFound { message }
            | ServiceError::Slack { message }
            | ServiceError::Notion { message }
            | ServiceError::Llm { message }
            | ServiceError::Content { message }
            | ServiceError::Internal { message } => message.clone(),
        };
        (status, Json(json!({ "error": self.kind(), "message": message }))).into_response()
    }
}

/// Slack user id of the caller, from the `X-Slack-User-Id` header.
#[derive(Debug, Clone)]
pub struct Caller(pub String);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Caller {
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(CALLER_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| Caller(v.to_string()))
            .ok_or_else(|| ServiceError::unauthorized("missing X-Slack-User-Id header"))
    }
}

/// Unwrap a JSON body, reporting malformed input as a validation error.
fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> ServiceResult<T> {
    body.map(|Json(value)| value)
        .map_err(|rejection| ServiceError::validation(rejection.body_text()))
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

async fn get_user_handler(State(state): State<AppState>, Caller(user): Caller) -> ServiceResult<Json<UserRecord>> {
    state
        .store
        .get_user(&user)
        .await?
        .map(Json)
        .ok_or_else(|| ServiceError::not_found(format!("no record for user {}", user)))
}

async fn put_user_handler(
    State(state): State<AppState>,
    Caller(user): Caller,
    body: Result<Json<UserUpdate>, JsonRejection>,
) -> ServiceResult<Json<UserRecord>> {
    let update = json_body(body)?;
    Ok(Json(state.store.upsert_user(&user, update).await?))
}

async fn get_preferences_handler(State(state): State<AppState>, Caller(user): Caller) -> ServiceResult<Json<Value>> {
    let record = state
        .store
        .get_user(&user)
        .await?
        .unwrap_or_else(|| UserRecord::new(user.as_str()));
    Ok(Json(preferences_body(&record)))
}

async fn put_preferences_handler(
    State(state): State<AppState>,
    Caller(user): Caller,
    body: Result<Json<PreferencesUpdate>, JsonRejection>,
) -> ServiceResult<Json<Value>> {
    let update = json_body(body)?;
    if let Some(preferences) = update.preferences {
        state.store.set_preferences(&user, preferences).await?;
    }
    for fact in update.memory_facts.iter().map(|f| f.trim()).filter(|f| !f.is_empty()) {
        state.store.append_memory_fact(&user, fact).await?;
    }
    let record = state
        .store
        .get_user(&user)
        .await?
        .unwrap_or_else(|| UserRecord::new(user.as_str()));
    Ok(Json(preferences_body(&record)))
}

fn preferences_body(record: &UserRecord) -> Value {
    json!({
        "preferences": record.preferences,
        "memoryFacts": record.memory_facts,
    })
}

// ---------------------------------------------------------------------------
// Summaries
// ---------------------------------------------------------------------------

async fn create_summary_handler(
    State(state): State<AppState>,
    Caller(user): Caller,
    body: Result<Json<SummaryRequest>, JsonRejection>,
) -> ServiceResult<(StatusCode, Json<SummaryRecord>)> {
    let request = json_body(body)?;
    let max_words = request.max_words()?;
    let _timer = state.metrics.timer("api.create_summary");

    let summary = state
        .crew
        .content_agent()
        .summarize(&request.url, max_words, request.format)
        .await?;
    let record = state.store.create_summary(summary.into_new_summary(&user)).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

async fn list_summaries_handler(State(state): State<AppState>, Caller(user): Caller) -> ServiceResult<Json<Value>> {
    let summaries = state.store.list_summaries(&user).await?;
    Ok(Json(json!({ "summaries": summaries })))
}

async fn get_summary_handler(
    State(state): State<AppState>,
    Caller(user): Caller,
    Path(id): Path<String>,
) -> ServiceResult<Json<SummaryRecord>> {
    Ok(Json(state.store.get_summary(&user, &id).await?))
}

// ---------------------------------------------------------------------------
// TODOs
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct TodoQuery {
    done: Option<bool>,
}

async fn list_todos_handler(
    State(state): State<AppState>,
    Caller(user): Caller,
    Query(query): Query<TodoQuery>,
) -> ServiceResult<Json<Value>> {
    let todos = state.store.list_todos(&user, query.done).await?;
    Ok(Json(json!({ "todos": todos })))
}

async fn create_todo_handler(
    State(state): State<AppState>,
    Caller(user): Caller,
    body: Result<Json<NewTodo>, JsonRejection>,
) -> ServiceResult<(StatusCode, Json<TodoRecord>)> {
    let todo = json_body(body)?.validated()?;
    let record = state.store.create_todo(&user, todo).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

async fn get_todo_handler(
    State(state): State<AppState>,
    Caller(user): Caller,
    Path(id): Path<String>,
) -> ServiceResult<Json<TodoRecord>> {
    Ok(Json(state.store.get_todo(&user, &id).await?))
}

async fn update_todo_handler(
    State(state): State<AppState>,
    Caller(user): Caller,
    Path(id): Path<String>,
    body: Result<Json<TodoPatch>, JsonRejection>,
) -> ServiceResult<Json<TodoRecord>> {
    let patch = json_body(body)?.validated()?;
    Ok(Json(state.store.update_todo(&user, &id, patch).await?))
}

async fn delete_todo_handler(
    State(state): State<AppState>,
    Caller(user): Caller,
    Path(id): Path<String>,
) -> ServiceResult<StatusCode> {
    state.store.delete_todo(&user, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Health and metrics
// ---------------------------------------------------------------------------

/// GET /health — liveness probe with vendor availability.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": crate::VERSION,
        "services": {
            "slack": state.crew.slack_agent().is_available(),
            "notion": state.notion_available,
            "openai": state.crew.response_agent().llm().is_available(),
        },
        "storage": state.store.backend(),
    }))
}

async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.metrics.summary())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
