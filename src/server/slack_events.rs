//! `POST /slack/events`: signature check, then hand-off to the crew.

use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    Json,
};
use serde_json::{json, Value};

use super::routes::AppState;
use crate::services::slack::events::SlackEnvelope;
use crate::services::slack::signature::{now_secs, verify_signature, SIGNATURE_HEADER, TIMESTAMP_HEADER};
use crate::utilities::errors::{ServiceError, ServiceResult};

/// Set by Slack on redeliveries of an event it considers unacknowledged.
pub const RETRY_HEADER: &str = "x-slack-retry-num";

fn header<'a>(headers: &'a HeaderMap, name: &str) -> ServiceResult<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ServiceError::unauthorized(format!("missing {} header", name)))
}

/// Verify the raw body before anything is parsed, answer URL verification
/// inline and process callbacks in a spawned task.
pub async fn slack_events_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ServiceResult<Json<Value>> {
    let timestamp = header(&headers, TIMESTAMP_HEADER)?;
    let signature = header(&headers, SIGNATURE_HEADER)?;
    verify_signature(&state.signing_secret, timestamp, &body, signature, now_secs())?;

    let envelope: SlackEnvelope = serde_json::from_slice(&body)
        .map_err(|e| ServiceError::validation(format!("invalid Slack payload: {}", e)))?;

    match envelope {
        SlackEnvelope::UrlVerification { challenge } => {
            log::info!("Answering Slack URL verification");
            Ok(Json(json!({ "challenge": challenge })))
        }
        SlackEnvelope::EventCallback { event, event_id } => {
            if let Some(retry) = headers.get(RETRY_HEADER).and_then(|v| v.to_str().ok()) {
                log::info!("Skipping Slack redelivery {} of event {:?}", retry, event_id);
                return Ok(Json(json!({ "ok": true })));
            }
            log::debug!("Accepted Slack event {:?}", event_id);
            let crew = state.crew.clone();
            tokio::spawn(async move {
                crew.handle_event(event).await;
            });
            Ok(Json(json!({ "ok": true })))
        }
        SlackEnvelope::Unknown => {
            log::debug!("Ignoring unsupported Slack envelope");
            Ok(Json(json!({ "ok": true })))
        }
    }
}
