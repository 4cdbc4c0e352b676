//! HTTP server: the Slack webhook and the REST surface over user records.

pub mod routes;
pub mod slack_events;

pub use routes::{app_router, AppState};
