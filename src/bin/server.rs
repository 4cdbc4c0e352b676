//! ChatDSJ HTTP server binary.
//!
//! Serves the Slack Events API webhook and the REST surface over user
//! records. Configuration comes from the environment, optionally seeded from
//! a `.env` file.
//!
//! # Environment Variables
//!
//! - `SLACK_SIGNING_SECRET` — required
//! - `SLACK_BOT_TOKEN`, `OPENAI_API_KEY`, `NOTION_API_TOKEN` — each vendor is
//!   reported unavailable by `/health` when its credential is missing
//! - `NOTION_USER_DB_ID`, `NOTION_TODO_DB_ID`, `NOTION_SUMMARY_DB_ID`
//! - `PORT` — HTTP port (default: 8080)
//! - `LOG_LEVEL` — default tracing filter, overridden by `RUST_LOG`
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin server
//! ```

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use chatdsj::agents::{ContentAgent, MemoryAgent, ResponseAgent, SlackAgent, TodoAgent};
use chatdsj::crew::CrewManager;
use chatdsj::llms::base_llm::BaseLLM;
use chatdsj::llms::providers::openai::OpenAICompletion;
use chatdsj::memory::storage::{InMemoryStore, NotionDatabases, NotionStore, RecordStore};
use chatdsj::server::{app_router, AppState};
use chatdsj::services::content::{ContentService, HttpFetcher};
use chatdsj::services::notion::NotionClient;
use chatdsj::services::slack::SlackWebClient;
use chatdsj::settings::Settings;
use chatdsj::utilities::metrics::Metrics;

fn init_tracing(settings: &Settings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},chatdsj={}", settings.log_level.as_filter(), settings.log_level.as_filter())));
    if settings.is_production() {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn record_store(settings: &Settings, metrics: &Arc<Metrics>) -> Arc<dyn RecordStore> {
    match (&settings.notion_api_token, &settings.notion_user_db_id) {
        (Some(token), Some(users)) => {
            let client = NotionClient::new(token.as_str()).with_metrics(metrics.clone());
            let databases = NotionDatabases {
                users: users.clone(),
                todos: settings.notion_todo_db_id.clone(),
                summaries: settings.notion_summary_db_id.clone(),
            };
            tracing::info!("Using Notion record store");
            Arc::new(NotionStore::new(client, databases))
        }
        _ => {
            tracing::warn!("Notion is not configured, records are kept in memory only");
            Arc::new(InMemoryStore::new())
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is fine; the process environment still applies.
    let _ = dotenvy::dotenv();
    let settings = Settings::from_env().context("invalid configuration")?;
    init_tracing(&settings);
    tracing::info!("Starting ChatDSJ {} with {:?}", chatdsj::VERSION, settings);

    let metrics = Arc::new(Metrics::new());
    let store = record_store(&settings, &metrics);

    let slack = Arc::new(SlackWebClient::new(settings.slack_bot_token.clone()).with_metrics(metrics.clone()));
    let llm: Arc<dyn BaseLLM> = Arc::new(
        OpenAICompletion::new(
            settings.openai_model.clone(),
            settings.openai_api_key.clone(),
            settings.openai_base_url.clone(),
        )
        .with_max_tokens(settings.max_tokens_response),
    );
    if !llm.is_available() {
        tracing::warn!("OPENAI_API_KEY is not set, replies will fail until it is configured");
    }

    let verbose = settings.enable_crew_verbose;
    let content = ContentService::new(Arc::new(HttpFetcher::new().with_metrics(metrics.clone())));
    let crew = CrewManager::new(
        SlackAgent::new(slack, verbose),
        MemoryAgent::new(store.clone(), verbose),
        ResponseAgent::new(
            llm.clone(),
            settings.openai_system_prompt.clone(),
            settings.max_tokens_response,
            verbose,
        ),
        Arc::new(ContentAgent::new(content, Some(llm), verbose)),
        TodoAgent::new(store.clone(), verbose),
        metrics.clone(),
        verbose,
    )
    .with_max_message_history(settings.max_message_history);

    let state = AppState::new(
        Arc::new(crew),
        store,
        metrics,
        &settings.slack_signing_secret,
        settings.notion_configured(),
    );
    let app = app_router(state);

    let bind_addr = format!("0.0.0.0:{}", settings.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;
    tracing::info!("ChatDSJ listening on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    Ok(())
}
