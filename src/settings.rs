//! Environment-driven configuration.
//!
//! Values come from the process environment; the server binary loads an
//! optional `.env` file with `dotenvy` first. Secrets are redacted from the
//! `Debug` output.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o";
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are ChatDSJ, a helpful AI assistant for the Slack workspace. You help users with their questions and tasks.";
pub const DEFAULT_MAX_TOKENS_RESPONSE: u32 = 1500;
pub const DEFAULT_MAX_MESSAGE_HISTORY: usize = 1000;
pub const DEFAULT_PORT: u16 = 8080;

/// Errors raised while loading [`Settings`].
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Missing required setting: {name}")]
    Missing { name: &'static str },

    #[error("Invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Testing,
    Production,
}

impl FromStr for Environment {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "testing" | "test" => Ok(Self::Testing),
            "production" | "prod" => Ok(Self::Production),
            _ => Err(()),
        }
    }
}

/// Log level accepted in `LOG_LEVEL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Directive understood by `tracing_subscriber::EnvFilter`.
    pub fn as_filter(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "TRACE" => Ok(Self::Trace),
            "DEBUG" => Ok(Self::Debug),
            "INFO" | "SUCCESS" => Ok(Self::Info),
            "WARN" | "WARNING" => Ok(Self::Warn),
            "ERROR" | "CRITICAL" => Ok(Self::Error),
            _ => Err(()),
        }
    }
}

/// Application settings.
#[derive(Clone)]
pub struct Settings {
    pub slack_bot_token: Option<String>,
    pub slack_signing_secret: String,
    pub slack_app_token: Option<String>,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub openai_base_url: Option<String>,
    pub openai_system_prompt: String,
    pub notion_api_token: Option<String>,
    pub notion_user_db_id: Option<String>,
    pub notion_todo_db_id: Option<String>,
    pub notion_summary_db_id: Option<String>,
    pub log_level: LogLevel,
    pub environment: Environment,
    pub max_tokens_response: u32,
    pub max_message_history: usize,
    pub enable_crew_verbose: bool,
    pub port: u16,
}

impl Settings {
    /// Load settings from the process environment.
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load settings from a map; used by tests.
    pub fn from_map(values: &HashMap<String, String>) -> Result<Self, SettingsError> {
        Self::from_lookup(|key| values.get(key).cloned())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let slack_signing_secret = get("SLACK_SIGNING_SECRET").ok_or(SettingsError::Missing {
            name: "SLACK_SIGNING_SECRET",
        })?;

        let log_level = match get("LOG_LEVEL") {
            Some(v) => v.parse().map_err(|_| SettingsError::Invalid {
                name: "LOG_LEVEL",
                value: v.clone(),
            })?,
            None => LogLevel::Info,
        };

        let environment = match get("ENVIRONMENT") {
            Some(v) => v.parse().map_err(|_| SettingsError::Invalid {
                name: "ENVIRONMENT",
                value: v.clone(),
            })?,
            None => Environment::Development,
        };

        Ok(Self {
            slack_bot_token: get("SLACK_BOT_TOKEN"),
            slack_signing_secret,
            slack_app_token: get("SLACK_APP_TOKEN"),
            openai_api_key: get("OPENAI_API_KEY"),
            openai_model: get("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
            openai_base_url: get("OPENAI_BASE_URL"),
            openai_system_prompt: get("OPENAI_SYSTEM_PROMPT")
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            notion_api_token: get("NOTION_API_TOKEN"),
            notion_user_db_id: get("NOTION_USER_DB_ID"),
            notion_todo_db_id: get("NOTION_TODO_DB_ID"),
            notion_summary_db_id: get("NOTION_SUMMARY_DB_ID"),
            log_level,
            environment,
            max_tokens_response: parse_or(get("MAX_TOKENS_RESPONSE"), "MAX_TOKENS_RESPONSE", DEFAULT_MAX_TOKENS_RESPONSE)?,
            max_message_history: parse_or(get("MAX_MESSAGE_HISTORY"), "MAX_MESSAGE_HISTORY", DEFAULT_MAX_MESSAGE_HISTORY)?,
            enable_crew_verbose: parse_or(
                get("ENABLE_CREW_VERBOSE").map(|v| v.to_ascii_lowercase()),
                "ENABLE_CREW_VERBOSE",
                false,
            )?,
            port: parse_or(get("PORT"), "PORT", DEFAULT_PORT)?,
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    /// Notion is usable when a token and at least the user database are set.
    pub fn notion_configured(&self) -> bool {
        self.notion_api_token.is_some() && self.notion_user_db_id.is_some()
    }
}

fn parse_or<T: FromStr>(value: Option<String>, name: &'static str, default: T) -> Result<T, SettingsError> {
    match value {
        Some(v) => v.parse().map_err(|_| SettingsError::Invalid { name, value: v }),
        None => Ok(default),
    }
}

fn redact(value: &Option<String>) -> &'static str {
    if value.is_some() {
        "***"
    } else {
        "<unset>"
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("slack_bot_token", &redact(&self.slack_bot_token))
            .field("slack_signing_secret", &"***")
            .field("slack_app_token", &redact(&self.slack_app_token))
            .field("openai_api_key", &redact(&self.openai_api_key))
            .field("openai_model", &self.openai_model)
            .field("openai_base_url", &self.openai_base_url)
            .field("notion_api_token", &redact(&self.notion_api_token))
            .field("notion_user_db_id", &self.notion_user_db_id)
            .field("notion_todo_db_id", &self.notion_todo_db_id)
            .field("notion_summary_db_id", &self.notion_summary_db_id)
            .field("log_level", &self.log_level)
            .field("environment", &self.environment)
            .field("max_tokens_response", &self.max_tokens_response)
            .field("max_message_history", &self.max_message_history)
            .field("enable_crew_verbose", &self.enable_crew_verbose)
            .field("port", &self.port)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn base() -> HashMap<String, String> {
        HashMap::from([("SLACK_SIGNING_SECRET".to_string(), "shh".to_string())])
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::from_map(&base()).unwrap();
        assert_eq!(settings.openai_model, "gpt-4o");
        assert_eq!(settings.openai_system_prompt, DEFAULT_SYSTEM_PROMPT);
        assert_eq!(settings.max_tokens_response, 1500);
        assert_eq!(settings.max_message_history, 1000);
        assert_eq!(settings.port, 8080);
        assert_eq!(settings.log_level, LogLevel::Info);
        assert_eq!(settings.environment, Environment::Development);
        assert!(!settings.enable_crew_verbose);
        assert!(!settings.notion_configured());
    }

    #[test]
    fn test_missing_signing_secret() {
        let err = Settings::from_map(&HashMap::new()).unwrap_err();
        assert!(matches!(err, SettingsError::Missing { name: "SLACK_SIGNING_SECRET" }));
    }

    #[test]
    fn test_log_level_validation() {
        let mut values = base();
        values.insert("LOG_LEVEL".into(), "warning".into());
        assert_eq!(Settings::from_map(&values).unwrap().log_level, LogLevel::Warn);

        values.insert("LOG_LEVEL".into(), "LOUD".into());
        assert!(matches!(
            Settings::from_map(&values),
            Err(SettingsError::Invalid { name: "LOG_LEVEL", .. })
        ));
    }

    #[test]
    fn test_blank_values_are_unset() {
        let mut values = base();
        values.insert("OPENAI_API_KEY".into(), "   ".into());
        values.insert("ENABLE_CREW_VERBOSE".into(), "TRUE".into());
        let settings = Settings::from_map(&values).unwrap();
        assert!(settings.openai_api_key.is_none());
        assert!(settings.enable_crew_verbose);
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let mut values = base();
        values.insert("OPENAI_API_KEY".into(), "sk-very-secret".into());
        let rendered = format!("{:?}", Settings::from_map(&values).unwrap());
        assert!(!rendered.contains("sk-very-secret"));
        assert!(!rendered.contains("shh"));
    }

    #[test]
    fn test_dotenv_file_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "SLACK_SIGNING_SECRET=from-file").unwrap();
        writeln!(file, "PORT=9100").unwrap();

        let values: HashMap<String, String> = dotenvy::from_path_iter(file.path())
            .unwrap()
            .map(|item| item.unwrap())
            .collect();
        let settings = Settings::from_map(&values).unwrap();
        assert_eq!(settings.slack_signing_secret, "from-file");
        assert_eq!(settings.port, 9100);
    }
}
