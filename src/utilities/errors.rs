//! Error types shared by the ChatDSJ services.
//!
//! Every failure that crosses a service boundary is a [`ServiceError`]. The
//! HTTP layer maps each variant to a status code; the Slack pipeline turns
//! any of them into the generic apology message.

use thiserror::Error;

/// Convenience alias used across the service layer.
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Service-level error taxonomy.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Caller could not be authenticated (bad Slack signature, missing caller id).
    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    /// Request body or command arguments failed validation.
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// Record does not exist or is not owned by the caller.
    #[error("Not found: {message}")]
    NotFound { message: String },

    /// Slack Web API failure.
    #[error("Slack API error: {message}")]
    Slack { message: String },

    /// Notion API failure.
    #[error("Notion API error: {message}")]
    Notion { message: String },

    /// Chat-completion API failure.
    #[error("LLM error: {message}")]
    Llm { message: String },

    /// Fetching or parsing linked content failed.
    #[error("Content error: {message}")]
    Content { message: String },

    /// Invariant broken inside the service itself.
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl ServiceError {
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized { message: message.into() }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation { message: message.into() }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound { message: message.into() }
    }

    pub fn slack(message: impl Into<String>) -> Self {
        Self::Slack { message: message.into() }
    }

    pub fn notion(message: impl Into<String>) -> Self {
        Self::Notion { message: message.into() }
    }

    pub fn llm(message: impl Into<String>) -> Self {
        Self::Llm { message: message.into() }
    }

    pub fn content(message: impl Into<String>) -> Self {
        Self::Content { message: message.into() }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into() }
    }

    /// Short machine-readable kind, used as the `error` field of JSON bodies
    /// and as the error-metrics category.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unauthorized { .. } => "unauthorized",
            Self::Validation { .. } => "validation",
            Self::NotFound { .. } => "not_found",
            Self::Slack { .. } => "slack",
            Self::Notion { .. } => "notion",
            Self::Llm { .. } => "llm",
            Self::Content { .. } => "content",
            Self::Internal { .. } => "internal",
        }
    }

    /// Whether the failure came from an external API.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            Self::Slack { .. } | Self::Notion { .. } | Self::Llm { .. } | Self::Content { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_message() {
        let err = ServiceError::validation("text must not be empty");
        assert_eq!(err.to_string(), "Validation error: text must not be empty");
    }

    #[test]
    fn test_upstream_classification() {
        assert!(ServiceError::notion("boom").is_upstream());
        assert!(ServiceError::llm("boom").is_upstream());
        assert!(!ServiceError::not_found("todo").is_upstream());
        assert!(!ServiceError::unauthorized("sig").is_upstream());
    }

    #[test]
    fn test_kind() {
        assert_eq!(ServiceError::slack("x").kind(), "slack");
        assert_eq!(ServiceError::internal("x").kind(), "internal");
    }
}
