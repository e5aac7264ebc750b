//! Error types for dataroom

use thiserror::Error;

/// Result type alias using DataroomError
pub type Result<T> = std::result::Result<T, DataroomError>;

/// Error type alias for convenience
pub type Error = DataroomError;

/// Exit codes for CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL_ERROR: i32 = 1;
    pub const NOT_READY: i32 = 2;
    pub const INVALID_INPUT: i32 = 3;
    pub const BUSY: i32 = 4;
}

/// Main error type for dataroom
#[derive(Debug, Error)]
pub enum DataroomError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Walk directory error: {0}")]
    WalkDir(#[from] walkdir::Error),

    #[error("Glob pattern error: {0}")]
    GlobPattern(#[from] glob::PatternError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("External service error (HTTP {status}): {message}")]
    ExternalError { status: u16, message: String },

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Generation failed: {0}")]
    Generation(String),

    #[error("Index error: {0}")]
    Index(String),

    #[error("Index not ready: no snapshot has been built yet")]
    IndexNotReady,

    #[error("An index rebuild is already in progress")]
    RebuildInProgress,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl DataroomError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::IndexNotReady => exit_codes::NOT_READY,
            Self::InvalidInput(_) | Self::Config(_) => exit_codes::INVALID_INPUT,
            Self::RebuildInProgress => exit_codes::BUSY,
            _ => exit_codes::GENERAL_ERROR,
        }
    }

    /// Whether retrying the same call may succeed.
    ///
    /// Timeouts, connection failures, rate limits and server-side errors are
    /// transient. Malformed responses and client errors are not.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e
                        .status()
                        .map(|s| s.as_u16() == 429 || s.is_server_error())
                        .unwrap_or(false)
            }
            Self::ExternalError { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        let rate_limited = DataroomError::ExternalError {
            status: 429,
            message: "slow down".to_string(),
        };
        let unavailable = DataroomError::ExternalError {
            status: 503,
            message: "unavailable".to_string(),
        };
        let bad_request = DataroomError::ExternalError {
            status: 400,
            message: "bad".to_string(),
        };

        assert!(rate_limited.is_transient());
        assert!(unavailable.is_transient());
        assert!(!bad_request.is_transient());
        assert!(!DataroomError::Llm("unparseable".to_string()).is_transient());
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(DataroomError::IndexNotReady.exit_code(), exit_codes::NOT_READY);
        assert_eq!(DataroomError::RebuildInProgress.exit_code(), exit_codes::BUSY);
        assert_eq!(
            DataroomError::InvalidInput("k".to_string()).exit_code(),
            exit_codes::INVALID_INPUT
        );
        assert_eq!(
            DataroomError::Generation("boom".to_string()).exit_code(),
            exit_codes::GENERAL_ERROR
        );
    }
}
