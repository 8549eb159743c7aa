//! FX error types.

use thiserror::Error;

/// Errors that can occur while fetching, caching or loading rate data.
#[derive(Debug, Error)]
pub enum FxError {
    /// Required configuration is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Transport failure or non-success HTTP status.
    #[error("Network error{}: {message}", status_suffix(.status))]
    Network {
        status: Option<u16>,
        message: String,
    },

    /// The provider answered with an application-level error.
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Persisted or fetched data could not be decoded.
    #[error("Parse error: {0}")]
    Parse(String),

    /// The key-value store failed.
    #[error("Storage error: {0}")]
    Storage(String),
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" ({s})")).unwrap_or_default()
}

impl FxError {
    /// Build a network error without a status code.
    pub fn network(message: impl Into<String>) -> Self {
        FxError::Network {
            status: None,
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for FxError {
    fn from(err: reqwest::Error) -> Self {
        FxError::Network {
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for FxError {
    fn from(err: std::io::Error) -> Self {
        FxError::Storage(err.to_string())
    }
}

/// Result type for FX operations.
pub type FxResult<T> = Result<T, FxError>;
