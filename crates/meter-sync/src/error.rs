//! Sync error types.

use meter_core::{ERROR_CONFIG, ERROR_REMOTE, ERROR_STATE, ERROR_TIMEOUT};

/// Sync error type.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    /// Request could not be sent or the connection failed.
    #[error("http: {0}")]
    Http(String),

    /// Remote answered with a non-2xx status.
    #[error("remote returned HTTP {0}")]
    Status(u16),

    #[error("remote request timed out")]
    Timeout,

    /// Remote answered 2xx but the body was unusable.
    #[error("remote: {0}")]
    Remote(String),

    #[error("state: {0}")]
    State(String),

    /// Base URL cannot address the records API.
    #[error("invalid url: {0}")]
    InvalidUrl(String),
}

impl SyncError {
    /// Get the error type string for metrics.
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::Io(_) | Self::Json(_) | Self::State(_) => ERROR_STATE,
            Self::Timeout => ERROR_TIMEOUT,
            Self::InvalidUrl(_) => ERROR_CONFIG,
            Self::Http(_) | Self::Status(_) | Self::Remote(_) => ERROR_REMOTE,
        }
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::Remote(err.to_string())
        } else if let Some(status) = err.status() {
            Self::Status(status.as_u16())
        } else {
            Self::Http(err.to_string())
        }
    }
}
