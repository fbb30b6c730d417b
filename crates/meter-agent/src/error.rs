//! Agent error types.

use meter_core::{ERROR_CONFIG, ERROR_DECODE, ERROR_REMOTE, ERROR_TIMEOUT, ERROR_TRANSPORT};
use meter_proto::DecodeError;

/// Agent error type.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("invalid stats endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("transport: {0}")]
    Transport(#[from] tonic::transport::Error),

    #[error("rpc: {0}")]
    Status(Box<tonic::Status>),

    #[error("stats query timed out")]
    Timeout,

    #[error("decode: {0}")]
    Decode(#[from] DecodeError),

    #[error("config: {0}")]
    Config(#[from] meter_config::ConfigError),

    #[error("sync: {0}")]
    Sync(#[from] meter_sync::SyncError),
}

impl From<tonic::Status> for AgentError {
    fn from(status: tonic::Status) -> Self {
        Self::Status(Box::new(status))
    }
}

impl AgentError {
    /// Get the error type string for metrics.
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::InvalidEndpoint(_) | Self::Config(_) => ERROR_CONFIG,
            Self::Transport(_) | Self::Status(_) => ERROR_TRANSPORT,
            Self::Timeout => ERROR_TIMEOUT,
            Self::Decode(_) => ERROR_DECODE,
            Self::Sync(_) => ERROR_REMOTE,
        }
    }

    /// Whether the stats connection should be rebuilt before the next poll.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Status(_) | Self::Timeout)
    }
}
