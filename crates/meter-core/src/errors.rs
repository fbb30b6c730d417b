//! Error type constants for metrics and logging.
//!
//! These constants provide consistent error classification across all crates.

/// Stats endpoint unreachable or call failed.
pub const ERROR_TRANSPORT: &str = "transport";
/// Stats response could not be decoded.
pub const ERROR_DECODE: &str = "decode";
/// Network call exceeded its deadline.
pub const ERROR_TIMEOUT: &str = "timeout";
/// Remote bookkeeping read or write failed.
pub const ERROR_REMOTE: &str = "remote";
/// Sync state file could not be read or written.
pub const ERROR_STATE: &str = "state";
/// Configuration error.
pub const ERROR_CONFIG: &str = "config";
