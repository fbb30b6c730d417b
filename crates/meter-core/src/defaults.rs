//! Default configuration values.
//!
//! Centralized default constants for use across all crates.

// ============================================================================
// Stats Endpoint Defaults
// ============================================================================

/// Default Xray API address (the `api` inbound).
pub const DEFAULT_STATS_ENDPOINT: &str = "127.0.0.1:10085";
/// Default stats name pattern; matches every per-user counter.
pub const DEFAULT_STATS_PATTERN: &str = "user>>>";
/// Do not reset server-side counters on read by default.
pub const DEFAULT_STATS_RESET: bool = false;
/// Default deadline for one QueryStats call in seconds.
pub const DEFAULT_STATS_TIMEOUT_SECS: u64 = 5;
/// Default connect timeout for the stats channel in seconds.
pub const DEFAULT_STATS_CONNECT_TIMEOUT_SECS: u64 = 5;

// ============================================================================
// Poll Loop Defaults
// ============================================================================

/// Default poll interval in seconds.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

// ============================================================================
// Reconnect Defaults
// ============================================================================

/// Initial reconnect delay in milliseconds.
pub const DEFAULT_RECONNECT_INITIAL_DELAY_MS: u64 = 1000;
/// Maximum reconnect delay in milliseconds.
pub const DEFAULT_RECONNECT_MAX_DELAY_MS: u64 = 60_000;
/// Backoff multiplier.
pub const DEFAULT_RECONNECT_MULTIPLIER: f64 = 2.0;
/// Jitter factor (0.0 to 1.0).
pub const DEFAULT_RECONNECT_JITTER: f64 = 0.1;

// ============================================================================
// Sync Defaults
// ============================================================================

/// Default location of the persisted sync state.
pub const DEFAULT_SYNC_STATE_PATH: &str = "/var/lib/xray-meter/sync-state.json";
/// Minimum seconds between two reconciliation sweeps.
pub const DEFAULT_SYNC_INTERVAL_SECS: u64 = 300;
/// Smallest per-identity delta worth sending to the remote service (10 MiB).
pub const DEFAULT_SYNC_MIN_DELTA_BYTES: u64 = 10 * 1024 * 1024;
/// Deadline for each remote HTTP request in seconds.
pub const DEFAULT_SYNC_REQUEST_TIMEOUT_SECS: u64 = 10;
/// Separator between username and device suffix in an identity.
pub const DEFAULT_USERNAME_SEPARATOR: &str = "@";

// ============================================================================
// Output Defaults
// ============================================================================

/// Render the console table by default.
pub const DEFAULT_CONSOLE_ENABLED: bool = true;
/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";
