//! Configuration type definitions.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::defaults::*;

/// Top-level configuration. Every section is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub stats: StatsConfig,
    #[serde(default)]
    pub poll: PollConfig,
    #[serde(default)]
    pub reconnect: ReconnectConfig,
    /// Remote usage sync. Absent disables sync entirely.
    #[serde(default)]
    pub sync: Option<SyncConfig>,
    #[serde(default)]
    pub console: ConsoleConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Xray stats API connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsConfig {
    /// gRPC address of the Xray API inbound, `host:port` or a full `http://` URI.
    #[serde(default = "default_stats_endpoint")]
    pub endpoint: String,
    /// Counter name pattern passed to QueryStats.
    #[serde(default = "default_stats_pattern")]
    pub pattern: String,
    /// Ask Xray to zero counters after reading them.
    #[serde(default = "default_stats_reset")]
    pub reset: bool,
    /// Deadline for one QueryStats call.
    #[serde(default = "default_stats_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_stats_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            endpoint: default_stats_endpoint(),
            pattern: default_stats_pattern(),
            reset: default_stats_reset(),
            timeout_secs: default_stats_timeout_secs(),
            connect_timeout_secs: default_stats_connect_timeout_secs(),
        }
    }
}

impl StatsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    #[serde(default = "default_poll_interval_secs")]
    pub interval_secs: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_poll_interval_secs(),
        }
    }
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Exponential backoff after a failed poll.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectConfig {
    /// Initial reconnect delay in milliseconds.
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// Maximum reconnect delay in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Backoff multiplier.
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    /// Jitter factor (0.0 to 1.0).
    #[serde(default = "default_jitter")]
    pub jitter: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            multiplier: default_multiplier(),
            jitter: default_jitter(),
        }
    }
}

/// Remote bookkeeping service and local sync state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// API root, e.g. `https://panel.example.com/api`.
    pub base_url: String,
    /// Sent as `Authorization: Bearer <token>` when set.
    #[serde(default)]
    pub api_token: Option<String>,
    /// Server column written to every remote row of this node.
    pub server_label: String,
    #[serde(default = "default_sync_state_path")]
    pub state_path: PathBuf,
    /// Minimum seconds between sweeps.
    #[serde(default = "default_sync_interval_secs")]
    pub interval_secs: u64,
    /// Smallest delta worth a remote write.
    #[serde(default = "default_sync_min_delta_bytes")]
    pub min_delta_bytes: u64,
    #[serde(default = "default_sync_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Identity is split on the first occurrence to get the remote username.
    #[serde(default = "default_username_separator")]
    pub username_separator: String,
}

impl SyncConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsoleConfig {
    /// Print the traffic table to stdout after every poll.
    #[serde(default = "default_console_enabled")]
    pub enabled: bool,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            enabled: default_console_enabled(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MetricsConfig {
    /// Prometheus exporter listen address. None disables the exporter.
    pub listen: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    pub level: Option<String>,
    /// Per-module log level filters (e.g., {"meter_sync": "debug", "h2": "warn"}).
    #[serde(default)]
    pub filters: HashMap<String, String>,
}
