//! CLI override definitions and application logic.

use std::path::PathBuf;

use clap::Parser;

use crate::Config;

#[derive(Debug, Clone, Parser, Default)]
pub struct CliOverrides {
    /// Override Xray API address, e.g. 127.0.0.1:10085
    #[arg(long)]
    pub endpoint: Option<String>,
    /// Override QueryStats name pattern
    #[arg(long)]
    pub pattern: Option<String>,
    /// Reset Xray counters after each read
    #[arg(long)]
    pub reset: bool,
    /// Override poll interval (seconds)
    #[arg(long)]
    pub interval_secs: Option<u64>,
    /// Override QueryStats deadline (seconds)
    #[arg(long)]
    pub stats_timeout_secs: Option<u64>,
    /// Override sync server label
    #[arg(long)]
    pub server_label: Option<String>,
    /// Override sync state file path
    #[arg(long)]
    pub state_path: Option<PathBuf>,
    /// Override minimum seconds between sync sweeps
    #[arg(long)]
    pub sync_interval_secs: Option<u64>,
    /// Override minimum delta (bytes) worth syncing
    #[arg(long)]
    pub min_delta_bytes: Option<u64>,
    /// Disable remote sync even if configured
    #[arg(long)]
    pub no_sync: bool,
    /// Do not render the console table
    #[arg(long)]
    pub no_console: bool,
    /// Override metrics listen address
    #[arg(long)]
    pub metrics_listen: Option<String>,
    /// Override log level (trace/debug/info/warn/error)
    #[arg(long)]
    pub log_level: Option<String>,
}

/// Apply command-line overrides on top of a loaded config.
///
/// Sync overrides only touch an existing `[sync]` section.
pub fn apply_overrides(config: &mut Config, overrides: &CliOverrides) {
    if let Some(v) = &overrides.endpoint {
        config.stats.endpoint = v.clone();
    }
    if let Some(v) = &overrides.pattern {
        config.stats.pattern = v.clone();
    }
    if overrides.reset {
        config.stats.reset = true;
    }
    if let Some(v) = overrides.interval_secs {
        config.poll.interval_secs = v;
    }
    if let Some(v) = overrides.stats_timeout_secs {
        config.stats.timeout_secs = v;
    }
    if overrides.no_sync {
        config.sync = None;
    }
    if let Some(sync) = config.sync.as_mut() {
        if let Some(v) = &overrides.server_label {
            sync.server_label = v.clone();
        }
        if let Some(v) = &overrides.state_path {
            sync.state_path = v.clone();
        }
        if let Some(v) = overrides.sync_interval_secs {
            sync.interval_secs = v;
        }
        if let Some(v) = overrides.min_delta_bytes {
            sync.min_delta_bytes = v;
        }
    }
    if overrides.no_console {
        config.console.enabled = false;
    }
    if let Some(v) = &overrides.metrics_listen {
        config.metrics.listen = Some(v.clone());
    }
    if let Some(v) = &overrides.log_level {
        config.logging.level = Some(v.clone());
    }
}
