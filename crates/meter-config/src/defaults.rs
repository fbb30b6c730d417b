//! Default value functions for serde deserialization.
//!
//! These functions forward to constants defined in `meter_core::defaults`.

use std::path::PathBuf;

use meter_core::defaults;

/// Generate default value functions that forward to meter_core::defaults constants.
macro_rules! default_fns {
    // For Copy types (integers, bool, etc.)
    ($($fn_name:ident => $const_name:ident : $ty:ty),* $(,)?) => {
        $(
            pub(crate) fn $fn_name() -> $ty {
                defaults::$const_name
            }
        )*
    };
}

/// Generate default value functions that return String from &str constants.
macro_rules! default_string_fns {
    ($($fn_name:ident => $const_name:ident),* $(,)?) => {
        $(
            pub(crate) fn $fn_name() -> String {
                defaults::$const_name.to_string()
            }
        )*
    };
}

default_fns! {
    default_stats_reset                => DEFAULT_STATS_RESET: bool,
    default_stats_timeout_secs         => DEFAULT_STATS_TIMEOUT_SECS: u64,
    default_stats_connect_timeout_secs => DEFAULT_STATS_CONNECT_TIMEOUT_SECS: u64,
    default_poll_interval_secs         => DEFAULT_POLL_INTERVAL_SECS: u64,
    // Reconnect backoff
    default_initial_delay_ms           => DEFAULT_RECONNECT_INITIAL_DELAY_MS: u64,
    default_max_delay_ms               => DEFAULT_RECONNECT_MAX_DELAY_MS: u64,
    default_multiplier                 => DEFAULT_RECONNECT_MULTIPLIER: f64,
    default_jitter                     => DEFAULT_RECONNECT_JITTER: f64,
    // Sync
    default_sync_interval_secs         => DEFAULT_SYNC_INTERVAL_SECS: u64,
    default_sync_min_delta_bytes       => DEFAULT_SYNC_MIN_DELTA_BYTES: u64,
    default_sync_request_timeout_secs  => DEFAULT_SYNC_REQUEST_TIMEOUT_SECS: u64,
    default_console_enabled            => DEFAULT_CONSOLE_ENABLED: bool,
}

default_string_fns! {
    default_stats_endpoint     => DEFAULT_STATS_ENDPOINT,
    default_stats_pattern      => DEFAULT_STATS_PATTERN,
    default_username_separator => DEFAULT_USERNAME_SEPARATOR,
}

pub(crate) fn default_sync_state_path() -> PathBuf {
    PathBuf::from(defaults::DEFAULT_SYNC_STATE_PATH)
}
