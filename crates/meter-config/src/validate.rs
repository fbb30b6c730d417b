//! Configuration validation logic.

use std::net::SocketAddr;

use crate::Config;
use crate::loader::ConfigError;

pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.stats.endpoint.trim().is_empty() {
        return Err(ConfigError::Validation("stats.endpoint is empty".into()));
    }
    if config.stats.timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "stats.timeout_secs must be > 0".into(),
        ));
    }
    if config.stats.connect_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "stats.connect_timeout_secs must be > 0".into(),
        ));
    }
    if config.poll.interval_secs == 0 {
        return Err(ConfigError::Validation(
            "poll.interval_secs must be > 0".into(),
        ));
    }

    let rc = &config.reconnect;
    if rc.multiplier.is_nan() || rc.multiplier < 1.0 {
        return Err(ConfigError::Validation(
            "reconnect.multiplier must be >= 1.0".into(),
        ));
    }
    if !(0.0..=1.0).contains(&rc.jitter) {
        return Err(ConfigError::Validation(
            "reconnect.jitter must be within 0.0..=1.0".into(),
        ));
    }
    if rc.initial_delay_ms > rc.max_delay_ms {
        return Err(ConfigError::Validation(
            "reconnect.initial_delay_ms cannot be greater than reconnect.max_delay_ms".into(),
        ));
    }

    if let Some(ref sync) = config.sync {
        if !(sync.base_url.starts_with("http://") || sync.base_url.starts_with("https://")) {
            return Err(ConfigError::Validation(
                "sync.base_url must start with http:// or https://".into(),
            ));
        }
        if sync.server_label.trim().is_empty() {
            return Err(ConfigError::Validation("sync.server_label is empty".into()));
        }
        if sync.interval_secs == 0 {
            return Err(ConfigError::Validation(
                "sync.interval_secs must be > 0".into(),
            ));
        }
        if sync.request_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "sync.request_timeout_secs must be > 0".into(),
            ));
        }
        if sync.username_separator.is_empty() {
            return Err(ConfigError::Validation(
                "sync.username_separator is empty".into(),
            ));
        }
        if sync.state_path.as_os_str().is_empty() {
            return Err(ConfigError::Validation("sync.state_path is empty".into()));
        }
    }

    if let Some(ref listen) = config.metrics.listen
        && listen.parse::<SocketAddr>().is_err()
    {
        return Err(ConfigError::Validation(format!(
            "metrics.listen is not a socket address: {listen}"
        )));
    }
    Ok(())
}
