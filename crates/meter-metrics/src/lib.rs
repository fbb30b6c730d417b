//! Metrics collection and Prometheus exporter for xray-meter.
//!
//! Per-identity series mirror the absolute Xray counters and the speeds derived by
//! the aggregator. Internal series count polls and sync outcomes.

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;

use meter_stats::{Direction, TrafficState, TrafficTotals};
use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Initialize Prometheus metrics exporter.
///
/// Starts an HTTP server on the given address to expose metrics.
/// Returns an error message if binding fails.
pub fn init_prometheus(listen: &str) -> Result<(), String> {
    let addr: SocketAddr = listen
        .parse()
        .map_err(|e| format!("invalid metrics listen address: {}", e))?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("failed to install prometheus exporter: {}", e))?;

    Ok(())
}

// ============================================================================
// Metric Names
// ============================================================================

/// Absolute Xray traffic counter per identity and direction.
pub const TRAFFIC_BYTES_TOTAL: &str = "xray_traffic_bytes_total";
/// Current speed per identity and direction.
pub const SPEED_BYTES_PER_SECOND: &str = "xray_speed_bytes_per_second";
/// Speed summed over all identities, per direction.
pub const TOTAL_SPEED_BYTES_PER_SECOND: &str = "xray_total_speed_bytes_per_second";
/// Number of identities reported by the latest poll.
pub const IDENTITIES: &str = "xray_meter_identities";
/// Poll attempts by result (`ok` or an error type).
pub const POLLS_TOTAL: &str = "xray_meter_polls_total";
/// Per-identity reconciliation attempts by result (`synced`, `failed`).
pub const SYNC_TOTAL: &str = "xray_meter_sync_total";
/// Bytes folded into remote totals.
pub const SYNCED_BYTES_TOTAL: &str = "xray_meter_synced_bytes_total";

// ============================================================================
// Metric Recording Functions
// ============================================================================

/// Publish the state of every identity after a successful poll.
#[allow(clippy::cast_precision_loss)]
pub fn publish_traffic(users: &HashMap<String, TrafficState>, totals: &TrafficTotals) {
    for (identity, state) in users {
        for (direction, bytes, speed) in [
            (Direction::Uplink, state.uplink, state.uplink_speed),
            (Direction::Downlink, state.downlink, state.downlink_speed),
        ] {
            let direction = direction.as_str();
            counter!(TRAFFIC_BYTES_TOTAL, "email" => identity.clone(), "direction" => direction)
                .absolute(bytes);
            gauge!(SPEED_BYTES_PER_SECOND, "email" => identity.clone(), "direction" => direction)
                .set(speed);
        }
    }

    gauge!(TOTAL_SPEED_BYTES_PER_SECOND, "direction" => Direction::Uplink.as_str())
        .set(totals.uplink_speed);
    gauge!(TOTAL_SPEED_BYTES_PER_SECOND, "direction" => Direction::Downlink.as_str())
        .set(totals.downlink_speed);
    gauge!(IDENTITIES).set(users.len() as f64);
}

/// Publishes traffic and zeroes the speeds of identities that left.
///
/// Counters of departed identities keep their last absolute value.
#[derive(Debug, Default)]
pub struct TrafficPublisher {
    published: HashSet<String>,
}

impl TrafficPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&mut self, users: &HashMap<String, TrafficState>, totals: &TrafficTotals) {
        publish_traffic(users, totals);

        for identity in self.published.iter().filter(|id| !users.contains_key(*id)) {
            for direction in [Direction::Uplink, Direction::Downlink] {
                gauge!(
                    SPEED_BYTES_PER_SECOND,
                    "email" => identity.clone(),
                    "direction" => direction.as_str()
                )
                .set(0.0);
            }
        }
        self.published = users.keys().cloned().collect();
    }
}

/// Record a poll result (`"ok"` or an error type from `meter_core::errors`).
#[inline]
pub fn record_poll(result: &'static str) {
    counter!(POLLS_TOTAL, "result" => result).increment(1);
}

/// Record the outcome of one sync sweep.
#[inline]
pub fn record_sweep(synced: usize, failed: usize, synced_bytes: u64) {
    counter!(SYNC_TOTAL, "result" => "synced").increment(synced as u64);
    counter!(SYNC_TOTAL, "result" => "failed").increment(failed as u64);
    counter!(SYNCED_BYTES_TOTAL).increment(synced_bytes);
}
