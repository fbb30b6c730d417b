//! # xray-meter
//!
//! Per-user traffic accounting for Xray with restart-safe usage sync.
//!
//! ## Crates
//!
//! - [`meter_core`] - Default configuration values and error classes
//! - [`meter_proto`] - StatsService wire decoding and request encoding
//! - [`meter_stats`] - Counter parsing, per-identity speeds and totals
//! - [`meter_sync`] - Persisted delta sync against a remote bookkeeping service
//! - [`meter_config`] - Configuration loading and validation
//! - [`meter_metrics`] - Prometheus exposition
//! - [`meter_agent`] - The poll loop, gRPC client and console table

pub use meter_agent as agent;
pub use meter_config as config;
pub use meter_core as core;
pub use meter_metrics as metrics;
pub use meter_proto as proto;
pub use meter_stats as stats;
pub use meter_sync as sync;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use meter_agent::{Monitor, MonitorSettings, StatsClient, StatsSource};
    pub use meter_config::{Config, load_config, validate_config};
    pub use meter_stats::{TrafficAggregator, TrafficState, parse_counters};
    pub use meter_sync::{HttpStore, RemoteStore, SyncEngine, SyncSettings, SyncState};
}
