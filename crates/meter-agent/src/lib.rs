//! Xray traffic monitor: polls the Xray StatsService, keeps per-user speeds and
//! totals, exports them, and drives the remote usage sync.
//!
//! # Usage
//!
//! ```bash
//! xray-meter monitor -c config.toml
//! ```
//!
//! With an empty config the monitor polls `127.0.0.1:10085` every 5 seconds and
//! prints a table; add a `[sync]` section to reconcile usage with a panel.

pub mod backoff;
pub mod cli;
pub mod client;
pub mod codec;
pub mod error;
pub mod monitor;
pub mod render;

pub use cli::MonitorArgs;
pub use client::{QUERY_STATS_PATH, StatsClient, StatsSource};
pub use error::AgentError;
pub use monitor::{Monitor, MonitorSettings, PollReport};
