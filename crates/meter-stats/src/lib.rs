//! Per-identity traffic accounting.
//!
//! - [`parse_counters`] folds decoded [`CounterRecord`](meter_proto::CounterRecord)s into a
//!   [`Snapshot`] of absolute per-identity counters.
//! - [`TrafficAggregator`] keeps one [`TrafficState`] per identity and derives
//!   reset-safe deltas, speeds and totals from consecutive snapshots.

pub mod aggregator;
pub mod format;
pub mod parser;

pub use aggregator::{TrafficAggregator, TrafficState, TrafficTotals, counter_delta};
pub use format::{format_bytes, format_speed};
pub use parser::{
    CounterName, Direction, IdentityCounters, NAME_DELIMITER, Snapshot, parse_counters,
    parse_name,
};
