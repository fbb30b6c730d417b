//! Per-identity counter state, speeds and totals.
//!
//! The first observation of an identity only establishes a baseline. After that
//! each poll yields `new - last` per direction, or `new` when the counter went
//! backwards (Xray restarted and began counting from zero).

use std::collections::HashMap;

use tracing::debug;

use crate::parser::{IdentityCounters, Snapshot};

/// Traffic state for a single identity.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TrafficState {
    /// Absolute uplink counter at the latest poll.
    pub uplink: u64,
    /// Absolute downlink counter at the latest poll.
    pub downlink: u64,
    /// Upload speed in bytes/second since the previous poll.
    pub uplink_speed: f64,
    /// Download speed in bytes/second since the previous poll.
    pub downlink_speed: f64,
    /// Uplink counter used as the reference for the next delta.
    pub last_uplink: u64,
    /// Downlink counter used as the reference for the next delta.
    pub last_downlink: u64,
}

impl TrafficState {
    fn baseline(counters: &IdentityCounters) -> Self {
        let uplink = counters.uplink.unwrap_or(0);
        let downlink = counters.downlink.unwrap_or(0);
        Self {
            uplink,
            downlink,
            uplink_speed: 0.0,
            downlink_speed: 0.0,
            last_uplink: uplink,
            last_downlink: downlink,
        }
    }

    fn advance(&mut self, counters: &IdentityCounters, elapsed_secs: f64) {
        let uplink = counters.uplink.unwrap_or(self.last_uplink);
        let downlink = counters.downlink.unwrap_or(self.last_downlink);

        self.uplink_speed = rate(counter_delta(self.last_uplink, uplink), elapsed_secs);
        self.downlink_speed = rate(counter_delta(self.last_downlink, downlink), elapsed_secs);

        self.uplink = uplink;
        self.downlink = downlink;
        self.last_uplink = uplink;
        self.last_downlink = downlink;
    }

    /// Uplink plus downlink.
    #[inline]
    pub fn total(&self) -> u64 {
        self.uplink.saturating_add(self.downlink)
    }

    /// Whether any traffic moved since the previous poll.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.uplink_speed > 0.0 || self.downlink_speed > 0.0
    }
}

/// Sums over all tracked identities.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TrafficTotals {
    pub uplink: u64,
    pub downlink: u64,
    pub uplink_speed: f64,
    pub downlink_speed: f64,
}

impl TrafficTotals {
    #[inline]
    pub fn total(&self) -> u64 {
        self.uplink.saturating_add(self.downlink)
    }
}

/// Bytes accrued between two readings of a monotonic counter.
///
/// A reading below the previous one means the counter restarted from zero, so the
/// whole new reading is the delta.
#[inline]
pub fn counter_delta(previous: u64, current: u64) -> u64 {
    if current >= previous {
        current - previous
    } else {
        current
    }
}

#[inline]
#[allow(clippy::cast_precision_loss)]
fn rate(delta: u64, elapsed_secs: f64) -> f64 {
    if elapsed_secs > 0.0 {
        delta as f64 / elapsed_secs
    } else {
        0.0
    }
}

/// Owns the [`TrafficState`] of every identity reported by the latest poll.
#[derive(Debug, Default)]
pub struct TrafficAggregator {
    users: HashMap<String, TrafficState>,
}

impl TrafficAggregator {
    /// Create an empty aggregator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one poll worth of counters.
    ///
    /// Identities missing from `snapshot` are evicted: the stats service no longer
    /// reports them.
    pub fn update(
        &mut self,
        snapshot: &Snapshot,
        elapsed_secs: f64,
    ) -> &HashMap<String, TrafficState> {
        let before = self.users.len();
        self.users.retain(|identity, _| snapshot.contains_key(identity));
        let evicted = before - self.users.len();
        if evicted > 0 {
            debug!(evicted, "dropped identities missing from snapshot");
        }

        for (identity, counters) in snapshot {
            match self.users.get_mut(identity) {
                Some(state) => state.advance(counters, elapsed_secs),
                None => {
                    debug!(identity = %identity, "new identity, establishing baseline");
                    self.users
                        .insert(identity.clone(), TrafficState::baseline(counters));
                }
            }
        }

        &self.users
    }

    /// Read-only view of the current per-identity state.
    pub fn users(&self) -> &HashMap<String, TrafficState> {
        &self.users
    }

    pub fn get(&self, identity: &str) -> Option<&TrafficState> {
        self.users.get(identity)
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Absolute uplink + downlink per identity.
    pub fn identity_totals(&self) -> impl Iterator<Item = (&str, u64)> + '_ {
        self.users
            .iter()
            .map(|(identity, state)| (identity.as_str(), state.total()))
    }

    /// Sum counters and speeds over all identities.
    pub fn totals(&self) -> TrafficTotals {
        self.users
            .values()
            .fold(TrafficTotals::default(), |acc, state| TrafficTotals {
                uplink: acc.uplink.saturating_add(state.uplink),
                downlink: acc.downlink.saturating_add(state.downlink),
                uplink_speed: acc.uplink_speed + state.uplink_speed,
                downlink_speed: acc.downlink_speed + state.downlink_speed,
            })
    }
}
