//! Delta reconciliation state machine.
//!
//! Per identity:
//!
//! - no record → baseline at the current total, nothing sent
//! - record → `delta = counter_delta(last_synced_total, total)`; below the threshold
//!   nothing happens, otherwise the delta is folded into the remote total
//!
//! `last_synced_total` only moves after the remote write is confirmed, so a failed
//! sweep recomputes the same delta next time.

use std::future::Future;
use std::time::{Duration, Instant};

use meter_core::{
    DEFAULT_SYNC_INTERVAL_SECS, DEFAULT_SYNC_MIN_DELTA_BYTES, DEFAULT_SYNC_REQUEST_TIMEOUT_SECS,
    DEFAULT_USERNAME_SEPARATOR,
};
use meter_stats::counter_delta;
use tracing::{debug, info, warn};

use crate::error::SyncError;
use crate::state::SyncState;
use crate::store::{RemoteStore, bytes_to_gib, gib_to_bytes, username_for};

/// Engine parameters.
#[derive(Debug, Clone)]
pub struct SyncSettings {
    /// Server column of the remote rows written by this node.
    pub server_label: String,
    /// Minimum time between two sweeps started by [`SyncEngine::maybe_sync`].
    pub interval: Duration,
    /// Deltas below this stay local until they grow.
    pub min_delta_bytes: u64,
    pub username_separator: String,
    /// Deadline for each remote call.
    pub request_timeout: Duration,
}

impl SyncSettings {
    pub fn new(server_label: impl Into<String>) -> Self {
        Self {
            server_label: server_label.into(),
            interval: Duration::from_secs(DEFAULT_SYNC_INTERVAL_SECS),
            min_delta_bytes: DEFAULT_SYNC_MIN_DELTA_BYTES,
            username_separator: DEFAULT_USERNAME_SEPARATOR.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_SYNC_REQUEST_TIMEOUT_SECS),
        }
    }
}

/// What happened to one identity during a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// First sighting; `total` recorded, nothing sent.
    Baseline { total: u64 },
    /// Delta below the threshold (or zero); nothing sent.
    Pending { delta: u64 },
    /// Delta folded into the remote total.
    Synced {
        delta: u64,
        /// Remote total in bytes after the write.
        remote_total: u64,
        /// The local counter went backwards since the last sync.
        reset: bool,
        /// No remote row existed and one was created.
        created: bool,
    },
}

/// Counts of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub baselined: usize,
    pub pending: usize,
    pub synced: usize,
    pub failed: usize,
    /// Sum of the deltas sent.
    pub synced_bytes: u64,
}

/// Reconciles local totals against a [`RemoteStore`].
#[derive(Debug)]
pub struct SyncEngine<S> {
    store: S,
    state: SyncState,
    settings: SyncSettings,
    last_sweep: Option<Instant>,
}

impl<S: RemoteStore> SyncEngine<S> {
    pub fn new(store: S, state: SyncState, settings: SyncSettings) -> Self {
        Self {
            store,
            state,
            settings,
            last_sweep: None,
        }
    }

    pub fn state(&self) -> &SyncState {
        &self.state
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Whether [`maybe_sync`](Self::maybe_sync) would run a sweep at `now`.
    pub fn is_due(&self, now: Instant) -> bool {
        self.last_sweep
            .is_none_or(|last| now.saturating_duration_since(last) >= self.settings.interval)
    }

    /// Run a sweep if the sync interval has elapsed since the previous one.
    pub async fn maybe_sync<I, K>(&mut self, totals: I, now: Instant) -> Option<SweepReport>
    where
        I: IntoIterator<Item = (K, u64)>,
        K: AsRef<str>,
    {
        if !self.is_due(now) {
            return None;
        }
        self.last_sweep = Some(now);
        Some(self.sync_all(totals).await)
    }

    /// Reconcile every identity in `totals` (absolute uplink + downlink), then
    /// persist pending baselines.
    pub async fn sync_all<I, K>(&mut self, totals: I) -> SweepReport
    where
        I: IntoIterator<Item = (K, u64)>,
        K: AsRef<str>,
    {
        let mut totals: Vec<(K, u64)> = totals.into_iter().collect();
        totals.sort_by(|a, b| a.0.as_ref().cmp(b.0.as_ref()));

        let mut report = SweepReport::default();
        for (identity, total) in &totals {
            let identity = identity.as_ref();
            match self.sync_identity(identity, *total).await {
                Ok(SyncOutcome::Baseline { .. }) => report.baselined += 1,
                Ok(SyncOutcome::Pending { .. }) => report.pending += 1,
                Ok(SyncOutcome::Synced { delta, .. }) => {
                    report.synced += 1;
                    report.synced_bytes = report.synced_bytes.saturating_add(delta);
                }
                Err(e) => {
                    report.failed += 1;
                    warn!(
                        identity = %identity,
                        error = %e,
                        error_type = e.error_type(),
                        "reconciliation failed, will retry next sweep"
                    );
                }
            }
        }

        if let Err(e) = self.persist().await {
            warn!(error = %e, "failed to persist sync state");
        }

        if report.synced > 0 || report.failed > 0 {
            info!(
                synced = report.synced,
                failed = report.failed,
                bytes = report.synced_bytes,
                "sync sweep complete"
            );
        } else {
            debug!(
                baselined = report.baselined,
                pending = report.pending,
                "sync sweep complete"
            );
        }
        report
    }

    /// Advance one identity through the state machine.
    ///
    /// Baselines are only recorded in memory; [`sync_all`](Self::sync_all) and
    /// [`persist`](Self::persist) write them out. A confirmed reconciliation is saved
    /// immediately.
    pub async fn sync_identity(
        &mut self,
        identity: &str,
        total: u64,
    ) -> Result<SyncOutcome, SyncError> {
        let Some(record) = self.state.get(identity) else {
            self.state.set(identity, total);
            debug!(identity = %identity, total, "sync baseline established");
            return Ok(SyncOutcome::Baseline { total });
        };

        let last = record.last_synced_total;
        let reset = total < last;
        let delta = counter_delta(last, total);

        if delta == 0 || delta < self.settings.min_delta_bytes {
            if reset {
                debug!(
                    identity = %identity,
                    last_synced_total = last,
                    current = total,
                    "counter reset below sync threshold"
                );
            }
            return Ok(SyncOutcome::Pending { delta });
        }

        let (remote_total, created) = self.reconcile(identity, delta).await?;
        if reset {
            warn!(
                identity = %identity,
                last_synced_total = last,
                current = total,
                "counter reset detected, synced current value as delta"
            );
        }

        self.state.set(identity, total);
        if let Err(e) = self.state.save().await {
            // Remote already advanced; the dirty state is retried on the next save.
            warn!(identity = %identity, error = %e, "failed to persist sync state");
        }

        info!(
            identity = %identity,
            delta,
            remote_total,
            created,
            "traffic synced"
        );
        Ok(SyncOutcome::Synced {
            delta,
            remote_total,
            reset,
            created,
        })
    }

    /// Read-modify-write the remote row. Returns the new remote total in bytes and
    /// whether the row was created.
    async fn reconcile(&self, identity: &str, delta: u64) -> Result<(u64, bool), SyncError> {
        let username = username_for(identity, &self.settings.username_separator);
        let label = self.settings.server_label.as_str();
        let timeout = self.settings.request_timeout;

        match bounded(timeout, self.store.find_row(username, label)).await? {
            Some(row) => {
                let remote = gib_to_bytes(row.total_gib).ok_or_else(|| {
                    SyncError::Remote(format!(
                        "row {} has invalid total {}",
                        row.id, row.total_gib
                    ))
                })?;
                let new_total = remote.saturating_add(delta);
                bounded(
                    timeout,
                    self.store.patch_row(&row.id, bytes_to_gib(new_total)),
                )
                .await?;
                Ok((new_total, false))
            }
            None => {
                bounded(
                    timeout,
                    self.store.create_row(username, label, bytes_to_gib(delta)),
                )
                .await?;
                Ok((delta, true))
            }
        }
    }

    /// Write the state file if anything changed since the last save.
    pub async fn persist(&mut self) -> Result<(), SyncError> {
        if self.state.is_dirty() {
            self.state.save().await?;
        }
        Ok(())
    }
}

async fn bounded<T>(
    timeout: Duration,
    fut: impl Future<Output = Result<T, SyncError>>,
) -> Result<T, SyncError> {
    tokio::time::timeout(timeout, fut)
        .await
        .map_err(|_| SyncError::Timeout)?
}
