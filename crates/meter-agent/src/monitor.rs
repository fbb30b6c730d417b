//! The poll loop.
//!
//! Each cycle: query stats → parse counters → update the aggregator → publish
//! metrics and the console table → let the sync engine run a sweep if it is due.
//! A failed query leaves every piece of state untouched and backs off before the
//! next attempt.

use std::time::{Duration, Instant};

use meter_config::{Config, ReconnectConfig};
use meter_metrics::TrafficPublisher;
use meter_stats::{TrafficAggregator, parse_counters};
use meter_sync::{RemoteStore, SweepReport, SyncEngine};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backoff::Backoff;
use crate::client::StatsSource;
use crate::error::AgentError;
use crate::render;

/// Poll loop parameters.
#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub interval: Duration,
    pub reconnect: ReconnectConfig,
    /// Print the traffic table after every successful poll.
    pub console: bool,
    /// Publish Prometheus series after every successful poll.
    pub metrics: bool,
}

impl MonitorSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            interval: config.poll.interval(),
            reconnect: config.reconnect.clone(),
            console: config.console.enabled,
            metrics: config.metrics.listen.is_some(),
        }
    }
}

/// Outcome of one successful cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollReport {
    /// Identities tracked after the update.
    pub identities: usize,
    /// Present when a sync sweep ran during this cycle.
    pub sweep: Option<SweepReport>,
}

/// Drives a [`StatsSource`] into a [`TrafficAggregator`] and an optional
/// [`SyncEngine`].
#[derive(Debug)]
pub struct Monitor<S, R> {
    source: S,
    aggregator: TrafficAggregator,
    publisher: TrafficPublisher,
    sync: Option<SyncEngine<R>>,
    settings: MonitorSettings,
    last_poll: Option<Instant>,
}

impl<S: StatsSource, R: RemoteStore> Monitor<S, R> {
    pub fn new(source: S, sync: Option<SyncEngine<R>>, settings: MonitorSettings) -> Self {
        Self {
            source,
            aggregator: TrafficAggregator::new(),
            publisher: TrafficPublisher::new(),
            sync,
            settings,
            last_poll: None,
        }
    }

    pub fn aggregator(&self) -> &TrafficAggregator {
        &self.aggregator
    }

    pub fn sync(&self) -> Option<&SyncEngine<R>> {
        self.sync.as_ref()
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Run one cycle.
    ///
    /// Speeds are computed over the time since the previous successful poll.
    pub async fn poll_once(&mut self) -> Result<PollReport, AgentError> {
        let records = self.source.query().await?;
        let now = Instant::now();
        let elapsed = self
            .last_poll
            .map_or(0.0, |last| now.duration_since(last).as_secs_f64());
        self.last_poll = Some(now);

        let snapshot = parse_counters(&records);
        self.aggregator.update(&snapshot, elapsed);
        debug!(
            records = records.len(),
            identities = self.aggregator.len(),
            elapsed_secs = elapsed,
            "poll applied"
        );

        let totals = self.aggregator.totals();
        if self.settings.metrics {
            self.publisher.publish(self.aggregator.users(), &totals);
        }
        if self.settings.console {
            render::print_table(self.aggregator.users(), &totals);
        }

        let mut sweep = None;
        if let Some(engine) = self.sync.as_mut()
            && let Some(report) = engine
                .maybe_sync(self.aggregator.identity_totals(), now)
                .await
        {
            meter_metrics::record_sweep(report.synced, report.failed, report.synced_bytes);
            sweep = Some(report);
        }

        Ok(PollReport {
            identities: self.aggregator.len(),
            sweep,
        })
    }

    /// Poll until `shutdown` is cancelled, then persist sync state.
    pub async fn run(mut self, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(self.settings.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut backoff = Backoff::new(self.settings.reconnect.clone());

        info!(
            interval_secs = self.settings.interval.as_secs(),
            sync = self.sync.is_some(),
            "poll loop started"
        );

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            match self.poll_once().await {
                Ok(_) => {
                    meter_metrics::record_poll("ok");
                    backoff.reset();
                }
                Err(e) => {
                    meter_metrics::record_poll(e.error_type());
                    let delay = backoff.next_delay();
                    warn!(
                        error = %e,
                        delay_ms = delay.as_millis() as u64,
                        "stats poll failed, retrying after delay"
                    );
                    tokio::select! {
                        biased;
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }

        self.shutdown().await;
    }

    /// Persist pending sync state.
    pub async fn shutdown(&mut self) {
        if let Some(engine) = self.sync.as_mut() {
            match engine.persist().await {
                Ok(()) => info!(
                    path = %engine.state().path().display(),
                    "sync state persisted"
                ),
                Err(e) => warn!(error = %e, "failed to persist sync state on shutdown"),
            }
        }
        info!("poll loop stopped");
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Arc;

    use async_trait::async_trait;
    use meter_proto::{CounterRecord, DecodeError};
    use meter_sync::{RemoteRow, RowId, SyncError, SyncSettings, SyncState};
    use parking_lot::Mutex;

    use super::*;

    /// Replays scripted poll results.
    struct ScriptedSource {
        script: VecDeque<Result<Vec<CounterRecord>, AgentError>>,
    }

    impl ScriptedSource {
        fn new(script: Vec<Result<Vec<CounterRecord>, AgentError>>) -> Self {
            Self {
                script: script.into(),
            }
        }
    }

    #[async_trait]
    impl StatsSource for ScriptedSource {
        async fn query(&mut self) -> Result<Vec<CounterRecord>, AgentError> {
            self.script.pop_front().unwrap_or_else(|| Ok(Vec::new()))
        }
    }

    #[derive(Default)]
    struct RecordingStore {
        created: Mutex<Vec<(String, f64)>>,
    }

    #[async_trait]
    impl RemoteStore for RecordingStore {
        async fn find_row(&self, _: &str, _: &str) -> Result<Option<RemoteRow>, SyncError> {
            Ok(None)
        }

        async fn create_row(&self, username: &str, _: &str, total: f64) -> Result<(), SyncError> {
            self.created.lock().push((username.to_string(), total));
            Ok(())
        }

        async fn patch_row(&self, _: &RowId, _: f64) -> Result<(), SyncError> {
            Ok(())
        }
    }

    fn batch(entries: &[(&str, u64, u64)]) -> Vec<CounterRecord> {
        entries
            .iter()
            .flat_map(|(id, up, down)| {
                [
                    CounterRecord {
                        name: format!("user>>>{id}>>>traffic>>>uplink"),
                        value: *up,
                    },
                    CounterRecord {
                        name: format!("user>>>{id}>>>traffic>>>downlink"),
                        value: *down,
                    },
                ]
            })
            .collect()
    }

    fn settings() -> MonitorSettings {
        MonitorSettings {
            interval: Duration::from_millis(10),
            reconnect: ReconnectConfig {
                initial_delay_ms: 10,
                max_delay_ms: 20,
                multiplier: 2.0,
                jitter: 0.0,
            },
            console: false,
            metrics: false,
        }
    }

    type TestMonitor = Monitor<ScriptedSource, Arc<RecordingStore>>;

    #[tokio::test]
    async fn failed_poll_leaves_state_untouched() {
        let source = ScriptedSource::new(vec![
            Ok(batch(&[("alice", 1000, 2000), ("bob", 5, 5)])),
            Err(AgentError::Decode(DecodeError::Truncated(3))),
            Err(AgentError::Timeout),
            Ok(batch(&[("alice", 3000, 2000), ("bob", 5, 5)])),
        ]);
        let mut monitor: TestMonitor = Monitor::new(source, None, settings());

        let report = monitor.poll_once().await.unwrap();
        assert_eq!(report.identities, 2);
        assert!(report.sweep.is_none());

        assert!(monitor.poll_once().await.is_err());
        assert!(monitor.poll_once().await.is_err());
        assert_eq!(monitor.aggregator().len(), 2);
        assert_eq!(monitor.aggregator().get("alice").unwrap().uplink, 1000);

        monitor.poll_once().await.unwrap();
        let alice = monitor.aggregator().get("alice").unwrap();
        assert_eq!(alice.uplink, 3000);
        assert!(alice.uplink_speed > 0.0);
        assert_eq!(alice.downlink_speed, 0.0);
    }

    #[tokio::test]
    async fn empty_batch_evicts_everyone() {
        let source = ScriptedSource::new(vec![Ok(batch(&[("alice", 1, 1)])), Ok(Vec::new())]);
        let mut monitor: TestMonitor = Monitor::new(source, None, settings());
        monitor.poll_once().await.unwrap();
        let report = monitor.poll_once().await.unwrap();
        assert_eq!(report.identities, 0);
    }

    #[tokio::test]
    async fn first_cycle_baselines_sync_state() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(RecordingStore::default());
        let engine = SyncEngine::new(
            store.clone(),
            SyncState::new(dir.path().join("state.json")),
            SyncSettings::new("node-1"),
        );
        let source = ScriptedSource::new(vec![Ok(batch(&[("alice@phone", 1 << 30, 0)]))]);
        let mut monitor = Monitor::new(source, Some(engine), settings());

        let report = monitor.poll_once().await.unwrap();
        let sweep = report.sweep.unwrap();
        assert_eq!(sweep.baselined, 1);
        assert!(store.created.lock().is_empty());

        let state = monitor.sync().unwrap().state();
        assert_eq!(state.get("alice@phone").unwrap().last_synced_total, 1 << 30);
        assert!(dir.path().join("state.json").exists());
    }

    #[tokio::test]
    async fn run_stops_on_shutdown_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let store = Arc::new(RecordingStore::default());
        let engine = SyncEngine::new(
            store,
            SyncState::new(&path),
            SyncSettings::new("node-1"),
        );
        let source = ScriptedSource::new(vec![
            Err(AgentError::Timeout),
            Ok(batch(&[("carol", 10, 20)])),
        ]);
        let monitor = Monitor::new(source, Some(engine), settings());

        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(monitor.run(shutdown.clone()));
        tokio::time::sleep(Duration::from_millis(200)).await;
        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();

        let state = SyncState::read(&path).await.unwrap().unwrap();
        assert_eq!(state.get("carol").unwrap().last_synced_total, 30);
    }
}
