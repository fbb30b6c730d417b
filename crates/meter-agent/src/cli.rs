//! CLI entry point for the monitor subcommand.

use std::io;
use std::path::PathBuf;

use clap::Parser;
use meter_config::{
    CliOverrides, LoggingConfig, SyncConfig, apply_overrides, load_config, validate_config,
};
use meter_sync::{HttpStore, SyncEngine, SyncSettings, SyncState};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::client::StatsClient;
use crate::monitor::{Monitor, MonitorSettings};

/// CLI arguments for the monitor subcommand.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "xray-meter-monitor",
    version,
    about = "Poll Xray traffic stats, show per-user speeds and sync usage to a remote panel"
)]
pub struct MonitorArgs {
    /// Config file path (json/yaml/toml)
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    #[command(flatten)]
    pub overrides: CliOverrides,
}

/// Run the monitor until SIGINT/SIGTERM.
pub async fn run(args: MonitorArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = load_config(&args.config)?;
    apply_overrides(&mut config, &args.overrides);
    validate_config(&config)?;

    init_tracing(&config.logging);

    info!(
        version = meter_core::VERSION,
        endpoint = %config.stats.endpoint,
        "xray-meter starting"
    );

    if let Some(listen) = &config.metrics.listen {
        match meter_metrics::init_prometheus(listen) {
            Ok(()) => info!("metrics exporter listening on {}", listen),
            Err(e) => warn!("failed to start metrics exporter: {}", e),
        }
    }

    // Set up graceful shutdown on SIGTERM/SIGINT
    let shutdown = CancellationToken::new();
    let shutdown_signal = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal_handler().await;
        info!("shutdown signal received");
        shutdown_signal.cancel();
    });

    let source = StatsClient::new(&config.stats)?;

    let sync = match &config.sync {
        Some(sync_config) => {
            let store = HttpStore::new(
                sync_config.base_url.as_str(),
                sync_config.api_token.clone(),
                sync_config.request_timeout(),
            )?;
            let state = SyncState::load(&sync_config.state_path).await;
            info!(
                base_url = %sync_config.base_url,
                server = %sync_config.server_label,
                records = state.len(),
                "remote sync enabled"
            );
            Some(SyncEngine::new(store, state, sync_settings(sync_config)))
        }
        None => {
            info!("remote sync disabled");
            None
        }
    };

    Monitor::new(source, sync, MonitorSettings::from_config(&config))
        .run(shutdown)
        .await;
    Ok(())
}

fn sync_settings(config: &SyncConfig) -> SyncSettings {
    SyncSettings {
        server_label: config.server_label.clone(),
        interval: config.interval(),
        min_delta_bytes: config.min_delta_bytes,
        username_separator: config.username_separator.clone(),
        request_timeout: config.request_timeout(),
    }
}

/// Wait for shutdown signals (SIGTERM, SIGINT).
async fn shutdown_signal_handler() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

/// Build the env filter from base level and per-module filters.
fn filter_directives(config: &LoggingConfig) -> String {
    let mut filter_str = config
        .level
        .as_deref()
        .unwrap_or(meter_core::DEFAULT_LOG_LEVEL)
        .to_string();

    let mut modules: Vec<_> = config.filters.iter().collect();
    modules.sort();
    for (module, level) in modules {
        filter_str.push(',');
        filter_str.push_str(module);
        filter_str.push('=');
        filter_str.push_str(level);
    }
    filter_str
}

/// Logs go to stderr; stdout belongs to the console table.
fn init_tracing(config: &LoggingConfig) {
    let filter = EnvFilter::try_new(filter_directives(config))
        .unwrap_or_else(|_| EnvFilter::new(meter_core::DEFAULT_LOG_LEVEL));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(io::stderr))
        .init();
}
