//! Unified xray-meter CLI.
//!
//! - `xray-meter monitor` - Poll Xray stats, render traffic and sync usage
//! - `xray-meter state` - Inspect or edit the persisted sync state

use std::process::ExitCode;

use clap::{Parser, Subcommand};

/// xray-meter unified CLI.
#[derive(Parser)]
#[command(
    name = "xray-meter",
    version,
    about = "Per-user traffic accounting and remote usage sync for Xray",
    propagate_version = true
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the poll loop.
    #[command(name = "monitor", alias = "run")]
    Monitor(Box<meter_agent::MonitorArgs>),

    /// Inspect or edit the sync state file.
    #[command(name = "state")]
    State(meter_sync::StateArgs),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Monitor(args) => meter_agent::cli::run(*args).await,
        Commands::State(args) => meter_sync::cli::run(args).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
