//! CLI module for meter-sync.
//!
//! Inspects and edits the persisted sync state. Used as the `state` subcommand
//! of the main xray-meter CLI.
//!
//! # Usage
//!
//! ```bash
//! # List every identity and its last reconciled total
//! xray-meter state show --path /var/lib/xray-meter/sync-state.json
//!
//! # Drop one identity; it re-baselines on the next sweep
//! xray-meter state forget --path /var/lib/xray-meter/sync-state.json alice@example.com
//! ```

use std::path::PathBuf;

use clap::{Args, Subcommand};
use meter_core::DEFAULT_SYNC_STATE_PATH;
use meter_stats::format_bytes;
use tabled::{Table, Tabled};

use crate::state::SyncState;

/// Sync state management arguments.
#[derive(Args, Debug, Clone)]
pub struct StateArgs {
    /// Path of the sync state file.
    #[arg(short, long, global = true, default_value = DEFAULT_SYNC_STATE_PATH)]
    pub path: PathBuf,

    #[command(subcommand)]
    pub command: StateCommands,
}

/// State CLI subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum StateCommands {
    /// Print every persisted record.
    Show,

    /// Remove the record of one identity.
    Forget {
        /// Identity (email) as reported by the stats service.
        identity: String,
    },
}

/// Record row for display.
#[derive(Tabled)]
struct RecordDisplay {
    #[tabled(rename = "Identity")]
    identity: String,
    #[tabled(rename = "Last Synced")]
    last_synced: String,
    #[tabled(rename = "Bytes")]
    bytes: u64,
}

/// Run the state CLI with the given arguments.
pub async fn run(args: StateArgs) -> Result<(), Box<dyn std::error::Error>> {
    match args.command {
        StateCommands::Show => show(args.path).await,
        StateCommands::Forget { identity } => forget(args.path, &identity).await,
    }
}

async fn show(path: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let Some(state) = SyncState::read(&path).await? else {
        println!("No sync state at {}.", path.display());
        return Ok(());
    };

    if state.is_empty() {
        println!("No records.");
        return Ok(());
    }

    let rows: Vec<RecordDisplay> = state
        .records()
        .iter()
        .map(|(identity, record)| RecordDisplay {
            identity: identity.clone(),
            last_synced: format_bytes(record.last_synced_total),
            bytes: record.last_synced_total,
        })
        .collect();

    println!("{}", Table::new(rows));
    println!("\n{} record(s) in {}", state.len(), path.display());
    Ok(())
}

async fn forget(path: PathBuf, identity: &str) -> Result<(), Box<dyn std::error::Error>> {
    let Some(mut state) = SyncState::read(&path).await? else {
        return Err(format!("no sync state at {}", path.display()).into());
    };

    match state.remove(identity) {
        Some(record) => {
            state.save().await?;
            println!(
                "Forgot {identity} (last synced {}).",
                format_bytes(record.last_synced_total)
            );
            Ok(())
        }
        None => Err(format!("identity not found: {identity}").into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn forget_removes_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let mut state = SyncState::new(&path);
        state.set("alice", 1);
        state.set("bob", 2);
        state.save().await.unwrap();

        let args = StateArgs {
            path: path.clone(),
            command: StateCommands::Forget {
                identity: "alice".into(),
            },
        };
        run(args).await.unwrap();

        let state = SyncState::read(&path).await.unwrap().unwrap();
        assert!(state.get("alice").is_none());
        assert!(state.get("bob").is_some());
    }

    #[tokio::test]
    async fn forget_unknown_identity_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        SyncState::new(&path).save().await.unwrap();

        let err = forget(path, "ghost").await.unwrap_err();
        assert!(err.to_string().contains("ghost"));
    }

    #[tokio::test]
    async fn show_missing_file_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        assert!(show(dir.path().join("absent.json")).await.is_ok());
    }
}
