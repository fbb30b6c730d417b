//! Restart-safe delta synchronization of per-identity traffic to a remote
//! bookkeeping service.
//!
//! This crate provides:
//!
//! - [`SyncState`] / [`SyncRecord`] - the persisted last-reconciled total per identity
//! - [`RemoteStore`] - read / create / patch capability of the remote service
//! - [`HttpStore`] - JSON-over-HTTP implementation of [`RemoteStore`]
//! - [`SyncEngine`] - baseline, threshold, reset detection and read-modify-write
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use meter_sync::{HttpStore, SyncEngine, SyncSettings, SyncState};
//!
//! # async fn example() -> Result<(), meter_sync::SyncError> {
//! let store = HttpStore::new("https://panel.example.com/api", None, Duration::from_secs(10))?;
//! let state = SyncState::load("/var/lib/xray-meter/sync-state.json").await;
//! let mut engine = SyncEngine::new(store, state, SyncSettings::new("node-1"));
//!
//! let report = engine.sync_all([("alice@example.com", 42_000_000)]).await;
//! println!("{report:?}");
//! # Ok(())
//! # }
//! ```

pub mod cli;
mod engine;
mod error;
mod http;
mod state;
mod store;


pub use cli::{StateArgs, StateCommands};
pub use engine::{SweepReport, SyncEngine, SyncOutcome, SyncSettings};
pub use error::SyncError;
pub use http::HttpStore;
pub use state::{STATE_VERSION, SyncRecord, SyncState};
pub use store::{RemoteRow, RemoteStore, RowId, bytes_to_gib, gib_to_bytes, username_for};
