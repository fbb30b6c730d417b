//! Core constants shared across xray-meter crates.
//!
//! This crate provides:
//! - Default configuration values
//! - Error type constants for metrics/logging
//! - Common project metadata

pub mod defaults;
pub mod errors;

// Re-export commonly used items at crate root
pub use defaults::*;
pub use errors::*;

/// Project name.
pub const PROJECT_NAME: &str = "xray-meter";
/// Project version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Bytes in one gibibyte, the display unit of the remote bookkeeping service.
pub const BYTES_PER_GIB: u64 = 1 << 30;
/// Bytes in one mebibyte.
pub const BYTES_PER_MIB: u64 = 1 << 20;
