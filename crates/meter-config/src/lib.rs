//! Configuration loading and CLI definitions.
//!
//! Supports JSON (with comments), YAML and TOML. Every value has a default from
//! `meter_core::defaults`, so an empty file is a valid config that polls the local
//! Xray API without remote sync.

mod cli;
mod defaults;
mod loader;
mod types;
mod validate;

pub use cli::{CliOverrides, apply_overrides};
pub use loader::{ConfigError, load_config};
pub use types::*;
pub use validate::validate_config;
