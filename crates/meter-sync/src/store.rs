//! Remote bookkeeping abstraction.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use meter_core::BYTES_PER_GIB;
use serde::{Deserialize, Serialize};

use crate::error::SyncError;

/// Decimal places kept when a total is written to the remote service.
const GIB_DECIMALS: f64 = 1_000_000.0;

/// Identifier of a remote row. Services use either numeric or string keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RowId {
    Int(i64),
    Text(String),
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(id) => write!(f, "{id}"),
            Self::Text(id) => f.write_str(id),
        }
    }
}

impl From<i64> for RowId {
    fn from(id: i64) -> Self {
        Self::Int(id)
    }
}

impl From<&str> for RowId {
    fn from(id: &str) -> Self {
        Self::Text(id.to_string())
    }
}

/// One usage row of the remote service: the running total of a username on a server.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteRow {
    pub id: RowId,
    pub username: String,
    pub server_label: String,
    /// Authoritative total in GiB.
    pub total_gib: f64,
}

/// Read / create / patch capability of the remote bookkeeping service.
///
/// Implementations must be thread-safe (`Send + Sync`).
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Look up the row for `(username, server_label)`. `Ok(None)` when there is none.
    async fn find_row(
        &self,
        username: &str,
        server_label: &str,
    ) -> Result<Option<RemoteRow>, SyncError>;

    /// Create a row seeded with `total_gib`.
    async fn create_row(
        &self,
        username: &str,
        server_label: &str,
        total_gib: f64,
    ) -> Result<(), SyncError>;

    /// Overwrite the total of an existing row.
    async fn patch_row(&self, id: &RowId, total_gib: f64) -> Result<(), SyncError>;
}

#[async_trait]
impl<S: RemoteStore + ?Sized> RemoteStore for Arc<S> {
    #[inline]
    async fn find_row(
        &self,
        username: &str,
        server_label: &str,
    ) -> Result<Option<RemoteRow>, SyncError> {
        (**self).find_row(username, server_label).await
    }

    #[inline]
    async fn create_row(
        &self,
        username: &str,
        server_label: &str,
        total_gib: f64,
    ) -> Result<(), SyncError> {
        (**self).create_row(username, server_label, total_gib).await
    }

    #[inline]
    async fn patch_row(&self, id: &RowId, total_gib: f64) -> Result<(), SyncError> {
        (**self).patch_row(id, total_gib).await
    }
}

#[async_trait]
impl<S: RemoteStore + ?Sized> RemoteStore for Box<S> {
    #[inline]
    async fn find_row(
        &self,
        username: &str,
        server_label: &str,
    ) -> Result<Option<RemoteRow>, SyncError> {
        (**self).find_row(username, server_label).await
    }

    #[inline]
    async fn create_row(
        &self,
        username: &str,
        server_label: &str,
        total_gib: f64,
    ) -> Result<(), SyncError> {
        (**self).create_row(username, server_label, total_gib).await
    }

    #[inline]
    async fn patch_row(&self, id: &RowId, total_gib: f64) -> Result<(), SyncError> {
        (**self).patch_row(id, total_gib).await
    }
}

// ── Unit conversion ───────────────────────────────────────────────

/// Convert a remote GiB total to bytes, rounded to the nearest byte.
///
/// Returns `None` for negative, non-finite or out-of-range values.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn gib_to_bytes(gib: f64) -> Option<u64> {
    if !gib.is_finite() || gib < 0.0 {
        return None;
    }
    let bytes = (gib * BYTES_PER_GIB as f64).round();
    if bytes >= u64::MAX as f64 {
        return None;
    }
    Some(bytes as u64)
}

/// Convert bytes to GiB rounded to 6 decimals for writing.
#[allow(clippy::cast_precision_loss)]
pub fn bytes_to_gib(bytes: u64) -> f64 {
    (bytes as f64 / BYTES_PER_GIB as f64 * GIB_DECIMALS).round() / GIB_DECIMALS
}

/// Remote username of an identity: the part before `separator`.
///
/// The whole identity is used when the separator is absent or the prefix is empty.
pub fn username_for<'a>(identity: &'a str, separator: &str) -> &'a str {
    match identity.split_once(separator) {
        Some((name, _)) if !name.is_empty() => name,
        _ => identity,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gib_conversion() {
        assert_eq!(gib_to_bytes(1.0), Some(BYTES_PER_GIB));
        assert_eq!(gib_to_bytes(0.0), Some(0));
        assert_eq!(gib_to_bytes(0.5), Some(BYTES_PER_GIB / 2));
        assert_eq!(gib_to_bytes(-0.1), None);
        assert_eq!(gib_to_bytes(f64::NAN), None);
        assert_eq!(gib_to_bytes(f64::INFINITY), None);
        assert_eq!(gib_to_bytes(1e30), None);

        assert_eq!(bytes_to_gib(BYTES_PER_GIB), 1.0);
        assert_eq!(bytes_to_gib(0), 0.0);
        // 11 MiB = 0.0107421875 GiB
        assert_eq!(bytes_to_gib(11 * 1024 * 1024), 0.010742);
    }

    #[test]
    fn username_derivation() {
        assert_eq!(username_for("alice@example.com", "@"), "alice");
        assert_eq!(username_for("alice@phone@home", "@"), "alice");
        assert_eq!(username_for("bob", "@"), "bob");
        assert_eq!(username_for("@weird", "@"), "@weird");
        assert_eq!(username_for("carol.laptop", "."), "carol");
    }

    #[test]
    fn row_id_forms() {
        let int: RowId = serde_json::from_str("17").unwrap();
        let text: RowId = serde_json::from_str("\"rec_abc\"").unwrap();
        assert_eq!(int, RowId::Int(17));
        assert_eq!(text, RowId::from("rec_abc"));
        assert_eq!(int.to_string(), "17");
        assert_eq!(text.to_string(), "rec_abc");
    }
}
