//! Persisted per-identity sync records.
//!
//! Atomic write (tmp + rename) ensures a crash never leaves a half-written file.
//! Losing the file is safe: every identity re-baselines instead of being charged twice.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::SyncError;

/// On-disk format version.
pub const STATE_VERSION: u32 = 1;

/// Last reconciled position of one identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRecord {
    /// Absolute uplink + downlink at the last confirmed remote write (or baseline).
    pub last_synced_total: u64,
}

#[derive(Debug, Serialize, Deserialize)]
struct StateFile {
    version: u32,
    /// Unix timestamp of the write.
    saved_at: u64,
    records: BTreeMap<String, SyncRecord>,
}

/// In-memory sync records plus the path they persist to.
#[derive(Debug, Clone)]
pub struct SyncState {
    path: PathBuf,
    records: BTreeMap<String, SyncRecord>,
    dirty: bool,
}

impl SyncState {
    /// Empty state that will persist to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            records: BTreeMap::new(),
            dirty: false,
        }
    }

    /// Read the state file strictly.
    ///
    /// Returns `Ok(None)` when the file does not exist.
    pub async fn read(path: impl Into<PathBuf>) -> Result<Option<Self>, SyncError> {
        let path = path.into();
        let data = match tokio::fs::read_to_string(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let file: StateFile = serde_json::from_str(&data)?;
        if file.version != STATE_VERSION {
            return Err(SyncError::State(format!(
                "unsupported state version {} (expected {STATE_VERSION})",
                file.version
            )));
        }

        Ok(Some(Self {
            path,
            records: file.records,
            dirty: false,
        }))
    }

    /// Load the state file, starting empty if it is missing or unreadable.
    pub async fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        match Self::read(path.clone()).await {
            Ok(Some(state)) => {
                debug!(path = %path.display(), records = state.len(), "loaded sync state");
                state
            }
            Ok(None) => {
                debug!(path = %path.display(), "no sync state on disk, starting empty");
                Self::new(path)
            }
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "unreadable sync state, identities will re-baseline"
                );
                Self::new(path)
            }
        }
    }

    /// Write all records to disk atomically.
    pub async fn save(&mut self) -> Result<(), SyncError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| SyncError::State(format!("failed to create state dir: {e}")))?;
        }

        let file = StateFile {
            version: STATE_VERSION,
            saved_at: unix_now(),
            records: self.records.clone(),
        };
        let data = serde_json::to_string_pretty(&file)?;

        let tmp = tmp_path(&self.path);
        tokio::fs::write(&tmp, data.as_bytes())
            .await
            .map_err(|e| SyncError::State(format!("failed to write tmp state: {e}")))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| SyncError::State(format!("failed to rename state file: {e}")))?;

        self.dirty = false;
        debug!(path = %self.path.display(), records = self.records.len(), "sync state saved");
        Ok(())
    }

    pub fn get(&self, identity: &str) -> Option<SyncRecord> {
        self.records.get(identity).copied()
    }

    /// Set the last reconciled total for `identity`.
    pub fn set(&mut self, identity: &str, last_synced_total: u64) {
        self.records
            .insert(identity.to_string(), SyncRecord { last_synced_total });
        self.dirty = true;
    }

    /// Remove one record. Only used by explicit admin action.
    pub fn remove(&mut self, identity: &str) -> Option<SyncRecord> {
        let removed = self.records.remove(identity);
        if removed.is_some() {
            self.dirty = true;
        }
        removed
    }

    pub fn records(&self) -> &BTreeMap<String, SyncRecord> {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Whether there are changes not yet written to disk.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");

        let mut state = SyncState::new(&path);
        state.set("alice@example.com", 1_000_000);
        state.set("bob", 42);
        assert!(state.is_dirty());
        state.save().await.unwrap();
        assert!(!state.is_dirty());
        assert!(!tmp_path(&path).exists());

        let loaded = SyncState::load(&path).await;
        assert_eq!(loaded.len(), 2);
        assert_eq!(
            loaded.get("alice@example.com"),
            Some(SyncRecord {
                last_synced_total: 1_000_000
            })
        );
        assert_eq!(loaded.get("bob").unwrap().last_synced_total, 42);
        assert!(!loaded.is_dirty());
    }

    #[tokio::test]
    async fn load_missing_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        assert!(SyncState::read(&path).await.unwrap().is_none());
        let state = SyncState::load(&path).await;
        assert!(state.is_empty());
        assert_eq!(state.path(), path.as_path());
    }

    #[tokio::test]
    async fn load_corrupted_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        tokio::fs::write(&path, b"not json").await.unwrap();

        assert!(SyncState::read(&path).await.is_err());
        assert!(SyncState::load(&path).await.is_empty());
    }

    #[tokio::test]
    async fn unknown_version_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        tokio::fs::write(&path, br#"{"version": 99, "saved_at": 0, "records": {}}"#)
            .await
            .unwrap();

        assert!(matches!(
            SyncState::read(&path).await,
            Err(SyncError::State(_))
        ));
    }

    #[tokio::test]
    async fn file_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let mut state = SyncState::new(&path);
        state.set("alice", 7);
        state.save().await.unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&tokio::fs::read_to_string(&path).await.unwrap()).unwrap();
        assert_eq!(raw["version"], 1);
        assert_eq!(raw["records"]["alice"]["last_synced_total"], 7);
        assert!(raw["saved_at"].as_u64().unwrap() > 0);
    }

    #[test]
    fn remove_marks_dirty_only_when_present() {
        let mut state = SyncState::new("unused.json");
        assert!(state.remove("ghost").is_none());
        assert!(!state.is_dirty());

        state.set("alice", 1);
        state.dirty = false;
        assert_eq!(state.remove("alice").unwrap().last_synced_total, 1);
        assert!(state.is_dirty());
    }
}
