//! Snapshot store: the last-reconciled snapshot of each side, on disk.
//!
//! Persists a `SnapshotFile` JSON document at
//! `<home>/.reconcile/snapshots/<key>.json`, where `key` is
//! `local_<store_id>` or `cloud_<store_id>`.
//! Writes use the same atomic `.tmp` + rename pattern as profiles.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use reconcile_core::Snapshot;

use crate::backend::SnapshotStorage;
use crate::error::{blocking, io_err, SyncError};

/// On-disk snapshot payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SnapshotFile {
    pub synced_at: DateTime<Utc>,
    #[serde(default)]
    pub entries: Snapshot,
}

/// Path to the snapshot JSON for a storage key, rooted at `home`.
pub fn store_path_at(home: &Path, key: &str) -> PathBuf {
    home.join(".reconcile")
        .join("snapshots")
        .join(format!("{key}.json"))
}

/// Load the snapshot stored under `key`.
///
/// Returns `None` if the file does not yet exist.
pub fn load_at(home: &Path, key: &str) -> Result<Option<SnapshotFile>, SyncError> {
    let path = store_path_at(home, key);
    if !path.exists() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    Ok(Some(serde_json::from_str(&contents)?))
}

/// Save `entries` under `key` atomically, stamped with the current time.
///
/// Writes to `<path>.tmp` then renames to `<path>`.
pub fn save_at(home: &Path, key: &str, entries: &Snapshot) -> Result<(), SyncError> {
    let path = store_path_at(home, key);
    let Some(dir) = path.parent() else {
        return Err(io_err(
            path,
            std::io::Error::other("invalid snapshot store path"),
        ));
    };
    std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;

    let file = SnapshotFile {
        synced_at: Utc::now(),
        entries: entries.clone(),
    };
    let json = serde_json::to_string_pretty(&file)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, &json).map_err(|e| io_err(&tmp, e))?;
    std::fs::rename(&tmp, &path).map_err(|e| io_err(&path, e))?;
    Ok(())
}

/// [`SnapshotStorage`] over the snapshot files of one profile.
#[derive(Debug, Clone)]
pub struct FileSnapshotStorage {
    home: PathBuf,
    store_id: String,
}

impl FileSnapshotStorage {
    pub fn new(home: impl Into<PathBuf>, store_id: impl Into<String>) -> Self {
        Self {
            home: home.into(),
            store_id: store_id.into(),
        }
    }
}

#[async_trait]
impl SnapshotStorage for FileSnapshotStorage {
    async fn store_id(&self) -> Result<String, SyncError> {
        Ok(self.store_id.clone())
    }

    async fn get(&self, key: &str) -> Result<Option<Snapshot>, SyncError> {
        let home = self.home.clone();
        let key = key.to_string();
        let file = blocking(move || load_at(&home, &key)).await?;
        Ok(file.map(|f| f.entries))
    }

    async fn set(&self, key: &str, snapshot: &Snapshot) -> Result<(), SyncError> {
        let home = self.home.clone();
        let key = key.to_string();
        let snapshot = snapshot.clone();
        blocking(move || save_at(&home, &key, &snapshot)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reconcile_core::AbstractInfo;
    use tempfile::TempDir;

    fn sample() -> Snapshot {
        let mut entries = Snapshot::new();
        entries.insert("a".to_string(), AbstractInfo::new("a", 10).with_etag("e-a"));
        entries.insert("b".to_string(), AbstractInfo::new("b", 20));
        entries
    }

    #[test]
    fn missing_file_loads_as_none() {
        let tmp = TempDir::new().unwrap();
        assert!(load_at(tmp.path(), "local_nonexistent").unwrap().is_none());
    }

    #[test]
    fn tmp_file_cleaned_up_after_save() {
        let tmp = TempDir::new().unwrap();
        save_at(tmp.path(), "local_clean", &sample()).unwrap();
        let tmp_path = store_path_at(tmp.path(), "local_clean").with_extension("json.tmp");
        assert!(
            !tmp_path.exists(),
            "tmp file should be removed after atomic rename"
        );
    }

    #[test]
    fn document_without_entries_loads_empty() {
        let tmp = TempDir::new().unwrap();
        let path = store_path_at(tmp.path(), "cloud_bare");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, r#"{"synced_at":"2024-10-01T00:00:00Z"}"#).unwrap();

        let loaded = load_at(tmp.path(), "cloud_bare").unwrap().unwrap();
        assert!(loaded.entries.is_empty());
    }

    #[test]
    fn corrupt_file_is_a_json_error() {
        let tmp = TempDir::new().unwrap();
        let path = store_path_at(tmp.path(), "local_bad");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{ not json").unwrap();

        let err = load_at(tmp.path(), "local_bad").unwrap_err();
        assert!(matches!(err, SyncError::Json(_)), "got {err}");
    }

    #[tokio::test]
    async fn storage_trait_reads_back_what_it_wrote() {
        let tmp = TempDir::new().unwrap();
        let storage = FileSnapshotStorage::new(tmp.path(), "notes");
        assert_eq!(storage.store_id().await.unwrap(), "notes");
        assert!(storage.get("local_notes").await.unwrap().is_none());

        storage.set("local_notes", &sample()).await.unwrap();
        assert_eq!(storage.get("local_notes").await.unwrap(), Some(sample()));
        assert!(storage.get("cloud_notes").await.unwrap().is_none());
    }
}
