//! Directory-backed record store: one JSON file per record.
//!
//! ```text
//! <dir>/
//!   <id>.json
//! ```
//!
//! The snapshot of a directory fingerprints each record with the SHA-256 of
//! its canonical JSON (`etag`: compact, keys sorted) and the record's own
//! time field (`updateAt`). Two copies of a record therefore share an etag
//! however their files are formatted. File mtimes are left out: they are not
//! comparable across two directories.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use sha2::{Digest, Sha256};

use reconcile_core::abstract_info::update_time_of;
use reconcile_core::{AbstractInfo, AbstractKey, Snapshot};

use crate::backend::{RecordStore, SnapshotSource};
use crate::error::{blocking, io_err, SyncError};

/// Records stored as `<dir>/<id>.json`.
#[derive(Debug, Clone)]
pub struct DirStore {
    dir: PathBuf,
    keys: AbstractKey,
}

impl DirStore {
    pub fn new(dir: impl Into<PathBuf>, keys: AbstractKey) -> Self {
        Self {
            dir: dir.into(),
            keys,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, id: &str) -> Result<PathBuf, SyncError> {
        record_path_in(&self.dir, id)
    }
}

fn record_path_in(dir: &Path, id: &str) -> Result<PathBuf, SyncError> {
    let valid = !id.is_empty()
        && !id.starts_with('.')
        && !id.contains(['/', '\\'])
        && !id.contains('\0');
    if !valid {
        return Err(SyncError::InvalidRecordId { id: id.to_string() });
    }
    Ok(dir.join(format!("{id}.json")))
}

/// Write `record` to `path` via a `.tmp` sibling and rename.
fn write_record(path: &Path, record: &Value) -> Result<(), SyncError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    let json = serde_json::to_string_pretty(record)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json).map_err(|e| io_err(&tmp, e))?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(path, e));
    }
    Ok(())
}

fn read_record(path: &Path) -> Result<Option<Value>, SyncError> {
    match std::fs::read_to_string(path) {
        Ok(contents) => Ok(Some(serde_json::from_str(&contents)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(io_err(path, e)),
    }
}

/// Build the snapshot of every `*.json` record in `dir`.
pub fn scan_dir(dir: &Path, keys: &AbstractKey) -> Result<Snapshot, SyncError> {
    let mut snapshot = Snapshot::new();
    if !dir.exists() {
        return Ok(snapshot);
    }

    for entry in std::fs::read_dir(dir).map_err(|e| io_err(dir, e))? {
        let entry = entry.map_err(|e| io_err(dir, e))?;
        let path = entry.path();
        if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let Some(id) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };

        snapshot.insert(id.to_string(), fingerprint(&path, id, keys)?);
    }
    Ok(snapshot)
}

/// Abstract of the record file at `path`.
fn fingerprint(path: &Path, id: &str, keys: &AbstractKey) -> Result<AbstractInfo, SyncError> {
    let bytes = std::fs::read(path).map_err(|e| io_err(path, e))?;
    let record: Value = serde_json::from_slice(&bytes)?;
    let etag = {
        let mut h = Sha256::new();
        h.update(serde_json::to_vec(&record)?);
        hex::encode(h.finalize())
    };
    let update_at = update_time_of(&record, keys)?;
    Ok(AbstractInfo::new(id, update_at).with_etag(etag))
}

#[async_trait]
impl SnapshotSource for DirStore {
    async fn current_snapshot(&self) -> Result<Option<Snapshot>, SyncError> {
        let dir = self.dir.clone();
        let keys = self.keys.clone();
        let snapshot = blocking(move || scan_dir(&dir, &keys)).await?;
        tracing::debug!(dir = %self.dir.display(), records = snapshot.len(), "scanned");
        Ok(Some(snapshot))
    }

    async fn abstract_of(&self, id: &str) -> Result<Option<AbstractInfo>, SyncError> {
        let path = self.record_path(id)?;
        let keys = self.keys.clone();
        let id = id.to_string();
        blocking(move || {
            if !path.is_file() {
                return Ok(None);
            }
            fingerprint(&path, &id, &keys).map(Some)
        })
        .await
    }
}

#[async_trait]
impl RecordStore<Value> for DirStore {
    async fn add(&self, id: &str, record: Value) -> Result<Option<Value>, SyncError> {
        let path = self.record_path(id)?;
        blocking(move || {
            write_record(&path, &record)?;
            Ok(Some(record))
        })
        .await
    }

    async fn update(&self, id: &str, record: Value) -> Result<Option<Value>, SyncError> {
        self.add(id, record).await
    }

    async fn remove(&self, id: &str) -> Result<Option<Value>, SyncError> {
        let path = self.record_path(id)?;
        blocking(move || match std::fs::remove_file(&path) {
            Ok(()) => Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_err(&path, e)),
        })
        .await
    }

    async fn query(&self, id: &str) -> Result<Option<Value>, SyncError> {
        let path = self.record_path(id)?;
        blocking(move || read_record(&path)).await
    }
}
