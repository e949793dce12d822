//! In-memory collaborators for embedding and tests.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;

use reconcile_core::{create_abstract, AbstractKey, Snapshot};

use crate::backend::{RecordStore, SnapshotSource, SnapshotStorage};
use crate::error::SyncError;

/// A record store held in a `BTreeMap`, doubling as its own snapshot source.
///
/// Clones share the same records.
pub struct MemoryRecordStore<T> {
    inner: Arc<Mutex<MemoryRecords<T>>>,
    keys: AbstractKey,
}

struct MemoryRecords<T> {
    records: BTreeMap<String, T>,
    failing: BTreeSet<String>,
    mutations: usize,
}

impl<T> Clone for MemoryRecordStore<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            keys: self.keys.clone(),
        }
    }
}

impl<T: Clone> MemoryRecordStore<T> {
    pub fn new(keys: AbstractKey) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MemoryRecords {
                records: BTreeMap::new(),
                failing: BTreeSet::new(),
                mutations: 0,
            })),
            keys,
        }
    }

    /// Seed a record without counting it as a mutation.
    pub fn insert(&self, id: impl Into<String>, record: T) {
        self.inner.lock().records.insert(id.into(), record);
    }

    pub fn get(&self, id: &str) -> Option<T> {
        self.inner.lock().records.get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Make every call touching `id` fail with a back end error.
    pub fn fail_on(&self, id: impl Into<String>) {
        self.inner.lock().failing.insert(id.into());
    }

    /// Number of successful `add`, `update` and `remove` calls.
    pub fn mutations(&self) -> usize {
        self.inner.lock().mutations
    }

    fn check(records: &MemoryRecords<T>, id: &str) -> Result<(), SyncError> {
        if records.failing.contains(id) {
            return Err(SyncError::backend(format!("injected failure for '{id}'")));
        }
        Ok(())
    }

    fn write(&self, id: &str, record: T) -> Result<Option<T>, SyncError> {
        let mut records = self.inner.lock();
        Self::check(&records, id)?;
        records.records.insert(id.to_string(), record.clone());
        records.mutations += 1;
        Ok(Some(record))
    }
}

#[async_trait]
impl<T> RecordStore<T> for MemoryRecordStore<T>
where
    T: Clone + Send + Sync + 'static,
{
    async fn add(&self, id: &str, record: T) -> Result<Option<T>, SyncError> {
        self.write(id, record)
    }

    async fn update(&self, id: &str, record: T) -> Result<Option<T>, SyncError> {
        self.write(id, record)
    }

    async fn remove(&self, id: &str) -> Result<Option<T>, SyncError> {
        let mut records = self.inner.lock();
        Self::check(&records, id)?;
        let removed = records.records.remove(id);
        records.mutations += 1;
        Ok(removed)
    }

    async fn query(&self, id: &str) -> Result<Option<T>, SyncError> {
        let records = self.inner.lock();
        Self::check(&records, id)?;
        Ok(records.records.get(id).cloned())
    }
}

#[async_trait]
impl<T> SnapshotSource for MemoryRecordStore<T>
where
    T: Clone + Serialize + Send + Sync + 'static,
{
    async fn current_snapshot(&self) -> Result<Option<Snapshot>, SyncError> {
        let records = self.inner.lock();
        let mut snapshot = Snapshot::new();
        for (id, record) in &records.records {
            if let Some(info) = create_abstract(Some(record), &self.keys)? {
                snapshot.insert(id.clone(), info);
            }
        }
        Ok(Some(snapshot))
    }
}

/// Cached snapshots held in memory. Clones share the same entries.
#[derive(Clone)]
pub struct MemorySnapshotStorage {
    store_id: String,
    entries: Arc<Mutex<BTreeMap<String, Snapshot>>>,
    writes: Arc<Mutex<usize>>,
}

impl MemorySnapshotStorage {
    pub fn new(store_id: impl Into<String>) -> Self {
        Self {
            store_id: store_id.into(),
            entries: Arc::new(Mutex::new(BTreeMap::new())),
            writes: Arc::new(Mutex::new(0)),
        }
    }

    pub fn snapshot(&self, key: &str) -> Option<Snapshot> {
        self.entries.lock().get(key).cloned()
    }

    /// Number of `set` calls so far.
    pub fn writes(&self) -> usize {
        *self.writes.lock()
    }
}

#[async_trait]
impl SnapshotStorage for MemorySnapshotStorage {
    async fn store_id(&self) -> Result<String, SyncError> {
        Ok(self.store_id.clone())
    }

    async fn get(&self, key: &str) -> Result<Option<Snapshot>, SyncError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, snapshot: &Snapshot) -> Result<(), SyncError> {
        self.entries.lock().insert(key.to_string(), snapshot.clone());
        *self.writes.lock() += 1;
        Ok(())
    }
}
