//! Collaborator seams: everything the engine reads from or writes to.
//!
//! The engine owns no storage or network code. Snapshots, cached snapshots
//! and per-record CRUD all arrive through these traits.

use std::sync::Arc;

use async_trait::async_trait;

use reconcile_core::{AbstractInfo, Snapshot, TaskDetail, TaskState};

use crate::error::SyncError;

/// Produces the current snapshot of one side.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// `None` is treated as an empty snapshot.
    async fn current_snapshot(&self) -> Result<Option<Snapshot>, SyncError>;

    /// Abstract of one record exactly as [`current_snapshot`] would report
    /// it, or `None` when the record is absent.
    ///
    /// [`current_snapshot`]: SnapshotSource::current_snapshot
    async fn abstract_of(&self, id: &str) -> Result<Option<AbstractInfo>, SyncError> {
        Ok(self
            .current_snapshot()
            .await?
            .and_then(|mut snapshot| snapshot.remove(id)))
    }
}

/// Persisted key-value access for last-reconciled snapshots.
#[async_trait]
pub trait SnapshotStorage: Send + Sync {
    /// Identifier partitioning cached snapshots, e.g. one per sync target.
    async fn store_id(&self) -> Result<String, SyncError>;

    async fn get(&self, key: &str) -> Result<Option<Snapshot>, SyncError>;

    async fn set(&self, key: &str, snapshot: &Snapshot) -> Result<(), SyncError>;
}

/// Per-record CRUD against one side.
///
/// Calls may be repeated for the same logical action; implementations must
/// tolerate that.
#[async_trait]
pub trait RecordStore<T>: Send + Sync {
    /// Create `id`, returning the stored record.
    async fn add(&self, id: &str, record: T) -> Result<Option<T>, SyncError>;

    /// Overwrite `id`, returning the stored record.
    async fn update(&self, id: &str, record: T) -> Result<Option<T>, SyncError>;

    /// Delete `id`, returning the removed record if the store reports it.
    async fn remove(&self, id: &str) -> Result<Option<T>, SyncError>;

    async fn query(&self, id: &str) -> Result<Option<T>, SyncError>;
}

/// Record stores for both sides, used by the default resolution strategies.
pub struct BasicMethods<T> {
    pub local: Arc<dyn RecordStore<T>>,
    pub cloud: Arc<dyn RecordStore<T>>,
}

impl<T> Clone for BasicMethods<T> {
    fn clone(&self) -> Self {
        Self {
            local: Arc::clone(&self.local),
            cloud: Arc::clone(&self.cloud),
        }
    }
}

/// Outcome of resolving one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub state: TaskState,
    /// Abstract of the record both sides now hold; `None` when it no longer
    /// exists anywhere.
    pub abstract_info: Option<AbstractInfo>,
}

impl Resolution {
    pub fn success(abstract_info: Option<AbstractInfo>) -> Self {
        Self {
            state: TaskState::Success,
            abstract_info,
        }
    }
}

/// Custom resolution for one action, replacing the default strategy.
#[async_trait]
pub trait ResolveTask: Send + Sync {
    async fn resolve(&self, key: &str, task: &TaskDetail) -> Result<Resolution, SyncError>;
}
