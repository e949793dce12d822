//! Task executor: resolves classified tasks one at a time, in key order.
//!
//! After every successful task both snapshot buffers are updated and written
//! back to storage, so a cycle interrupted halfway never replays the tasks it
//! already finished. When the snapshot sources are known, each buffer takes
//! the abstract its own side now reports rather than the resolver's.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use reconcile_core::abstract_info::update_time_of;
use reconcile_core::{
    create_abstract, AbstractInfo, AbstractKey, Side, Snapshot, SyncAction, SyncTaskMap,
    TaskDetail, TaskState,
};

use crate::backend::{
    BasicMethods, RecordStore, ResolveTask, Resolution, SnapshotSource, SnapshotStorage,
};
use crate::error::SyncError;

// ---------------------------------------------------------------------------
// Default strategies
// ---------------------------------------------------------------------------

/// Resolution strategies built on the record stores of both sides.
pub struct DefaultResolver<T> {
    methods: BasicMethods<T>,
    keys: AbstractKey,
}

impl<T> DefaultResolver<T> {
    pub fn new(methods: BasicMethods<T>, keys: AbstractKey) -> Self {
        Self { methods, keys }
    }
}

impl<T> DefaultResolver<T>
where
    T: Serialize + Clone + Send + Sync + 'static,
{
    fn stores(&self, from: Side) -> (&dyn RecordStore<T>, &dyn RecordStore<T>) {
        match from {
            Side::Local => (self.methods.local.as_ref(), self.methods.cloud.as_ref()),
            Side::Cloud => (self.methods.cloud.as_ref(), self.methods.local.as_ref()),
        }
    }

    /// Copy `key` from one side to the other. `overwrite` selects `update`
    /// over `add` on the receiving side.
    async fn transfer(&self, key: &str, from: Side, overwrite: bool) -> Result<Resolution, SyncError> {
        let (source, target) = self.stores(from);
        let record = source.query(key).await?.ok_or_else(|| SyncError::NotFound {
            id: key.to_string(),
            side: from,
        })?;
        let stored = if overwrite {
            target.update(key, record).await?
        } else {
            target.add(key, record).await?
        };
        Ok(Resolution::success(create_abstract(stored.as_ref(), &self.keys)?))
    }

    /// Last writer wins: the side with the strictly later update time is
    /// copied over the other. Ties go to the cloud.
    async fn resolve_conflict(&self, key: &str) -> Result<Resolution, SyncError> {
        let (local, cloud) =
            tokio::try_join!(self.methods.local.query(key), self.methods.cloud.query(key))?;
        let local_at = match &local {
            Some(record) => update_time_of(record, &self.keys)?,
            None => 0,
        };
        let cloud_at = match &cloud {
            Some(record) => update_time_of(record, &self.keys)?,
            None => 0,
        };

        let (winner, side) = if local_at > cloud_at {
            (local, Side::Local)
        } else {
            (cloud, Side::Cloud)
        };
        let record = winner.ok_or_else(|| SyncError::NotFound {
            id: key.to_string(),
            side,
        })?;
        tracing::debug!(key, winner = %side, local_at, cloud_at, "conflict resolved");

        let (_, target) = self.stores(side);
        let stored = target.update(key, record).await?;
        Ok(Resolution::success(create_abstract(stored.as_ref(), &self.keys)?))
    }
}

#[async_trait]
impl<T> ResolveTask for DefaultResolver<T>
where
    T: Serialize + Clone + Send + Sync + 'static,
{
    async fn resolve(&self, key: &str, task: &TaskDetail) -> Result<Resolution, SyncError> {
        match task.action_type {
            SyncAction::ClientDelete => {
                self.methods.local.remove(key).await?;
                Ok(Resolution::success(None))
            }
            SyncAction::ServerDelete => {
                self.methods.cloud.remove(key).await?;
                Ok(Resolution::success(None))
            }
            SyncAction::ClientDownload => self.transfer(key, Side::Cloud, false).await,
            SyncAction::OverrideDownload => self.transfer(key, Side::Cloud, true).await,
            SyncAction::ClientUpload => self.transfer(key, Side::Local, false).await,
            SyncAction::OverrideUpload => self.transfer(key, Side::Local, true).await,
            SyncAction::Conflict => self.resolve_conflict(key).await,
        }
    }
}

// ---------------------------------------------------------------------------
// Resolver lookup
// ---------------------------------------------------------------------------

/// Per-action overrides, falling back to the default strategies.
#[derive(Clone, Default)]
pub struct ResolverSet {
    overrides: BTreeMap<SyncAction, Arc<dyn ResolveTask>>,
    defaults: Option<Arc<dyn ResolveTask>>,
}

impl ResolverSet {
    pub fn with_defaults(mut self, defaults: Arc<dyn ResolveTask>) -> Self {
        self.defaults = Some(defaults);
        self
    }

    pub fn with_override(mut self, action: SyncAction, resolver: Arc<dyn ResolveTask>) -> Self {
        self.overrides.insert(action, resolver);
        self
    }

    /// The resolver for `action`, or [`SyncError::MissingResolver`].
    pub fn resolver_for(&self, action: SyncAction) -> Result<&dyn ResolveTask, SyncError> {
        self.overrides
            .get(&action)
            .or(self.defaults.as_ref())
            .map(|r| r.as_ref())
            .ok_or(SyncError::MissingResolver { action })
    }

    /// Fail unless every task in `tasks` has a resolver.
    pub fn check(&self, tasks: &SyncTaskMap) -> Result<(), SyncError> {
        tasks
            .values()
            .try_for_each(|task| self.resolver_for(task.action_type).map(|_| ()))
    }
}

// ---------------------------------------------------------------------------
// Snapshot buffers
// ---------------------------------------------------------------------------

/// What each side was last reconciled to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotBuffers {
    pub local: Snapshot,
    pub cloud: Snapshot,
}

impl SnapshotBuffers {
    /// Record the outcome of a successful task. `None` means the record no
    /// longer exists anywhere; otherwise both sides now hold `info`.
    pub fn apply(&mut self, key: &str, info: Option<AbstractInfo>) {
        match info {
            None => {
                self.local.remove(key);
                self.cloud.remove(key);
            }
            Some(info) => {
                self.local.insert(key.to_string(), info.clone());
                self.cloud.insert(key.to_string(), info);
            }
        }
    }

    fn side_mut(&mut self, side: Side) -> &mut Snapshot {
        match side {
            Side::Local => &mut self.local,
            Side::Cloud => &mut self.cloud,
        }
    }

    /// Write both buffers to `storage`, local first.
    pub async fn persist(&self, storage: &dyn SnapshotStorage, store_id: &str) -> Result<(), SyncError> {
        storage.set(&Side::Local.cache_key(store_id), &self.local).await?;
        storage.set(&Side::Cloud.cache_key(store_id), &self.cloud).await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Executor
// ---------------------------------------------------------------------------

/// Runs a task map against a resolver set and persists progress.
pub struct Executor<'a> {
    resolvers: &'a ResolverSet,
    storage: &'a dyn SnapshotStorage,
    store_id: &'a str,
    sources: Option<(&'a dyn SnapshotSource, &'a dyn SnapshotSource)>,
}

impl<'a> Executor<'a> {
    pub fn new(resolvers: &'a ResolverSet, storage: &'a dyn SnapshotStorage, store_id: &'a str) -> Self {
        Self {
            resolvers,
            storage,
            store_id,
            sources: None,
        }
    }

    /// Re-read each side's abstract after a successful task.
    pub fn with_sources(mut self, local: &'a dyn SnapshotSource, cloud: &'a dyn SnapshotSource) -> Self {
        self.sources = Some((local, cloud));
        self
    }

    /// Resolve every unclaimed task in `tasks`, updating states in place.
    ///
    /// Fails up front with [`SyncError::MissingResolver`] before touching any
    /// task. Individual task failures are recorded as `NetworkError` and do
    /// not stop the run.
    pub async fn run(&self, tasks: &mut SyncTaskMap, buffers: &mut SnapshotBuffers) -> Result<(), SyncError> {
        self.resolvers.check(tasks)?;

        for (key, task) in tasks.iter_mut() {
            if task.state.is_claimed() {
                tracing::debug!(key = %key, state = %task.state, "skipping claimed task");
                continue;
            }
            let resolver = self.resolvers.resolver_for(task.action_type)?;
            task.state = TaskState::Resolving;

            match resolver.resolve(key, task).await {
                Ok(resolution) => {
                    task.state = resolution.state;
                    if resolution.state != TaskState::Success {
                        tracing::warn!(key = %key, action = %task.action_type, state = %resolution.state, "task not resolved");
                        continue;
                    }
                    let info = if task.action_type.is_delete() {
                        None
                    } else {
                        resolution.abstract_info
                    };
                    let removed = info.is_none();
                    buffers.apply(key, info);
                    if !removed {
                        self.refresh(key, buffers).await;
                    }
                    if let Err(err) = buffers.persist(self.storage, self.store_id).await {
                        tracing::warn!(key = %key, error = %err, "failed to persist snapshots");
                    }
                    tracing::debug!(key = %key, action = %task.action_type, "task resolved");
                }
                Err(err) => {
                    tracing::warn!(key = %key, action = %task.action_type, error = %err, "task failed");
                    task.state = TaskState::NetworkError;
                }
            }
        }
        Ok(())
    }

    /// Overwrite `key` in each buffer with what that side reports now, so the
    /// next diff compares fingerprints of the same kind. The resolver's
    /// abstract stays where a side has no record or cannot be read.
    async fn refresh(&self, key: &str, buffers: &mut SnapshotBuffers) {
        let Some((local, cloud)) = self.sources else {
            return;
        };
        let (local_info, cloud_info) = tokio::join!(local.abstract_of(key), cloud.abstract_of(key));
        for (side, found) in [(Side::Local, local_info), (Side::Cloud, cloud_info)] {
            match found {
                Ok(Some(info)) => {
                    buffers.side_mut(side).insert(key.to_string(), info);
                }
                Ok(None) => {}
                Err(err) => tracing::warn!(key, side = %side, error = %err, "failed to re-read abstract"),
            }
        }
    }
}
