//! Reconciliation orchestrator.
//!
//! [`SyncStrategy::sync`] runs one cycle: diff both sides against their cached
//! snapshots, classify, execute. Cycles are single-flight:
//!
//! ```text
//!            begin                    finish / forced unlock
//!   Idle ─────────────▶ Resolving ───────────────────────────▶ Idle
//!    ▲                    │  ▲                                  or
//!    │                    │  │ begin                        PendingRetry
//!    │   retry fires      ▼  │                              (retry queued)
//!    └──────────────── PendingRetry
//! ```
//!
//! A call made while a cycle is running returns [`SyncError::Busy`] and
//! queues one retry at half the lock window; later calls replace it. The lock
//! is force-released after the full window even if the cycle is still
//! running. That cycle is then reported as an overrun until it finishes.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use reconcile_core::{
    compute_sync_task, diff_snapshot, AbstractKey, Side, Snapshot, SnapshotDiff, SyncAction,
    SyncTaskMap,
};

use crate::backend::{BasicMethods, ResolveTask, SnapshotSource, SnapshotStorage};
use crate::error::SyncError;
use crate::executor::{DefaultResolver, Executor, ResolverSet, SnapshotBuffers};

/// Lock window used when none is configured.
pub const DEFAULT_LOCK_RESOLVING: Duration = Duration::from_millis(10_000);

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// What to do when a cycle outlives its lock window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverrunPolicy {
    /// Let a new cycle start alongside the overrunning one.
    #[default]
    Race,
    /// Report busy until the overrunning cycle finishes.
    Wait,
}

type DefaultsFactory = Box<dyn FnOnce(AbstractKey) -> Arc<dyn ResolveTask> + Send>;

/// Collaborators and settings for a [`SyncStrategy`].
pub struct SyncOptions {
    local: Arc<dyn SnapshotSource>,
    cloud: Arc<dyn SnapshotSource>,
    storage: Arc<dyn SnapshotStorage>,
    defaults: Option<DefaultsFactory>,
    resolvers: ResolverSet,
    abstract_key: AbstractKey,
    lock_resolving: Duration,
    overrun: OverrunPolicy,
}

impl SyncOptions {
    pub fn new(
        local: Arc<dyn SnapshotSource>,
        cloud: Arc<dyn SnapshotSource>,
        storage: Arc<dyn SnapshotStorage>,
    ) -> Self {
        Self {
            local,
            cloud,
            storage,
            defaults: None,
            resolvers: ResolverSet::default(),
            abstract_key: AbstractKey::default(),
            lock_resolving: DEFAULT_LOCK_RESOLVING,
            overrun: OverrunPolicy::default(),
        }
    }

    /// Record stores backing the default strategy of every action.
    pub fn with_basic_methods<T>(mut self, methods: BasicMethods<T>) -> Self
    where
        T: Serialize + Clone + Send + Sync + 'static,
    {
        self.defaults = Some(Box::new(move |keys| {
            Arc::new(DefaultResolver::new(methods, keys)) as Arc<dyn ResolveTask>
        }));
        self
    }

    /// Replace the strategy for one action.
    pub fn with_resolver(mut self, action: SyncAction, resolver: Arc<dyn ResolveTask>) -> Self {
        self.resolvers = self.resolvers.with_override(action, resolver);
        self
    }

    pub fn with_abstract_key(mut self, keys: AbstractKey) -> Self {
        self.abstract_key = keys;
        self
    }

    pub fn with_lock_resolving(mut self, window: Duration) -> Self {
        self.lock_resolving = window;
        self
    }

    pub fn with_overrun_policy(mut self, policy: OverrunPolicy) -> Self {
        self.overrun = policy;
        self
    }
}

// ---------------------------------------------------------------------------
// Lock state
// ---------------------------------------------------------------------------

/// Scheduling phase of a [`SyncStrategy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncPhase {
    Idle,
    Resolving,
    /// No cycle holds the lock but a retry is queued.
    PendingRetry,
}

/// Point-in-time view of a [`SyncStrategy`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncStatus {
    pub phase: SyncPhase,
    pub retry_pending: bool,
    /// A cycle lost the lock to the fail-safe timer and is still running.
    pub overrun: bool,
    pub last_sync_at: Option<DateTime<Utc>>,
    /// Cycles that ran to completion.
    pub cycles: u64,
}

struct LockState {
    phase: SyncPhase,
    active: Option<u64>,
    next_cycle: u64,
    overrun: BTreeSet<u64>,
    retry: Option<JoinHandle<()>>,
    retry_seq: u64,
    unlock: Option<JoinHandle<()>>,
    last_sync_at: Option<DateTime<Utc>>,
    cycles: u64,
}

impl LockState {
    fn new() -> Self {
        Self {
            phase: SyncPhase::Idle,
            active: None,
            next_cycle: 0,
            overrun: BTreeSet::new(),
            retry: None,
            retry_seq: 0,
            unlock: None,
            last_sync_at: None,
            cycles: 0,
        }
    }

    fn idle_phase(&self) -> SyncPhase {
        if self.retry.is_some() {
            SyncPhase::PendingRetry
        } else {
            SyncPhase::Idle
        }
    }
}

struct Inner {
    local: Arc<dyn SnapshotSource>,
    cloud: Arc<dyn SnapshotSource>,
    storage: Arc<dyn SnapshotStorage>,
    resolvers: ResolverSet,
    lock_resolving: Duration,
    overrun: OverrunPolicy,
    state: Mutex<LockState>,
    buffers: tokio::sync::Mutex<SnapshotBuffers>,
    last_tasks: Mutex<SyncTaskMap>,
}

// ---------------------------------------------------------------------------
// SyncStrategy
// ---------------------------------------------------------------------------

/// Handle to one orchestrator. Clones share the same lock, timers and
/// snapshot buffers.
#[derive(Clone)]
pub struct SyncStrategy {
    inner: Arc<Inner>,
}

impl SyncStrategy {
    pub fn new(options: SyncOptions) -> Self {
        let mut resolvers = options.resolvers;
        if let Some(factory) = options.defaults {
            resolvers = resolvers.with_defaults(factory(options.abstract_key));
        }
        Self {
            inner: Arc::new(Inner {
                local: options.local,
                cloud: options.cloud,
                storage: options.storage,
                resolvers,
                lock_resolving: options.lock_resolving,
                overrun: options.overrun,
                state: Mutex::new(LockState::new()),
                buffers: tokio::sync::Mutex::new(SnapshotBuffers::default()),
                last_tasks: Mutex::new(SyncTaskMap::new()),
            }),
        }
    }

    pub fn lock_resolving(&self) -> Duration {
        self.inner.lock_resolving
    }

    /// Run one reconciliation cycle and return its task map.
    ///
    /// Returns [`SyncError::Busy`] without doing any work when a cycle already
    /// holds the lock; a retry has then been queued.
    pub async fn sync(&self) -> Result<SyncTaskMap, SyncError> {
        let cycle = self.begin()?;
        tracing::info!(cycle, "sync cycle started");

        let result = self.run_cycle().await;
        self.finish(cycle, result.is_ok());

        match &result {
            Ok(tasks) => {
                let failed = tasks.values().filter(|t| t.state.is_failure()).count();
                tracing::info!(cycle, tasks = tasks.len(), failed, "sync cycle finished");
                *self.inner.last_tasks.lock() = tasks.clone();
            }
            Err(err) => tracing::warn!(cycle, error = %err, "sync cycle failed"),
        }
        result
    }

    /// Diff and classify without executing anything or taking the lock.
    pub async fn plan(&self) -> Result<SyncTaskMap, SyncError> {
        let store_id = self.inner.storage.store_id().await?;
        let ((local, _), (cloud, _)) = tokio::try_join!(
            self.side_diff(Side::Local, &store_id),
            self.side_diff(Side::Cloud, &store_id)
        )?;
        Ok(compute_sync_task(local, cloud))
    }

    pub fn status(&self) -> SyncStatus {
        let state = self.inner.state.lock();
        SyncStatus {
            phase: state.phase,
            retry_pending: state.retry.is_some(),
            overrun: !state.overrun.is_empty(),
            last_sync_at: state.last_sync_at,
            cycles: state.cycles,
        }
    }

    /// Task map of the last cycle that completed without a structural error.
    pub fn last_task_map(&self) -> SyncTaskMap {
        self.inner.last_tasks.lock().clone()
    }

    // -- cycle body ---------------------------------------------------------

    async fn run_cycle(&self) -> Result<SyncTaskMap, SyncError> {
        let store_id = self.inner.storage.store_id().await?;
        let mut buffers = self.inner.buffers.lock().await;

        let ((local, local_cached), (cloud, cloud_cached)) = tokio::try_join!(
            self.side_diff(Side::Local, &store_id),
            self.side_diff(Side::Cloud, &store_id)
        )?;
        *buffers = SnapshotBuffers {
            local: local_cached,
            cloud: cloud_cached,
        };

        let mut tasks = compute_sync_task(local, cloud);
        tracing::debug!(store_id = %store_id, tasks = tasks.len(), "classified");

        Executor::new(&self.inner.resolvers, self.inner.storage.as_ref(), &store_id)
            .with_sources(self.inner.local.as_ref(), self.inner.cloud.as_ref())
            .run(&mut tasks, &mut buffers)
            .await?;

        // Stamp the cache even when there was nothing to resolve.
        if let Err(err) = buffers.persist(self.inner.storage.as_ref(), &store_id).await {
            tracing::warn!(store_id = %store_id, error = %err, "failed to persist snapshots");
        }
        Ok(tasks)
    }

    /// Diff one side's current snapshot against its cached one. Also returns
    /// the cached snapshot, which seeds that side's buffer.
    async fn side_diff(&self, side: Side, store_id: &str) -> Result<(SnapshotDiff, Snapshot), SyncError> {
        let source = match side {
            Side::Local => &self.inner.local,
            Side::Cloud => &self.inner.cloud,
        };
        let key = side.cache_key(store_id);
        let (current, cached) = tokio::try_join!(source.current_snapshot(), self.inner.storage.get(&key))?;
        let current = current.unwrap_or_default();
        let cached = cached.unwrap_or_default();

        let change_map = diff_snapshot(&current, &cached);
        Ok((
            SnapshotDiff {
                change_map,
                latest_snapshot: current,
            },
            cached,
        ))
    }

    // -- lock transitions ---------------------------------------------------

    /// Take the lock or queue a retry.
    fn begin(&self) -> Result<u64, SyncError> {
        let mut state = self.inner.state.lock();

        let waiting_on_overrun = self.inner.overrun == OverrunPolicy::Wait && !state.overrun.is_empty();
        if state.phase == SyncPhase::Resolving || waiting_on_overrun {
            let retry_in = self.inner.lock_resolving / 2;
            self.defer(&mut state, retry_in);
            tracing::debug!(?retry_in, waiting_on_overrun, "sync busy; retry queued");
            return Err(SyncError::Busy { retry_in });
        }

        // This cycle covers any queued retry.
        if let Some(retry) = state.retry.take() {
            retry.abort();
        }

        let cycle = state.next_cycle;
        state.next_cycle += 1;
        state.active = Some(cycle);
        state.phase = SyncPhase::Resolving;

        let inner = Arc::clone(&self.inner);
        let window = self.inner.lock_resolving;
        state.unlock = Some(tokio::spawn(async move {
            tokio::time::sleep(window).await;
            force_release(&inner, cycle);
        }));
        Ok(cycle)
    }

    /// Queue a single retry, replacing any queued one.
    fn defer(&self, state: &mut LockState, delay: Duration) {
        if let Some(retry) = state.retry.take() {
            retry.abort();
        }
        state.retry_seq += 1;
        let seq = state.retry_seq;
        let strategy = self.clone();
        state.retry = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            {
                let mut state = strategy.inner.state.lock();
                if state.retry_seq == seq {
                    state.retry = None;
                    if state.phase == SyncPhase::PendingRetry {
                        state.phase = SyncPhase::Idle;
                    }
                }
            }
            match strategy.sync().await {
                Ok(_) => {}
                Err(err) if err.is_busy() => {}
                Err(err) => tracing::warn!(error = %err, "retried sync failed"),
            }
        }));
        if state.phase != SyncPhase::Resolving {
            state.phase = SyncPhase::PendingRetry;
        }
    }

    /// Release the lock held by `cycle`, if it still holds it.
    fn finish(&self, cycle: u64, completed: bool) {
        let mut state = self.inner.state.lock();
        if completed {
            state.cycles += 1;
            state.last_sync_at = Some(Utc::now());
        }
        if state.active == Some(cycle) {
            state.active = None;
            if let Some(unlock) = state.unlock.take() {
                unlock.abort();
            }
            state.phase = state.idle_phase();
        } else if state.overrun.remove(&cycle) {
            tracing::info!(cycle, "overrunning cycle finished");
        }
    }
}

/// Fail-safe unlock: `cycle` outlived the lock window.
fn force_release(inner: &Inner, cycle: u64) {
    let mut state = inner.state.lock();
    if state.active != Some(cycle) {
        return;
    }
    state.active = None;
    state.unlock = None;
    state.overrun.insert(cycle);
    state.phase = state.idle_phase();
    tracing::warn!(cycle, window = ?inner.lock_resolving, "sync lock force-released");
}
