//! # reconcile-sync
//!
//! Async reconciliation engine: collaborator traits, task execution and the
//! single-flight orchestrator, plus file-backed collaborators.
//!
//! Build a [`SyncStrategy`] from [`SyncOptions`] and call
//! [`SyncStrategy::sync`], or use [`pipeline::run`] to drive registered
//! profiles.

pub mod backend;
pub mod dir_store;
pub mod error;
pub mod executor;
pub mod memory;
pub mod pipeline;
pub mod snapshot_store;
pub mod strategy;

pub use backend::{BasicMethods, RecordStore, Resolution, ResolveTask, SnapshotSource, SnapshotStorage};
pub use dir_store::DirStore;
pub use error::SyncError;
pub use executor::{DefaultResolver, Executor, ResolverSet, SnapshotBuffers};
pub use pipeline::{ProfileSyncResult, SyncScope};
pub use snapshot_store::FileSnapshotStorage;
pub use strategy::{OverrunPolicy, SyncOptions, SyncPhase, SyncStatus, SyncStrategy};
