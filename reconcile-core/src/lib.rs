//! Reconcile core library: record summaries, snapshot diffing, action
//! classification and sync profiles.
//!
//! - [`types`] — data model
//! - [`compare`] — [`is_same`] abstract comparator
//! - [`diff`] — [`diff_snapshot`]
//! - [`classify`] — [`compute_sync_task`]
//! - [`abstract_info`] — [`create_abstract`] from full records
//! - [`profile`] — YAML sync profiles (load / save / init)

pub mod abstract_info;
pub mod classify;
pub mod compare;
pub mod diff;
pub mod error;
pub mod profile;
pub mod types;

pub use abstract_info::create_abstract;
pub use classify::{compute_sync_task, Combination};
pub use compare::is_same;
pub use diff::diff_snapshot;
pub use error::ProfileError;
pub use types::{
    AbstractInfo, AbstractKey, ChangeFlag, ChangeMap, ProfileName, Side, Snapshot, SnapshotDiff,
    SyncAction, SyncTaskMap, TaskDetail, TaskState,
};
