//! Domain types for two-sided snapshot reconciliation.
//!
//! Every map in this module is a `BTreeMap` so that diffing, classification
//! and task execution walk keys in a stable order.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// A strongly-typed name for a sync profile. Doubles as the store id that
/// partitions cached snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProfileName(pub String);

impl fmt::Display for ProfileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for ProfileName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ProfileName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Record summaries
// ---------------------------------------------------------------------------

/// Lightweight fingerprint of one record.
///
/// `id` and `update_at` are always present (`update_at == 0` means unknown).
/// `etag` and `lastmod` are only filled in by back ends that track them.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbstractInfo {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lastmod: Option<String>,
    /// Milliseconds since the Unix epoch of the last logical update.
    #[serde(default)]
    pub update_at: i64,
}

impl AbstractInfo {
    pub fn new(id: impl Into<String>, update_at: i64) -> Self {
        Self {
            id: id.into(),
            etag: None,
            lastmod: None,
            update_at,
        }
    }

    pub fn with_etag(mut self, etag: impl Into<String>) -> Self {
        self.etag = Some(etag.into());
        self
    }

    pub fn with_lastmod(mut self, lastmod: impl Into<String>) -> Self {
        self.lastmod = Some(lastmod.into());
        self
    }
}

/// Everything known about one side of the data set at a point in time.
pub type Snapshot = BTreeMap<String, AbstractInfo>;

/// Field selectors used to build an [`AbstractInfo`] from a full record.
///
/// Selectors are dot-separated paths into the record's JSON form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbstractKey {
    #[serde(default = "default_time_key")]
    pub time_key: String,
    #[serde(default = "default_unique_key")]
    pub unique_key: String,
}

impl Default for AbstractKey {
    fn default() -> Self {
        Self {
            time_key: default_time_key(),
            unique_key: default_unique_key(),
        }
    }
}

fn default_time_key() -> String {
    "updateAt".to_string()
}

fn default_unique_key() -> String {
    "id".to_string()
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Which store a snapshot or record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Local,
    Cloud,
}

impl Side {
    /// Storage key of the last reconciled snapshot for this side:
    /// `local_<store_id>` / `cloud_<store_id>`.
    pub fn cache_key(self, store_id: &str) -> String {
        format!("{self}_{store_id}")
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Local => write!(f, "local"),
            Side::Cloud => write!(f, "cloud"),
        }
    }
}

/// How one key differs between a current snapshot and the cached one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChangeFlag {
    NoChange,
    Changed,
    Deleted,
    Created,
}

impl ChangeFlag {
    pub const ALL: [ChangeFlag; 4] = [
        ChangeFlag::NoChange,
        ChangeFlag::Changed,
        ChangeFlag::Deleted,
        ChangeFlag::Created,
    ];

    /// True when the record still exists on this side.
    pub fn is_present(self) -> bool {
        !matches!(self, ChangeFlag::Deleted)
    }
}

impl fmt::Display for ChangeFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeFlag::NoChange => write!(f, "no-change"),
            ChangeFlag::Changed => write!(f, "changed"),
            ChangeFlag::Deleted => write!(f, "deleted"),
            ChangeFlag::Created => write!(f, "created"),
        }
    }
}

/// Corrective operation chosen for a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncAction {
    /// Both sides diverged; last writer by timestamp wins.
    Conflict,
    /// Cloud has a record the local side has never seen.
    ClientDownload,
    /// Cloud deleted the record; drop it locally.
    ClientDelete,
    /// Local has a record the cloud has never seen.
    ClientUpload,
    /// Local deleted the record; drop it from the cloud.
    ServerDelete,
    /// Local changed, cloud did not; overwrite cloud.
    OverrideUpload,
    /// Cloud changed, local did not; overwrite local.
    OverrideDownload,
}

impl SyncAction {
    pub const ALL: [SyncAction; 7] = [
        SyncAction::Conflict,
        SyncAction::ClientDownload,
        SyncAction::ClientDelete,
        SyncAction::ClientUpload,
        SyncAction::ServerDelete,
        SyncAction::OverrideUpload,
        SyncAction::OverrideDownload,
    ];

    /// True for actions whose outcome is the record being gone on both sides.
    pub fn is_delete(self) -> bool {
        matches!(self, SyncAction::ClientDelete | SyncAction::ServerDelete)
    }
}

impl fmt::Display for SyncAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SyncAction::Conflict => "conflict",
            SyncAction::ClientDownload => "client-download",
            SyncAction::ClientDelete => "client-delete",
            SyncAction::ClientUpload => "client-upload",
            SyncAction::ServerDelete => "server-delete",
            SyncAction::OverrideUpload => "override-upload",
            SyncAction::OverrideDownload => "override-download",
        };
        f.write_str(label)
    }
}

/// Lifecycle of one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum TaskState {
    #[default]
    Pending,
    Resolving,
    Success,
    NetworkError,
    /// Reserved for collaborators that detect malformed cached data.
    LocalDataError,
    /// Reserved for collaborators that fail to decode a record.
    DecodeError,
}

impl TaskState {
    /// `Success` and `Resolving` tasks are skipped on re-entry.
    pub fn is_claimed(self) -> bool {
        matches!(self, TaskState::Success | TaskState::Resolving)
    }

    pub fn is_failure(self) -> bool {
        matches!(
            self,
            TaskState::NetworkError | TaskState::LocalDataError | TaskState::DecodeError
        )
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TaskState::Pending => "pending",
            TaskState::Resolving => "resolving",
            TaskState::Success => "success",
            TaskState::NetworkError => "network-error",
            TaskState::LocalDataError => "local-data-error",
            TaskState::DecodeError => "decode-error",
        };
        f.write_str(label)
    }
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

/// One unit of reconciliation work for a single key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDetail {
    pub id: String,
    pub state: TaskState,
    pub local_abstract: Option<AbstractInfo>,
    pub cloud_abstract: Option<AbstractInfo>,
    pub action_type: SyncAction,
}

impl TaskDetail {
    pub fn pending(
        id: impl Into<String>,
        action_type: SyncAction,
        local_abstract: Option<AbstractInfo>,
        cloud_abstract: Option<AbstractInfo>,
    ) -> Self {
        Self {
            id: id.into(),
            state: TaskState::Pending,
            local_abstract,
            cloud_abstract,
            action_type,
        }
    }
}

/// Per-key change flags produced by the differ.
pub type ChangeMap = BTreeMap<String, ChangeFlag>;

/// Tasks for one cycle, keyed by record key.
pub type SyncTaskMap = BTreeMap<String, TaskDetail>;

/// Diff of one side: its change flags plus the snapshot they were computed from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotDiff {
    pub change_map: ChangeMap,
    pub latest_snapshot: Snapshot,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
