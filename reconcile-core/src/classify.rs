//! Action classifier: turns a local diff and a cloud diff into sync tasks.
//!
//! Classification runs in three passes over working copies of the two change
//! maps. Pass 1 consumes every key flagged on both sides; whatever is left
//! belongs to exactly one side and is handled by passes 2 and 3.

use crate::compare::is_same;
use crate::types::{ChangeFlag, SnapshotDiff, SyncAction, SyncTaskMap, TaskDetail};

/// The combination table a `(local, cloud)` flag pair belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combination {
    /// Both sides carry data that may disagree.
    Conflict,
    /// Only the cloud moved.
    Download,
    /// Cloud deleted; local still has it.
    ClientDelete,
    /// Only the local side moved.
    ClientUpload,
    /// Local deleted; cloud still has it.
    ServerDelete,
    /// Deleted on both sides.
    NoAction,
}

impl Combination {
    /// Map a flag pair to its combination table.
    pub fn of(local: ChangeFlag, cloud: ChangeFlag) -> Self {
        use ChangeFlag::{Changed, Created, Deleted, NoChange};

        match (local, cloud) {
            (NoChange, NoChange)
            | (Changed, Changed)
            | (Changed, Created)
            | (Created, Changed)
            | (Created, Created) => Combination::Conflict,
            (NoChange, Changed) | (NoChange, Created) => Combination::Download,
            (NoChange, Deleted) | (Changed, Deleted) | (Created, Deleted) => {
                Combination::ClientDelete
            }
            (Changed, NoChange) | (Created, NoChange) => Combination::ClientUpload,
            (Deleted, NoChange) | (Deleted, Changed) | (Deleted, Created) => {
                Combination::ServerDelete
            }
            (Deleted, Deleted) => Combination::NoAction,
        }
    }

    /// Action for this combination. `same` reports whether the two current
    /// abstracts already agree; it is only consulted by guarded tables.
    pub fn action(self, same: impl FnOnce() -> bool) -> Option<SyncAction> {
        match self {
            Combination::Conflict => (!same()).then_some(SyncAction::Conflict),
            Combination::Download => (!same()).then_some(SyncAction::OverrideDownload),
            Combination::ClientUpload => (!same()).then_some(SyncAction::OverrideUpload),
            Combination::ClientDelete => Some(SyncAction::ClientDelete),
            Combination::ServerDelete => Some(SyncAction::ServerDelete),
            Combination::NoAction => None,
        }
    }
}

/// Compute the task map for one cycle.
///
/// Both diffs are consumed. Every produced task starts `Pending` and carries
/// the abstract of each side that still has the record.
pub fn compute_sync_task(local: SnapshotDiff, cloud: SnapshotDiff) -> SyncTaskMap {
    let SnapshotDiff {
        change_map: mut local_remaining,
        latest_snapshot: local_latest,
    } = local;
    let SnapshotDiff {
        change_map: mut cloud_remaining,
        latest_snapshot: cloud_latest,
    } = cloud;

    let mut tasks = SyncTaskMap::new();

    // Pass 1: keys flagged on both sides.
    let shared: Vec<String> = local_remaining
        .keys()
        .filter(|key| cloud_remaining.contains_key(*key))
        .cloned()
        .collect();
    for key in shared {
        let (Some(local_flag), Some(cloud_flag)) =
            (local_remaining.remove(&key), cloud_remaining.remove(&key))
        else {
            continue;
        };
        let local_info = local_latest.get(&key);
        let cloud_info = cloud_latest.get(&key);

        let action =
            Combination::of(local_flag, cloud_flag).action(|| is_same(local_info, cloud_info));
        if let Some(action) = action {
            tasks.insert(
                key.clone(),
                TaskDetail::pending(key, action, local_info.cloned(), cloud_info.cloned()),
            );
        }
    }

    // Pass 2: the cloud has no record of these keys at all.
    for (key, flag) in local_remaining {
        if flag.is_present() {
            let task = TaskDetail::pending(
                key.clone(),
                SyncAction::ClientUpload,
                local_latest.get(&key).cloned(),
                cloud_latest.get(&key).cloned(),
            );
            tasks.insert(key, task);
        }
    }

    // Pass 3: the local side has no record of these keys at all.
    for (key, flag) in cloud_remaining {
        if flag.is_present() {
            let task = TaskDetail::pending(
                key.clone(),
                SyncAction::ClientDownload,
                local_latest.get(&key).cloned(),
                cloud_latest.get(&key).cloned(),
            );
            tasks.insert(key, task);
        }
    }

    tasks
}
