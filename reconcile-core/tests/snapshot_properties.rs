//! Differ and classifier properties over hand-built snapshot pairs.

use std::collections::BTreeSet;

use reconcile_core::{
    compute_sync_task, diff_snapshot, AbstractInfo, ChangeFlag, Snapshot, SnapshotDiff,
    SyncAction,
};
use rstest::rstest;

fn snapshot(entries: &[(&str, i64)]) -> Snapshot {
    entries
        .iter()
        .map(|(key, at)| (key.to_string(), AbstractInfo::new(*key, *at)))
        .collect()
}

fn side(current: &Snapshot, old: &Snapshot) -> SnapshotDiff {
    SnapshotDiff {
        change_map: diff_snapshot(current, old),
        latest_snapshot: current.clone(),
    }
}

#[rstest]
#[case(&[], &[])]
#[case(&[("a", 1)], &[])]
#[case(&[], &[("a", 1)])]
#[case(&[("a", 1), ("b", 2)], &[("b", 3), ("c", 4)])]
#[case(&[("a", 1), ("b", 2), ("c", 3)], &[("a", 1), ("b", 2), ("c", 3)])]
fn diff_covers_union_exactly_once(#[case] current: &[(&str, i64)], #[case] old: &[(&str, i64)]) {
    let current = snapshot(current);
    let old = snapshot(old);
    let diff = diff_snapshot(&current, &old);

    let union: BTreeSet<&String> = current.keys().chain(old.keys()).collect();
    assert_eq!(diff.len(), union.len());
    assert!(union.iter().all(|key| diff.contains_key(*key)));
}

#[test]
fn etag_match_keeps_key_unchanged_despite_new_timestamp() {
    let old: Snapshot = [("a".to_string(), AbstractInfo::new("a", 1).with_etag("v1"))].into();
    let current: Snapshot = [("a".to_string(), AbstractInfo::new("a", 2).with_etag("v1"))].into();
    assert_eq!(diff_snapshot(&current, &old)["a"], ChangeFlag::NoChange);
}

#[test]
fn first_sync_against_empty_caches() {
    // Nothing cached on either side yet: every record is "created". Records
    // already identical on both sides need no work; others conflict.
    let empty = Snapshot::new();
    let local = snapshot(&[("both-same", 10), ("both-diff", 20), ("local-only", 30)]);
    let cloud = snapshot(&[("both-same", 10), ("both-diff", 25), ("cloud-only", 40)]);

    let tasks = compute_sync_task(side(&local, &empty), side(&cloud, &empty));

    assert!(!tasks.contains_key("both-same"));
    assert_eq!(tasks["both-diff"].action_type, SyncAction::Conflict);
    assert_eq!(tasks["local-only"].action_type, SyncAction::ClientUpload);
    assert_eq!(tasks["cloud-only"].action_type, SyncAction::ClientDownload);
    assert_eq!(tasks.len(), 3);
}

#[test]
fn steady_state_after_reconcile_needs_no_work() {
    let converged = snapshot(&[("a", 1), ("b", 2)]);
    let tasks = compute_sync_task(side(&converged, &converged), side(&converged, &converged));
    assert!(tasks.is_empty());
}

#[test]
fn one_sided_edits_route_to_override_actions() {
    let cached = snapshot(&[("up", 1), ("down", 1), ("gone-local", 1), ("gone-cloud", 1)]);
    let local = snapshot(&[("up", 2), ("down", 1), ("gone-cloud", 1)]);
    let cloud = snapshot(&[("up", 1), ("down", 3), ("gone-local", 1)]);

    let tasks = compute_sync_task(side(&local, &cached), side(&cloud, &cached));
    assert_eq!(tasks["up"].action_type, SyncAction::OverrideUpload);
    assert_eq!(tasks["down"].action_type, SyncAction::OverrideDownload);
    assert_eq!(tasks["gone-local"].action_type, SyncAction::ServerDelete);
    assert_eq!(tasks["gone-cloud"].action_type, SyncAction::ClientDelete);
}
