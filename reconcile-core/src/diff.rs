//! Snapshot differ.

use crate::compare::is_same;
use crate::types::{ChangeFlag, ChangeMap, Snapshot};

/// Classify every key of `current ∪ old` with exactly one [`ChangeFlag`].
///
/// Keys only in `current` are `Created`, keys only in `old` are `Deleted`,
/// and shared keys are `NoChange` or `Changed` according to [`is_same`].
pub fn diff_snapshot(current: &Snapshot, old: &Snapshot) -> ChangeMap {
    let mut result = ChangeMap::new();

    for (key, info) in current {
        let flag = match old.get(key) {
            None => ChangeFlag::Created,
            Some(previous) if is_same(Some(info), Some(previous)) => ChangeFlag::NoChange,
            Some(_) => ChangeFlag::Changed,
        };
        result.insert(key.clone(), flag);
    }

    for key in old.keys() {
        if !current.contains_key(key) {
            result.insert(key.clone(), ChangeFlag::Deleted);
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::types::AbstractInfo;

    fn snapshot(entries: &[(&str, i64)]) -> Snapshot {
        entries
            .iter()
            .map(|(key, at)| (key.to_string(), AbstractInfo::new(*key, *at)))
            .collect()
    }

    #[test]
    fn flags_each_kind_of_difference() {
        let current = snapshot(&[("same", 1), ("edited", 3), ("new", 1)]);
        let old = snapshot(&[("same", 1), ("edited", 2), ("gone", 1)]);

        let diff = diff_snapshot(&current, &old);
        assert_eq!(diff["same"], ChangeFlag::NoChange);
        assert_eq!(diff["edited"], ChangeFlag::Changed);
        assert_eq!(diff["new"], ChangeFlag::Created);
        assert_eq!(diff["gone"], ChangeFlag::Deleted);
    }

    #[test]
    fn covers_every_key_of_both_snapshots_once() {
        let current = snapshot(&[("a", 1), ("b", 2), ("c", 3)]);
        let old = snapshot(&[("b", 2), ("c", 4), ("d", 5), ("e", 6)]);

        let diff = diff_snapshot(&current, &old);
        let expected: BTreeSet<&str> = ["a", "b", "c", "d", "e"].into_iter().collect();
        let actual: BTreeSet<&str> = diff.keys().map(String::as_str).collect();
        assert_eq!(actual, expected);
        assert_eq!(diff.len(), expected.len());
    }

    #[test]
    fn diff_against_itself_is_all_no_change() {
        let x = snapshot(&[("a", 1), ("b", 2), ("c", 3)]);
        let diff = diff_snapshot(&x, &x);
        assert!(diff.values().all(|flag| *flag == ChangeFlag::NoChange));
    }

    #[test]
    fn empty_old_marks_everything_created() {
        let current = snapshot(&[("a", 1), ("b", 2)]);
        let diff = diff_snapshot(&current, &Snapshot::new());
        assert!(diff.values().all(|flag| *flag == ChangeFlag::Created));
    }
}
