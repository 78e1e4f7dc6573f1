//! Change detection between the persisted snapshot and a fresh listing.

use std::collections::{BTreeMap, HashSet};

use filestore::FileRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Modified,
    Removed,
}

/// One detected difference. Produced and consumed within a single scan
/// cycle, never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct Change {
    pub kind: ChangeKind,
    pub path: String,
    /// The current record; absent for `Removed`, where the path alone is
    /// the deletion key.
    pub record: Option<FileRecord>,
}

/// Diffs `current` against `previous`.
///
/// A path only in `current` is `Added`. A path in both is `Modified` when
/// the size differs or the listing's timestamp is strictly newer; equal
/// size and timestamp means no change, so a content edit that preserves
/// both goes undetected by design. A path only in `previous` is `Removed`,
/// emitted only when `remove_deleted` is set; otherwise it silently leaves
/// tracking. Directories never produce changes.
///
/// Output order is discovery order: `current` in listing order, then
/// removals in snapshot order.
pub fn detect_changes(
    previous: &BTreeMap<String, FileRecord>,
    current: &[FileRecord],
    remove_deleted: bool,
) -> Vec<Change> {
    let mut changes = Vec::new();
    let mut seen: HashSet<&str> = HashSet::with_capacity(current.len());

    for record in current {
        if record.is_directory {
            continue;
        }
        seen.insert(record.path.as_str());
        match previous.get(&record.path) {
            None => changes.push(Change {
                kind: ChangeKind::Added,
                path: record.path.clone(),
                record: Some(record.clone()),
            }),
            Some(known) => {
                if record.size != known.size || record.last_modified > known.last_modified {
                    changes.push(Change {
                        kind: ChangeKind::Modified,
                        path: record.path.clone(),
                        record: Some(record.clone()),
                    });
                }
            }
        }
    }

    if remove_deleted {
        for path in previous.keys() {
            if !seen.contains(path.as_str()) {
                changes.push(Change {
                    kind: ChangeKind::Removed,
                    path: path.clone(),
                    record: None,
                });
            }
        }
    }

    changes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(path: &str, size: u64, modified: u64) -> FileRecord {
        FileRecord {
            path: path.to_string(),
            name: path.rsplit('/').next().unwrap_or(path).to_string(),
            is_directory: false,
            size,
            last_modified: modified,
            owner: None,
            group: None,
        }
    }

    fn previous(records: &[FileRecord]) -> BTreeMap<String, FileRecord> {
        records
            .iter()
            .map(|r| (r.path.clone(), r.clone()))
            .collect()
    }

    fn kinds(changes: &[Change]) -> Vec<(ChangeKind, &str)> {
        changes
            .iter()
            .map(|c| (c.kind, c.path.as_str()))
            .collect()
    }

    #[test]
    fn first_scan_is_all_added() {
        let current = vec![record("/a.txt", 1, 10), record("/b.txt", 2, 10)];
        let changes = detect_changes(&BTreeMap::new(), &current, true);
        assert_eq!(
            kinds(&changes),
            vec![(ChangeKind::Added, "/a.txt"), (ChangeKind::Added, "/b.txt")]
        );
    }

    #[test]
    fn rescan_with_no_change_is_empty() {
        let current = vec![record("/a.txt", 1, 10), record("/b.txt", 2, 10)];
        let changes = detect_changes(&previous(&current), &current, true);
        assert!(changes.is_empty());
    }

    #[test]
    fn size_change_is_modified() {
        let prev = previous(&[record("/a.txt", 1, 10)]);
        let changes = detect_changes(&prev, &[record("/a.txt", 5, 10)], true);
        assert_eq!(kinds(&changes), vec![(ChangeKind::Modified, "/a.txt")]);
    }

    #[test]
    fn newer_timestamp_is_modified() {
        let prev = previous(&[record("/a.txt", 1, 10)]);
        let changes = detect_changes(&prev, &[record("/a.txt", 1, 11)], true);
        assert_eq!(kinds(&changes), vec![(ChangeKind::Modified, "/a.txt")]);
    }

    #[test]
    fn older_timestamp_is_not_modified() {
        // Equal size with a timestamp that went backwards: the comparison
        // is strictly-newer, so nothing is emitted.
        let prev = previous(&[record("/a.txt", 1, 10)]);
        let changes = detect_changes(&prev, &[record("/a.txt", 1, 9)], true);
        assert!(changes.is_empty());
    }

    #[test]
    fn vanished_path_is_removed_when_policy_enabled() {
        let prev = previous(&[record("/a.txt", 1, 10), record("/b.txt", 2, 10)]);
        let changes = detect_changes(&prev, &[record("/b.txt", 2, 10)], true);
        assert_eq!(kinds(&changes), vec![(ChangeKind::Removed, "/a.txt")]);
        assert!(changes[0].record.is_none());
    }

    #[test]
    fn vanished_path_is_dropped_silently_when_policy_disabled() {
        let prev = previous(&[record("/a.txt", 1, 10)]);
        let changes = detect_changes(&prev, &[], false);
        assert!(changes.is_empty());
    }

    #[test]
    fn directories_never_produce_changes() {
        let mut dir = record("/sub", 0, 10);
        dir.is_directory = true;
        let changes = detect_changes(&BTreeMap::new(), &[dir], true);
        assert!(changes.is_empty());
    }

    #[test]
    fn additions_precede_removals_in_discovery_order() {
        let prev = previous(&[record("/old.txt", 1, 10)]);
        let current = vec![record("/new.txt", 1, 20)];
        let changes = detect_changes(&prev, &current, true);
        assert_eq!(
            kinds(&changes),
            vec![
                (ChangeKind::Added, "/new.txt"),
                (ChangeKind::Removed, "/old.txt")
            ]
        );
    }
}
