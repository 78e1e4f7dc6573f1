//! Recursive tree traversal, implemented once on top of [`FileStore::list`].
//!
//! Only list/read/exists/open/close are protocol-specific; every store gets
//! traversal, filtering, depth limiting and the symlink-loop guard from
//! here. Directories drive recursion but are not returned: the output is
//! the flattened file listing change detection diffs against.

use std::collections::HashSet;

use crate::cancel::CancellationToken;
use crate::error::Result;
use crate::filter::PathFilter;
use crate::record::FileRecord;
use crate::store::FileStore;

#[derive(Debug, Default)]
pub struct WalkOptions {
    pub filter: PathFilter,
    /// Directory descent limit: children of the root are depth 1, a
    /// directory at the limit is listed but not entered. `None` is
    /// unlimited.
    pub max_depth: Option<usize>,
}

/// Outcome of one traversal.
#[derive(Debug, Default)]
pub struct WalkOutcome {
    /// Files in deterministic order: each directory's children sorted by
    /// name, parents before children.
    pub records: Vec<FileRecord>,
    pub scanned_dirs: usize,
    /// Subdirectories whose listing failed and was skipped.
    pub skipped_dirs: usize,
    /// True when the traversal stopped early on a cancellation request;
    /// `records` holds what was gathered up to that point.
    pub cancelled: bool,
}

/// Walks the tree under `root`.
///
/// A listing failure on the root itself is an error (there is nothing to
/// scan); a failure on any subdirectory is counted and skipped, matching
/// the per-path skip-and-continue policy.
pub fn walk(
    store: &mut dyn FileStore,
    root: &str,
    options: &WalkOptions,
    cancel: &CancellationToken,
) -> Result<WalkOutcome> {
    let mut outcome = WalkOutcome::default();
    let mut visited = HashSet::new();
    visited.insert(store.resolve(root));

    let entries = store.list(root)?;
    outcome.scanned_dirs += 1;
    descend(store, entries, 1, options, cancel, &mut visited, &mut outcome);

    tracing::debug!(
        root,
        files = outcome.records.len(),
        dirs = outcome.scanned_dirs,
        skipped = outcome.skipped_dirs,
        cancelled = outcome.cancelled,
        "traversal finished"
    );
    Ok(outcome)
}

fn descend(
    store: &mut dyn FileStore,
    mut entries: Vec<FileRecord>,
    depth: usize,
    options: &WalkOptions,
    cancel: &CancellationToken,
    visited: &mut HashSet<String>,
    outcome: &mut WalkOutcome,
) {
    entries.sort_by(|a, b| a.name.cmp(&b.name));

    for entry in entries {
        if cancel.is_cancelled() {
            outcome.cancelled = true;
            return;
        }

        if entry.is_directory {
            if !options.filter.descends_into(&entry.name) {
                continue;
            }
            if options.max_depth.is_some_and(|limit| depth >= limit) {
                continue;
            }
            // Enter each canonical target at most once per traversal so a
            // symlink cycle cannot loop the walk.
            if !visited.insert(store.resolve(&entry.path)) {
                tracing::debug!(path = %entry.path, "already visited, skipping");
                continue;
            }
            match store.list(&entry.path) {
                Ok(children) => {
                    outcome.scanned_dirs += 1;
                    descend(store, children, depth + 1, options, cancel, visited, outcome);
                    if outcome.cancelled {
                        return;
                    }
                }
                Err(error) if !error.is_connection() => {
                    tracing::warn!(path = %entry.path, %error, "skipping unlistable directory");
                    outcome.skipped_dirs += 1;
                }
                Err(error) => {
                    // Session is gone; no point continuing the traversal.
                    tracing::warn!(path = %entry.path, %error, "traversal aborted");
                    outcome.skipped_dirs += 1;
                    return;
                }
            }
        } else if options.filter.accepts_file(&entry.name) {
            outcome.records.push(entry);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::LocalFileStore;
    use std::fs;
    use std::path::Path;

    fn tree(layout: &[&str]) -> tempfile::TempDir {
        let temp = tempfile::TempDir::new().expect("tempdir");
        for entry in layout {
            let path = temp.path().join(entry.trim_end_matches('/'));
            if entry.ends_with('/') {
                fs::create_dir_all(&path).expect("mkdir");
            } else {
                fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
                fs::write(&path, b"content").expect("write");
            }
        }
        temp
    }

    fn walk_tree(root: &Path, options: &WalkOptions) -> WalkOutcome {
        let mut store = LocalFileStore::new();
        walk(
            &mut store,
            &root.to_string_lossy(),
            options,
            &CancellationToken::new(),
        )
        .expect("walk")
    }

    fn names(outcome: &WalkOutcome) -> Vec<&str> {
        outcome.records.iter().map(|r| r.name.as_str()).collect()
    }

    #[test]
    fn flattens_the_tree_parents_first() {
        let temp = tree(&["b.txt", "a.txt", "sub/c.txt", "sub/inner/d.txt"]);
        let outcome = walk_tree(temp.path(), &WalkOptions::default());
        assert_eq!(names(&outcome), vec!["a.txt", "b.txt", "c.txt", "d.txt"]);
        assert_eq!(outcome.scanned_dirs, 3);
        assert!(!outcome.cancelled);
    }

    #[test]
    fn max_depth_bounds_descent() {
        let temp = tree(&["a.txt", "sub/c.txt", "sub/inner/d.txt"]);
        let options = WalkOptions {
            max_depth: Some(1),
            ..Default::default()
        };
        let outcome = walk_tree(temp.path(), &options);
        assert_eq!(names(&outcome), vec!["a.txt"]);
    }

    #[test]
    fn filters_apply_to_files_not_descent() {
        let temp = tree(&["a.txt", "b.pdf", "sub/c.txt", "skipme/d.txt"]);
        let options = WalkOptions {
            filter: PathFilter::new(&["*.txt".to_string()], &["skipme".to_string()])
                .expect("patterns"),
            max_depth: None,
        };
        let outcome = walk_tree(temp.path(), &options);
        assert_eq!(names(&outcome), vec!["a.txt", "c.txt"]);
    }

    #[test]
    fn missing_root_is_an_error() {
        let mut store = LocalFileStore::new();
        let result = walk(
            &mut store,
            "/definitely/not/here",
            &WalkOptions::default(),
            &CancellationToken::new(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn cancellation_stops_the_walk() {
        let temp = tree(&["a.txt", "b.txt"]);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut store = LocalFileStore::new();
        let outcome = walk(
            &mut store,
            &temp.path().to_string_lossy(),
            &WalkOptions::default(),
            &cancel,
        )
        .expect("walk");
        assert!(outcome.cancelled);
        assert!(outcome.records.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn symlink_cycle_is_entered_at_most_once() {
        let temp = tree(&["sub/a.txt"]);
        std::os::unix::fs::symlink(temp.path(), temp.path().join("sub/loop")).expect("symlink");
        let outcome = walk_tree(temp.path(), &WalkOptions::default());
        // The cycle link resolves to the already-visited root and is skipped.
        assert_eq!(names(&outcome), vec!["a.txt"]);
        assert!(!outcome.cancelled);
    }
}
