//! The normalized description of one filesystem entry.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// One filesystem entry as reported by a [`crate::FileStore`].
///
/// Immutable value object, copied freely between components. `path` is the
/// unique key for change detection within one scan root: a rename shows up
/// as a removal of the old path plus an addition of the new one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Absolute logical path, in the protocol's own namespace.
    pub path: String,
    /// Last path segment.
    pub name: String,
    /// Directories are traversed but never indexed.
    pub is_directory: bool,
    /// Byte length. Meaningless for directories.
    pub size: u64,
    /// Modification time, Unix seconds.
    pub last_modified: u64,
    /// Owning user, when the protocol exposes it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    /// Owning group, when the protocol exposes it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
}

/// Returns the current Unix timestamp in seconds.
pub fn unix_now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|value| value.as_secs())
        .unwrap_or(0)
}

/// Converts a `SystemTime` to Unix seconds, clamping pre-epoch times to 0.
pub fn system_time_secs(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|value| value.as_secs())
        .unwrap_or(0)
}
