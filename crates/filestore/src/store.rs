//! The protocol capability set every store implements.

use std::io::Read;

use crate::error::Result;
use crate::record::FileRecord;

/// Uniform access to a tree of documents over one transport protocol.
///
/// The variant is selected at job construction time from configuration;
/// callers only ever see `dyn FileStore`. Sessions are stateful (FTP and
/// SFTP keep a live connection), hence `&mut self` throughout.
pub trait FileStore: Send {
    /// Establishes the transport session. Fails with
    /// [`FileStoreError::Connection`](crate::FileStoreError::Connection) on
    /// authentication or network failure.
    fn open(&mut self) -> Result<()>;

    /// Releases the session. Safe to call even if `open` partially failed;
    /// errors are logged, not propagated.
    fn close(&mut self);

    /// Enumerates the direct children of `path`, excluding the `.`/`..`
    /// pseudo-entries. Non-recursive; [`crate::walk`] does the recursion.
    fn list(&mut self, path: &str) -> Result<Vec<FileRecord>>;

    /// Opens a single-pass byte stream over the record's content. Fails
    /// with [`FileStoreError::Read`](crate::FileStoreError::Read) if the
    /// file vanished between listing and read; callers treat that as "file
    /// removed" and continue the scan.
    fn read(&mut self, record: &FileRecord) -> Result<Box<dyn Read + Send>>;

    /// True when `path` exists. Never errors for a missing path, only for
    /// a broken session.
    fn exists(&mut self, path: &str) -> Result<bool>;

    /// Canonical form of `path` where the protocol supports resolution
    /// (local disk, SFTP realpath). Used by the traversal's symlink-loop
    /// guard; the default identity is correct for protocols without links.
    fn resolve(&mut self, path: &str) -> String {
        path.to_string()
    }
}

/// Joins a child name onto a logical directory path.
pub fn join_path(parent: &str, name: &str) -> String {
    if parent.ends_with('/') {
        format!("{parent}{name}")
    } else {
        format!("{parent}/{name}")
    }
}
