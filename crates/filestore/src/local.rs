//! Local filesystem store.

use std::fs;
use std::io::{ErrorKind, Read};
use std::path::Path;

use crate::error::{FileStoreError, Result};
use crate::record::{system_time_secs, FileRecord};
use crate::store::{join_path, FileStore};

/// Store over the local disk. `open`/`close` are no-ops since there is no
/// session to establish.
#[derive(Debug, Default)]
pub struct LocalFileStore;

impl LocalFileStore {
    pub fn new() -> Self {
        Self
    }

    fn record_for(&self, logical_path: String, name: String, meta: &fs::Metadata) -> FileRecord {
        FileRecord {
            path: logical_path,
            name,
            is_directory: meta.is_dir(),
            size: if meta.is_dir() { 0 } else { meta.len() },
            last_modified: meta.modified().map(system_time_secs).unwrap_or(0),
            owner: owner_of(meta),
            group: group_of(meta),
        }
    }
}

impl FileStore for LocalFileStore {
    fn open(&mut self) -> Result<()> {
        Ok(())
    }

    fn close(&mut self) {}

    fn list(&mut self, path: &str) -> Result<Vec<FileRecord>> {
        let entries = fs::read_dir(path).map_err(|error| FileStoreError::list(path, error))?;

        let mut records = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|error| FileStoreError::list(path, error))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            // Follow symlinks so a link to a directory is traversable; a
            // dangling link is skipped like a vanished file.
            let meta = match fs::metadata(entry.path()) {
                Ok(meta) => meta,
                Err(error) => {
                    tracing::debug!(path = %entry.path().display(), %error, "skipping unreadable entry");
                    continue;
                }
            };
            records.push(self.record_for(join_path(path, &name), name, &meta));
        }

        records.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(records)
    }

    fn read(&mut self, record: &FileRecord) -> Result<Box<dyn Read + Send>> {
        match fs::File::open(&record.path) {
            Ok(file) => Ok(Box::new(file)),
            Err(error) if error.kind() == ErrorKind::NotFound => {
                Err(FileStoreError::read(&record.path, "file vanished before read"))
            }
            Err(error) => Err(FileStoreError::read(&record.path, error)),
        }
    }

    fn exists(&mut self, path: &str) -> Result<bool> {
        Ok(Path::new(path).exists())
    }

    fn resolve(&mut self, path: &str) -> String {
        fs::canonicalize(path)
            .map(|resolved| resolved.to_string_lossy().into_owned())
            .unwrap_or_else(|_| path.to_string())
    }
}

#[cfg(unix)]
fn owner_of(meta: &fs::Metadata) -> Option<String> {
    use std::os::unix::fs::MetadataExt;
    Some(meta.uid().to_string())
}

#[cfg(unix)]
fn group_of(meta: &fs::Metadata) -> Option<String> {
    use std::os::unix::fs::MetadataExt;
    Some(meta.gid().to_string())
}

#[cfg(not(unix))]
fn owner_of(_meta: &fs::Metadata) -> Option<String> {
    None
}

#[cfg(not(unix))]
fn group_of(_meta: &fs::Metadata) -> Option<String> {
    None
}
