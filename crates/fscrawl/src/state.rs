//! Per-job snapshot persistence.
//!
//! One JSON file per job under the metadata directory, rewritten wholesale
//! after each successful scan. Writes go to a temp file followed by an
//! atomic rename, so a crash mid-save leaves either the old snapshot or
//! the new one on disk, never a torn file.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use filestore::FileRecord;

use crate::error::{CrawlerError, Result};

/// Snapshot format version - increment when changing the layout.
pub const SNAPSHOT_VERSION: u32 = 1;

/// File state as of the last completed scan of one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub job_name: String,
    /// Unix seconds at which the previous completed scan started.
    pub last_run: u64,
    /// Non-directory records keyed by path.
    pub files: BTreeMap<String, FileRecord>,
}

impl JobSnapshot {
    /// The starting point for a job that has never run.
    pub fn empty(job_name: &str) -> Self {
        Self {
            job_name: job_name.to_string(),
            last_run: 0,
            files: BTreeMap::new(),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct PersistedSnapshot {
    version: u32,
    #[serde(flatten)]
    snapshot: JobSnapshot,
}

/// Loads and saves [`JobSnapshot`]s, one file per job name.
#[derive(Debug, Clone)]
pub struct JobStateStore {
    dir: PathBuf,
}

impl JobStateStore {
    pub fn new(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir).map_err(|error| {
            CrawlerError::Persistence(format!(
                "failed to create metadata directory {}: {error}",
                dir.display()
            ))
        })?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    pub fn snapshot_path(&self, job_name: &str) -> PathBuf {
        self.dir.join(format!("{job_name}.json"))
    }

    /// Returns the persisted snapshot, or an empty one when the job has
    /// never run. A snapshot from an older format version is discarded
    /// with a warning (the next scan rebuilds it); an unreadable file is a
    /// persistence error for the caller to surface.
    pub fn load(&self, job_name: &str) -> Result<JobSnapshot> {
        let path = self.snapshot_path(job_name);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(error) if error.kind() == ErrorKind::NotFound => {
                return Ok(JobSnapshot::empty(job_name));
            }
            Err(error) => {
                return Err(CrawlerError::Persistence(format!(
                    "failed to read snapshot {}: {error}",
                    path.display()
                )));
            }
        };

        let persisted: PersistedSnapshot = serde_json::from_slice(&bytes).map_err(|error| {
            CrawlerError::Persistence(format!(
                "failed to decode snapshot {}: {error}",
                path.display()
            ))
        })?;

        if persisted.version != SNAPSHOT_VERSION {
            tracing::warn!(
                job = job_name,
                found = persisted.version,
                expected = SNAPSHOT_VERSION,
                "snapshot version mismatch, starting from an empty snapshot"
            );
            return Ok(JobSnapshot::empty(job_name));
        }

        tracing::debug!(
            job = job_name,
            files = persisted.snapshot.files.len(),
            "loaded snapshot"
        );
        Ok(persisted.snapshot)
    }

    /// Atomically replaces the job's snapshot. A failed save leaves the
    /// previously persisted snapshot intact.
    pub fn save(&self, snapshot: &JobSnapshot) -> Result<()> {
        let path = self.snapshot_path(&snapshot.job_name);
        let tmp_path = path.with_extension("json.tmp");

        let persisted = PersistedSnapshot {
            version: SNAPSHOT_VERSION,
            snapshot: snapshot.clone(),
        };
        let encoded = serde_json::to_vec_pretty(&persisted).map_err(|error| {
            CrawlerError::Persistence(format!("failed to encode snapshot: {error}"))
        })?;

        fs::write(&tmp_path, encoded).map_err(|error| {
            CrawlerError::Persistence(format!(
                "failed to write snapshot file {}: {error}",
                tmp_path.display()
            ))
        })?;

        // Atomic rename
        fs::rename(&tmp_path, &path).map_err(|error| {
            CrawlerError::Persistence(format!(
                "failed to finalize snapshot file {}: {error}",
                path.display()
            ))
        })?;

        tracing::debug!(
            job = %snapshot.job_name,
            files = snapshot.files.len(),
            "saved snapshot"
        );
        Ok(())
    }
}
