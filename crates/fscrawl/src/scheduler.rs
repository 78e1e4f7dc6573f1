//! Scan scheduling: one dedicated thread per job, one cycle per tick.
//!
//! Cycles for one job never overlap; the loop runs a cycle, then waits on
//! the shutdown channel with the update rate as timeout, so a stop request
//! lands promptly between cycles and the cancellation token interrupts a
//! long cycle at document granularity.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, RecvTimeoutError, Sender};

use filestore::{
    unix_now_secs, walk, CancellationToken, FileRecord, FileStore, FileStoreError, PathFilter,
    WalkOptions,
};

use crate::config::Settings;
use crate::diff::{detect_changes, ChangeKind};
use crate::doc::{build_document, doc_id};
use crate::error::{CrawlerError, Result};
use crate::extract::ContentExtractor;
use crate::listener::IndexingListener;
use crate::state::{JobSnapshot, JobStateStore};

/// Job lifecycle state.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
#[repr(u8)]
pub enum JobState {
    Idle = 0,
    Scanning = 1,
    Stopped = 2,
}

impl JobState {
    /// Loads the state from an atomic.
    pub fn load(atomic: &AtomicU8) -> Self {
        match atomic.load(Ordering::Relaxed) {
            1 => Self::Scanning,
            2 => Self::Stopped,
            _ => Self::Idle,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Scanning => "scanning",
            Self::Stopped => "stopped",
        }
    }
}

/// Counters for one scan cycle.
#[derive(Debug, Default, Clone, Copy)]
pub struct CycleStats {
    pub added: usize,
    pub modified: usize,
    pub removed: usize,
    /// Documents successfully handed to the listener.
    pub indexed: usize,
    /// Documents skipped this cycle (read or extraction failure); they
    /// are left out of the snapshot and retried next cycle.
    pub skipped: usize,
    /// True when a stop request interrupted the cycle; the snapshot was
    /// not saved.
    pub cancelled: bool,
}

/// Runs scan cycles for one job. Owns the job's store, snapshot, and
/// listener; [`ScanScheduler`] drives it on a dedicated thread, tests
/// drive [`CrawlWorker::run_cycle`] directly.
pub struct CrawlWorker {
    settings: Settings,
    index: String,
    store: Box<dyn FileStore>,
    state_store: JobStateStore,
    listener: Arc<dyn IndexingListener>,
    extractor: Arc<dyn ContentExtractor>,
    walk_options: WalkOptions,
    cancel: CancellationToken,
    snapshot: JobSnapshot,
}

impl CrawlWorker {
    /// Builds a worker and loads the job's snapshot. An unreadable
    /// snapshot is surfaced as a warning and the job starts from an empty
    /// one (full re-index) rather than refusing to run.
    pub fn new(
        settings: Settings,
        store: Box<dyn FileStore>,
        state_store: JobStateStore,
        listener: Arc<dyn IndexingListener>,
        extractor: Arc<dyn ContentExtractor>,
    ) -> Result<Self> {
        let filter = PathFilter::new(&settings.fs.includes, &settings.fs.excludes)
            .map_err(|error| CrawlerError::Config(format!("invalid filter pattern: {error}")))?;
        let walk_options = WalkOptions {
            filter,
            max_depth: settings.fs.max_depth,
        };

        let snapshot = match state_store.load(&settings.name) {
            Ok(snapshot) => snapshot,
            Err(error) => {
                tracing::warn!(job = %settings.name, %error, "snapshot unreadable, starting empty");
                JobSnapshot::empty(&settings.name)
            }
        };

        let index = settings.index().to_string();
        Ok(Self {
            settings,
            index,
            store,
            state_store,
            listener,
            extractor,
            walk_options,
            cancel: CancellationToken::new(),
            snapshot,
        })
    }

    pub fn job_name(&self) -> &str {
        &self.settings.name
    }

    /// Token checked between documents; cancelling it interrupts an
    /// in-flight cycle promptly.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// One complete traversal-diff-index pass.
    ///
    /// Per-document failures are counted and skipped; a store-level
    /// failure aborts the rest of the cycle (snapshot unsaved) and the
    /// error propagates so the scheduler retries on the next tick from a
    /// fresh `open()`.
    pub fn run_cycle(&mut self) -> Result<CycleStats> {
        let cycle_start = unix_now_secs();
        let job = self.settings.name.clone();

        self.store.open()?;
        match self.store.exists(&self.settings.fs.url) {
            Ok(true) => {}
            Ok(false) => {
                self.store.close();
                return Err(CrawlerError::Store(FileStoreError::list(
                    &self.settings.fs.url,
                    "root does not exist",
                )));
            }
            Err(error) => {
                self.store.close();
                return Err(error.into());
            }
        }
        let outcome = match walk(
            self.store.as_mut(),
            &self.settings.fs.url,
            &self.walk_options,
            &self.cancel,
        ) {
            Ok(outcome) => outcome,
            Err(error) => {
                self.store.close();
                return Err(error.into());
            }
        };

        let mut stats = CycleStats::default();
        if outcome.cancelled {
            self.store.close();
            stats.cancelled = true;
            return Ok(stats);
        }

        let changes = detect_changes(
            &self.snapshot.files,
            &outcome.records,
            self.settings.fs.remove_deleted,
        );

        // The next snapshot starts as the full current listing; paths
        // that fail to index are dropped below so the following cycle
        // re-detects them as added.
        let mut new_files: BTreeMap<String, FileRecord> = outcome
            .records
            .into_iter()
            .map(|record| (record.path.clone(), record))
            .collect();

        for change in changes {
            if self.cancel.is_cancelled() {
                stats.cancelled = true;
                break;
            }
            match change.kind {
                ChangeKind::Added | ChangeKind::Modified => {
                    if change.kind == ChangeKind::Added {
                        stats.added += 1;
                    } else {
                        stats.modified += 1;
                    }
                    let Some(record) = change.record else {
                        continue;
                    };
                    match self.index_document(&record) {
                        Ok(()) => stats.indexed += 1,
                        Err(CrawlerError::Store(error)) if error.is_connection() => {
                            self.store.close();
                            return Err(CrawlerError::Store(error));
                        }
                        Err(error) => {
                            tracing::warn!(job = %job, path = %change.path, %error, "document skipped this cycle");
                            stats.skipped += 1;
                            new_files.remove(&change.path);
                        }
                    }
                }
                ChangeKind::Removed => {
                    self.listener.on_delete(&self.index, &doc_id(&change.path));
                    stats.removed += 1;
                }
            }
        }

        self.store.close();

        if !stats.cancelled {
            let snapshot = JobSnapshot {
                job_name: job.clone(),
                last_run: cycle_start,
                files: new_files,
            };
            if let Err(error) = self.state_store.save(&snapshot) {
                // The previous on-disk snapshot is intact; keep the new
                // state in memory so subsequent cycles stay incremental.
                tracing::warn!(job = %job, %error, "snapshot save failed");
            }
            self.snapshot = snapshot;
        }

        Ok(stats)
    }

    fn index_document(&mut self, record: &FileRecord) -> Result<()> {
        let mut reader = self.store.read(record)?;
        let max_chars = self
            .settings
            .fs
            .indexed_chars
            .as_ref()
            .map(|chars| chars.limit_for(record.size));
        let hint = self.settings.fs.content_type.as_deref();
        let extracted = self
            .extractor
            .extract(&record.path, reader.as_mut(), hint, max_chars)?;
        let body = build_document(record, &extracted, hint, unix_now_secs());
        self.listener.on_index(&self.index, &doc_id(&record.path), body);
        Ok(())
    }
}

/// Drives a [`CrawlWorker`] on its own thread, one cycle per update-rate
/// tick, until stopped.
pub struct ScanScheduler {
    job_name: String,
    state: Arc<AtomicU8>,
    cancel: CancellationToken,
    shutdown_tx: Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl ScanScheduler {
    pub fn spawn(mut worker: CrawlWorker, update_rate: Duration) -> Self {
        let job_name = worker.job_name().to_string();
        let state = Arc::new(AtomicU8::new(JobState::Idle as u8));
        let cancel = worker.cancellation_token();
        let (shutdown_tx, shutdown_rx) = unbounded::<()>();

        let thread_state = state.clone();
        let thread_job = job_name.clone();
        let handle = thread::spawn(move || {
            loop {
                thread_state.store(JobState::Scanning as u8, Ordering::Relaxed);
                let started = Instant::now();
                match worker.run_cycle() {
                    Ok(stats) if stats.cancelled => {
                        tracing::debug!(job = %thread_job, "scan cycle interrupted by stop request");
                    }
                    Ok(stats) => {
                        tracing::info!(
                            job = %thread_job,
                            added = stats.added,
                            modified = stats.modified,
                            removed = stats.removed,
                            indexed = stats.indexed,
                            skipped = stats.skipped,
                            elapsed_ms = started.elapsed().as_millis() as u64,
                            "scan cycle complete"
                        );
                    }
                    Err(error) => {
                        tracing::warn!(job = %thread_job, %error, "scan cycle failed, retrying next tick");
                    }
                }
                thread_state.store(JobState::Idle as u8, Ordering::Relaxed);

                tracing::debug!(job = %thread_job, secs = update_rate.as_secs(), "sleeping until next scan");
                match shutdown_rx.recv_timeout(update_rate) {
                    Err(RecvTimeoutError::Timeout) => continue,
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            thread_state.store(JobState::Stopped as u8, Ordering::Relaxed);
        });

        Self {
            job_name,
            state,
            cancel,
            shutdown_tx,
            handle: Some(handle),
        }
    }

    pub fn job_name(&self) -> &str {
        &self.job_name
    }

    pub fn state(&self) -> JobState {
        JobState::load(&self.state)
    }

    /// Requests a prompt stop and waits for the job thread to finish. An
    /// in-flight network call completes on its own terms. Idempotent.
    pub fn stop(&mut self) {
        self.cancel.cancel();
        let _ = self.shutdown_tx.send(());
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::warn!(job = %self.job_name, "job thread panicked");
            }
        }
    }
}

impl Drop for ScanScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
