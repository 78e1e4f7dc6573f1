use filestore::FileStoreError;

/// Unified error type for the crawler pipeline.
///
/// Store/extraction failures are per-path or per-document and are skipped
/// within a cycle; persistence and backend failures are surfaced to the
/// operator but never fatal to the scheduler.
#[derive(Debug, thiserror::Error)]
pub enum CrawlerError {
    #[error(transparent)]
    Store(#[from] FileStoreError),

    #[error("extraction failed for {path}: {reason}")]
    Extraction { path: String, reason: String },

    #[error("snapshot persistence failed: {0}")]
    Persistence(String),

    #[error("indexing backend error: {0}")]
    Backend(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl CrawlerError {
    pub fn extraction(path: &str, reason: impl std::fmt::Display) -> Self {
        Self::Extraction {
            path: path.to_string(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CrawlerError>;
