use std::io;

/// Errors produced by a [`crate::FileStore`].
///
/// The variants map to how callers must react: `Connection` retries on the
/// next scheduled cycle, `List` and `Read` are per-path and skippable.
#[derive(Debug, thiserror::Error)]
pub enum FileStoreError {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("cannot list {path}: {reason}")]
    List { path: String, reason: String },

    #[error("cannot read {path}: {reason}")]
    Read { path: String, reason: String },
}

impl FileStoreError {
    pub fn list(path: &str, error: impl std::fmt::Display) -> Self {
        Self::List {
            path: path.to_string(),
            reason: error.to_string(),
        }
    }

    pub fn read(path: &str, error: impl std::fmt::Display) -> Self {
        Self::Read {
            path: path.to_string(),
            reason: error.to_string(),
        }
    }

    pub fn connection(error: impl std::fmt::Display) -> Self {
        Self::Connection(error.to_string())
    }

    /// True when the underlying transport session is unusable and the whole
    /// scan cycle should abort rather than skip the current path.
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_))
    }
}

impl From<io::Error> for FileStoreError {
    fn from(error: io::Error) -> Self {
        Self::Connection(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, FileStoreError>;
