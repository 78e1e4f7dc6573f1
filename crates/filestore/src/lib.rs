//! Protocol-agnostic file access for crawling document trees.
//!
//! This crate provides the transport layer of the crawler:
//! - A normalized [`FileRecord`] describing one filesystem entry
//! - The [`FileStore`] capability set (open/close/list/read/exists)
//! - One store per protocol: local disk, FTP, SSH/SFTP
//! - A single generic filtered traversal shared by every store

pub mod cancel;
pub mod error;
pub mod filter;
pub mod ftp;
pub mod local;
pub mod record;
pub mod ssh;
pub mod store;
pub mod walk;

// Re-export main types
pub use cancel::CancellationToken;
pub use error::{FileStoreError, Result};
pub use filter::PathFilter;
pub use ftp::FtpFileStore;
pub use local::LocalFileStore;
pub use record::{unix_now_secs, FileRecord};
pub use ssh::SshFileStore;
pub use store::{join_path, FileStore};
pub use walk::{walk, WalkOptions, WalkOutcome};
