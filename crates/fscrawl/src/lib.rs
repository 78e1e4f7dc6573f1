//! Crawl-diff-bulk pipeline over a [`filestore::FileStore`].
//!
//! Each configured job runs on its own schedule: list the document tree,
//! diff it against the snapshot persisted by the previous cycle, extract
//! content for every added or modified file, and ship index/delete
//! operations to the backend in size/time-bounded bulk batches.

pub mod bulk;
pub mod config;
pub mod diff;
pub mod doc;
pub mod elasticsearch;
pub mod error;
pub mod extract;
pub mod listener;
pub mod scheduler;
pub mod state;

// Re-export main types
pub use bulk::{BulkBuffer, BulkOperation};
pub use config::Settings;
pub use diff::{detect_changes, Change, ChangeKind};
pub use elasticsearch::{BulkClient, BulkResponse, ElasticsearchClient};
pub use error::{CrawlerError, Result};
pub use extract::{ContentExtractor, ExtractedContent, PlainTextExtractor};
pub use listener::IndexingListener;
pub use scheduler::{CrawlWorker, JobState, ScanScheduler};
pub use state::{JobSnapshot, JobStateStore};
