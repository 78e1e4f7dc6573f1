//! Bulk buffering: turns a stream of per-document operations into
//! size/time-bounded batches.
//!
//! Operations queue under a mutex; the thread that pushes the queue over
//! `bulk_size` swaps the queue out and ships the batch itself, and a
//! dedicated flusher thread wakes every `flush_interval` so a slow trickle
//! of documents still reaches the backend. The lock is held only for the
//! push/swap, never for the network call.

use std::mem;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{unbounded, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use serde_json::Value;

use crate::elasticsearch::BulkClient;
use crate::listener::IndexingListener;

/// One queued backend operation, in discovery order.
#[derive(Debug, Clone, PartialEq)]
pub enum BulkOperation {
    Index {
        index: String,
        id: String,
        body: Value,
    },
    Delete {
        index: String,
        id: String,
    },
}

impl BulkOperation {
    pub fn id(&self) -> &str {
        match self {
            Self::Index { id, .. } | Self::Delete { id, .. } => id,
        }
    }
}

struct Shared<C: BulkClient> {
    queue: Mutex<Vec<BulkOperation>>,
    client: C,
    bulk_size: usize,
}

impl<C: BulkClient> Shared<C> {
    fn add(&self, operation: BulkOperation) {
        let batch = {
            let mut queue = self.queue.lock();
            queue.push(operation);
            if queue.len() >= self.bulk_size {
                mem::take(&mut *queue)
            } else {
                Vec::new()
            }
        };
        if !batch.is_empty() {
            self.send(batch);
        }
    }

    fn flush(&self) {
        let batch = mem::take(&mut *self.queue.lock());
        if !batch.is_empty() {
            self.send(batch);
        }
    }

    /// Ships one batch. A failed batch is reported and dropped, not
    /// re-queued: the next scan cycle re-detects the documents because
    /// their state was never durably marked processed.
    fn send(&self, batch: Vec<BulkOperation>) {
        let size = batch.len();
        match self.client.bulk(&batch) {
            Ok(response) => {
                let failed = response.failed_count();
                if failed > 0 {
                    tracing::warn!(size, failed, "bulk batch had per-item failures");
                } else {
                    tracing::debug!(size, "bulk batch shipped");
                }
            }
            Err(error) => {
                tracing::warn!(size, %error, "bulk batch failed, operations dropped");
            }
        }
    }
}

/// Accumulates operations and flushes them when `bulk_size` is reached or
/// `flush_interval` elapses, whichever comes first.
pub struct BulkBuffer<C: BulkClient + 'static> {
    shared: Arc<Shared<C>>,
    shutdown_tx: Sender<()>,
    flusher: Mutex<Option<JoinHandle<()>>>,
}

impl<C: BulkClient + 'static> BulkBuffer<C> {
    pub fn new(client: C, bulk_size: usize, flush_interval: Duration) -> Self {
        let shared = Arc::new(Shared {
            queue: Mutex::new(Vec::new()),
            client,
            bulk_size: bulk_size.max(1),
        });

        let (shutdown_tx, shutdown_rx) = unbounded::<()>();
        let flush_shared = shared.clone();
        let flusher = thread::spawn(move || loop {
            match shutdown_rx.recv_timeout(flush_interval) {
                Err(RecvTimeoutError::Timeout) => flush_shared.flush(),
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        });

        Self {
            shared,
            shutdown_tx,
            flusher: Mutex::new(Some(flusher)),
        }
    }

    pub fn add(&self, operation: BulkOperation) {
        self.shared.add(operation);
    }

    /// Drains whatever is queued right now into one batch.
    pub fn flush(&self) {
        self.shared.flush();
    }

    /// Stops the interval flusher and performs one final synchronous
    /// flush. Idempotent.
    pub fn close(&self) {
        let _ = self.shutdown_tx.send(());
        if let Some(handle) = self.flusher.lock().take() {
            if handle.join().is_err() {
                tracing::warn!("bulk flusher thread panicked");
            }
        }
        self.shared.flush();
    }
}

impl<C: BulkClient + 'static> Drop for BulkBuffer<C> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<C: BulkClient + 'static> IndexingListener for BulkBuffer<C> {
    fn on_index(&self, index: &str, id: &str, body: Value) {
        self.add(BulkOperation::Index {
            index: index.to_string(),
            id: id.to_string(),
            body,
        });
    }

    fn on_delete(&self, index: &str, id: &str) {
        self.add(BulkOperation::Delete {
            index: index.to_string(),
            id: id.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elasticsearch::BulkResponse;
    use crate::error::{CrawlerError, Result};
    use serde_json::json;

    /// Records every batch it receives; optionally fails them all.
    #[derive(Default)]
    struct RecordingClient {
        batches: Mutex<Vec<Vec<BulkOperation>>>,
        fail: bool,
    }

    impl BulkClient for RecordingClient {
        fn bulk(&self, operations: &[BulkOperation]) -> Result<BulkResponse> {
            if self.fail {
                return Err(CrawlerError::Backend("backend is down".to_string()));
            }
            self.batches.lock().push(operations.to_vec());
            Ok(BulkResponse::default())
        }
    }

    fn index_op(id: &str) -> BulkOperation {
        BulkOperation::Index {
            index: "docs".to_string(),
            id: id.to_string(),
            body: json!({ "content": id }),
        }
    }

    fn batches(shared: &Arc<Shared<RecordingClient>>) -> Vec<Vec<BulkOperation>> {
        shared.client.batches.lock().clone()
    }

    #[test]
    fn flushes_exactly_once_when_bulk_size_is_reached() {
        let buffer = BulkBuffer::new(RecordingClient::default(), 3, Duration::from_secs(3600));
        for id in ["a", "b", "c", "d"] {
            buffer.add(index_op(id));
        }
        // The third add shipped a batch; "d" waits in the fresh queue.
        let shipped = batches(&buffer.shared);
        assert_eq!(shipped.len(), 1);
        assert_eq!(shipped[0].len(), 3);
        assert_eq!(buffer.shared.queue.lock().len(), 1);
    }

    #[test]
    fn interval_flush_ships_a_partial_queue() {
        let buffer = BulkBuffer::new(RecordingClient::default(), 100, Duration::from_millis(20));
        buffer.add(index_op("a"));
        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while batches(&buffer.shared).is_empty() && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(batches(&buffer.shared).len(), 1);
    }

    #[test]
    fn close_performs_a_final_flush() {
        let buffer = BulkBuffer::new(RecordingClient::default(), 100, Duration::from_secs(3600));
        buffer.add(index_op("a"));
        buffer.add(index_op("b"));
        buffer.close();
        let shipped = batches(&buffer.shared);
        assert_eq!(shipped.len(), 1);
        assert_eq!(shipped[0].len(), 2);
        // A second close is a no-op.
        buffer.close();
        assert_eq!(batches(&buffer.shared).len(), 1);
    }

    #[test]
    fn operations_keep_discovery_order_within_a_batch() {
        let buffer = BulkBuffer::new(RecordingClient::default(), 3, Duration::from_secs(3600));
        buffer.add(index_op("first"));
        buffer.add(BulkOperation::Delete {
            index: "docs".to_string(),
            id: "second".to_string(),
        });
        buffer.add(index_op("third"));
        let shipped = batches(&buffer.shared);
        let ids: Vec<&str> = shipped[0].iter().map(|op| op.id()).collect();
        assert_eq!(ids, vec!["first", "second", "third"]);
    }

    #[test]
    fn failed_batch_is_dropped_not_requeued() {
        let client = RecordingClient {
            fail: true,
            ..Default::default()
        };
        let buffer = BulkBuffer::new(client, 2, Duration::from_secs(3600));
        buffer.add(index_op("a"));
        buffer.add(index_op("b"));
        assert!(buffer.shared.queue.lock().is_empty());
    }

    #[test]
    fn listener_calls_enqueue_operations() {
        let buffer = BulkBuffer::new(RecordingClient::default(), 10, Duration::from_secs(3600));
        buffer.on_index("docs", "1", json!({ "content": "hello" }));
        buffer.on_delete("docs", "2");
        let queue = buffer.shared.queue.lock().clone();
        assert_eq!(queue.len(), 2);
        assert!(matches!(queue[0], BulkOperation::Index { .. }));
        assert!(matches!(queue[1], BulkOperation::Delete { .. }));
    }
}
