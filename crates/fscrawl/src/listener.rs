//! The sink seam between the scan scheduler and the bulk engine.

use serde_json::Value;

/// Receives the per-document outcome of a scan cycle.
///
/// Production wires this to [`crate::BulkBuffer`]; tests substitute a
/// double that records calls.
pub trait IndexingListener: Send + Sync {
    fn on_index(&self, index: &str, id: &str, body: Value);
    fn on_delete(&self, index: &str, id: &str);
}
