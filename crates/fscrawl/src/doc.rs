//! Document identity and body construction.

use serde_json::{json, Value};

use filestore::FileRecord;

use crate::extract::ExtractedContent;

/// Stable document id for a path: FNV-1a fingerprint, 64-bit hex.
///
/// Deletes must derive the same id from the path alone, so nothing from
/// the record besides the path may feed the hash.
pub fn doc_id(path: &str) -> String {
    const FNV_PRIME: u64 = 0x100000001b3;
    let mut hash = 0xcbf29ce484222325u64;
    for byte in path.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    format!("{hash:016x}")
}

/// Builds the indexable document body for one extracted file.
pub fn build_document(
    record: &FileRecord,
    extracted: &ExtractedContent,
    content_type: Option<&str>,
    indexed_at: u64,
) -> Value {
    let mut file = json!({
        "name": record.name,
        "size": record.size,
        "last_modified": record.last_modified,
    });
    if let Some(owner) = &record.owner {
        file["owner"] = json!(owner);
    }
    if let Some(group) = &record.group {
        file["group"] = json!(group);
    }
    if let Some(content_type) = content_type {
        file["content_type"] = json!(content_type);
    }

    json!({
        "content": extracted.text,
        "meta": extracted.metadata,
        "file": file,
        "path": { "full": record.path },
        "indexed_at": indexed_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn record() -> FileRecord {
        FileRecord {
            path: "/docs/a.txt".to_string(),
            name: "a.txt".to_string(),
            is_directory: false,
            size: 12,
            last_modified: 1_700_000_000,
            owner: Some("501".to_string()),
            group: None,
        }
    }

    #[test]
    fn doc_id_is_stable_and_path_sensitive() {
        assert_eq!(doc_id("/docs/a.txt"), doc_id("/docs/a.txt"));
        assert_ne!(doc_id("/docs/a.txt"), doc_id("/docs/b.txt"));
        assert_eq!(doc_id("/docs/a.txt").len(), 16);
    }

    #[test]
    fn body_carries_content_file_and_path() {
        let extracted = ExtractedContent {
            text: "hello".to_string(),
            metadata: BTreeMap::new(),
        };
        let body = build_document(&record(), &extracted, Some("text/plain"), 1_700_000_100);
        assert_eq!(body["content"], "hello");
        assert_eq!(body["file"]["name"], "a.txt");
        assert_eq!(body["file"]["size"], 12);
        assert_eq!(body["file"]["owner"], "501");
        assert_eq!(body["file"]["content_type"], "text/plain");
        assert!(body["file"].get("group").is_none());
        assert_eq!(body["path"]["full"], "/docs/a.txt");
        assert_eq!(body["indexed_at"], 1_700_000_100);
    }
}
