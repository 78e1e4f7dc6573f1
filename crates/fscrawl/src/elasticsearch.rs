//! Wire client for the indexing backend.
//!
//! A thin blocking HTTP/JSON client: `bulk` ships NDJSON batches,
//! `create_index`/`put_mapping` run once at job startup, `search` exists
//! for tooling. [`BulkClient`] is the seam the bulk engine depends on so
//! tests can substitute a recording fake.

use std::fmt::Write as _;
use std::time::Duration;

use serde::Deserialize;
use serde_json::{json, Value};

use crate::bulk::BulkOperation;
use crate::config::ElasticsearchConfig;
use crate::error::{CrawlerError, Result};

const REQUEST_TIMEOUT_SECS: u64 = 60;

/// The one capability the bulk engine needs from the backend.
pub trait BulkClient: Send + Sync {
    fn bulk(&self, operations: &[BulkOperation]) -> Result<BulkResponse>;
}

/// Per-batch response: one result per operation, in request order.
#[derive(Debug, Default, Deserialize)]
pub struct BulkResponse {
    #[serde(default)]
    pub errors: bool,
    #[serde(default)]
    pub items: Vec<BulkItem>,
}

impl BulkResponse {
    pub fn failed_count(&self) -> usize {
        self.items
            .iter()
            .filter(|item| item.result().is_some_and(|r| r.error.is_some()))
            .count()
    }
}

/// One per-item result; the backend keys it by the operation kind.
#[derive(Debug, Default, Deserialize)]
pub struct BulkItem {
    #[serde(default)]
    index: Option<BulkItemResult>,
    #[serde(default)]
    delete: Option<BulkItemResult>,
}

impl BulkItem {
    pub fn result(&self) -> Option<&BulkItemResult> {
        self.index.as_ref().or(self.delete.as_ref())
    }
}

#[derive(Debug, Deserialize)]
pub struct BulkItemResult {
    #[serde(rename = "_id", default)]
    pub id: String,
    #[serde(default)]
    pub status: u16,
    #[serde(default)]
    pub error: Option<Value>,
}

pub struct ElasticsearchClient {
    base_url: String,
    username: Option<String>,
    password: Option<String>,
    http: reqwest::blocking::Client,
}

impl ElasticsearchClient {
    pub fn new(config: &ElasticsearchConfig) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|error| CrawlerError::Backend(format!("failed to build http client: {error}")))?;
        Ok(Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            username: config.username.clone(),
            password: config.password.clone(),
            http,
        })
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::blocking::RequestBuilder {
        let mut builder = self.http.request(method, format!("{}{path}", self.base_url));
        if let Some(username) = &self.username {
            builder = builder.basic_auth(username, self.password.as_deref());
        }
        builder
    }

    /// Creates the index, treating "already exists" as success.
    pub fn create_index(&self, index: &str) -> Result<()> {
        let response = self
            .request(reqwest::Method::PUT, &format!("/{index}"))
            .send()
            .map_err(|error| CrawlerError::Backend(error.to_string()))?;

        let status = response.status();
        if status.is_success() {
            tracing::debug!(index, "index created");
            return Ok(());
        }

        let body = response.text().unwrap_or_default();
        if body.contains("resource_already_exists_exception") {
            tracing::debug!(index, "index already exists");
            return Ok(());
        }
        Err(CrawlerError::Backend(format!(
            "create index {index} failed with {status}: {body}"
        )))
    }

    /// Installs the document mapping for the index.
    pub fn put_mapping(&self, index: &str, mapping: &Value) -> Result<()> {
        let response = self
            .request(reqwest::Method::PUT, &format!("/{index}/_mapping"))
            .json(mapping)
            .send()
            .map_err(|error| CrawlerError::Backend(error.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(CrawlerError::Backend(format!(
                "put mapping on {index} failed with {status}: {body}"
            )));
        }
        Ok(())
    }

    pub fn search(&self, index: &str, query: &Value) -> Result<Value> {
        let response = self
            .request(reqwest::Method::POST, &format!("/{index}/_search"))
            .json(query)
            .send()
            .map_err(|error| CrawlerError::Backend(error.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(CrawlerError::Backend(format!(
                "search on {index} failed with {status}: {body}"
            )));
        }
        response
            .json()
            .map_err(|error| CrawlerError::Backend(error.to_string()))
    }
}

impl BulkClient for ElasticsearchClient {
    fn bulk(&self, operations: &[BulkOperation]) -> Result<BulkResponse> {
        let body = build_bulk_body(operations)
            .map_err(|error| CrawlerError::Backend(format!("failed to encode bulk body: {error}")))?;
        let response = self
            .request(reqwest::Method::POST, "/_bulk")
            .header(reqwest::header::CONTENT_TYPE, "application/x-ndjson")
            .body(body)
            .send()
            .map_err(|error| CrawlerError::Backend(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(CrawlerError::Backend(format!(
                "bulk request failed with {status}: {body}"
            )));
        }
        response
            .json()
            .map_err(|error| CrawlerError::Backend(error.to_string()))
    }
}

/// Encodes a batch as NDJSON: one action line per operation, followed by
/// the document body for index operations.
fn build_bulk_body(operations: &[BulkOperation]) -> serde_json::Result<String> {
    let mut body = String::new();
    for operation in operations {
        match operation {
            BulkOperation::Index { index, id, body: doc } => {
                let action = json!({ "index": { "_index": index, "_id": id } });
                let _ = writeln!(body, "{}", serde_json::to_string(&action)?);
                let _ = writeln!(body, "{}", serde_json::to_string(doc)?);
            }
            BulkOperation::Delete { index, id } => {
                let action = json!({ "delete": { "_index": index, "_id": id } });
                let _ = writeln!(body, "{}", serde_json::to_string(&action)?);
            }
        }
    }
    Ok(body)
}

/// Mapping installed at job startup: extracted text plus the file and path
/// attributes change detection relies on.
pub fn default_mapping() -> Value {
    json!({
        "properties": {
            "content": { "type": "text" },
            "meta": { "type": "object", "enabled": true },
            "file": {
                "properties": {
                    "name": { "type": "keyword" },
                    "size": { "type": "long" },
                    "last_modified": { "type": "date", "format": "epoch_second" },
                    "owner": { "type": "keyword" },
                    "group": { "type": "keyword" },
                    "content_type": { "type": "keyword" }
                }
            },
            "path": {
                "properties": {
                    "full": { "type": "keyword" }
                }
            },
            "indexed_at": { "type": "date", "format": "epoch_second" }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bulk_body_interleaves_actions_and_documents() {
        let operations = vec![
            BulkOperation::Index {
                index: "docs".to_string(),
                id: "1".to_string(),
                body: json!({ "content": "hello" }),
            },
            BulkOperation::Delete {
                index: "docs".to_string(),
                id: "2".to_string(),
            },
        ];
        let body = build_bulk_body(&operations).expect("encode");
        let lines: Vec<&str> = body.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(
            serde_json::from_str::<Value>(lines[0]).expect("json"),
            json!({ "index": { "_index": "docs", "_id": "1" } })
        );
        assert_eq!(
            serde_json::from_str::<Value>(lines[1]).expect("json"),
            json!({ "content": "hello" })
        );
        assert_eq!(
            serde_json::from_str::<Value>(lines[2]).expect("json"),
            json!({ "delete": { "_index": "docs", "_id": "2" } })
        );
        assert!(body.ends_with('\n'));
    }

    #[test]
    fn bulk_response_counts_item_failures() {
        let raw = r#"{
            "errors": true,
            "items": [
                { "index": { "_id": "1", "status": 201 } },
                { "index": { "_id": "2", "status": 400, "error": { "type": "mapper_parsing_exception" } } },
                { "delete": { "_id": "3", "status": 200 } }
            ]
        }"#;
        let response: BulkResponse = serde_json::from_str(raw).expect("parse");
        assert!(response.errors);
        assert_eq!(response.items.len(), 3);
        assert_eq!(response.failed_count(), 1);
    }

    #[test]
    fn empty_response_has_no_failures() {
        let response = BulkResponse::default();
        assert_eq!(response.failed_count(), 0);
    }
}
