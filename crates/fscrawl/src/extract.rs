//! Content extraction boundary.
//!
//! The real document parser is an external collaborator behind
//! [`ContentExtractor`]; the crawler only needs text plus whatever
//! metadata the parser surfaces. The in-tree [`PlainTextExtractor`]
//! handles text documents and rejects binary input as corrupt.

use std::collections::BTreeMap;
use std::io::Read;

use crate::error::{CrawlerError, Result};

/// What extraction produces for one document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedContent {
    pub text: String,
    pub metadata: BTreeMap<String, String>,
}

/// Turns a document byte stream into indexable text.
///
/// Fails with [`CrawlerError::Extraction`] on unsupported or corrupt
/// input; the scan cycle catches that per document and retries on the
/// next cycle.
pub trait ContentExtractor: Send + Sync {
    fn extract(
        &self,
        path: &str,
        reader: &mut dyn Read,
        content_type_hint: Option<&str>,
        max_chars: Option<usize>,
    ) -> Result<ExtractedContent>;
}

const READ_CHUNK: usize = 8 * 1024;

/// Extractor for plain-text documents.
///
/// Reads at most the character budget, decodes as UTF-8 (lossily, so
/// legacy encodings still index), and treats NUL bytes as binary content
/// it does not understand.
#[derive(Debug, Default)]
pub struct PlainTextExtractor;

impl PlainTextExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl ContentExtractor for PlainTextExtractor {
    fn extract(
        &self,
        path: &str,
        reader: &mut dyn Read,
        content_type_hint: Option<&str>,
        max_chars: Option<usize>,
    ) -> Result<ExtractedContent> {
        // UTF-8 is at most 4 bytes per char; reading this much guarantees
        // the budget is satisfiable without slurping unbounded input.
        let byte_budget = max_chars.map(|chars| chars.saturating_mul(4));

        let mut bytes = Vec::new();
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            if byte_budget.is_some_and(|budget| bytes.len() >= budget) {
                break;
            }
            let n = reader
                .read(&mut chunk)
                .map_err(|error| CrawlerError::extraction(path, error))?;
            if n == 0 {
                break;
            }
            bytes.extend_from_slice(&chunk[..n]);
        }

        if bytes.contains(&0) {
            return Err(CrawlerError::extraction(path, "binary content"));
        }

        let mut text = String::from_utf8_lossy(&bytes).into_owned();
        if let Some(limit) = max_chars {
            if let Some((cut, _)) = text.char_indices().nth(limit) {
                text.truncate(cut);
            }
        }

        let mut metadata = BTreeMap::new();
        if let Some(hint) = content_type_hint {
            metadata.insert("content_type".to_string(), hint.to_string());
        }

        Ok(ExtractedContent { text, metadata })
    }
}
