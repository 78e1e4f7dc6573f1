//! Job configuration, loaded from a JSON settings file.
//!
//! One file describes one job: what tree to crawl (`fs`), how to reach it
//! (`server`), and where the documents go (`elasticsearch`). Everything
//! except the job name has a default.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CrawlerError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Unique job name; also the default index name and the snapshot file
    /// stem.
    pub name: String,
    #[serde(default)]
    pub fs: FsConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub elasticsearch: ElasticsearchConfig,
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).map_err(|error| {
            CrawlerError::Config(format!("cannot read {}: {error}", path.display()))
        })?;
        let settings: Settings = serde_json::from_slice(&bytes).map_err(|error| {
            CrawlerError::Config(format!("cannot parse {}: {error}", path.display()))
        })?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(CrawlerError::Config("job name is required".to_string()));
        }
        if self.fs.url.is_empty() {
            return Err(CrawlerError::Config("fs.url is required".to_string()));
        }
        if self.elasticsearch.bulk_size == 0 {
            return Err(CrawlerError::Config(
                "elasticsearch.bulk_size must be at least 1".to_string(),
            ));
        }
        if let Some(IndexedChars::Ratio(raw)) = &self.fs.indexed_chars {
            if parse_percent(raw).is_none() {
                return Err(CrawlerError::Config(format!(
                    "fs.indexed_chars must be a number or a percentage, got {raw:?}"
                )));
            }
        }
        Ok(())
    }

    /// Index documents land in: configured name, or the job name.
    pub fn index(&self) -> &str {
        self.elasticsearch.index.as_deref().unwrap_or(&self.name)
    }

    pub fn update_rate(&self) -> Duration {
        Duration::from_secs(self.fs.update_rate)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FsConfig {
    /// Root of the crawled tree, in the protocol's namespace.
    #[serde(default = "default_url")]
    pub url: String,
    /// Seconds between scan cycles.
    #[serde(default = "default_update_rate")]
    pub update_rate: u64,
    #[serde(default)]
    pub includes: Vec<String>,
    #[serde(default)]
    pub excludes: Vec<String>,
    #[serde(default)]
    pub max_depth: Option<usize>,
    /// Whether vanished files produce delete operations.
    #[serde(default = "default_true")]
    pub remove_deleted: bool,
    /// Cap on extracted characters per document: a fixed count or a
    /// percentage of the file size, e.g. `5000` or `"20%"`.
    #[serde(default)]
    pub indexed_chars: Option<IndexedChars>,
    /// Passed through to the extraction collaborator.
    #[serde(default)]
    pub content_type: Option<String>,
}

impl Default for FsConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            update_rate: default_update_rate(),
            includes: Vec::new(),
            excludes: Vec::new(),
            max_depth: None,
            remove_deleted: true,
            indexed_chars: None,
            content_type: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IndexedChars {
    Fixed(u64),
    /// Percentage of the file size, as `"NN%"`.
    Ratio(String),
}

impl IndexedChars {
    /// Character budget for a file of `size` bytes.
    pub fn limit_for(&self, size: u64) -> usize {
        match self {
            Self::Fixed(count) => *count as usize,
            Self::Ratio(raw) => {
                let percent = parse_percent(raw).unwrap_or(100.0);
                (size as f64 * percent / 100.0).ceil() as usize
            }
        }
    }
}

fn parse_percent(raw: &str) -> Option<f64> {
    let number = raw.strip_suffix('%')?.trim();
    let percent: f64 = number.parse().ok()?;
    (percent > 0.0).then_some(percent)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Local,
    Ftp,
    Ssh,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub protocol: Protocol,
    #[serde(default = "default_hostname")]
    pub hostname: String,
    /// Defaults to the protocol's well-known port.
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Private key file for SSH; wins over `password` when both are set.
    #[serde(default)]
    pub pem_path: Option<PathBuf>,
}

impl ServerConfig {
    pub fn port(&self) -> u16 {
        self.port.unwrap_or(match self.protocol {
            Protocol::Local => 0,
            Protocol::Ftp => 21,
            Protocol::Ssh => 22,
        })
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            protocol: Protocol::Local,
            hostname: default_hostname(),
            port: None,
            username: None,
            password: None,
            pem_path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElasticsearchConfig {
    #[serde(default = "default_node")]
    pub url: String,
    /// Defaults to the job name.
    #[serde(default)]
    pub index: Option<String>,
    /// Queued operations that trigger a flush.
    #[serde(default = "default_bulk_size")]
    pub bulk_size: usize,
    /// Seconds between timer-driven flushes.
    #[serde(default = "default_flush_interval")]
    pub flush_interval: u64,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl ElasticsearchConfig {
    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval)
    }
}

impl Default for ElasticsearchConfig {
    fn default() -> Self {
        Self {
            url: default_node(),
            index: None,
            bulk_size: default_bulk_size(),
            flush_interval: default_flush_interval(),
            username: None,
            password: None,
        }
    }
}

fn default_url() -> String {
    "/tmp/fscrawl".to_string()
}

fn default_update_rate() -> u64 {
    900
}

fn default_hostname() -> String {
    "127.0.0.1".to_string()
}

fn default_node() -> String {
    "http://127.0.0.1:9200".to_string()
}

fn default_bulk_size() -> usize {
    100
}

fn default_flush_interval() -> u64 {
    5
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_settings_fill_defaults() {
        let settings: Settings = serde_json::from_str(r#"{ "name": "docs" }"#).expect("parse");
        settings.validate().expect("valid");
        assert_eq!(settings.fs.update_rate, 900);
        assert!(settings.fs.remove_deleted);
        assert_eq!(settings.server.protocol, Protocol::Local);
        assert_eq!(settings.elasticsearch.bulk_size, 100);
        assert_eq!(settings.index(), "docs");
    }

    #[test]
    fn full_settings_parse() {
        let raw = r#"{
            "name": "reports",
            "fs": {
                "url": "/data/reports",
                "update_rate": 60,
                "includes": ["*.txt", "*.md"],
                "excludes": ["*~"],
                "max_depth": 3,
                "remove_deleted": false,
                "indexed_chars": "20%"
            },
            "server": {
                "protocol": "ssh",
                "hostname": "files.internal",
                "username": "crawler",
                "pem_path": "/etc/fscrawl/id_rsa"
            },
            "elasticsearch": {
                "url": "http://es.internal:9200",
                "index": "reports-v2",
                "bulk_size": 50,
                "flush_interval": 2
            }
        }"#;
        let settings: Settings = serde_json::from_str(raw).expect("parse");
        settings.validate().expect("valid");
        assert_eq!(settings.server.protocol, Protocol::Ssh);
        assert_eq!(settings.server.port(), 22);
        assert_eq!(settings.index(), "reports-v2");
        assert_eq!(
            settings.fs.indexed_chars,
            Some(IndexedChars::Ratio("20%".to_string()))
        );
    }

    #[test]
    fn indexed_chars_accepts_fixed_and_percent() {
        let fixed: IndexedChars = serde_json::from_str("5000").expect("parse");
        assert_eq!(fixed.limit_for(1_000_000), 5000);

        let ratio: IndexedChars = serde_json::from_str(r#""20%""#).expect("parse");
        assert_eq!(ratio.limit_for(1000), 200);
    }

    #[test]
    fn bad_percentage_is_rejected() {
        let settings: Settings = serde_json::from_str(
            r#"{ "name": "docs", "fs": { "indexed_chars": "lots" } }"#,
        )
        .expect("parse");
        assert!(matches!(
            settings.validate(),
            Err(CrawlerError::Config(_))
        ));
    }

    #[test]
    fn zero_bulk_size_is_rejected() {
        let settings: Settings = serde_json::from_str(
            r#"{ "name": "docs", "elasticsearch": { "bulk_size": 0 } }"#,
        )
        .expect("parse");
        assert!(settings.validate().is_err());
    }
}
