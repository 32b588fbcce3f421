//! Configuration for harvest sources and local storage.
//!
//! Loaded once at startup from a TOML file and passed down by value; nothing
//! mutates configuration after the run starts.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::models::DataStandard;

/// Default per-request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Which harvest protocol a source speaks.
///
/// A static mapping from configuration to harvester replaces the original
/// runtime type discovery: `ProcessorKind` is matched exactly once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProcessorKind {
    /// Static HTML index pointing at individual XML documents.
    LinkCrawl,
    /// CSW-style search API returning record pages with a next-offset cursor.
    PaginatedSearch,
}

impl ProcessorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LinkCrawl => "link-crawl",
            Self::PaginatedSearch => "paginated-search",
        }
    }
}

/// How a mandatory field rule extracts its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    /// First matching node's value; blank or absent fails.
    Text,
    /// All matching nodes joined with `", "`; no matches fails.
    List,
}

/// A single mandatory-field extraction rule.
///
/// `path` is a `/`-separated chain of `prefix:local` segments resolved against
/// the record's own namespace declarations (see [`crate::xml`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MandatoryFieldRule {
    pub name: String,
    pub kind: FieldKind,
    pub path: String,
}

/// One harvest source. Immutable for the duration of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Source name; also the storage container name.
    pub name: String,
    pub kind: ProcessorKind,
    /// Base URL of the catalogue endpoint.
    pub api_base: String,
    /// Request path. For paginated sources it may contain `{{maxRecords}}`
    /// and `{{startPosition}}` placeholders.
    pub api_url: String,
    #[serde(default)]
    pub mandatory_fields: Vec<MandatoryFieldRule>,
    /// Cron expression consumed by the external scheduler; informational here.
    #[serde(default)]
    pub schedule: Option<String>,
    /// Extra fetch attempts for a failed (non-probe) page before skipping it.
    #[serde(default)]
    pub page_retry_limit: u32,
}

impl SourceConfig {
    /// Full URL of the master index / search endpoint, before placeholder
    /// substitution.
    pub fn endpoint_url(&self) -> String {
        format!("{}{}", self.api_base.trim_end_matches('/'), self.api_url)
    }

    /// Metadata standard tag announced for this source's records.
    pub fn data_standard(&self) -> DataStandard {
        match self.kind {
            ProcessorKind::LinkCrawl => DataStandard::Gemini22,
            ProcessorKind::PaginatedSearch => DataStandard::Gemini23,
        }
    }

    /// Storage container holding this source's harvested records.
    pub fn container(&self) -> &str {
        &self.name
    }
}

/// Local storage layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root directory of the filesystem object store.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Scratch area for enriched XML produced by downstream consumers.
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: PathBuf,
    /// Outbox directory for the file-backed message queue.
    #[serde(default = "default_queue_dir")]
    pub queue_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            scratch_dir: default_scratch_dir(),
            queue_dir: default_queue_dir(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_scratch_dir() -> PathBuf {
    PathBuf::from("scratch")
}

fn default_queue_dir() -> PathBuf {
    PathBuf::from("queue")
}

fn default_request_timeout() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    /// Extra namespace prefixes for field extraction, e.g. the `mdc` schema
    /// location prefix, merged over the prefixes a record declares itself.
    #[serde(default)]
    pub namespaces: HashMap<String, String>,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("cannot read config {}: {}", path.display(), e))?;
        let config: AppConfig = toml::from_str(&raw)
            .map_err(|e| anyhow::anyhow!("invalid config {}: {}", path.display(), e))?;
        Ok(config)
    }

    /// Look up a source by name.
    pub fn source(&self, name: &str) -> Option<&SourceConfig> {
        self.sources.iter().find(|s| s.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[storage]
data_dir = "/var/lib/geoharvest/data"

[namespaces]
mdc = "https://example.org/schema/mdc"

[[sources]]
name = "jncc"
kind = "link-crawl"
api_base = "https://data.example.gov.uk"
api_url = "/waf/index.html"
schedule = "0 4 * * *"

[[sources.mandatory_fields]]
name = "title"
kind = "text"
path = "gmd:identificationInfo/gmd:MD_DataIdentification/gmd:citation"

[[sources]]
name = "medin"
kind = "paginated-search"
api_base = "https://portal.example.org"
api_url = "/csw?maxRecords={{maxRecords}}&startPosition={{startPosition}}"
page_retry_limit = 2
"#;

    #[test]
    fn test_parse_full_config() {
        let config: AppConfig = toml::from_str(SAMPLE).unwrap();
        assert_eq!(config.sources.len(), 2);
        assert_eq!(
            config.storage.data_dir,
            PathBuf::from("/var/lib/geoharvest/data")
        );
        assert_eq!(config.storage.scratch_dir, PathBuf::from("scratch"));
        assert_eq!(config.namespaces["mdc"], "https://example.org/schema/mdc");

        let jncc = config.source("jncc").unwrap();
        assert_eq!(jncc.kind, ProcessorKind::LinkCrawl);
        assert_eq!(jncc.mandatory_fields.len(), 1);
        assert_eq!(jncc.mandatory_fields[0].kind, FieldKind::Text);
        assert_eq!(jncc.data_standard(), DataStandard::Gemini22);
        assert_eq!(
            jncc.endpoint_url(),
            "https://data.example.gov.uk/waf/index.html"
        );

        let medin = config.source("medin").unwrap();
        assert_eq!(medin.kind, ProcessorKind::PaginatedSearch);
        assert_eq!(medin.page_retry_limit, 2);
        assert_eq!(medin.data_standard(), DataStandard::Gemini23);
    }

    #[test]
    fn test_unknown_source_is_none() {
        let config: AppConfig = toml::from_str(SAMPLE).unwrap();
        assert!(config.source("nonexistent").is_none());
    }
}
