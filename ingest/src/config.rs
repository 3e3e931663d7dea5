//! Top-level configuration for the ingest pipeline.
//!
//! This module aggregates configuration for:
//!
//! - the network to ingest and whether it is periodically reset,
//! - the ordered list of stream file sources (local directories or HTTP
//!   mirrors) with their failover backoff,
//! - block ingest tuning and the optional configured ledger,
//! - the Prometheus metrics namespace.
//!
//! Every struct deserializes from JSON with defaults for missing fields, so
//! an empty object `{}` is a valid configuration.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::reader::block::DEFAULT_MAX_BLOCK_SIZE;
use crate::types::{Compression, Ledger, NodeContribution};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid hex in {field}: {source}")]
    InvalidHex {
        field: &'static str,
        #[source]
        source: hex::FromHexError,
    },
}

/// Kind of stream file backend.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// `uri` is a local directory.
    #[default]
    Local,
    /// `uri` is the base URL of an HTTP mirror.
    Http,
}

/// One stream file backend. Sources are tried in the order configured.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub kind: SourceKind,
    pub uri: String,
    /// How long the source stays out of rotation after a retryable failure.
    pub backoff_secs: u64,
    pub timeout_secs: u64,
    /// Maximum number of files returned by one listing.
    pub batch_size: usize,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: SourceKind::Local,
            uri: "data".to_string(),
            backoff_secs: 60,
            timeout_secs: 30,
            batch_size: 100,
        }
    }
}

impl SourceConfig {
    pub fn backoff(&self) -> Duration {
        Duration::from_secs(self.backoff_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Node weight and key of a configured ledger.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct NodeContributionConfig {
    pub node_id: u64,
    pub weight: u64,
    /// Hex-encoded public key.
    pub history_proof_key: String,
}

/// A ledger given in configuration, used instead of the persisted one.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Hex-encoded ledger id.
    pub ledger_id: String,
    /// Hex-encoded aggregate verification key.
    pub history_proof_verification_key: String,
    pub node_contributions: Vec<NodeContributionConfig>,
}

impl LedgerConfig {
    pub fn to_ledger(&self) -> Result<Ledger, ConfigError> {
        let node_contributions = self
            .node_contributions
            .iter()
            .map(|node| {
                Ok(NodeContribution {
                    node_id: node.node_id,
                    weight: node.weight,
                    history_proof_key: decode_hex(
                        "node_contributions.history_proof_key",
                        &node.history_proof_key,
                    )?,
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        Ok(Ledger {
            ledger_id: decode_hex("ledger_id", &self.ledger_id)?,
            history_proof_verification_key: decode_hex(
                "history_proof_verification_key",
                &self.history_proof_verification_key,
            )?,
            node_contributions,
            consensus_timestamp: 0,
        })
    }
}

fn decode_hex(field: &'static str, value: &str) -> Result<Vec<u8>, ConfigError> {
    hex::decode(value.trim_start_matches("0x"))
        .map_err(|source| ConfigError::InvalidHex { field, source })
}

/// Block ingest tuning.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct BlockConfig {
    /// Whether block files are stored zstd-compressed (`.blk.zstd`).
    pub compressed: bool,
    /// Keep the raw file bytes on parsed blocks.
    pub persist_bytes: bool,
    /// First block to ingest when nothing was persisted yet.
    pub start_block_number: u64,
    /// Number of block files downloaded ahead of verification.
    pub concurrency: usize,
    /// Largest decompressed block file accepted.
    pub max_size_bytes: usize,
    pub ledger: Option<LedgerConfig>,
}

impl Default for BlockConfig {
    fn default() -> Self {
        Self {
            compressed: true,
            persist_bytes: false,
            start_block_number: 0,
            concurrency: 4,
            max_size_bytes: DEFAULT_MAX_BLOCK_SIZE,
            ledger: None,
        }
    }
}

impl BlockConfig {
    pub fn compression(&self) -> Option<Compression> {
        self.compressed.then_some(Compression::Zstd)
    }
}

/// Configuration for the Prometheus metrics registry.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    /// Prefix of every metric name.
    pub namespace: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            namespace: "ingest".to_string(),
        }
    }
}

/// Top-level configuration for an ingest process.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub network: String,
    /// Whether the network is reset from time to time and re-created under
    /// `{network}-{instant}` folders.
    pub resettable: bool,
    pub sources: Vec<SourceConfig>,
    pub block: BlockConfig,
    pub metrics: MetricsConfig,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            network: "testnet".to_string(),
            resettable: false,
            sources: vec![SourceConfig::default()],
            block: BlockConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl IngestConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Upper bound for one block download: a request may fail over through
    /// every source.
    pub fn download_timeout(&self) -> Duration {
        self.sources.iter().map(SourceConfig::timeout).sum()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn empty_object_yields_defaults() {
        let cfg: IngestConfig = serde_json::from_str("{}").expect("parse");
        assert_eq!(cfg.network, "testnet");
        assert_eq!(cfg.sources.len(), 1);
        assert_eq!(cfg.sources[0].kind, SourceKind::Local);
        assert_eq!(cfg.block.compression(), Some(Compression::Zstd));
        assert_eq!(cfg.block.concurrency, 4);
        assert_eq!(cfg.block.max_size_bytes, DEFAULT_MAX_BLOCK_SIZE);
        assert!(cfg.metrics.enabled);
        assert_eq!(cfg.download_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn parses_sources_and_ledger_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        write!(
            file,
            r#"{{
                "network": "mainnet",
                "resettable": true,
                "sources": [
                    {{"kind": "http", "uri": "http://mirror:8080", "backoff_secs": 5, "timeout_secs": 2}},
                    {{"uri": "/var/lib/streams"}}
                ],
                "block": {{
                    "compressed": false,
                    "start_block_number": 42,
                    "max_size_bytes": 1048576,
                    "ledger": {{
                        "ledger_id": "0x0102",
                        "node_contributions": [
                            {{"node_id": 3, "weight": 10, "history_proof_key": "aabb"}}
                        ]
                    }}
                }}
            }}"#
        )
        .expect("write");

        let cfg = IngestConfig::from_json_file(file.path()).expect("load");
        assert_eq!(cfg.network, "mainnet");
        assert!(cfg.resettable);
        assert_eq!(cfg.sources[0].kind, SourceKind::Http);
        assert_eq!(cfg.sources[0].backoff(), Duration::from_secs(5));
        assert_eq!(cfg.sources[1].uri, "/var/lib/streams");
        assert_eq!(cfg.sources[1].batch_size, 100);
        assert_eq!(cfg.download_timeout(), Duration::from_secs(32));
        assert_eq!(cfg.block.compression(), None);
        assert_eq!(cfg.block.start_block_number, 42);
        assert_eq!(cfg.block.max_size_bytes, 1 << 20);

        let ledger = cfg.block.ledger.expect("ledger").to_ledger().expect("valid hex");
        assert_eq!(ledger.ledger_id, vec![1, 2]);
        assert!(ledger.history_proof_verification_key.is_empty());
        assert_eq!(ledger.node_contributions[0].history_proof_key, vec![0xaa, 0xbb]);
    }

    #[test]
    fn bad_ledger_hex_names_the_field() {
        let ledger = LedgerConfig {
            ledger_id: "zz".to_string(),
            ..LedgerConfig::default()
        };
        match ledger.to_ledger().expect_err("bad hex") {
            ConfigError::InvalidHex { field, .. } => assert_eq!(field, "ledger_id"),
            other => panic!("unexpected error variant: {other:?}"),
        }
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = IngestConfig::from_json_file("/nonexistent/ingest.json").expect_err("missing");
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
