//! Block stream ingest library crate.
//!
//! This crate provides the building blocks for ingesting ledger stream
//! files and proving them authentic before anything downstream sees them:
//!
//! - strongly-typed domain types and wire messages (`types`, `proto`),
//! - Merkle hashing, block root digests and state proofs (`hash`),
//! - threshold signature verification anchored on a ledger (`tss`),
//! - block and signature file readers (`reader`),
//! - local, HTTP and failover stream file providers (`provider`),
//! - the block stream verifier and the block file source (`verifier`,
//!   `pipeline`),
//! - storage collaborator interfaces (`storage`),
//! - Prometheus-based metrics (`metrics`),
//! - and a top-level ingest configuration (`config`).

pub mod config;
pub mod error;
pub mod hash;
pub mod metrics;
pub mod pipeline;
pub mod proto;
pub mod provider;
pub mod reader;
pub mod storage;
pub mod tss;
pub mod types;
pub mod verifier;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export top-level configuration types.
pub use config::{
    BlockConfig, ConfigError, IngestConfig, LedgerConfig, MetricsConfig, SourceConfig, SourceKind,
};

pub use error::{IngestError, Result};

// Re-export hashing and verification.
pub use hash::{BlockRootHashDigest, IncrementalStreamingHasher, StateProofVerifier};
pub use tss::{BlockSignature, SignatureScheme, ThresholdSignatureVerifier};
pub use verifier::BlockStreamVerifier;

// Re-export readers, providers and the block file source.
pub use pipeline::{BlockIngestor, IngestorOptions};
pub use provider::{
    CompositeStreamFileProvider, HttpStreamFileProvider, LocalStreamFileProvider, ProviderError,
    StreamFileProvider,
};
pub use reader::{BlockFileReader, CompositeSignatureFileReader, SignatureFileReader};

// Re-export storage collaborators.
pub use storage::{
    BlockFileSink, InMemoryBlockFileSink, InMemoryLedgerRepository, LedgerRepository,
    StorageError,
};

pub use metrics::{IngestMetrics, MetricsRegistry};

// Re-export domain types at the crate root for convenience.
pub use types::*;

/// Type alias for the default provider stack: ordered failover across the
/// configured sources.
pub type DefaultStreamFileProvider = CompositeStreamFileProvider;

/// Type alias for the default block stream verifier, backed by the
/// in-memory collaborators.
pub type DefaultBlockStreamVerifier =
    BlockStreamVerifier<InMemoryLedgerRepository, InMemoryBlockFileSink>;

/// Type alias for the default block ingestor stack.
///
/// This uses:
///
/// - [`DefaultStreamFileProvider`] (composite failover),
/// - [`InMemoryLedgerRepository`] as the ledger trust anchor store,
/// - [`InMemoryBlockFileSink`] as the destination of verified blocks.
pub type DefaultBlockIngestor =
    BlockIngestor<DefaultStreamFileProvider, InMemoryLedgerRepository, InMemoryBlockFileSink>;
