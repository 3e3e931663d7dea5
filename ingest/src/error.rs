//! Error taxonomy for the ingest pipeline.
//!
//! Format and verification failures are permanent for the file that caused
//! them and are never retried. Provider failures carry their own
//! classification (see [`ProviderError::is_retryable`]) which the composite
//! provider uses to decide on failover.

use std::io;

use thiserror::Error;

pub use crate::provider::ProviderError;
pub use crate::storage::StorageError;

/// Result alias used across the crate.
pub type Result<T, E = IngestError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum IngestError {
    /// Malformed bytes, missing mandatory items, bad proof structure.
    #[error("{0}")]
    InvalidStreamFile(String),

    /// A hash that should chain or match does not.
    #[error("{kind} hash mismatch for file {file}. Expected = {expected}, Actual = {actual}")]
    HashMismatch {
        kind: &'static str,
        file: String,
        expected: String,
        actual: String,
    },

    /// A block root recomputed through a state proof differs from the root
    /// computed over the block's own items.
    #[error("Block {block} root hash mismatch: expected={expected}, actual={actual}")]
    RootHashMismatch {
        block: u64,
        expected: String,
        actual: String,
    },

    #[error("{0}")]
    SignatureVerification(String),

    /// A signature file could not be parsed.
    #[error("{message}")]
    SignatureFileParsing {
        message: String,
        #[source]
        source: Option<io::Error>,
    },

    #[error("{0}")]
    IllegalArgument(String),

    /// Misuse of a stateful component, or a missing trust anchor.
    #[error("{0}")]
    IllegalState(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Wraps any failure that happened while downloading and verifying one
    /// block file, naming the file.
    #[error("{message}")]
    BlockStream {
        message: String,
        #[source]
        source: Box<IngestError>,
    },
}

impl IngestError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        IngestError::InvalidStreamFile(message.into())
    }

    pub(crate) fn signature_file(message: impl Into<String>) -> Self {
        IngestError::SignatureFileParsing {
            message: message.into(),
            source: None,
        }
    }
}

impl From<prost::DecodeError> for IngestError {
    fn from(err: prost::DecodeError) -> Self {
        IngestError::InvalidStreamFile(format!("Failed to decode block stream: {err}"))
    }
}
