//! Storage collaborators of the ingest pipeline.
//!
//! The relational store lives outside this crate. The pipeline only needs
//! two narrow interfaces:
//!
//! - [`LedgerRepository`]: the most recently persisted ledger, used as the
//!   signature trust anchor,
//! - [`BlockFileSink`]: accepts verified block files and reports the last
//!   one it accepted so a restarted verifier can resume the hash chain.
//!
//! In-memory implementations ([`mem`]) back tests and the demo binary.

pub mod mem;

use thiserror::Error;

use crate::types::{BlockFile, BlockSummary, Ledger};

pub use mem::{InMemoryBlockFileSink, InMemoryLedgerRepository};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
    #[error("corrupted record: {0}")]
    Corrupted(String),
}

/// Read access to persisted ledger records.
pub trait LedgerRepository: Send + Sync {
    /// Ledger with the greatest consensus timestamp, if any was persisted.
    fn find_latest(&self) -> Result<Option<Ledger>, StorageError>;
}

/// Destination for verified block files.
pub trait BlockFileSink: Send + Sync {
    /// Last block accepted by this sink.
    fn latest(&self) -> Result<Option<BlockSummary>, StorageError>;

    /// Persists a verified block.
    fn persist(&self, block_file: BlockFile) -> Result<(), StorageError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Unavailable;

    impl LedgerRepository for Unavailable {
        fn find_latest(&self) -> Result<Option<Ledger>, StorageError> {
            Err(StorageError::Unavailable("connection refused".to_string()))
        }
    }

    #[test]
    fn repositories_are_object_safe() {
        let repo: Box<dyn LedgerRepository> = Box::new(Unavailable);
        let err = repo.find_latest().expect_err("always fails");
        assert_eq!(err.to_string(), "storage backend unavailable: connection refused");

        let sink: Box<dyn BlockFileSink> = Box::new(InMemoryBlockFileSink::new());
        assert!(sink.latest().expect("in-memory latest").is_none());
    }
}
