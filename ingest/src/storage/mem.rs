//! In-memory storage collaborators.
//!
//! Useful for unit tests, the demo binary and short-lived verification
//! runs. Everything lives behind `parking_lot` locks so the types can be
//! shared across tasks.

use parking_lot::{Mutex, RwLock};

use super::{BlockFileSink, LedgerRepository, StorageError};
use crate::types::{BlockFile, BlockSummary, Ledger};

/// In-memory implementation of [`LedgerRepository`].
#[derive(Default)]
pub struct InMemoryLedgerRepository {
    ledgers: RwLock<Vec<Ledger>>,
}

impl InMemoryLedgerRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn save(&self, ledger: Ledger) {
        self.ledgers.write().push(ledger);
    }

    pub fn len(&self) -> usize {
        self.ledgers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.ledgers.read().is_empty()
    }
}

impl LedgerRepository for InMemoryLedgerRepository {
    fn find_latest(&self) -> Result<Option<Ledger>, StorageError> {
        Ok(self
            .ledgers
            .read()
            .iter()
            .max_by_key(|l| l.consensus_timestamp)
            .cloned())
    }
}

/// In-memory implementation of [`BlockFileSink`].
///
/// Keeps every persisted block unless `retain_items` is false, in which
/// case item arenas and raw bytes are dropped after persisting.
pub struct InMemoryBlockFileSink {
    blocks: Mutex<Vec<BlockFile>>,
    latest: Mutex<Option<BlockSummary>>,
    retain_items: bool,
}

impl Default for InMemoryBlockFileSink {
    fn default() -> Self {
        Self {
            blocks: Mutex::new(Vec::new()),
            latest: Mutex::new(None),
            retain_items: true,
        }
    }
}

impl InMemoryBlockFileSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sink that only keeps block metadata.
    pub fn metadata_only() -> Self {
        Self {
            retain_items: false,
            ..Self::default()
        }
    }

    /// Seeds the sink as if `summary` had been persisted earlier.
    pub fn with_latest(summary: BlockSummary) -> Self {
        let sink = Self::default();
        *sink.latest.lock() = Some(summary);
        sink
    }

    pub fn blocks(&self) -> Vec<BlockFile> {
        self.blocks.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.blocks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.lock().is_empty()
    }
}

impl BlockFileSink for InMemoryBlockFileSink {
    fn latest(&self) -> Result<Option<BlockSummary>, StorageError> {
        Ok(self.latest.lock().clone())
    }

    fn persist(&self, mut block_file: BlockFile) -> Result<(), StorageError> {
        let summary = block_file.summary().ok_or_else(|| {
            StorageError::Corrupted(format!("block file {} has no root hash", block_file.name))
        })?;

        if !self.retain_items {
            block_file.items.clear();
            block_file.bytes = None;
        }

        self.blocks.lock().push(block_file);
        *self.latest.lock() = Some(summary);
        Ok(())
    }
}
