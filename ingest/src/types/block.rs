// ingest/src/types/block.rs

//! Parsed block files.
//!
//! A [`BlockFile`] is one unit of ingestion. It exclusively owns its
//! transaction items, which are stored as an arena: every [`BlockItem`]
//! refers to its predecessor and its logical parent by [`ItemId`] rather
//! than by reference. Links only ever point to earlier items, so the chain
//! cannot contain cycles.

use std::collections::HashMap;

use prost::Message;

use super::{DigestAlgorithm, Hash384};
use crate::error::{IngestError, Result};
use crate::proto::transaction_output::{Kind as OutputKind, Transaction as Output};
use crate::proto::{
    BlockHeader, BlockProof, SignedTransaction, StateChanges, TransactionBody, TransactionOutput,
    TransactionResult,
};

/// Index of an item within its block file.
pub type ItemId = usize;

/// Statuses that count as success: `SUCCESS`, `FEE_SCHEDULE_FILE_PART_UPLOADED`
/// and `SUCCESS_BUT_MISSING_EXPECTED_OPERATION`.
pub const SUCCESS_STATUSES: [i32; 3] = [22, 104, 220];

/// Block stream reader format version recorded on parsed files.
pub const BLOCK_FILE_VERSION: u32 = 7;

/// One transaction's parsed facts.
#[derive(Clone, Debug)]
pub struct BlockItem {
    pub id: ItemId,
    /// Raw signed transaction bytes, absent for results without a
    /// preceding transaction (e.g. system-generated children).
    pub transaction_bytes: Option<Vec<u8>>,
    pub signed_transaction: Option<SignedTransaction>,
    pub transaction_result: TransactionResult,
    pub transaction_outputs: Vec<TransactionOutput>,
    /// Only state changes whose timestamp equals this item's consensus
    /// timestamp.
    pub state_changes: Vec<StateChanges>,
    pub consensus_timestamp: i64,
    pub parent_consensus_timestamp: Option<i64>,
    pub previous: Option<ItemId>,
    pub parent: Option<ItemId>,
    successful: bool,
}

impl BlockItem {
    pub fn status(&self) -> i32 {
        self.transaction_result.status
    }

    /// True if the status is a success code and the resolved parent, if
    /// any, was successful too.
    pub fn successful(&self) -> bool {
        self.successful
    }

    /// SHA-384 of the signed transaction bytes.
    pub fn transaction_hash(&self) -> Option<Hash384> {
        self.transaction_bytes.as_deref().map(Hash384::compute)
    }

    /// Decodes the transaction body on demand.
    pub fn transaction_body(&self) -> Result<Option<TransactionBody>> {
        let Some(signed) = &self.signed_transaction else {
            return Ok(None);
        };

        TransactionBody::decode(signed.body_bytes.as_slice())
            .map(Some)
            .map_err(|e| IngestError::invalid(format!("Failed to deserialize TransactionBody: {e}")))
    }

    pub fn transaction_output(&self, kind: OutputKind) -> Option<&Output> {
        self.transaction_outputs
            .iter()
            .filter_map(|o| o.transaction.as_ref())
            .find(|t| t.kind() == kind)
    }
}

/// The minimum a verifier needs to chain the next block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockSummary {
    pub index: u64,
    pub hash: Hash384,
    pub consensus_start: i64,
}

/// One parsed block stream file.
#[derive(Clone, Debug, Default)]
pub struct BlockFile {
    /// Raw file bytes, kept only when configured.
    pub bytes: Option<Vec<u8>>,
    pub consensus_start: i64,
    pub consensus_end: i64,
    pub count: u64,
    pub digest_algorithm: DigestAlgorithm,
    /// Root hash over the block's items; absent when the block has no footer.
    pub hash: Option<Hash384>,
    pub index: u64,
    pub items: Vec<BlockItem>,
    pub load_start: i64,
    pub load_end: i64,
    pub name: String,
    pub node: String,
    pub previous_hash: Option<Hash384>,
    pub round_start: Option<u64>,
    pub round_end: Option<u64>,
    pub size: usize,
    pub version: u32,
    pub block_header: Option<BlockHeader>,
    pub block_proof: Option<BlockProof>,
    /// Latest item per consensus timestamp, for parent resolution.
    by_timestamp: HashMap<i64, ItemId>,
}

impl BlockFile {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: BLOCK_FILE_VERSION,
            ..Default::default()
        }
    }

    /// Records a round header. The first round seen is the start.
    pub fn on_new_round(&mut self, round_number: u64) {
        if self.round_start.is_none() {
            self.round_start = Some(round_number);
        }
        self.round_end = Some(round_number);
    }

    /// Appends a closed-out transaction, linking it to its predecessor and
    /// resolving its parent.
    pub fn push_item(
        &mut self,
        transaction_bytes: Option<Vec<u8>>,
        signed_transaction: Option<SignedTransaction>,
        transaction_result: TransactionResult,
    ) -> ItemId {
        let id = self.items.len();
        let previous = id.checked_sub(1);
        let consensus_timestamp = transaction_result
            .consensus_timestamp
            .map(|t| t.to_nanos())
            .unwrap_or_default();
        let parent_consensus_timestamp = transaction_result
            .parent_consensus_timestamp
            .map(|t| t.to_nanos());

        let parent = parent_consensus_timestamp.and_then(|ts| self.by_timestamp.get(&ts).copied());
        let successful = SUCCESS_STATUSES.contains(&transaction_result.status)
            && parent.is_none_or(|p| self.items[p].successful);

        self.items.push(BlockItem {
            id,
            transaction_bytes,
            signed_transaction,
            transaction_result,
            transaction_outputs: Vec::new(),
            state_changes: Vec::new(),
            consensus_timestamp,
            parent_consensus_timestamp,
            previous,
            parent,
            successful,
        });
        self.by_timestamp.insert(consensus_timestamp, id);
        self.count = self.items.len() as u64;
        id
    }

    pub fn item(&self, id: ItemId) -> Option<&BlockItem> {
        self.items.get(id)
    }

    pub fn last_item_mut(&mut self) -> Option<&mut BlockItem> {
        self.items.last_mut()
    }

    pub fn previous(&self, id: ItemId) -> Option<&BlockItem> {
        self.items.get(id)?.previous.and_then(|p| self.items.get(p))
    }

    pub fn parent(&self, id: ItemId) -> Option<&BlockItem> {
        self.items.get(id)?.parent.and_then(|p| self.items.get(p))
    }

    pub fn summary(&self) -> Option<BlockSummary> {
        Some(BlockSummary {
            index: self.index,
            hash: self.hash?,
            consensus_start: self.consensus_start,
        })
    }
}
