//! Block root hash.
//!
//! The block merkle tree is laid out as:
//!
//! ```text
//!                 root
//!                /    \
//!               t    [single]
//!                       |
//!                   [internal]
//!              ______/    \______
//!             /                  \
//!        [internal]          [internal]
//!         /     \             /      \
//!      [ ]      [ ]        [ ]       [ ]
//!     /  \     /  \       /  \      /  \
//!    L1  L2   L3  L4     L5  L6    L7  L8
//! ```
//!
//! - `t`: leaf hash of the block timestamp
//! - `L1`: previous block root hash
//! - `L2`: root of the tree of all previous block hashes
//! - `L3`: state root at the start of the block
//! - `L4`..`L8`: streaming roots of consensus headers, inputs, outputs,
//!   state changes and trace data items
//!
//! The right child of the root has a single child; its sibling slot is
//! reserved by the block stream format.

use prost::Message;

use super::{IncrementalStreamingHasher, hash_internal_node, hash_leaf, hash_single_child};
use crate::error::{IngestError, Result};
use crate::proto::block_item::Item;
use crate::proto::{BlockItem, Timestamp};
use crate::types::Hash384;

/// Accumulates the items of one block and produces its root hash.
#[derive(Debug, Default)]
pub struct BlockRootHashDigest {
    consensus_headers: IncrementalStreamingHasher,
    inputs: IncrementalStreamingHasher,
    outputs: IncrementalStreamingHasher,
    state_changes: IncrementalStreamingHasher,
    trace_data: IncrementalStreamingHasher,

    block_timestamp: Option<Timestamp>,
    previous_hash: Option<Vec<u8>>,
    previous_blocks_tree_hash: Option<Vec<u8>>,
    start_of_block_state_hash: Option<Vec<u8>>,
    finalized: bool,
}

impl BlockRootHashDigest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one item. `raw` must be the item's exact encoding as read from
    /// the block file.
    pub fn add_block_item(&mut self, item: &BlockItem, raw: &[u8]) -> Result<()> {
        if self.finalized {
            return Err(IngestError::IllegalState(
                "Can't add more block items once finalized".to_string(),
            ));
        }

        let hasher = match &item.item {
            Some(Item::BlockHeader(header)) => {
                self.block_timestamp = Some(header.block_timestamp.unwrap_or_default());
                Some(&mut self.outputs)
            }
            Some(Item::BlockFooter(footer)) => {
                self.previous_hash = Some(footer.previous_block_root_hash.clone());
                self.previous_blocks_tree_hash =
                    Some(footer.root_hash_of_all_block_hashes_tree.clone());
                self.start_of_block_state_hash =
                    Some(footer.start_of_block_state_root_hash.clone());
                None
            }
            Some(Item::EventHeader(_)) | Some(Item::RoundHeader(_)) => {
                Some(&mut self.consensus_headers)
            }
            Some(Item::TransactionOutput(_)) | Some(Item::TransactionResult(_)) => {
                Some(&mut self.outputs)
            }
            Some(Item::SignedTransaction(_)) => Some(&mut self.inputs),
            Some(Item::StateChanges(_)) => Some(&mut self.state_changes),
            Some(Item::TraceData(_)) => Some(&mut self.trace_data),
            Some(Item::BlockProof(_)) | None => None,
        };

        if let Some(hasher) = hasher {
            hasher.add_leaf(raw);
        }

        Ok(())
    }

    /// Convenience for callers that hold a decoded item only.
    pub fn add_decoded(&mut self, item: &BlockItem) -> Result<()> {
        self.add_block_item(item, &item.encode_to_vec())
    }

    /// Computes the root hash and finalizes the digest.
    pub fn digest(&mut self) -> Result<Hash384> {
        if self.finalized {
            return Err(IngestError::IllegalState(
                "Block root hash digest is already finalized".to_string(),
            ));
        }

        let (Some(timestamp), Some(previous), Some(tree), Some(start_state)) = (
            self.block_timestamp,
            self.previous_hash.as_deref(),
            self.previous_blocks_tree_hash.as_deref(),
            self.start_of_block_state_hash.as_deref(),
        ) else {
            return Err(IngestError::IllegalState(
                "blockTimestamp / previousBlocksTreeHash / previousHash / startOfBlockStateHash are not set"
                    .to_string(),
            ));
        };

        let consensus_headers = self.consensus_headers.compute_root_hash();
        let inputs = self.inputs.compute_root_hash();
        let outputs = self.outputs.compute_root_hash();
        let state_changes = self.state_changes.compute_root_hash();
        let trace_data = self.trace_data.compute_root_hash();

        let depth2_left = combine(&[
            previous,
            tree,
            start_state,
            consensus_headers.as_ref(),
            inputs.as_ref(),
            outputs.as_ref(),
            state_changes.as_ref(),
            trace_data.as_ref(),
        ]);
        let depth1_right = hash_single_child(depth2_left.as_ref());
        let depth1_left = hash_leaf(&timestamp.encode_to_vec());

        self.finalized = true;
        Ok(hash_internal_node(depth1_left.as_ref(), depth1_right.as_ref()))
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }
}

/// Reduces eight leaves pairwise into their subtree root.
fn combine(leaves: &[&[u8]; 8]) -> Hash384 {
    let mut level: Vec<Hash384> = leaves
        .chunks(2)
        .map(|pair| hash_internal_node(pair[0], pair[1]))
        .collect();

    while level.len() > 1 {
        level = level
            .chunks(2)
            .map(|pair| hash_internal_node(pair[0].as_ref(), pair[1].as_ref()))
            .collect();
    }

    level[0]
}
