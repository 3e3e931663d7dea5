//! State proof recomputation.
//!
//! A block whose proof is a state proof is not signed directly. Instead it
//! carries three merkle paths into a later block that is signed:
//!
//! - lane 0: the later block's timestamp leaf,
//! - lane 1: starts at this block's previous block root hash; its siblings
//!   first rebuild this block's root, then continue into the later block,
//! - lane 2: the terminal lane that both other lanes feed into.
//!
//! Siblings come in groups of four. The third sibling of each group closes
//! a depth-3 subtree whose parent is a single-child node, and the fourth is
//! the timestamp leaf on the left of the block root. Lane 1 therefore needs
//! at least seven siblings: four for this block, three for the later one
//! (whose timestamp comes from lane 0).

use super::{hash_internal_node, hash_leaf, hash_single_child};
use crate::error::{IngestError, Result};
use crate::proto::MerklePath;
use crate::types::Hash384;

const PATH_COUNT: usize = 3;
const MIN_PREVIOUS_BLOCK_ROOT_SIBLINGS: usize = 7;
const SIBLING_GROUP_SIZE: usize = 4;
const DEPTH3_RIGHT_SIBLING_INDEX: usize = 2;
const TERMINAL_LANE: i32 = 2;

/// Recomputes the signed root a state proof leads to.
#[derive(Clone, Copy, Debug, Default)]
pub struct StateProofVerifier;

impl StateProofVerifier {
    pub fn new() -> Self {
        Self
    }

    /// Verifies that `paths` rebuild `current_root_hash` and returns the root
    /// of the later block the threshold signature is for.
    pub fn get_root_hash(
        &self,
        block_number: u64,
        current_root_hash: &Hash384,
        paths: &[MerklePath],
    ) -> Result<Hash384> {
        if paths.len() != PATH_COUNT {
            return Err(IngestError::invalid(format!(
                "Number of merkle paths in block {block_number}'s StateProof is not {PATH_COUNT}"
            )));
        }

        let previous_root_lane = &paths[1];
        let siblings = &previous_root_lane.siblings;
        if siblings.len() < MIN_PREVIOUS_BLOCK_ROOT_SIBLINGS {
            return Err(IngestError::invalid(format!(
                "Block {block_number}'s merkle path from the previous block root has less than \
                 {MIN_PREVIOUS_BLOCK_ROOT_SIBLINGS} siblings"
            )));
        }

        check_lanes(block_number, paths)?;

        let timestamp_leaf = paths[0].timestamp_leaf().ok_or_else(|| {
            IngestError::invalid(format!(
                "Block {block_number}'s first merkle path has no timestamp leaf"
            ))
        })?;
        let start = previous_root_lane.hash().ok_or_else(|| {
            IngestError::invalid(format!(
                "Block {block_number}'s merkle path from the previous block root has no hash"
            ))
        })?;

        let mut running = start.to_vec();
        for (i, sibling) in siblings.iter().enumerate() {
            let node = if sibling.is_left {
                hash_internal_node(&sibling.hash, &running)
            } else {
                hash_internal_node(&running, &sibling.hash)
            };

            let node = if i % SIBLING_GROUP_SIZE == DEPTH3_RIGHT_SIBLING_INDEX {
                hash_single_child(node.as_ref())
            } else {
                node
            };

            if i == SIBLING_GROUP_SIZE - 1 && node != *current_root_hash {
                return Err(IngestError::RootHashMismatch {
                    block: block_number,
                    expected: current_root_hash.to_hex(),
                    actual: node.to_hex(),
                });
            }

            running = node.as_ref().to_vec();
        }

        let depth1_left = hash_leaf(timestamp_leaf);
        Ok(hash_internal_node(depth1_left.as_ref(), &running))
    }
}

/// Lanes 0 and 1 both feed the terminal lane.
fn check_lanes(block_number: u64, paths: &[MerklePath]) -> Result<()> {
    for (lane, path) in paths.iter().enumerate().take(2) {
        if path.next_path_index != TERMINAL_LANE {
            return Err(IngestError::invalid(format!(
                "Block {block_number}'s merkle path {lane} continues at path {}, expected {TERMINAL_LANE}",
                path.next_path_index
            )));
        }
    }

    let terminal = &paths[TERMINAL_LANE as usize];
    if terminal.next_path_index != -1 {
        return Err(IngestError::invalid(format!(
            "Block {block_number}'s merkle path {TERMINAL_LANE} is not terminal, continues at path {}",
            terminal.next_path_index
        )));
    }

    Ok(())
}
