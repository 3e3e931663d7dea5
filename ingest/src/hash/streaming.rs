//! Streaming Merkle root computation.

use super::{hash_internal_node, hash_leaf};
use crate::types::Hash384;

/// Folds an ordered sequence of leaves into a Merkle root without keeping
/// the leaves around.
///
/// The hasher keeps one pending subtree root per set bit of the leaf count,
/// so memory stays O(log n). Complete subtrees are merged as soon as they
/// are formed; the remaining ones are folded right to left when the root is
/// requested.
#[derive(Clone, Debug, Default)]
pub struct IncrementalStreamingHasher {
    pending: Vec<Hash384>,
    leaf_count: u64,
}

impl IncrementalStreamingHasher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one leaf, given its raw (unhashed) bytes.
    pub fn add_leaf(&mut self, data: &[u8]) {
        self.pending.push(hash_leaf(data));

        // Every trailing one bit of the old count is a complete subtree of the
        // same height as the one just closed.
        let mut n = self.leaf_count;
        while n & 1 == 1 {
            let (Some(right), Some(left)) = (self.pending.pop(), self.pending.pop()) else {
                break;
            };
            self.pending.push(hash_internal_node(left.as_ref(), right.as_ref()));
            n >>= 1;
        }

        self.leaf_count += 1;
    }

    /// Root over every leaf added so far.
    ///
    /// Does not consume the hasher; more leaves may be added afterwards.
    /// With no leaves the root is the empty leaf hash.
    pub fn compute_root_hash(&self) -> Hash384 {
        let Some((last, rest)) = self.pending.split_last() else {
            return hash_leaf(&[]);
        };

        rest.iter()
            .rev()
            .fold(*last, |root, left| hash_internal_node(left.as_ref(), root.as_ref()))
    }

    pub fn leaf_count(&self) -> u64 {
        self.leaf_count
    }

    /// Number of pending subtree roots; equals the popcount of the leaf count.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}
