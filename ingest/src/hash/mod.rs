//! Merkle hashing for block streams.
//!
//! All hashing is SHA-384 with a one-byte domain tag so that leaves,
//! single-child nodes and two-child nodes can never collide:
//!
//! - leaf: `SHA-384(0x00 || data)`
//! - single-child internal node: `SHA-384(0x01 || child)`
//! - two-child internal node: `SHA-384(0x02 || left || right)`
//!
//! Building blocks on top of these primitives:
//!
//! - [`IncrementalStreamingHasher`]: streaming Merkle root with O(log n) memory,
//! - [`BlockRootHashDigest`]: the root hash of a whole block,
//! - [`StateProofVerifier`]: recomputation of a block root through a state proof.

pub mod root;
pub mod state_proof;
pub mod streaming;

use sha2::{Digest, Sha384};

use crate::types::Hash384;

pub use root::BlockRootHashDigest;
pub use state_proof::StateProofVerifier;
pub use streaming::IncrementalStreamingHasher;

const LEAF_PREFIX: u8 = 0x00;
const SINGLE_CHILD_PREFIX: u8 = 0x01;
const INTERNAL_NODE_PREFIX: u8 = 0x02;

/// Hashes a leaf.
pub fn hash_leaf(data: &[u8]) -> Hash384 {
    let mut digest = Sha384::new();
    digest.update([LEAF_PREFIX]);
    digest.update(data);
    Hash384::from_digest(digest.finalize())
}

/// Hashes an internal node with two children.
///
/// Operands are raw byte slices: footer hashes and proof siblings arrive
/// from the wire and are not required to be 48 bytes long.
pub fn hash_internal_node(left: &[u8], right: &[u8]) -> Hash384 {
    let mut digest = Sha384::new();
    digest.update([INTERNAL_NODE_PREFIX]);
    digest.update(left);
    digest.update(right);
    Hash384::from_digest(digest.finalize())
}

/// Hashes an internal node with a single child.
pub fn hash_single_child(child: &[u8]) -> Hash384 {
    let mut digest = Sha384::new();
    digest.update([SINGLE_CHILD_PREFIX]);
    digest.update(child);
    Hash384::from_digest(digest.finalize())
}
