//! Wire messages for block stream and signature files.
//!
//! These are hand-maintained `prost` messages mirroring the subset of the
//! ledger's protobuf schema the pipeline needs. Field tags must match the
//! published schema byte for byte, because block root hashes are computed
//! over the exact serialized items.
//!
//! - [`block`]: blocks, items, headers, footers and proofs.
//! - [`transaction`]: signed transaction envelopes and bodies.
//! - [`signature`]: protobuf-framed (v6) signature files.

pub mod block;
pub mod signature;
pub mod transaction;

pub use block::{
    Block, BlockFooter, BlockHeader, BlockItem, BlockProof, EventHeader, MerklePath, NodeSignature,
    RawBlock, RoundHeader, SchnorrSignatures, SiblingNode, StateChange, StateChanges, StateProof,
    TraceData, TransactionOutput, TransactionResult, TssSignedBlockProof, block_item, block_proof,
    merkle_path, transaction_output, tss_signed_block_proof,
};
pub use signature::{HashObject, SignatureFile, SignatureObject};
pub use transaction::{AccountId, SignedTransaction, TransactionBody, TransactionId};

/// Protobuf well-known `Timestamp` layout.
#[derive(Clone, Copy, PartialEq, Eq, Hash, ::prost::Message)]
pub struct Timestamp {
    #[prost(int64, tag = "1")]
    pub seconds: i64,
    #[prost(int32, tag = "2")]
    pub nanos: i32,
}

const NANOS_PER_SECOND: i64 = 1_000_000_000;

impl Timestamp {
    /// Nanoseconds since the epoch, saturating at the `i64` bounds.
    pub fn to_nanos(&self) -> i64 {
        self.seconds
            .saturating_mul(NANOS_PER_SECOND)
            .saturating_add(i64::from(self.nanos))
    }

    pub fn from_nanos(nanos: i64) -> Self {
        Self {
            seconds: nanos.div_euclid(NANOS_PER_SECOND),
            nanos: nanos.rem_euclid(NANOS_PER_SECOND) as i32,
        }
    }
}
