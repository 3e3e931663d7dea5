//! Block stream messages.

use super::Timestamp;

/// A block: the ordered list of items making up one stream file.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Block {
    #[prost(message, repeated, tag = "1")]
    pub items: Vec<BlockItem>,
}

/// Same wire layout as [`Block`], but keeps every item's exact encoding.
///
/// Root hashes are computed over item bytes as they appear in the file,
/// so the reader decodes through this view first.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RawBlock {
    #[prost(bytes = "vec", repeated, tag = "1")]
    pub items: Vec<Vec<u8>>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BlockItem {
    #[prost(oneof = "block_item::Item", tags = "1, 2, 3, 4, 5, 6, 7, 9, 11, 12")]
    pub item: Option<block_item::Item>,
}

pub mod block_item {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Item {
        #[prost(message, tag = "1")]
        BlockHeader(super::BlockHeader),
        #[prost(message, tag = "2")]
        EventHeader(super::EventHeader),
        #[prost(message, tag = "3")]
        RoundHeader(super::RoundHeader),
        #[prost(bytes, tag = "4")]
        SignedTransaction(Vec<u8>),
        #[prost(message, tag = "5")]
        TransactionResult(super::TransactionResult),
        #[prost(message, tag = "6")]
        TransactionOutput(super::TransactionOutput),
        #[prost(message, tag = "7")]
        StateChanges(super::StateChanges),
        #[prost(message, tag = "9")]
        BlockProof(super::BlockProof),
        #[prost(message, tag = "11")]
        TraceData(super::TraceData),
        #[prost(message, tag = "12")]
        BlockFooter(super::BlockFooter),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BlockHeader {
    #[prost(uint64, tag = "3")]
    pub number: u64,
    #[prost(message, optional, tag = "4")]
    pub block_timestamp: Option<Timestamp>,
    #[prost(int32, tag = "5")]
    pub hash_algorithm: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct EventHeader {
    #[prost(uint64, tag = "1")]
    pub creator_node_id: u64,
    #[prost(int64, tag = "2")]
    pub birth_round: i64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RoundHeader {
    #[prost(uint64, tag = "1")]
    pub round_number: u64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TransactionResult {
    #[prost(int32, tag = "1")]
    pub status: i32,
    #[prost(message, optional, tag = "2")]
    pub consensus_timestamp: Option<Timestamp>,
    #[prost(message, optional, tag = "3")]
    pub parent_consensus_timestamp: Option<Timestamp>,
    #[prost(uint64, tag = "5")]
    pub transaction_fee_charged: u64,
}

/// Per-transaction output that does not fit the generic result.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TransactionOutput {
    #[prost(oneof = "transaction_output::Transaction", tags = "2, 3, 4")]
    pub transaction: Option<transaction_output::Transaction>,
}

pub mod transaction_output {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub enum Kind {
        AccountCreate,
        ContractCall,
        UtilPrng,
    }

    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Transaction {
        #[prost(bytes, tag = "2")]
        AccountCreate(Vec<u8>),
        #[prost(bytes, tag = "3")]
        ContractCall(Vec<u8>),
        #[prost(bytes, tag = "4")]
        UtilPrng(Vec<u8>),
    }

    impl Transaction {
        pub fn kind(&self) -> Kind {
            match self {
                Transaction::AccountCreate(_) => Kind::AccountCreate,
                Transaction::ContractCall(_) => Kind::ContractCall,
                Transaction::UtilPrng(_) => Kind::UtilPrng,
            }
        }
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StateChanges {
    #[prost(message, optional, tag = "1")]
    pub consensus_timestamp: Option<Timestamp>,
    #[prost(message, repeated, tag = "2")]
    pub state_changes: Vec<StateChange>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StateChange {
    #[prost(uint32, tag = "1")]
    pub state_id: u32,
    #[prost(bytes = "vec", tag = "2")]
    pub change: Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TraceData {
    #[prost(bytes = "vec", tag = "1")]
    pub data: Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BlockFooter {
    #[prost(bytes = "vec", tag = "1")]
    pub previous_block_root_hash: Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    pub root_hash_of_all_block_hashes_tree: Vec<u8>,
    #[prost(bytes = "vec", tag = "3")]
    pub start_of_block_state_root_hash: Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BlockProof {
    #[prost(uint64, tag = "1")]
    pub block: u64,
    #[prost(oneof = "block_proof::Proof", tags = "4, 5")]
    pub proof: Option<block_proof::Proof>,
}

pub mod block_proof {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Proof {
        /// The block root itself is signed.
        #[prost(message, tag = "4")]
        SignedBlockProof(super::TssSignedBlockProof),
        /// The block root is proven into a later signed block.
        #[prost(message, tag = "5")]
        BlockStateProof(super::StateProof),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TssSignedBlockProof {
    #[prost(oneof = "tss_signed_block_proof::Signature", tags = "1, 2")]
    pub signature: Option<tss_signed_block_proof::Signature>,
}

pub mod tss_signed_block_proof {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Signature {
        #[prost(bytes, tag = "1")]
        LatticeSignature(Vec<u8>),
        #[prost(message, tag = "2")]
        SchnorrSignatures(super::SchnorrSignatures),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SchnorrSignatures {
    #[prost(message, repeated, tag = "1")]
    pub signatures: Vec<NodeSignature>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct NodeSignature {
    #[prost(uint64, tag = "1")]
    pub node_id: u64,
    #[prost(bytes = "vec", tag = "2")]
    pub signature: Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StateProof {
    #[prost(message, repeated, tag = "1")]
    pub paths: Vec<MerklePath>,
    #[prost(message, optional, tag = "2")]
    pub signed_block_proof: Option<TssSignedBlockProof>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MerklePath {
    #[prost(oneof = "merkle_path::Content", tags = "1, 2")]
    pub content: Option<merkle_path::Content>,
    #[prost(message, repeated, tag = "3")]
    pub siblings: Vec<SiblingNode>,
    #[prost(int32, tag = "4")]
    pub next_path_index: i32,
}

pub mod merkle_path {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Content {
        #[prost(bytes, tag = "1")]
        Hash(Vec<u8>),
        #[prost(bytes, tag = "2")]
        TimestampLeaf(Vec<u8>),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SiblingNode {
    #[prost(bool, tag = "1")]
    pub is_left: bool,
    #[prost(bytes = "vec", tag = "2")]
    pub hash: Vec<u8>,
}

impl MerklePath {
    /// Direct hash leaf, if this lane carries one.
    pub fn hash(&self) -> Option<&[u8]> {
        match &self.content {
            Some(merkle_path::Content::Hash(h)) => Some(h),
            _ => None,
        }
    }

    pub fn timestamp_leaf(&self) -> Option<&[u8]> {
        match &self.content {
            Some(merkle_path::Content::TimestampLeaf(t)) => Some(t),
            _ => None,
        }
    }
}
