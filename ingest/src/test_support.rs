//! Fixture builders shared by the unit tests.
//!
//! [`FixtureBlock`] builds internally consistent block stream files: the
//! root hash it reports is what the reader computes for the encoded bytes,
//! so chains of fixtures can be linked and signed like real blocks.

use ed25519_dalek::{Signer, SigningKey};
use prost::Message;

use crate::hash::{BlockRootHashDigest, IncrementalStreamingHasher, hash_internal_node, hash_leaf};
use crate::proto::block_item::Item;
use crate::proto::{
    self, Block, BlockFooter, BlockHeader, BlockItem, BlockProof, MerklePath, RoundHeader,
    SchnorrSignatures, SiblingNode, SignedTransaction, StateChanges, StateProof, Timestamp,
    TransactionBody, TransactionResult, TssSignedBlockProof, block_proof, merkle_path,
    tss_signed_block_proof,
};
use crate::tss::NodeSignature;
use crate::types::{Hash384, Ledger, NodeContribution};

pub(crate) const LEDGER_ID: &[u8] = b"test-ledger";
pub(crate) const SUCCESS: i32 = 22;
const BASE_SECONDS: i64 = 1_700_000_000;

/// Deterministic Ed25519 keys, one per node.
pub(crate) fn signing_keys(count: usize) -> Vec<SigningKey> {
    (0..count)
        .map(|i| SigningKey::from_bytes(&[i as u8 + 1; 32]))
        .collect()
}

/// Ledger where node `i` owns `keys[i]` with `weights[i]`.
pub(crate) fn schnorr_ledger(keys: &[SigningKey], weights: &[u64]) -> Ledger {
    Ledger {
        ledger_id: LEDGER_ID.to_vec(),
        history_proof_verification_key: Vec::new(),
        node_contributions: keys
            .iter()
            .zip(weights)
            .enumerate()
            .map(|(i, (key, weight))| NodeContribution {
                node_id: i as u64,
                weight: *weight,
                history_proof_key: key.verifying_key().to_bytes().to_vec(),
            })
            .collect(),
        consensus_timestamp: BASE_SECONDS,
    }
}

/// Signatures of the given nodes over `message` under `ledger`.
pub(crate) fn schnorr_sign(
    ledger: &Ledger,
    keys: &[SigningKey],
    signers: &[u64],
    message: &[u8],
) -> Vec<NodeSignature> {
    let payload = ledger.signing_payload(message);
    signers
        .iter()
        .map(|&node_id| NodeSignature {
            node_id,
            signature: keys[node_id as usize].sign(&payload).to_bytes().to_vec(),
        })
        .collect()
}

pub(crate) fn schnorr_proof(signatures: &[NodeSignature]) -> TssSignedBlockProof {
    TssSignedBlockProof {
        signature: Some(tss_signed_block_proof::Signature::SchnorrSignatures(
            SchnorrSignatures {
                signatures: signatures
                    .iter()
                    .map(|s| proto::NodeSignature {
                        node_id: s.node_id,
                        signature: s.signature.clone(),
                    })
                    .collect(),
            },
        )),
    }
}

pub(crate) fn item(item: Item) -> BlockItem {
    BlockItem { item: Some(item) }
}

/// An encodable block with a header, body items, a footer and an optional
/// proof.
#[derive(Clone, Debug)]
pub(crate) struct FixtureBlock {
    pub number: u64,
    pub timestamp: Timestamp,
    pub previous_hash: Vec<u8>,
    pub tree_hash: Vec<u8>,
    pub state_hash: Vec<u8>,
    pub body: Vec<BlockItem>,
    pub proof: Option<BlockProof>,
    pub with_footer: bool,
}

impl FixtureBlock {
    pub fn new(number: u64) -> Self {
        Self {
            number,
            timestamp: Timestamp {
                seconds: BASE_SECONDS + number as i64,
                nanos: 0,
            },
            previous_hash: vec![0x01; 48],
            tree_hash: vec![0x02; 48],
            state_hash: vec![0x03; 48],
            body: Vec::new(),
            proof: None,
            with_footer: true,
        }
    }

    pub fn with_previous_hash(mut self, previous_hash: Vec<u8>) -> Self {
        self.previous_hash = previous_hash;
        self
    }

    pub fn with_item(mut self, block_item: BlockItem) -> Self {
        self.body.push(block_item);
        self
    }

    pub fn with_round(self, round_number: u64) -> Self {
        self.with_item(item(Item::RoundHeader(RoundHeader { round_number })))
    }

    /// Adds a signed transaction and its result.
    pub fn with_transaction(
        self,
        memo: &str,
        status: i32,
        consensus_nanos: i64,
        parent_nanos: Option<i64>,
    ) -> Self {
        self.with_item(item(Item::SignedTransaction(signed_transaction_bytes(memo))))
            .with_result(status, consensus_nanos, parent_nanos)
    }

    /// Adds a result without a preceding transaction.
    pub fn with_result(self, status: i32, consensus_nanos: i64, parent_nanos: Option<i64>) -> Self {
        self.with_item(item(Item::TransactionResult(TransactionResult {
            status,
            consensus_timestamp: Some(Timestamp::from_nanos(consensus_nanos)),
            parent_consensus_timestamp: parent_nanos.map(Timestamp::from_nanos),
            transaction_fee_charged: 1,
        })))
    }

    pub fn with_state_changes(self, consensus_nanos: i64) -> Self {
        self.with_item(item(Item::StateChanges(StateChanges {
            consensus_timestamp: Some(Timestamp::from_nanos(consensus_nanos)),
            state_changes: Vec::new(),
        })))
    }

    pub fn with_proof(mut self, proof: block_proof::Proof) -> Self {
        self.proof = Some(BlockProof {
            block: self.number,
            proof: Some(proof),
        });
        self
    }

    pub fn without_footer(mut self) -> Self {
        self.with_footer = false;
        self
    }

    /// Signs the block root with the given nodes.
    pub fn signed(self, ledger: &Ledger, keys: &[SigningKey], signers: &[u64]) -> Self {
        let signatures = schnorr_sign(ledger, keys, signers, self.root_hash().as_ref());
        self.with_proof(block_proof::Proof::SignedBlockProof(schnorr_proof(
            &signatures,
        )))
    }

    pub fn header_item(&self) -> BlockItem {
        item(Item::BlockHeader(BlockHeader {
            number: self.number,
            block_timestamp: Some(self.timestamp),
            hash_algorithm: 0,
        }))
    }

    fn footer_item(&self) -> BlockItem {
        item(Item::BlockFooter(BlockFooter {
            previous_block_root_hash: self.previous_hash.clone(),
            root_hash_of_all_block_hashes_tree: self.tree_hash.clone(),
            start_of_block_state_root_hash: self.state_hash.clone(),
        }))
    }

    /// Items in file order: header, body, footer, proof.
    pub fn items(&self) -> Vec<BlockItem> {
        let mut items = vec![self.header_item()];
        items.extend(self.body.iter().cloned());
        if self.with_footer {
            items.push(self.footer_item());
        }
        if let Some(proof) = &self.proof {
            items.push(item(Item::BlockProof(proof.clone())));
        }
        items
    }

    pub fn encode(&self) -> Vec<u8> {
        Block {
            items: self.items(),
        }
        .encode_to_vec()
    }

    pub fn root_hash(&self) -> Hash384 {
        let mut digest = BlockRootHashDigest::new();
        for block_item in self.items() {
            digest.add_decoded(&block_item).expect("fixture item");
        }
        digest.digest().expect("fixture block has header and footer")
    }

    pub fn timestamp_leaf(&self) -> Vec<u8> {
        self.timestamp.encode_to_vec()
    }

    /// Siblings that rebuild this block's root from its previous hash,
    /// excluding the timestamp leaf.
    fn siblings(&self) -> Vec<SiblingNode> {
        assert!(
            self.body.is_empty(),
            "state proof fixtures only cover header-only blocks"
        );
        let empty = hash_leaf(&[]);
        let mut outputs = IncrementalStreamingHasher::new();
        outputs.add_leaf(&self.header_item().encode_to_vec());
        let outputs = outputs.compute_root_hash();

        let consensus_subtree = hash_internal_node(&self.state_hash, empty.as_ref());
        let content_subtree = hash_internal_node(
            hash_internal_node(empty.as_ref(), outputs.as_ref()).as_ref(),
            hash_internal_node(empty.as_ref(), empty.as_ref()).as_ref(),
        );

        vec![
            sibling(false, self.tree_hash.clone()),
            sibling(false, consensus_subtree.as_ref().to_vec()),
            sibling(false, content_subtree.as_ref().to_vec()),
        ]
    }
}

fn sibling(is_left: bool, hash: Vec<u8>) -> SiblingNode {
    SiblingNode { is_left, hash }
}

pub(crate) fn signed_transaction_bytes(memo: &str) -> Vec<u8> {
    SignedTransaction {
        body_bytes: TransactionBody {
            memo: memo.to_string(),
            transaction_fee: 10,
            ..Default::default()
        }
        .encode_to_vec(),
        sig_map: vec![0xAA; 4],
        use_serialized_tx_message_hash_algorithm: false,
    }
    .encode_to_vec()
}

/// Merkle paths proving `current` is an ancestor of `signed`, which must
/// directly follow it.
pub(crate) fn state_proof_paths(current: &FixtureBlock, signed: &FixtureBlock) -> Vec<MerklePath> {
    let mut siblings = current.siblings();
    siblings.push(sibling(true, hash_leaf(&current.timestamp_leaf()).as_ref().to_vec()));
    siblings.extend(signed.siblings());

    vec![
        MerklePath {
            content: Some(merkle_path::Content::TimestampLeaf(signed.timestamp_leaf())),
            siblings: Vec::new(),
            next_path_index: 2,
        },
        MerklePath {
            content: Some(merkle_path::Content::Hash(current.previous_hash.clone())),
            siblings,
            next_path_index: 2,
        },
        MerklePath {
            content: None,
            siblings: Vec::new(),
            next_path_index: -1,
        },
    ]
}

/// A state proof for `current` whose signed block is `signed`.
pub(crate) fn state_proof(
    current: &FixtureBlock,
    signed: &FixtureBlock,
    signed_block_proof: TssSignedBlockProof,
) -> block_proof::Proof {
    block_proof::Proof::BlockStateProof(StateProof {
        paths: state_proof_paths(current, signed),
        signed_block_proof: Some(signed_block_proof),
    })
}
