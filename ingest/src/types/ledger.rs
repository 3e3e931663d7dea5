//! Ledger identity records.
//!
//! A [`Ledger`] is the trust anchor for block signatures: the ledger id
//! binds signatures to one network, the history proof verification key
//! verifies aggregate (lattice) signatures, and the node contributions carry
//! each node's weight and key for per-node (Schnorr) signatures.

/// One node's share of the ledger's signing weight.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeContribution {
    pub node_id: u64,
    pub weight: u64,
    /// Public key the node signs block roots with.
    pub history_proof_key: Vec<u8>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Ledger {
    pub ledger_id: Vec<u8>,
    pub history_proof_verification_key: Vec<u8>,
    /// Ordered by node id.
    pub node_contributions: Vec<NodeContribution>,
    /// Consensus time the ledger was published at, in nanoseconds.
    pub consensus_timestamp: i64,
}

impl Ledger {
    /// Sum of all node weights, saturating.
    pub fn total_weight(&self) -> u64 {
        self.node_contributions
            .iter()
            .fold(0u64, |acc, c| acc.saturating_add(c.weight))
    }

    pub fn contribution(&self, node_id: u64) -> Option<&NodeContribution> {
        self.node_contributions.iter().find(|c| c.node_id == node_id)
    }

    /// The bytes a signature actually covers: the ledger id followed by the
    /// message. Binding the id prevents replay across networks.
    pub fn signing_payload(&self, message: &[u8]) -> Vec<u8> {
        let mut payload = Vec::with_capacity(self.ledger_id.len() + message.len());
        payload.extend_from_slice(&self.ledger_id);
        payload.extend_from_slice(message);
        payload
    }
}
