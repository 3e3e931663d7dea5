//! Threshold signature verification of block roots.
//!
//! Blocks are signed on behalf of the whole network. A proof declares one
//! of two schemes:
//!
//! - **lattice**: one aggregate Dilithium (ML-DSA) signature verified with
//!   the ledger's history proof verification key,
//! - **schnorr**: per-node Ed25519 signatures verified with each node's
//!   history proof key; the signers' combined weight must exceed one third
//!   of the ledger's total weight.
//!
//! Either way the signed payload is `ledger_id || message`.
//!
//! The ledger trust anchor is resolved in order from an explicitly set
//! ledger, the latest persisted ledger, then the configured ledger. The
//! persisted ledger is cached once found; until then the repository is
//! asked on every call and the configured ledger stands in.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use ed25519_dalek::{Signature as Ed25519Signature, VerifyingKey};
use parking_lot::RwLock;
use pqcrypto_dilithium::dilithium5;
use pqcrypto_traits::sign::{DetachedSignature as _, PublicKey as _};
use tracing::{debug, info};

use crate::error::{IngestError, Result};
use crate::proto::{TssSignedBlockProof, tss_signed_block_proof};
use crate::storage::LedgerRepository;
use crate::types::Ledger;

const MISSING_LEDGER: &str =
    "Ledger id, history proof verification key and node contributions not found";

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum SignatureScheme {
    Lattice,
    Schnorr,
}

impl fmt::Display for SignatureScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignatureScheme::Lattice => f.write_str("lattice"),
            SignatureScheme::Schnorr => f.write_str("schnorr"),
        }
    }
}

/// One node's signature over a block root.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeSignature {
    pub node_id: u64,
    pub signature: Vec<u8>,
}

/// A block signature in whichever scheme the block declares.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BlockSignature {
    Lattice(Vec<u8>),
    Schnorr(Vec<NodeSignature>),
}

impl BlockSignature {
    pub fn scheme(&self) -> SignatureScheme {
        match self {
            BlockSignature::Lattice(_) => SignatureScheme::Lattice,
            BlockSignature::Schnorr(_) => SignatureScheme::Schnorr,
        }
    }

    /// Extracts the signature from a signed block proof.
    pub fn from_proof(block_number: u64, proof: &TssSignedBlockProof) -> Result<Self> {
        match &proof.signature {
            Some(tss_signed_block_proof::Signature::LatticeSignature(bytes)) => {
                Ok(BlockSignature::Lattice(bytes.clone()))
            }
            Some(tss_signed_block_proof::Signature::SchnorrSignatures(set)) => {
                Ok(BlockSignature::Schnorr(
                    set.signatures
                        .iter()
                        .map(|s| NodeSignature {
                            node_id: s.node_id,
                            signature: s.signature.clone(),
                        })
                        .collect(),
                ))
            }
            None => Err(IngestError::invalid(format!(
                "Block {block_number}'s proof carries no TSS signature"
            ))),
        }
    }
}

/// Verifies block signatures against the active ledger.
pub struct ThresholdSignatureVerifier<R: LedgerRepository> {
    repository: R,
    configured: Option<Arc<Ledger>>,
    explicit: RwLock<Option<Arc<Ledger>>>,
    persisted: RwLock<Option<Arc<Ledger>>>,
}

impl<R: LedgerRepository> ThresholdSignatureVerifier<R> {
    pub fn new(repository: R, configured: Option<Ledger>) -> Self {
        Self {
            repository,
            configured: configured.map(Arc::new),
            explicit: RwLock::new(None),
            persisted: RwLock::new(None),
        }
    }

    /// Overrides every other ledger source for the life of the verifier.
    pub fn set_ledger(&self, ledger: Ledger) {
        info!(
            nodes = ledger.node_contributions.len(),
            total_weight = ledger.total_weight(),
            "using explicitly set ledger"
        );
        *self.explicit.write() = Some(Arc::new(ledger));
    }

    /// Active trust anchor.
    pub fn ledger(&self) -> Result<Arc<Ledger>> {
        if let Some(ledger) = self.explicit.read().as_ref() {
            return Ok(ledger.clone());
        }
        if let Some(ledger) = self.persisted.read().as_ref() {
            return Ok(ledger.clone());
        }

        let Some(found) = self.repository.find_latest()? else {
            return match &self.configured {
                Some(ledger) => Ok(ledger.clone()),
                None => Err(IngestError::IllegalState(MISSING_LEDGER.to_string())),
            };
        };

        let mut slot = self.persisted.write();
        let ledger = slot.get_or_insert_with(|| Arc::new(found)).clone();
        info!(
            consensus_timestamp = ledger.consensus_timestamp,
            nodes = ledger.node_contributions.len(),
            "loaded latest persisted ledger"
        );
        Ok(ledger)
    }

    /// Verifies `signature` over `message` for block `block_number`.
    pub fn verify(&self, block_number: u64, message: &[u8], signature: &BlockSignature) -> Result<()> {
        let ledger = self.ledger()?;
        let payload = ledger.signing_payload(message);

        let valid = match signature {
            BlockSignature::Lattice(bytes) => verify_lattice(&ledger, &payload, bytes),
            BlockSignature::Schnorr(signatures) => {
                verify_schnorr(block_number, &ledger, &payload, signatures)
            }
        };

        if valid {
            Ok(())
        } else {
            Err(IngestError::SignatureVerification(format!(
                "TSS signature verification failed for block {block_number} using {} scheme",
                signature.scheme()
            )))
        }
    }
}

fn verify_lattice(ledger: &Ledger, payload: &[u8], signature: &[u8]) -> bool {
    let Ok(public_key) = dilithium5::PublicKey::from_bytes(&ledger.history_proof_verification_key)
    else {
        return false;
    };
    let Ok(signature) = dilithium5::DetachedSignature::from_bytes(signature) else {
        return false;
    };

    dilithium5::verify_detached_signature(&signature, payload, &public_key).is_ok()
}

fn verify_schnorr(
    block_number: u64,
    ledger: &Ledger,
    payload: &[u8],
    signatures: &[NodeSignature],
) -> bool {
    let total_weight = ledger.total_weight();
    if total_weight == 0 {
        return false;
    }

    let mut signers = HashSet::new();
    let mut signed_weight = 0u64;
    for node_signature in signatures {
        if !signers.insert(node_signature.node_id) {
            continue;
        }
        let Some(contribution) = ledger.contribution(node_signature.node_id) else {
            continue;
        };
        if verify_node_signature(&contribution.history_proof_key, payload, &node_signature.signature)
        {
            signed_weight = signed_weight.saturating_add(contribution.weight);
        }
    }

    debug!(
        block = block_number,
        signed_weight, total_weight, "schnorr signature weight"
    );

    u128::from(signed_weight) * 3 > u128::from(total_weight)
}

fn verify_node_signature(key: &[u8], payload: &[u8], signature: &[u8]) -> bool {
    let Ok(key) = <[u8; 32]>::try_from(key) else {
        return false;
    };
    let Ok(key) = VerifyingKey::from_bytes(&key) else {
        return false;
    };
    let Ok(signature) = Ed25519Signature::from_slice(signature) else {
        return false;
    };

    key.verify_strict(payload, &signature).is_ok()
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use pqcrypto_traits::sign::{DetachedSignature as _, PublicKey as _};

    use super::*;
    use crate::proto::SchnorrSignatures;
    use crate::storage::{InMemoryLedgerRepository, StorageError};
    use crate::test_support::{LEDGER_ID, schnorr_ledger, schnorr_sign, signing_keys};

    /// Counts lookups so tests can check caching.
    struct CountingRepository {
        ledger: Option<Ledger>,
        calls: AtomicUsize,
    }

    impl CountingRepository {
        fn new(ledger: Option<Ledger>) -> Self {
            Self {
                ledger,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl LedgerRepository for &CountingRepository {
        fn find_latest(&self) -> std::result::Result<Option<Ledger>, StorageError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.ledger.clone())
        }
    }

    impl LedgerRepository for &InMemoryLedgerRepository {
        fn find_latest(&self) -> std::result::Result<Option<Ledger>, StorageError> {
            (**self).find_latest()
        }
    }

    fn ledger_with_id(id: &[u8]) -> Ledger {
        Ledger {
            ledger_id: id.to_vec(),
            ..Default::default()
        }
    }

    #[test]
    fn explicit_ledger_wins_over_every_other_source() {
        let repo = InMemoryLedgerRepository::new();
        repo.save(ledger_with_id(b"persisted"));
        let verifier = ThresholdSignatureVerifier::new(repo, Some(ledger_with_id(b"configured")));

        verifier.set_ledger(ledger_with_id(b"explicit"));

        assert_eq!(verifier.ledger().expect("resolves").ledger_id, b"explicit");
    }

    #[test]
    fn persisted_ledger_wins_over_configured() {
        let repo = CountingRepository::new(Some(ledger_with_id(b"rotated")));
        let verifier = ThresholdSignatureVerifier::new(&repo, Some(ledger_with_id(b"bootstrap")));

        assert_eq!(verifier.ledger().expect("resolves").ledger_id, b"rotated");
        assert_eq!(repo.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn configured_ledger_is_the_fallback_until_one_is_persisted() {
        let repo = InMemoryLedgerRepository::new();
        let verifier = ThresholdSignatureVerifier::new(&repo, Some(ledger_with_id(b"bootstrap")));

        assert_eq!(verifier.ledger().expect("resolves").ledger_id, b"bootstrap");

        repo.save(ledger_with_id(b"rotated"));
        assert_eq!(verifier.ledger().expect("resolves").ledger_id, b"rotated");
    }

    #[test]
    fn persisted_ledger_is_looked_up_once() {
        let repo = CountingRepository::new(Some(ledger_with_id(b"persisted")));
        let verifier = ThresholdSignatureVerifier::new(&repo, None);

        for _ in 0..3 {
            assert_eq!(verifier.ledger().expect("resolves").ledger_id, b"persisted");
        }
        assert_eq!(repo.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn missing_ledger_is_illegal_state() {
        let verifier = ThresholdSignatureVerifier::new(InMemoryLedgerRepository::new(), None);

        let err = verifier
            .verify(1, b"root", &BlockSignature::Lattice(vec![0; 8]))
            .expect_err("no trust anchor");
        match err {
            IngestError::IllegalState(msg) => assert_eq!(msg, MISSING_LEDGER),
            other => panic!("unexpected error variant: {other:?}"),
        }
    }

    #[test]
    fn lattice_signature_verifies_with_ledger_key() {
        let (public_key, secret_key) = dilithium5::keypair();
        let ledger = Ledger {
            ledger_id: LEDGER_ID.to_vec(),
            history_proof_verification_key: public_key.as_bytes().to_vec(),
            ..Default::default()
        };
        let message = [0x42u8; 48];
        let signature = dilithium5::detached_sign(&ledger.signing_payload(&message), &secret_key);
        let verifier = ThresholdSignatureVerifier::new(InMemoryLedgerRepository::new(), Some(ledger));

        verifier
            .verify(5, &message, &BlockSignature::Lattice(signature.as_bytes().to_vec()))
            .expect("valid lattice signature");

        let err = verifier
            .verify(5, &[0x43u8; 48], &BlockSignature::Lattice(signature.as_bytes().to_vec()))
            .expect_err("different message");
        assert_eq!(
            err.to_string(),
            "TSS signature verification failed for block 5 using lattice scheme"
        );
    }

    #[test]
    fn schnorr_signature_needs_more_than_a_third_of_weight() {
        let keys = signing_keys(4);
        let ledger = schnorr_ledger(&keys, &[10, 10, 10, 30]);
        let message = b"block root";
        let verifier =
            ThresholdSignatureVerifier::new(InMemoryLedgerRepository::new(), Some(ledger.clone()));

        // 20 of 60 is exactly a third: not enough.
        let weak = schnorr_sign(&ledger, &keys, &[0, 1], message);
        assert!(matches!(
            verifier.verify(9, message, &BlockSignature::Schnorr(weak)),
            Err(IngestError::SignatureVerification(_))
        ));

        let strong = schnorr_sign(&ledger, &keys, &[3], message);
        verifier
            .verify(9, message, &BlockSignature::Schnorr(strong))
            .expect("30 of 60 is enough");
    }

    #[test]
    fn duplicate_and_unknown_signers_do_not_add_weight() {
        let keys = signing_keys(3);
        let ledger = schnorr_ledger(&keys, &[10, 10, 10]);
        let message = b"block root";
        let verifier =
            ThresholdSignatureVerifier::new(InMemoryLedgerRepository::new(), Some(ledger.clone()));

        let mut signatures = schnorr_sign(&ledger, &keys, &[0], message);
        signatures.push(signatures[0].clone());
        signatures.push(NodeSignature {
            node_id: 99,
            signature: signatures[0].signature.clone(),
        });

        assert!(verifier
            .verify(1, message, &BlockSignature::Schnorr(signatures))
            .is_err());
    }

    #[test]
    fn schnorr_signature_over_other_message_fails() {
        let keys = signing_keys(2);
        let ledger = schnorr_ledger(&keys, &[1, 1]);
        let verifier =
            ThresholdSignatureVerifier::new(InMemoryLedgerRepository::new(), Some(ledger.clone()));

        let signatures = schnorr_sign(&ledger, &keys, &[0, 1], b"other root");
        let err = verifier
            .verify(3, b"block root", &BlockSignature::Schnorr(signatures))
            .expect_err("wrong message");
        assert!(err.to_string().contains("block 3"));
    }

    #[test]
    fn signature_is_extracted_from_proof() {
        let proof = TssSignedBlockProof {
            signature: Some(tss_signed_block_proof::Signature::SchnorrSignatures(
                SchnorrSignatures {
                    signatures: vec![crate::proto::NodeSignature {
                        node_id: 4,
                        signature: vec![1, 2],
                    }],
                },
            )),
        };
        let signature = BlockSignature::from_proof(1, &proof).expect("has signature");
        assert_eq!(signature.scheme(), SignatureScheme::Schnorr);

        let empty = TssSignedBlockProof::default();
        assert!(matches!(
            BlockSignature::from_proof(1, &empty),
            Err(IngestError::InvalidStreamFile(_))
        ));
    }
}
