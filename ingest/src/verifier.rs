//! Block stream verification.
//!
//! [`BlockStreamVerifier`] accepts parsed block files strictly in order and
//! only hands a block to the sink once it has checked that:
//!
//! - its number follows the last verified block and matches its file name,
//! - its previous hash is the last verified block's root hash,
//! - its root hash is signed by the network, either directly or through a
//!   state proof into a later signed block.
//!
//! The last verified block survives restarts through
//! [`BlockFileSink::latest`].

use std::time::Instant;

use chrono::Utc;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::error::{IngestError, Result};
use crate::hash::StateProofVerifier;
use crate::metrics::IngestMetrics;
use crate::proto::block_proof::Proof;
use crate::storage::{BlockFileSink, LedgerRepository};
use crate::tss::{BlockSignature, ThresholdSignatureVerifier};
use crate::types::{BlockFile, BlockSummary, Hash384};

const NANOS_PER_SECOND: f64 = 1_000_000_000.0;

#[derive(Default)]
struct ChainTip {
    last: Option<BlockSummary>,
    bootstrapped: bool,
}

pub struct BlockStreamVerifier<R: LedgerRepository, S: BlockFileSink> {
    tss: ThresholdSignatureVerifier<R>,
    state_proofs: StateProofVerifier,
    sink: S,
    tip: Mutex<ChainTip>,
    metrics: Option<IngestMetrics>,
}

impl<R: LedgerRepository, S: BlockFileSink> BlockStreamVerifier<R, S> {
    pub fn new(tss: ThresholdSignatureVerifier<R>, sink: S) -> Self {
        Self {
            tss,
            state_proofs: StateProofVerifier::new(),
            sink,
            tip: Mutex::new(ChainTip::default()),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: IngestMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn tss(&self) -> &ThresholdSignatureVerifier<R> {
        &self.tss
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Last verified block, loading it from the sink on first use.
    pub fn last_block(&self) -> Result<Option<BlockSummary>> {
        let mut tip = self.tip.lock();
        self.bootstrap(&mut tip)?;
        Ok(tip.last.clone())
    }

    /// Verifies `block_file` and persists it. Rejected blocks are not
    /// persisted and do not move the chain tip.
    pub fn verify(&self, block_file: BlockFile) -> Result<()> {
        let started = Instant::now();
        let name = block_file.name.clone();
        let result = self.verify_and_persist(block_file);

        if let Some(metrics) = &self.metrics {
            metrics.observe_verification(result.is_ok(), started.elapsed().as_secs_f64());
        }
        if let Err(err) = &result {
            warn!(file = %name, error = %err, "rejected block file");
        }
        result
    }

    fn bootstrap(&self, tip: &mut ChainTip) -> Result<()> {
        if !tip.bootstrapped {
            tip.last = self.sink.latest()?;
            tip.bootstrapped = true;
            if let Some(last) = &tip.last {
                debug!(block = last.index, hash = %last.hash, "resuming after persisted block");
            }
        }
        Ok(())
    }

    fn verify_and_persist(&self, block_file: BlockFile) -> Result<()> {
        let mut tip = self.tip.lock();
        self.bootstrap(&mut tip)?;

        verify_block_number(tip.last.as_ref(), &block_file)?;
        let hash = block_file.hash.ok_or_else(|| {
            IngestError::invalid(format!("Missing block footer in block {}", block_file.name))
        })?;
        verify_hash_chain(tip.last.as_ref(), &block_file)?;
        self.verify_proof(&block_file, &hash)?;

        let summary = BlockSummary {
            index: block_file.index,
            hash,
            consensus_start: block_file.consensus_start,
        };
        let consensus_end = block_file.consensus_end;
        let count = block_file.count;
        self.sink.persist(block_file)?;
        tip.last = Some(summary.clone());

        if let Some(metrics) = &self.metrics {
            let lag = Utc::now()
                .timestamp_nanos_opt()
                .unwrap_or_default()
                .saturating_sub(consensus_end)
                .max(0);
            metrics
                .stream_close_latency_seconds
                .observe(lag as f64 / NANOS_PER_SECOND);
        }
        info!(block = summary.index, hash = %summary.hash, items = count, "verified block");
        Ok(())
    }

    fn verify_proof(&self, block_file: &BlockFile, hash: &Hash384) -> Result<()> {
        let block_number = block_file.index;
        let proof = block_file
            .block_proof
            .as_ref()
            .and_then(|p| p.proof.as_ref())
            .ok_or_else(|| IngestError::invalid("Missing block proof"))?;

        match proof {
            Proof::SignedBlockProof(signed) => {
                let signature = BlockSignature::from_proof(block_number, signed)?;
                self.tss.verify(block_number, hash.as_ref(), &signature)
            }
            Proof::BlockStateProof(state_proof) => {
                let signed_root =
                    self.state_proofs
                        .get_root_hash(block_number, hash, &state_proof.paths)?;
                let signed = state_proof.signed_block_proof.as_ref().ok_or_else(|| {
                    IngestError::invalid(format!(
                        "Block {block_number}'s state proof has no signed block proof"
                    ))
                })?;
                let signature = BlockSignature::from_proof(block_number, signed)?;
                self.tss.verify(block_number, signed_root.as_ref(), &signature)
            }
        }
    }
}

fn verify_block_number(last: Option<&BlockSummary>, block_file: &BlockFile) -> Result<()> {
    let block_number = block_file.index;
    if let Some(last) = last {
        if last.index.checked_add(1) != Some(block_number) {
            return Err(IngestError::invalid(format!(
                "Non-consecutive block number, previous = {}, current = {block_number}",
                last.index
            )));
        }
    }

    let name = &block_file.name;
    let stem = name.split('.').next().unwrap_or(name);
    let from_filename = stem.parse::<u64>().map_err(|_| {
        IngestError::invalid(format!("Failed to parse block number from filename {name}"))
    })?;
    if from_filename != block_number {
        return Err(IngestError::invalid(format!(
            "Block number mismatch, from filename = {from_filename}, from content = {block_number}"
        )));
    }
    Ok(())
}

fn verify_hash_chain(last: Option<&BlockSummary>, block_file: &BlockFile) -> Result<()> {
    let Some(last) = last else {
        return Ok(());
    };
    if block_file.previous_hash == Some(last.hash) {
        return Ok(());
    }

    Err(IngestError::HashMismatch {
        kind: "Previous",
        file: block_file.name.clone(),
        expected: last.hash.to_hex(),
        actual: block_file
            .previous_hash
            .map(|h| h.to_hex())
            .unwrap_or_else(|| "null".to_string()),
    })
}

#[cfg(test)]
mod tests {
    use ed25519_dalek::SigningKey;
    use prometheus::Registry;

    use super::*;
    use crate::proto::{TssSignedBlockProof, block_proof};
    use crate::reader::BlockFileReader;
    use crate::storage::{InMemoryBlockFileSink, InMemoryLedgerRepository};
    use crate::test_support::{
        FixtureBlock, schnorr_ledger, schnorr_proof, schnorr_sign, signing_keys, state_proof,
    };
    use crate::types::{HASH_LEN, Ledger, StreamFileData, StreamFilename};

    type TestVerifier = BlockStreamVerifier<InMemoryLedgerRepository, InMemoryBlockFileSink>;

    struct Network {
        keys: Vec<SigningKey>,
        ledger: Ledger,
    }

    impl Network {
        fn new() -> Self {
            let keys = signing_keys(3);
            let ledger = schnorr_ledger(&keys, &[1, 1, 1]);
            Self { keys, ledger }
        }

        fn verifier(&self, sink: InMemoryBlockFileSink) -> TestVerifier {
            let tss = ThresholdSignatureVerifier::new(
                InMemoryLedgerRepository::new(),
                Some(self.ledger.clone()),
            );
            BlockStreamVerifier::new(tss, sink)
        }

        fn sign(&self, fixture: FixtureBlock) -> FixtureBlock {
            fixture.signed(&self.ledger, &self.keys, &[0, 1])
        }
    }

    fn parse(fixture: &FixtureBlock) -> BlockFile {
        let name = StreamFilename::from_block_number("", fixture.number as i64, None).expect("name");
        BlockFileReader::default()
            .read(&StreamFileData::new(name, fixture.encode()))
            .expect("fixture parses")
    }

    fn chain(network: &Network, numbers: std::ops::Range<u64>) -> Vec<FixtureBlock> {
        let mut previous = vec![0u8; HASH_LEN];
        numbers
            .map(|n| {
                let block = network.sign(FixtureBlock::new(n).with_previous_hash(previous.clone()));
                previous = block.root_hash().as_ref().to_vec();
                block
            })
            .collect()
    }

    fn expect_invalid(result: Result<()>) -> String {
        match result.expect_err("block must be rejected") {
            IngestError::InvalidStreamFile(msg) => msg,
            other => panic!("unexpected error variant: {other:?}"),
        }
    }

    #[test]
    fn verifies_and_persists_a_signed_chain() {
        let network = Network::new();
        let verifier = network.verifier(InMemoryBlockFileSink::new());

        for block in chain(&network, 0..3) {
            verifier.verify(parse(&block)).expect("valid block");
        }

        let last = verifier.last_block().expect("tip").expect("some");
        assert_eq!(last.index, 2);
        assert_eq!(verifier.sink().len(), 3);
        assert_eq!(verifier.sink().latest().expect("latest"), Some(last));
    }

    #[test]
    fn rejects_non_consecutive_block() {
        let network = Network::new();
        let verifier = network.verifier(InMemoryBlockFileSink::new());
        let blocks = chain(&network, 0..3);

        verifier.verify(parse(&blocks[0])).expect("first");
        let msg = expect_invalid(verifier.verify(parse(&blocks[2])));
        assert_eq!(msg, "Non-consecutive block number, previous = 0, current = 2");
        assert_eq!(verifier.sink().len(), 1);
    }

    #[test]
    fn rejects_filename_content_mismatch() {
        let network = Network::new();
        let verifier = network.verifier(InMemoryBlockFileSink::new());
        let mut block_file = parse(&chain(&network, 0..1)[0]);
        block_file.name = "0000000000000000008.blk".to_string();

        let msg = expect_invalid(verifier.verify(block_file));
        assert_eq!(msg, "Block number mismatch, from filename = 8, from content = 0");
    }

    #[test]
    fn rejects_unparsable_filename() {
        let network = Network::new();
        let verifier = network.verifier(InMemoryBlockFileSink::new());
        let mut block_file = parse(&chain(&network, 0..1)[0]);
        block_file.name = "block-zero.blk".to_string();

        let msg = expect_invalid(verifier.verify(block_file));
        assert_eq!(msg, "Failed to parse block number from filename block-zero.blk");
    }

    #[test]
    fn rejects_broken_hash_chain() {
        let network = Network::new();
        let verifier = network.verifier(InMemoryBlockFileSink::new());
        let first = network.sign(FixtureBlock::new(0));
        let second = network.sign(FixtureBlock::new(1).with_previous_hash(vec![0xEE; HASH_LEN]));

        verifier.verify(parse(&first)).expect("first");
        let err = verifier.verify(parse(&second)).expect_err("broken chain");

        assert_eq!(
            err.to_string(),
            format!(
                "Previous hash mismatch for file 0000000000000000001.blk. Expected = {}, Actual = {}",
                first.root_hash().to_hex(),
                hex::encode([0xEE; HASH_LEN])
            )
        );
    }

    #[test]
    fn resumes_from_sink_latest() {
        let network = Network::new();
        let blocks = chain(&network, 4..6);
        let sink = InMemoryBlockFileSink::with_latest(BlockSummary {
            index: 4,
            hash: blocks[0].root_hash(),
            consensus_start: 0,
        });
        let verifier = network.verifier(sink);

        verifier.verify(parse(&blocks[1])).expect("continues persisted chain");
        assert_eq!(verifier.last_block().expect("tip").map(|b| b.index), Some(5));
    }

    #[test]
    fn accepts_state_proof_into_signed_block() {
        let network = Network::new();
        let current = FixtureBlock::new(10).with_previous_hash(vec![0x10; HASH_LEN]);
        let signed = FixtureBlock::new(11).with_previous_hash(current.root_hash().as_ref().to_vec());
        let signatures = schnorr_sign(
            &network.ledger,
            &network.keys,
            &[1, 2],
            signed.root_hash().as_ref(),
        );
        let current = current.clone().with_proof(state_proof(
            &current,
            &signed,
            schnorr_proof(&signatures),
        ));

        let verifier = network.verifier(InMemoryBlockFileSink::new());
        verifier.verify(parse(&current)).expect("state proof verifies");
    }

    #[test]
    fn rejects_state_proof_signed_over_wrong_root() {
        let network = Network::new();
        let current = FixtureBlock::new(10).with_previous_hash(vec![0x10; HASH_LEN]);
        let signed = FixtureBlock::new(11).with_previous_hash(current.root_hash().as_ref().to_vec());
        let signatures = schnorr_sign(&network.ledger, &network.keys, &[1, 2], b"something else");
        let current = current.clone().with_proof(state_proof(
            &current,
            &signed,
            schnorr_proof(&signatures),
        ));

        let verifier = network.verifier(InMemoryBlockFileSink::new());
        let err = verifier.verify(parse(&current)).expect_err("wrong root");
        assert!(matches!(err, IngestError::SignatureVerification(_)));
    }

    #[test]
    fn rejected_signature_is_not_persisted_and_is_counted() {
        let network = Network::new();
        let registry = Registry::new();
        let metrics = IngestMetrics::register(&registry).expect("metrics");
        let verifier = network
            .verifier(InMemoryBlockFileSink::new())
            .with_metrics(metrics.clone());

        // one of three signers is not more than a third
        let weak = FixtureBlock::new(0).signed(&network.ledger, &network.keys, &[2]);
        let err = verifier.verify(parse(&weak)).expect_err("insufficient weight");

        assert_eq!(
            err.to_string(),
            "TSS signature verification failed for block 0 using schnorr scheme"
        );
        assert!(verifier.sink().is_empty());
        assert_eq!(metrics.blocks_rejected.get(), 1);
        assert_eq!(metrics.blocks_verified.get(), 0);
        assert!(verifier.last_block().expect("tip").is_none());
    }

    #[test]
    fn rejects_block_without_footer() {
        let network = Network::new();
        let verifier = network.verifier(InMemoryBlockFileSink::new());
        let fixture = FixtureBlock::new(0)
            .without_footer()
            .with_proof(block_proof::Proof::SignedBlockProof(TssSignedBlockProof::default()));

        let msg = expect_invalid(verifier.verify(parse(&fixture)));
        assert_eq!(msg, "Missing block footer in block 0000000000000000000.blk");
    }

    #[test]
    fn missing_ledger_is_fatal() {
        let tss = ThresholdSignatureVerifier::new(InMemoryLedgerRepository::new(), None);
        let verifier = BlockStreamVerifier::new(tss, InMemoryBlockFileSink::new());
        let network = Network::new();

        let err = verifier
            .verify(parse(&network.sign(FixtureBlock::new(0))))
            .expect_err("no ledger");
        assert!(matches!(err, IngestError::IllegalState(_)));
    }
}
