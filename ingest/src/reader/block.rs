// ingest/src/reader/block.rs

//! Block stream file reader.
//!
//! Turns the bytes of one block file into a [`BlockFile`]:
//!
//! - every item is decoded from its exact on-disk bytes, which also feed
//!   the block root hash,
//! - signed transactions are paired with the result that follows them and
//!   appended to the item arena,
//! - outputs and matching state changes attach to the last closed item,
//! - header, footer, proof and round boundaries are recorded on the file.

use chrono::Utc;
use prost::Message;
use tracing::debug;

use crate::error::{IngestError, Result};
use crate::hash::BlockRootHashDigest;
use crate::proto::block_item::Item;
use crate::proto::{self, RawBlock, SignedTransaction};
use crate::types::{BlockFile, Hash384, StreamFileData};

/// Largest decompressed block file accepted by default.
pub const DEFAULT_MAX_BLOCK_SIZE: usize = 256 * 1024 * 1024;

/// Reads block stream files.
#[derive(Clone, Copy, Debug)]
pub struct BlockFileReader {
    persist_bytes: bool,
    max_size: usize,
}

impl Default for BlockFileReader {
    fn default() -> Self {
        Self::new(false)
    }
}

impl BlockFileReader {
    /// `persist_bytes` keeps the raw file bytes on the parsed block.
    pub fn new(persist_bytes: bool) -> Self {
        Self {
            persist_bytes,
            max_size: DEFAULT_MAX_BLOCK_SIZE,
        }
    }

    /// Caps the decompressed size of a block file.
    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    pub fn read(&self, data: &StreamFileData) -> Result<BlockFile> {
        let load_start = now_nanos();
        let filename = data.filename();
        let bytes = data.decompressed_bytes(self.max_size)?;
        let raw = RawBlock::decode(bytes.as_slice())?;

        let mut block_file = BlockFile::new(filename);
        block_file.load_start = load_start;
        block_file.size = data.bytes.len();

        let mut digest = BlockRootHashDigest::new();
        let mut in_flight: Option<(Vec<u8>, SignedTransaction)> = None;
        let mut has_footer = false;

        for raw_item in &raw.items {
            let block_item = proto::BlockItem::decode(raw_item.as_slice())?;
            digest.add_block_item(&block_item, raw_item)?;

            let Some(item) = block_item.item else {
                continue;
            };
            match item {
                Item::BlockHeader(header) => {
                    block_file.index = header.number;
                    block_file.block_header = Some(header);
                }
                Item::RoundHeader(round) => block_file.on_new_round(round.round_number),
                Item::SignedTransaction(transaction_bytes) => {
                    if in_flight.is_some() {
                        return Err(missing_result(filename));
                    }
                    let signed = SignedTransaction::decode(transaction_bytes.as_slice())
                        .map_err(|_| IngestError::invalid("Failed to deserialize Transaction"))?;
                    in_flight = Some((transaction_bytes, signed));
                }
                Item::TransactionResult(result) => {
                    let (transaction_bytes, signed) = in_flight.take().unzip();
                    block_file.push_item(transaction_bytes, signed, result);
                }
                Item::TransactionOutput(output) => {
                    if let Some(last) = block_file.last_item_mut() {
                        last.transaction_outputs.push(output);
                    }
                }
                Item::StateChanges(changes) => {
                    if let Some(last) = block_file.last_item_mut() {
                        let timestamp = changes.consensus_timestamp.map(|t| t.to_nanos());
                        if timestamp == Some(last.consensus_timestamp) {
                            last.state_changes.push(changes);
                        }
                    }
                }
                Item::BlockFooter(footer) => {
                    let previous_hash = Hash384::from_slice(&footer.previous_block_root_hash)
                        .ok_or_else(|| {
                            IngestError::invalid(format!(
                                "Invalid previous block root hash length {} in block {filename}",
                                footer.previous_block_root_hash.len()
                            ))
                        })?;
                    block_file.previous_hash = Some(previous_hash);
                    has_footer = true;
                }
                Item::BlockProof(proof) => block_file.block_proof = Some(proof),
                Item::EventHeader(_) | Item::TraceData(_) => {}
            }
        }

        let Some(header) = &block_file.block_header else {
            return Err(IngestError::invalid("Missing block header"));
        };
        if in_flight.is_some() {
            return Err(missing_result(filename));
        }
        if block_file.block_proof.is_none() {
            return Err(IngestError::invalid("Missing block proof"));
        }

        let header_timestamp = header.block_timestamp.unwrap_or_default().to_nanos();
        block_file.consensus_start = block_file
            .items
            .first()
            .map_or(header_timestamp, |item| item.consensus_timestamp);
        block_file.consensus_end = block_file
            .items
            .last()
            .map_or(header_timestamp, |item| item.consensus_timestamp);

        if has_footer {
            block_file.hash = Some(digest.digest()?);
        }
        if self.persist_bytes {
            block_file.bytes = Some(data.bytes.clone());
        }
        block_file.load_end = now_nanos();

        debug!(
            block = block_file.index,
            items = block_file.count,
            size = block_file.size,
            "parsed block file"
        );
        Ok(block_file)
    }
}

fn missing_result(filename: &str) -> IngestError {
    IngestError::invalid(format!("Missing transaction result in block {filename}"))
}

fn now_nanos() -> i64 {
    Utc::now().timestamp_nanos_opt().unwrap_or_default()
}
