//! Core domain types used by the ingest pipeline
//!
//! This module defines the strongly-typed hash used throughout the
//! pipeline, stream filenames, the parsed block domain (block files and
//! their item arena), ledger trust anchors and the uniform signature file
//! shape. The goal is to avoid "naked" byte buffers in public APIs and
//! instead use domain-specific newtypes.

use std::fmt;

use sha2::{Digest, Sha384};

/// Parsed block files and the transaction item arena.
pub mod block;
/// Stream file naming (record-style timestamps and block indices).
pub mod filename;
/// Ledger identity records used as the signature trust anchor.
pub mod ledger;
/// Uniform output of the versioned signature file readers.
pub mod signature;

pub use block::{BlockFile, BlockItem, BlockSummary, ItemId, SUCCESS_STATUSES};
pub use filename::{
    BlockSourceType, Compression, ConsensusNode, FileType, StreamFileData, StreamFilename,
    StreamType, block_filename,
};
pub use ledger::{Ledger, NodeContribution};
pub use signature::{SignatureType, StreamFileSignature};

/// Length in bytes of every hash produced by the pipeline.
pub const HASH_LEN: usize = 48;

/// Strongly-typed 384-bit hash wrapper (SHA-384).
///
/// All root hashes, Merkle nodes and signature file digests in the block
/// stream are SHA-384. This type is always exactly [`HASH_LEN`] bytes long.
#[derive(Clone, Copy, Eq, PartialEq, Hash)]
pub struct Hash384(pub [u8; HASH_LEN]);

impl Hash384 {
    /// Computes the plain SHA-384 digest of `data`.
    ///
    /// Merkle hashing uses the domain-tagged helpers in [`crate::hash`]
    /// instead; this is for content hashes such as transaction hashes.
    pub fn compute(data: &[u8]) -> Self {
        Self::from_digest(Sha384::digest(data))
    }

    /// Copies a finished SHA-384 digest into a `Hash384`.
    pub(crate) fn from_digest(digest: impl AsRef<[u8]>) -> Self {
        let mut out = [0u8; HASH_LEN];
        out.copy_from_slice(digest.as_ref());
        Hash384(out)
    }

    /// Builds a hash from a byte slice, returning `None` unless the slice is
    /// exactly [`HASH_LEN`] bytes.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let array: [u8; HASH_LEN] = bytes.try_into().ok()?;
        Some(Hash384(array))
    }

    /// Parses a lowercase or uppercase hex string.
    pub fn from_hex(s: &str) -> Option<Self> {
        let bytes = hex::decode(s).ok()?;
        Self::from_slice(&bytes)
    }

    /// Returns the underlying 48-byte hash as a borrowed array.
    pub fn as_bytes(&self) -> &[u8; HASH_LEN] {
        &self.0
    }

    /// Lowercase hex encoding, as used in logs and error messages.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl AsRef<[u8]> for Hash384 {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Hash384 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Hash384 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash384({})", self.to_hex())
    }
}

/// Digest algorithm declared by block headers and signature files.
///
/// Only SHA-384 is in use on the network.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub enum DigestAlgorithm {
    #[default]
    Sha384,
}

impl DigestAlgorithm {
    /// Type marker written into fixed-layout signature files.
    pub const fn type_code(self) -> i32 {
        match self {
            DigestAlgorithm::Sha384 => 0x58ff_811b,
        }
    }

    /// Digest length in bytes.
    pub const fn size(self) -> usize {
        match self {
            DigestAlgorithm::Sha384 => HASH_LEN,
        }
    }
}
