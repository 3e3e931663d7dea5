//! Uniform output of the signature file readers.

use super::{DigestAlgorithm, Hash384};

/// Signature algorithm declared by a signature file.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum SignatureType {
    Sha384WithRsa,
}

impl SignatureType {
    pub const fn code(self) -> i32 {
        match self {
            SignatureType::Sha384WithRsa => 1,
        }
    }

    /// Largest signature the format allows.
    pub const fn max_length(self) -> usize {
        match self {
            SignatureType::Sha384WithRsa => 384,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        (code == SignatureType::Sha384WithRsa.code()).then_some(SignatureType::Sha384WithRsa)
    }
}

/// The facts every signature file format yields, whichever reader parsed it.
///
/// Early (v2) files only sign the entire file, so the metadata fields are
/// optional.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamFileSignature {
    pub filename: String,
    pub bytes: Vec<u8>,
    pub file_hash: Hash384,
    pub file_hash_signature: Vec<u8>,
    pub metadata_hash: Option<Hash384>,
    pub metadata_hash_signature: Option<Vec<u8>>,
    pub digest_algorithm: DigestAlgorithm,
    pub signature_type: SignatureType,
    pub version: u8,
}
