//! Signature file readers.
//!
//! Consensus nodes have written three signature file layouts over time.
//! [`CompositeSignatureFileReader`] picks the right reader from the file's
//! first byte; every reader yields the same [`StreamFileSignature`].

mod proto;
mod stream;
mod v2;
mod v5;

use std::io;

use crate::error::{IngestError, Result};
use crate::types::{StreamFileData, StreamFileSignature};

pub use proto::ProtoSignatureFileReader;
pub use v2::SignatureFileReaderV2;
pub use v5::SignatureFileReaderV5;

/// Parses one signature file layout.
pub trait SignatureFileReader: Send + Sync {
    fn read(&self, data: &StreamFileData) -> Result<StreamFileSignature>;
}

/// Signature file layouts, keyed by their leading byte.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SignatureFileFormat {
    V2,
    V5,
    V6,
}

impl SignatureFileFormat {
    pub fn classify(first_byte: u8) -> Option<Self> {
        match first_byte {
            v2::FILE_HASH_MARKER => Some(SignatureFileFormat::V2),
            v5::VERSION => Some(SignatureFileFormat::V5),
            proto::VERSION => Some(SignatureFileFormat::V6),
            _ => None,
        }
    }
}

/// Dispatches to the reader matching the file's format.
#[derive(Clone, Copy, Debug, Default)]
pub struct CompositeSignatureFileReader {
    v2: SignatureFileReaderV2,
    v5: SignatureFileReaderV5,
    v6: ProtoSignatureFileReader,
}

impl CompositeSignatureFileReader {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SignatureFileReader for CompositeSignatureFileReader {
    fn read(&self, data: &StreamFileData) -> Result<StreamFileSignature> {
        let Some(&first_byte) = data.bytes.first() else {
            return Err(IngestError::SignatureFileParsing {
                message: format!("Error reading signature file {}", data.filename()),
                source: Some(io::Error::from(io::ErrorKind::UnexpectedEof)),
            });
        };

        match SignatureFileFormat::classify(first_byte) {
            Some(SignatureFileFormat::V2) => self.v2.read(data),
            Some(SignatureFileFormat::V5) => self.v5.read(data),
            Some(SignatureFileFormat::V6) => self.v6.read(data),
            None => Err(IngestError::signature_file(format!(
                "Unsupported signature file version: {first_byte}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use super::*;
    use crate::types::StreamFilename;

    fn data(bytes: Vec<u8>) -> StreamFileData {
        let name = StreamFilename::parse("", "2021-01-11T22_09_24.063739000Z.rcd_sig").expect("name");
        StreamFileData::new(name, bytes)
    }

    fn v2_bytes() -> Vec<u8> {
        let mut bytes = vec![4];
        bytes.extend_from_slice(&[0x22; 48]);
        bytes.push(3);
        bytes.extend_from_slice(&2i32.to_be_bytes());
        bytes.extend_from_slice(&[9, 9]);
        bytes
    }

    #[test]
    fn classifies_known_versions() {
        assert_eq!(SignatureFileFormat::classify(4), Some(SignatureFileFormat::V2));
        assert_eq!(SignatureFileFormat::classify(5), Some(SignatureFileFormat::V5));
        assert_eq!(SignatureFileFormat::classify(6), Some(SignatureFileFormat::V6));
        assert_eq!(SignatureFileFormat::classify(2), None);
    }

    #[test]
    fn dispatches_on_first_byte() {
        let reader = CompositeSignatureFileReader::new();

        let v2 = reader.read(&data(v2_bytes())).expect("v2");
        assert_eq!(v2.version, 2);

        let v5 = reader
            .read(&data(v5::tests::v5_bytes(&[1; 48], &[2; 48])))
            .expect("v5");
        assert_eq!(v5.version, 5);

        let v6 = reader
            .read(&data(proto::tests::v6_bytes(&[1; 48], &[2; 48])))
            .expect("v6");
        assert_eq!(v6.version, 6);
        assert_eq!(v5.file_hash, v6.file_hash);
    }

    #[test]
    fn unsupported_version_is_rejected() {
        let mut bytes = v2_bytes();
        bytes[0] = 12;

        let err = CompositeSignatureFileReader::new()
            .read(&data(bytes))
            .expect_err("version 12");
        assert_eq!(err.to_string(), "Unsupported signature file version: 12");
    }

    #[test]
    fn empty_file_wraps_unexpected_eof() {
        let err = CompositeSignatureFileReader::new()
            .read(&data(Vec::new()))
            .expect_err("empty file");

        assert!(err.to_string().contains("Error reading signature file"));
        let source = err.source().expect("io cause");
        assert!(source.downcast_ref::<io::Error>().is_some());
    }
}
