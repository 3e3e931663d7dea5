use super::SignatureFileReader;
use super::stream::ValidatedReader;
use crate::error::Result;
use crate::types::{DigestAlgorithm, Hash384, SignatureType, StreamFileData, StreamFileSignature};

pub(crate) const FILE_HASH_MARKER: u8 = 4;
const SIGNATURE_MARKER: u8 = 3;
const VERSION: u8 = 2;

/// Version 2 signature files: a marked file hash followed by a marked,
/// length-prefixed signature. There is no metadata hash.
#[derive(Clone, Copy, Debug, Default)]
pub struct SignatureFileReaderV2;

impl SignatureFileReader for SignatureFileReaderV2 {
    fn read(&self, data: &StreamFileData) -> Result<StreamFileSignature> {
        let filename = data.filename();
        let digest_algorithm = DigestAlgorithm::Sha384;
        let signature_type = SignatureType::Sha384WithRsa;
        let mut reader = ValidatedReader::new(&data.bytes, filename);

        reader.expect_u8(FILE_HASH_MARKER, "", "hash delimiter")?;
        let file_hash = reader.read_bytes(digest_algorithm.size(), "entireFile", "hash")?;
        reader.expect_u8(SIGNATURE_MARKER, "", "signature delimiter")?;
        let signature = reader.read_length_and_bytes(
            1,
            signature_type.max_length(),
            false,
            "entireFile",
            "signature",
        )?;
        reader.finish()?;

        Ok(StreamFileSignature {
            filename: filename.to_string(),
            bytes: data.bytes.clone(),
            file_hash: Hash384::from_digest(file_hash),
            file_hash_signature: signature,
            metadata_hash: None,
            metadata_hash_signature: None,
            digest_algorithm,
            signature_type,
            version: VERSION,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::IngestError;
    use crate::types::StreamFilename;

    fn v2_bytes(hash: &[u8; 48], signature: &[u8]) -> Vec<u8> {
        let mut bytes = vec![FILE_HASH_MARKER];
        bytes.extend_from_slice(hash);
        bytes.push(SIGNATURE_MARKER);
        bytes.extend_from_slice(&(signature.len() as i32).to_be_bytes());
        bytes.extend_from_slice(signature);
        bytes
    }

    fn data(bytes: Vec<u8>) -> StreamFileData {
        let name = StreamFilename::parse("", "2019-08-30T18_10_00.419072Z.rcd_sig").expect("name");
        StreamFileData::new(name, bytes)
    }

    #[test]
    fn reads_file_hash_and_signature() {
        let bytes = v2_bytes(&[7u8; 48], &[1, 2, 3]);
        let signature = SignatureFileReaderV2.read(&data(bytes.clone())).expect("valid v2");

        assert_eq!(signature.file_hash.as_bytes(), &[7u8; 48]);
        assert_eq!(signature.file_hash_signature, vec![1, 2, 3]);
        assert!(signature.metadata_hash.is_none());
        assert_eq!(signature.version, 2);
        assert_eq!(signature.bytes, bytes);
    }

    #[test]
    fn wrong_signature_marker_is_rejected() {
        let mut bytes = v2_bytes(&[7u8; 48], &[1]);
        bytes[49] = 9;

        match SignatureFileReaderV2.read(&data(bytes)).expect_err("bad marker") {
            IngestError::SignatureFileParsing { message, .. } => {
                assert!(message.contains("signature delimiter"), "{message}")
            }
            other => panic!("unexpected error variant: {other:?}"),
        }
    }

    #[test]
    fn trailing_data_is_rejected() {
        let mut bytes = v2_bytes(&[7u8; 48], &[1]);
        bytes.push(0);

        let err = SignatureFileReaderV2.read(&data(bytes)).expect_err("extra data");
        assert!(err.to_string().starts_with("Extra data discovered"));
    }
}
