use super::SignatureFileReader;
use super::stream::ValidatedReader;
use crate::error::Result;
use crate::types::{DigestAlgorithm, SignatureType, StreamFileData, StreamFileSignature};

pub(crate) const VERSION: u8 = 5;

/// Version 5 signature files: object-stream framed hash and signature
/// objects for the entire file and for its metadata.
#[derive(Clone, Copy, Debug, Default)]
pub struct SignatureFileReaderV5;

impl SignatureFileReader for SignatureFileReaderV5 {
    fn read(&self, data: &StreamFileData) -> Result<StreamFileSignature> {
        let filename = data.filename();
        let digest_algorithm = DigestAlgorithm::Sha384;
        let signature_type = SignatureType::Sha384WithRsa;
        let mut reader = ValidatedReader::new(&data.bytes, filename);

        reader.expect_u8(VERSION, "", "fileVersion")?;
        // object stream signature version, unused
        reader.read_i32("", "objectStreamSignatureVersion")?;

        let file_hash = reader.read_hash_object(digest_algorithm, "entireFile")?;
        let file_hash_signature = reader.read_signature_object(signature_type, "entireFile")?;
        let metadata_hash = reader.read_hash_object(digest_algorithm, "metadata")?;
        let metadata_hash_signature = reader.read_signature_object(signature_type, "metadata")?;
        reader.finish()?;

        Ok(StreamFileSignature {
            filename: filename.to_string(),
            bytes: data.bytes.clone(),
            file_hash,
            file_hash_signature,
            metadata_hash: Some(metadata_hash),
            metadata_hash_signature: Some(metadata_hash_signature),
            digest_algorithm,
            signature_type,
            version: VERSION,
        })
    }
}
