use prost::Message;

use super::SignatureFileReader;
use crate::error::{IngestError, Result};
use crate::proto::{SignatureFile, SignatureObject};
use crate::reader::signature::stream::SIGNATURE_CHECKSUM_BASE;
use crate::types::{DigestAlgorithm, Hash384, SignatureType, StreamFileData, StreamFileSignature};

pub(crate) const VERSION: u8 = 6;

/// Version 6 signature files: the version byte followed by a protobuf
/// [`SignatureFile`], validated like the fixed-layout v5 objects.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProtoSignatureFileReader;

impl SignatureFileReader for ProtoSignatureFileReader {
    fn read(&self, data: &StreamFileData) -> Result<StreamFileSignature> {
        let filename = data.filename();
        let body = match data.bytes.split_first() {
            Some((&VERSION, body)) => body,
            Some((&other, _)) => {
                return Err(IngestError::signature_file(format!(
                    "Invalid fileVersion in signature file {filename}: expected {VERSION}, actual {other}"
                )));
            }
            None => {
                return Err(IngestError::signature_file(format!(
                    "Error reading signature file {filename}"
                )));
            }
        };

        let file = SignatureFile::decode(body).map_err(|e| {
            IngestError::signature_file(format!("Error reading signature file {filename}: {e}"))
        })?;

        let validator = Validator {
            filename,
            digest_algorithm: DigestAlgorithm::Sha384,
            signature_type: SignatureType::Sha384WithRsa,
        };
        let (file_hash, file_hash_signature) =
            validator.section(file.file_signature.as_ref(), "entireFile")?;
        let (metadata_hash, metadata_hash_signature) =
            validator.section(file.metadata_signature.as_ref(), "metadata")?;

        Ok(StreamFileSignature {
            filename: filename.to_string(),
            bytes: data.bytes.clone(),
            file_hash,
            file_hash_signature,
            metadata_hash: Some(metadata_hash),
            metadata_hash_signature: Some(metadata_hash_signature),
            digest_algorithm: validator.digest_algorithm,
            signature_type: validator.signature_type,
            version: VERSION,
        })
    }
}

struct Validator<'a> {
    filename: &'a str,
    digest_algorithm: DigestAlgorithm,
    signature_type: SignatureType,
}

impl Validator<'_> {
    fn section(&self, object: Option<&SignatureObject>, section: &str) -> Result<(Hash384, Vec<u8>)> {
        let object = object.ok_or_else(|| self.error(format!("Missing {section} signature")))?;

        self.expect(self.signature_type.code(), object.signature_type, section, "signature type")?;
        let max = self.signature_type.max_length() as i32;
        if !(1..=max).contains(&object.length) {
            return Err(self.error(format!(
                "Invalid {section} signature length: {} is not within [1, {max}]",
                object.length
            )));
        }
        self.expect(SIGNATURE_CHECKSUM_BASE - object.length, object.checksum, section, "checksum")?;
        self.expect(
            object.length,
            object.signature.len() as i32,
            section,
            "actual signature length",
        )?;

        let hash_object = object
            .hash_object
            .as_ref()
            .ok_or_else(|| self.error(format!("Missing {section} hash object")))?;
        self.expect(
            self.digest_algorithm.type_code(),
            hash_object.algorithm,
            section,
            "hash digest type",
        )?;
        let size = self.digest_algorithm.size() as i32;
        self.expect(size, hash_object.length, section, "hash length")?;
        let hash = Hash384::from_slice(&hash_object.hash).ok_or_else(|| {
            self.error(format!(
                "Invalid {section} actual hash length: expected {size}, actual {}",
                hash_object.hash.len()
            ))
        })?;

        Ok((hash, object.signature.clone()))
    }

    fn expect(&self, expected: i32, actual: i32, section: &str, field: &str) -> Result<()> {
        if expected == actual {
            return Ok(());
        }
        Err(self.error(format!(
            "Invalid {section} {field}: expected {expected}, actual {actual}"
        )))
    }

    fn error(&self, detail: String) -> IngestError {
        IngestError::signature_file(format!("{detail} in signature file {}", self.filename))
    }
}
