//! Big-endian cursor over fixed-layout signature files.
//!
//! Every read names the section and field it belongs to so a corrupt file
//! can be diagnosed from the error alone.

use std::io;

use crate::error::{IngestError, Result};
use crate::types::{DigestAlgorithm, Hash384, SignatureType};

/// Added to the signature length to form the signature object checksum.
pub(crate) const SIGNATURE_CHECKSUM_BASE: i32 = 101;

pub(crate) struct ValidatedReader<'a> {
    data: &'a [u8],
    position: usize,
    filename: &'a str,
}

impl<'a> ValidatedReader<'a> {
    pub fn new(data: &'a [u8], filename: &'a str) -> Self {
        Self {
            data,
            position: 0,
            filename,
        }
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    pub fn read_bytes(&mut self, len: usize, section: &str, field: &str) -> Result<&'a [u8]> {
        if self.remaining() < len {
            return Err(IngestError::SignatureFileParsing {
                message: format!(
                    "Unable to read {} from signature file {}: expected {len} bytes, actual {}",
                    describe(section, field),
                    self.filename,
                    self.remaining()
                ),
                source: Some(io::Error::from(io::ErrorKind::UnexpectedEof)),
            });
        }

        let bytes = &self.data[self.position..self.position + len];
        self.position += len;
        Ok(bytes)
    }

    pub fn read_u8(&mut self, section: &str, field: &str) -> Result<u8> {
        Ok(self.read_bytes(1, section, field)?[0])
    }

    pub fn read_i32(&mut self, section: &str, field: &str) -> Result<i32> {
        let bytes = self.read_bytes(4, section, field)?;
        Ok(i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn read_i64(&mut self, section: &str, field: &str) -> Result<i64> {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(self.read_bytes(8, section, field)?);
        Ok(i64::from_be_bytes(buf))
    }

    pub fn expect_u8(&mut self, expected: u8, section: &str, field: &str) -> Result<u8> {
        let actual = self.read_u8(section, field)?;
        self.check(i64::from(expected), i64::from(actual), section, field)?;
        Ok(actual)
    }

    pub fn expect_i32(&mut self, expected: i32, section: &str, field: &str) -> Result<i32> {
        let actual = self.read_i32(section, field)?;
        self.check(i64::from(expected), i64::from(actual), section, field)?;
        Ok(actual)
    }

    /// Reads an `i32` length in `min..=max`, an optional checksum and then
    /// that many bytes.
    pub fn read_length_and_bytes(
        &mut self,
        min: usize,
        max: usize,
        has_checksum: bool,
        section: &str,
        field: &str,
    ) -> Result<Vec<u8>> {
        let length_field = format!("{field} length");
        let length = self.read_i32(section, &length_field)?;
        let len = usize::try_from(length).ok().filter(|len| (min..=max).contains(len));
        let Some(len) = len else {
            return Err(IngestError::signature_file(format!(
                "Invalid {} in signature file {}: {length} is not within [{min}, {max}]",
                describe(section, &length_field),
                self.filename
            )));
        };

        if has_checksum {
            self.expect_i32(SIGNATURE_CHECKSUM_BASE - length, section, "checksum")?;
        }

        let bytes = self.read_bytes(len, section, &format!("actual {field} length"))?;
        Ok(bytes.to_vec())
    }

    /// Fails unless every byte has been read.
    pub fn finish(&self) -> Result<()> {
        if self.remaining() != 0 {
            return Err(IngestError::signature_file(format!(
                "Extra data discovered in signature file {}",
                self.filename
            )));
        }
        Ok(())
    }

    fn check(&self, expected: i64, actual: i64, section: &str, field: &str) -> Result<()> {
        if expected == actual {
            return Ok(());
        }
        Err(IngestError::signature_file(format!(
            "Invalid {} in signature file {}: expected {expected}, actual {actual}",
            describe(section, field),
            self.filename
        )))
    }

    /// Hash object: class id, class version, digest type, length, hash.
    pub fn read_hash_object(&mut self, algorithm: DigestAlgorithm, section: &str) -> Result<Hash384> {
        self.read_i64(section, "hash class id")?;
        self.read_i32(section, "hash class version")?;
        self.expect_i32(algorithm.type_code(), section, "hash digest type")?;
        let size = algorithm.size();
        let hash = self.read_length_and_bytes(size, size, false, section, "hash")?;
        Hash384::from_slice(&hash)
            .ok_or_else(|| IngestError::signature_file(format!("Invalid {section} hash length")))
    }

    /// Signature object: class id, class version, type, length, checksum,
    /// signature.
    pub fn read_signature_object(
        &mut self,
        signature_type: SignatureType,
        section: &str,
    ) -> Result<Vec<u8>> {
        self.read_i64(section, "signature class id")?;
        self.read_i32(section, "signature class version")?;
        self.expect_i32(signature_type.code(), section, "signature type")?;
        self.read_length_and_bytes(1, signature_type.max_length(), true, section, "signature")
    }
}

fn describe(section: &str, field: &str) -> String {
    if section.is_empty() {
        field.to_string()
    } else {
        format!("{section} {field}")
    }
}
