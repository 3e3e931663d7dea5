//! Stream file readers.
//!
//! - [`block`]: block stream files into [`crate::types::BlockFile`],
//! - [`signature`]: the versioned signature file layouts.

pub mod block;
pub mod signature;

pub use block::BlockFileReader;
pub use signature::{
    CompositeSignatureFileReader, ProtoSignatureFileReader, SignatureFileFormat,
    SignatureFileReader, SignatureFileReaderV2, SignatureFileReaderV5,
};
