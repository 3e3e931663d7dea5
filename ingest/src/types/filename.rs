//! Stream file naming.
//!
//! Two naming schemes are in use:
//!
//! - record streams: `2021-03-10T16_30_00.123456789Z.rcd[_sig][.gz]`, one
//!   folder per consensus node,
//! - block streams: `0000000000000000042.blk[.gz|.zstd]`, a 19-digit,
//!   zero-padded block number.
//!
//! In both schemes the lexicographic order of file names is also the
//! chronological order, which is what [`StreamFilename`]'s `Ord` uses.

use std::cmp::Ordering;
use std::fmt;
use std::io::{self, Read};
use std::time::SystemTime;

use chrono::DateTime;

use crate::error::{IngestError, Result};

const BLOCK_NUMBER_WIDTH: usize = 19;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum StreamType {
    Record,
    Block,
}

impl StreamType {
    /// Folder holding this stream type under a network folder.
    pub const fn path(self) -> &'static str {
        match self {
            StreamType::Record => "recordstreams",
            StreamType::Block => "blockstreams",
        }
    }

    pub const fn data_extension(self) -> &'static str {
        match self {
            StreamType::Record => "rcd",
            StreamType::Block => "blk",
        }
    }

    pub const fn signature_extension(self) -> Option<&'static str> {
        match self {
            StreamType::Record => Some("rcd_sig"),
            StreamType::Block => None,
        }
    }
}

impl fmt::Display for StreamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamType::Record => f.write_str("RECORD"),
            StreamType::Block => f.write_str("BLOCK"),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum FileType {
    Data,
    Signature,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Compression {
    Gzip,
    Zstd,
}

impl Compression {
    pub const fn suffix(self) -> &'static str {
        match self {
            Compression::Gzip => "gz",
            Compression::Zstd => "zstd",
        }
    }

    pub fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix {
            "gz" => Some(Compression::Gzip),
            "zstd" => Some(Compression::Zstd),
            _ => None,
        }
    }
}

/// Where a block file was produced, inferred from its name.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum BlockSourceType {
    /// Uncompressed `.blk` files streamed from a block node.
    BlockNode,
    /// Anything else, e.g. compressed files from cloud storage.
    File,
}

impl BlockSourceType {
    pub fn from_filename(filename: &str) -> Self {
        let is_block_node = filename
            .strip_suffix(".blk")
            .is_some_and(|digits| {
                digits.len() == BLOCK_NUMBER_WIDTH && digits.bytes().all(|b| b.is_ascii_digit())
            });

        if is_block_node {
            BlockSourceType::BlockNode
        } else {
            BlockSourceType::File
        }
    }
}

/// Formats the file name of a block.
///
/// Takes a signed number so callers holding untrusted indices get an
/// error instead of a wrapped value.
pub fn block_filename(block_number: i64, compression: Option<Compression>) -> Result<String> {
    if block_number < 0 {
        return Err(IngestError::IllegalArgument(
            "Block number must be non-negative".to_string(),
        ));
    }

    let mut name = format!(
        "{block_number:0width$}.{}",
        StreamType::Block.data_extension(),
        width = BLOCK_NUMBER_WIDTH
    );
    if let Some(c) = compression {
        name.push('.');
        name.push_str(c.suffix());
    }
    Ok(name)
}

/// A consensus node whose stream files are downloaded.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct ConsensusNode {
    pub node_id: u64,
    /// Account id in `shard.realm.num` form, used in record stream folders.
    pub account_id: String,
}

impl ConsensusNode {
    pub fn new(node_id: u64, account_id: impl Into<String>) -> Self {
        Self {
            node_id,
            account_id: account_id.into(),
        }
    }

    /// Folder holding this node's files of the given type.
    ///
    /// Block streams are not split per node.
    pub fn directory(&self, network: &str, stream_type: StreamType) -> String {
        match stream_type {
            StreamType::Record => format!(
                "{network}/{}/record{}",
                stream_type.path(),
                self.account_id
            ),
            StreamType::Block => format!("{network}/{}", stream_type.path()),
        }
    }
}

/// A parsed, immutable stream file name.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct StreamFilename {
    path: String,
    filename: String,
    stream_type: StreamType,
    file_type: FileType,
    extension: String,
    compression: Option<Compression>,
    ordinal: i64,
}

impl StreamFilename {
    /// Parses `filename` located in directory `path` (no trailing slash,
    /// may be empty).
    pub fn parse(path: &str, filename: &str) -> Result<Self> {
        let invalid = || IngestError::IllegalArgument(format!("Invalid stream file name {filename}"));

        let (stem, compression) = match filename.rsplit_once('.') {
            Some((stem, suffix)) => match Compression::from_suffix(suffix) {
                Some(c) => (stem, Some(c)),
                None => (filename, None),
            },
            None => return Err(invalid()),
        };
        let (base, extension) = stem.rsplit_once('.').ok_or_else(invalid)?;

        let (stream_type, file_type, ordinal) = if extension == StreamType::Block.data_extension() {
            if base.len() != BLOCK_NUMBER_WIDTH || !base.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid());
            }
            let number = base.parse::<i64>().map_err(|_| invalid())?;
            (StreamType::Block, FileType::Data, number)
        } else {
            let file_type = if extension == StreamType::Record.data_extension() {
                FileType::Data
            } else if Some(extension) == StreamType::Record.signature_extension() {
                FileType::Signature
            } else {
                return Err(invalid());
            };
            let nanos = parse_instant(&base.replace('_', ":")).ok_or_else(invalid)?;
            (StreamType::Record, file_type, nanos)
        };

        Ok(Self {
            path: path.trim_end_matches('/').to_string(),
            filename: filename.to_string(),
            stream_type,
            file_type,
            extension: extension.to_string(),
            compression,
            ordinal,
        })
    }

    /// Parses a `path/filename` string.
    pub fn from_file_path(file_path: &str) -> Result<Self> {
        match file_path.rsplit_once('/') {
            Some((path, filename)) => Self::parse(path, filename),
            None => Self::parse("", file_path),
        }
    }

    pub fn from_block_number(
        path: &str,
        block_number: i64,
        compression: Option<Compression>,
    ) -> Result<Self> {
        Self::parse(path, &block_filename(block_number, compression)?)
    }

    /// Full object path, `path/filename`.
    pub fn file_path(&self) -> String {
        if self.path.is_empty() {
            self.filename.clone()
        } else {
            format!("{}/{}", self.path, self.filename)
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn stream_type(&self) -> StreamType {
        self.stream_type
    }

    pub fn file_type(&self) -> FileType {
        self.file_type
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn compression(&self) -> Option<Compression> {
        self.compression
    }

    /// Consensus nanoseconds for record files, block number for block files.
    pub fn ordinal(&self) -> i64 {
        self.ordinal
    }

    /// Whether `other` is the same kind of file (stream and file type), used
    /// to filter listings.
    pub fn same_kind(&self, other: &StreamFilename) -> bool {
        self.stream_type == other.stream_type && self.file_type == other.file_type
    }
}

impl Ord for StreamFilename {
    fn cmp(&self, other: &Self) -> Ordering {
        self.filename
            .cmp(&other.filename)
            .then_with(|| self.path.cmp(&other.path))
    }
}

impl PartialOrd for StreamFilename {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for StreamFilename {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.file_path())
    }
}

/// RFC 3339 instant to epoch nanoseconds.
pub(crate) fn parse_instant(s: &str) -> Option<i64> {
    DateTime::parse_from_rfc3339(s).ok()?.timestamp_nanos_opt()
}

/// Bytes of one downloaded stream file.
#[derive(Clone, Debug)]
pub struct StreamFileData {
    pub stream_filename: StreamFilename,
    pub bytes: Vec<u8>,
    /// Modification time reported by the backend, when it has one.
    pub last_modified: Option<SystemTime>,
}

impl StreamFileData {
    pub fn new(stream_filename: StreamFilename, bytes: Vec<u8>) -> Self {
        Self {
            stream_filename,
            bytes,
            last_modified: None,
        }
    }

    pub fn filename(&self) -> &str {
        self.stream_filename.filename()
    }

    /// File contents with the name's compression removed. Fails once the
    /// contents grow past `max_size` bytes.
    pub fn decompressed_bytes(&self, max_size: usize) -> Result<Vec<u8>> {
        let decompress_error = |e: io::Error| {
            IngestError::invalid(format!(
                "Failed to decompress stream file {}: {e}",
                self.filename()
            ))
        };
        let limit = u64::try_from(max_size).unwrap_or(u64::MAX).saturating_add(1);

        let bytes = match self.stream_filename.compression() {
            None => self.bytes.clone(),
            Some(Compression::Gzip) => {
                read_bounded(flate2::read::GzDecoder::new(self.bytes.as_slice()), limit)
                    .map_err(decompress_error)?
            }
            Some(Compression::Zstd) => {
                let decoder = zstd::stream::read::Decoder::new(self.bytes.as_slice())
                    .map_err(decompress_error)?;
                read_bounded(decoder, limit).map_err(decompress_error)?
            }
        };

        if bytes.len() > max_size {
            return Err(IngestError::invalid(format!(
                "Stream file {} exceeds the maximum size of {max_size} bytes",
                self.filename()
            )));
        }
        Ok(bytes)
    }
}

fn read_bounded(reader: impl Read, limit: u64) -> io::Result<Vec<u8>> {
    let mut out = Vec::new();
    reader.take(limit).read_to_end(&mut out)?;
    Ok(out)
}
