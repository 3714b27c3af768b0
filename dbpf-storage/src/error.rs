//! Error types for DBPF archive access

use sc4_formats::Tgi;
use thiserror::Error;

/// Result type for archive operations
pub type Result<T> = std::result::Result<T, Error>;

/// DBPF archive error types
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Requested byte range extends past the end of the file
    #[error("range {offset}+{length} is outside the {size}-byte file")]
    RangeOutOfBounds {
        offset: u64,
        length: usize,
        size: u64,
    },

    /// File is too small to hold the fixed-size envelope
    #[error("buffer of {actual} bytes is too small for the {expected}-byte DBPF header")]
    TruncatedHeader { expected: usize, actual: usize },

    /// First four bytes are not `DBPF`
    #[error("invalid DBPF magic: expected [68, 66, 80, 70], got {0:?}")]
    InvalidMagic([u8; 4]),

    /// Only version 1.0 archives are supported
    #[error("unsupported DBPF version {major}.{minor}")]
    UnsupportedVersion { major: u32, minor: u32 },

    /// Only index type 7 is supported
    #[error("unsupported index type: {0}")]
    UnsupportedIndexType(u32),

    /// Index table does not fit inside the file
    #[error("index table at {offset}+{size} does not fit in {len} bytes")]
    IndexOutOfBounds { offset: u32, size: u32, len: usize },

    /// Entry payload does not fit inside the file
    #[error("entry {tgi} at {offset}+{size} does not fit in {len} bytes")]
    EntryOutOfBounds {
        tgi: Tgi,
        offset: u32,
        size: u32,
        len: usize,
    },

    /// No entry with the requested key
    #[error("no entry for {0}")]
    NotFound(Tgi),

    /// No entry matching the requested mask
    #[error("no entry matches the requested mask")]
    NoMatch,

    /// Label is not in the resource-key catalog
    #[error("unknown resource label {0:?}")]
    LabelNotFound(String),

    /// QFS decompression error
    #[error("QFS error: {0}")]
    Qfs(#[from] qfs::Error),

    /// Payload decoder error
    #[error("format error: {0}")]
    Format(#[from] sc4_formats::Error),
}
