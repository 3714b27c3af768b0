//! Error types shared by the format decoders

use thiserror::Error;

/// Format decoder error types
#[derive(Error, Debug)]
pub enum Error {
    /// A read would cross the end of the payload
    #[error("buffer underrun: need {needed} bytes at offset {offset}, but only {remaining} remain")]
    Underrun {
        needed: usize,
        offset: usize,
        remaining: usize,
    },

    /// Seek target past the end of the payload
    #[error("cannot seek to offset {position}: buffer is {len} bytes")]
    SeekOutOfRange { position: usize, len: usize },

    /// First 8 bytes are not a recognized Exemplar/Cohort signature
    #[error("invalid exemplar signature: {0:?}")]
    BadExemplarSignature(String),

    /// Binary exemplar property carries an unknown value-type tag
    #[error("unsupported property value type: {0:#06x}")]
    UnknownValueType(u16),

    /// Binary exemplar property carries an unknown key-type tag
    #[error("unsupported property key type: {0:#06x}")]
    UnknownKeyType(u16),

    /// String-array property walks outside its declared storage
    #[error("string-array entry exceeds its declared storage")]
    StringArrayOutOfBounds,

    /// Syntax error in the text exemplar dialect
    #[error("text exemplar: {0}")]
    TextSyntax(String),

    /// LText payload has no decodable content
    #[error("LText payload is empty")]
    EmptyLText,

    /// FSH envelope magic is not one of the recognized values
    #[error("unrecognized FSH magic: {0:#010x}")]
    BadFshMagic(u32),

    /// FSH directory entry points outside the payload
    #[error("FSH entry offset {offset:#x} is outside the {len}-byte payload")]
    FshEntryOutOfBounds { offset: u32, len: usize },

    /// Bitmap format code with no known storage layout
    #[error("unsupported bitmap format code: {0:#04x}")]
    UnsupportedBitmapCode(u8),

    /// Block-compressed bitmaps require 4x4-aligned dimensions
    #[error("DXT bitmap dimensions {width}x{height} are not a multiple of 4")]
    DxtDimensions { width: u16, height: u16 },

    /// Bitmap carries fewer bytes than its code and dimensions require
    #[error("bitmap data is {actual} bytes, expected {expected}")]
    BitmapTruncated { expected: usize, actual: usize },

    /// S3D chunk missing or out of order
    #[error("expected S3D chunk {expected:?}")]
    MissingChunk { expected: &'static str },

    /// S3D version outside the supported range
    #[error("unsupported S3D version {major}.{minor}")]
    UnsupportedVersion { major: u16, minor: u16 },

    /// S3D block count over the sanity limit
    #[error("S3D {chunk} declares {count} blocks, limit is {limit}")]
    TooManyBlocks {
        chunk: &'static str,
        count: u32,
        limit: u32,
    },

    /// Line that is neither a section header, a key=value pair, nor a comment
    #[error("malformed INI line {line}")]
    IniSyntax { line: usize },

    /// RUL0 key or value the rule grammar rejects
    #[error("malformed RUL0 data at line {line}")]
    Rul0Syntax { line: usize },
}
