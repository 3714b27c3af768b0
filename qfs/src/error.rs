//! Error types for QFS decompression

use thiserror::Error;

/// Result type for QFS operations
pub type Result<T> = std::result::Result<T, Error>;

/// QFS error types
#[derive(Error, Debug)]
pub enum Error {
    /// Payload is shorter than the 5-byte stream header
    #[error("QFS payload too small: {actual} bytes")]
    TooSmall { actual: usize },

    /// First two bytes do not carry the QFS magic
    #[error("QFS magic mismatch: expected {expected:#06x}, got {got:#06x}")]
    BadMagic { expected: u16, got: u16 },

    /// A control record or literal run extends past the end of the input
    #[error("QFS input truncated at offset {offset}: need {needed} bytes, {remaining} remain")]
    TruncatedInput {
        offset: usize,
        needed: usize,
        remaining: usize,
    },

    /// A literal or back-reference copy would write past the declared output size
    #[error("QFS output overrun at position {position}: writing {len} bytes exceeds {capacity}")]
    OutputOverrun {
        position: usize,
        len: usize,
        capacity: usize,
    },

    /// A back-reference points before the start of the output
    #[error("invalid QFS back-reference offset {offset} at output position {position}")]
    InvalidBackRef { offset: usize, position: usize },

    /// The stream ended with a different amount of output than it declared
    #[error("QFS stream produced {written} bytes but declared {declared}")]
    LengthMismatch { written: usize, declared: usize },

    /// Caller-provided buffer does not match the declared uncompressed size
    #[error("output buffer is {provided} bytes but the stream declares {declared}")]
    BufferSizeMismatch { provided: usize, declared: usize },
}
