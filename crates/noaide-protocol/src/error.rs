//! Protocol error types

use thiserror::Error;

/// Errors that can occur while framing or decoding the event stream
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Codec id byte is not one we can decode
    #[error("Unknown codec id: 0x{0:02x}")]
    UnknownCodec(u8),

    /// A frame arrived before any decompressor was registered
    #[error("No decompressor registered")]
    DecompressorMissing,

    /// The registered decompressor rejected the payload
    #[error("Decompression failed: {0}")]
    Decompress(#[source] std::io::Error),

    /// The registered compressor rejected the payload
    #[error("Compression failed: {0}")]
    Compress(#[source] std::io::Error),

    /// Topic bytes are not valid UTF-8
    #[error("Topic is not valid UTF-8: {0}")]
    InvalidTopic(#[from] std::str::Utf8Error),

    /// Topic does not fit the 16-bit length prefix
    #[error("Topic too long: {len} bytes exceeds maximum of {max} bytes")]
    TopicTooLong { len: usize, max: usize },

    /// Frame exceeds the configured maximum size
    #[error("Frame too large: {size} bytes exceeds maximum of {max} bytes")]
    FrameTooLarge { size: usize, max: usize },

    /// Frame is shorter than its header claims
    #[error("Incomplete frame: expected {expected} bytes, got {actual}")]
    IncompleteFrame { expected: usize, actual: usize },

    /// Decompressed payload is not a valid envelope map
    #[error("Envelope decode error: {0}")]
    Deserialize(#[from] rmp_serde::decode::Error),

    /// Envelope could not be serialized
    #[error("Envelope encode error: {0}")]
    Serialize(#[from] rmp_serde::encode::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
