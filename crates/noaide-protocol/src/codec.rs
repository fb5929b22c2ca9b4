//! Frame codec: one complete frame <-> (topic, envelope)
//!
//! The codec never owns a compression algorithm. Callers inject a
//! [`Decompressor`] (and a [`Compressor`] when encoding); plain functions and
//! closures of the right shape implement both traits.

use std::fmt;
use std::io;
use std::sync::Arc;

use bytes::{BufMut, BytesMut};

use crate::envelope::EventEnvelope;
use crate::error::ProtocolError;
use crate::frame::{CodecId, FrameHeader, TOPIC_LEN_SIZE};

/// Payload decompression function
pub trait Decompressor: Send + Sync {
    /// Decompress one frame payload
    fn decompress(&self, input: &[u8]) -> io::Result<Vec<u8>>;
}

impl<F> Decompressor for F
where
    F: Fn(&[u8]) -> io::Result<Vec<u8>> + Send + Sync,
{
    fn decompress(&self, input: &[u8]) -> io::Result<Vec<u8>> {
        self(input)
    }
}

/// Payload compression function
pub trait Compressor: Send + Sync {
    /// Compress one frame payload
    fn compress(&self, input: &[u8]) -> io::Result<Vec<u8>>;
}

impl<F> Compressor for F
where
    F: Fn(&[u8]) -> io::Result<Vec<u8>> + Send + Sync,
{
    fn compress(&self, input: &[u8]) -> io::Result<Vec<u8>> {
        self(input)
    }
}

/// A decoded frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedFrame {
    /// Logical channel the envelope was published on
    pub topic: String,
    /// The event itself
    pub envelope: EventEnvelope,
}

/// Decoder for complete frames
///
/// Cloning is cheap; clones share the registered decompressor.
#[derive(Clone, Default)]
pub struct FrameCodec {
    decompressor: Option<Arc<dyn Decompressor>>,
}

impl fmt::Debug for FrameCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameCodec")
            .field("decompressor", &self.decompressor.is_some())
            .finish()
    }
}

impl FrameCodec {
    /// Create a codec with no decompressor; every decode fails until one is set
    pub fn new() -> Self {
        Self { decompressor: None }
    }

    /// Create a codec using the given decompressor
    pub fn with_decompressor(decompressor: Arc<dyn Decompressor>) -> Self {
        Self {
            decompressor: Some(decompressor),
        }
    }

    /// Replace the registered decompressor
    pub fn set_decompressor(&mut self, decompressor: Arc<dyn Decompressor>) {
        self.decompressor = Some(decompressor);
    }

    /// Whether a decompressor is registered
    pub fn has_decompressor(&self) -> bool {
        self.decompressor.is_some()
    }

    /// Decode one complete frame as produced by the stream assembler
    pub fn decode(&self, frame: &[u8]) -> Result<DecodedFrame, ProtocolError> {
        let header = FrameHeader::peek(frame).ok_or(ProtocolError::IncompleteFrame {
            expected: TOPIC_LEN_SIZE,
            actual: frame.len(),
        })?;
        let frame_size = header.frame_size().unwrap_or(usize::MAX);
        if frame.len() < frame_size {
            return Err(ProtocolError::IncompleteFrame {
                expected: frame_size,
                actual: frame.len(),
            });
        }

        let topic_end = TOPIC_LEN_SIZE + header.topic_len as usize;
        let topic = std::str::from_utf8(&frame[TOPIC_LEN_SIZE..topic_end])?;

        let codec =
            CodecId::from_u8(header.codec_id).ok_or(ProtocolError::UnknownCodec(header.codec_id))?;
        let decompressor = self
            .decompressor
            .as_ref()
            .ok_or(ProtocolError::DecompressorMissing)?;

        let compressed = &frame[header.header_size()..frame_size];
        let payload = decompressor
            .decompress(compressed)
            .map_err(ProtocolError::Decompress)?;

        let envelope = match codec {
            CodecId::MessagePack => rmp_serde::from_slice::<EventEnvelope>(&payload)?,
        };

        Ok(DecodedFrame {
            topic: topic.to_owned(),
            envelope,
        })
    }
}

/// Encode `envelope` as a complete frame on `topic`, appending to `dst`.
///
/// Nothing is written if any step fails.
pub fn encode_frame(
    topic: &str,
    envelope: &EventEnvelope,
    compressor: &dyn Compressor,
    dst: &mut BytesMut,
) -> Result<(), ProtocolError> {
    let serialized = rmp_serde::to_vec_named(envelope)?;
    let compressed = compressor
        .compress(&serialized)
        .map_err(ProtocolError::Compress)?;

    FrameHeader::encode(topic, CodecId::MessagePack, compressed.len(), dst)?;
    dst.put_slice(&compressed);
    Ok(())
}
