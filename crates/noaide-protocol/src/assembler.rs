//! Tokio decoder that cuts a sub-stream's bytes into complete frames

use bytes::{Bytes, BytesMut};
use tokio_util::codec::Decoder;

use crate::error::ProtocolError;
use crate::frame::{FrameHeader, DEFAULT_MAX_FRAME_SIZE};

/// Splits an ordered byte stream into complete, still-encoded frames.
///
/// The assembler only reads the length fields, so frames with an unknown
/// codec or a corrupt payload are still delimited correctly and never
/// disturb the frames after them. Decoding the frame contents is left to
/// [`FrameCodec`](crate::FrameCodec).
///
/// A frame declaring more than `max_frame_size` bytes is a protocol
/// violation: the decoder fails and the sub-stream should be dropped.
#[derive(Debug, Clone)]
pub struct FrameAssembler {
    max_frame_size: usize,
}

impl Default for FrameAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameAssembler {
    /// Create an assembler with the default frame size limit
    pub fn new() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }

    /// Create an assembler with a custom frame size limit
    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }

    /// The configured frame size limit
    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }
}

impl Decoder for FrameAssembler {
    type Item = Bytes;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let header = match FrameHeader::peek(src) {
            Some(h) => h,
            None => return Ok(None), // Need more data
        };

        let frame_size = match header.frame_size() {
            Some(size) if size <= self.max_frame_size => size,
            oversized => {
                return Err(ProtocolError::FrameTooLarge {
                    size: oversized.unwrap_or(usize::MAX),
                    max: self.max_frame_size,
                })
            }
        };

        if src.len() < frame_size {
            src.reserve(frame_size - src.len());
            return Ok(None);
        }

        Ok(Some(src.split_to(frame_size).freeze()))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(frame) = self.decode(src)? {
            return Ok(Some(frame));
        }
        if src.is_empty() {
            return Ok(None);
        }

        let expected = FrameHeader::peek(src)
            .map(|h| h.frame_size().unwrap_or(usize::MAX))
            .unwrap_or_else(|| src.len() + 1);
        let actual = src.len();
        src.clear();
        Err(ProtocolError::IncompleteFrame { expected, actual })
    }
}
