//! Frame header encoding/decoding
//!
//! Every frame on a sub-stream has the layout (integers big-endian):
//!
//! ```text
//! offset  size         field
//! 0       2            topic_len (u16)
//! 2       topic_len    topic (UTF-8)
//! 2+tl    1            codec_id (u8)
//! 3+tl    4            payload_len (u32)
//! 7+tl    payload_len  payload (compressed)
//! ```
//!
//! Frames are self-delimiting: the header alone determines where the next
//! frame starts, whatever the codec id says.

use bytes::{BufMut, BytesMut};

use crate::error::ProtocolError;

/// Size of the topic length prefix
pub const TOPIC_LEN_SIZE: usize = 2;

/// Size of the codec id and payload length fields that follow the topic
pub const TRAILER_SIZE: usize = 1 + 4;

/// Longest topic the 16-bit length prefix can carry
pub const MAX_TOPIC_LEN: usize = u16::MAX as usize;

/// Default upper bound on a single frame (16MB)
pub const DEFAULT_MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Payload codec identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CodecId {
    /// MessagePack map with named fields
    MessagePack = 0x01,
}

impl CodecId {
    /// Convert to u8
    pub fn as_u8(&self) -> u8 {
        *self as u8
    }

    /// Convert from u8
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x01 => Some(Self::MessagePack),
            _ => None,
        }
    }
}

/// Frame header: everything except the topic text and the payload bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Length of the topic in bytes
    pub topic_len: u16,
    /// Raw codec id; may be unknown to this client
    pub codec_id: u8,
    /// Length of the compressed payload in bytes
    pub payload_len: u32,
}

impl FrameHeader {
    /// Bytes from the start of the frame up to the first payload byte
    pub fn header_size(&self) -> usize {
        TOPIC_LEN_SIZE + self.topic_len as usize + TRAILER_SIZE
    }

    /// Total size of the frame including the payload.
    ///
    /// None when the size does not fit in `usize`, which is possible on
    /// 32-bit targets for payload lengths near `u32::MAX`.
    pub fn frame_size(&self) -> Option<usize> {
        self.header_size().checked_add(self.payload_len as usize)
    }

    /// Read a header from the start of `src` without consuming anything.
    ///
    /// Returns None while `src` is too short to hold the complete header.
    pub fn peek(src: &[u8]) -> Option<Self> {
        if src.len() < TOPIC_LEN_SIZE {
            return None;
        }

        let topic_len = u16::from_be_bytes([src[0], src[1]]);
        let codec_at = TOPIC_LEN_SIZE + topic_len as usize;
        if src.len() < codec_at + TRAILER_SIZE {
            return None;
        }

        let codec_id = src[codec_at];
        let len_at = codec_at + 1;
        let payload_len = u32::from_be_bytes([
            src[len_at],
            src[len_at + 1],
            src[len_at + 2],
            src[len_at + 3],
        ]);

        Some(Self {
            topic_len,
            codec_id,
            payload_len,
        })
    }

    /// Write the header for `topic` into `dst`, leaving the payload to the caller
    pub fn encode(
        topic: &str,
        codec_id: CodecId,
        payload_len: usize,
        dst: &mut BytesMut,
    ) -> Result<(), ProtocolError> {
        let topic = topic.as_bytes();
        if topic.len() > MAX_TOPIC_LEN {
            return Err(ProtocolError::TopicTooLong {
                len: topic.len(),
                max: MAX_TOPIC_LEN,
            });
        }
        let payload_len = u32::try_from(payload_len).map_err(|_| ProtocolError::FrameTooLarge {
            size: payload_len,
            max: u32::MAX as usize,
        })?;

        dst.reserve(TOPIC_LEN_SIZE + topic.len() + TRAILER_SIZE);
        dst.put_u16(topic.len() as u16);
        dst.put_slice(topic);
        dst.put_u8(codec_id.as_u8());
        dst.put_u32(payload_len);
        Ok(())
    }
}
