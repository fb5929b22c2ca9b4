//! noaide-protocol: Wire protocol for the noaide event stream
//!
//! This crate defines the binary frame format the server pushes over each
//! transport sub-stream, the envelope carried inside every frame, and the
//! decoders that turn raw bytes back into `(topic, envelope)` pairs.

pub mod assembler;
pub mod codec;
pub mod envelope;
pub mod error;
pub mod frame;
pub mod topic;

pub use assembler::FrameAssembler;
pub use codec::{encode_frame, Compressor, DecodedFrame, Decompressor, FrameCodec};
pub use envelope::{EventEnvelope, EventSource, QualityTier};
pub use error::ProtocolError;
pub use frame::{CodecId, FrameHeader, DEFAULT_MAX_FRAME_SIZE, MAX_TOPIC_LEN};
