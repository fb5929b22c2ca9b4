//! Framing tests across arbitrary read boundaries
//!
//! Drives `FrameAssembler` and `FrameCodec` together the way a sub-stream
//! reader does: bytes arrive in chunks, every complete frame is decoded, and
//! decode failures drop only the frame they belong to.

use std::io;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio_util::codec::{Decoder, FramedRead};

use noaide_protocol::topic::{FILE_CHANGES, SESSION_MESSAGES, SYSTEM_EVENTS};
use noaide_protocol::{
    encode_frame, DecodedFrame, EventEnvelope, EventSource, FrameAssembler, FrameCodec,
};

fn passthrough(input: &[u8]) -> io::Result<Vec<u8>> {
    Ok(input.to_vec())
}

fn envelope(sequence: u64, source: EventSource) -> EventEnvelope {
    EventEnvelope {
        event_id: format!("event-{}", sequence),
        source,
        sequence,
        logical_ts: sequence * 10,
        wall_ts: 1_771_000_000_000 + sequence,
        session_id: Some("3b0f3c1e-aaaa-4bbb-8ccc-000000000001".to_string()),
        dedup_key: None,
        payload: Bytes::from(vec![sequence as u8; 40]),
    }
}

fn encoded(topic: &str, envelope: &EventEnvelope) -> BytesMut {
    let mut buf = BytesMut::new();
    encode_frame(topic, envelope, &passthrough, &mut buf).unwrap();
    buf
}

/// Feed `chunks` in order, decoding everything that completes after each one.
/// Returns the decoded frames along with the chunk index each appeared at.
fn feed(chunks: &[&[u8]]) -> Vec<(usize, DecodedFrame)> {
    let mut assembler = FrameAssembler::new();
    let codec = FrameCodec::with_decompressor(Arc::new(passthrough));
    let mut buf = BytesMut::new();
    let mut out = Vec::new();

    for (i, chunk) in chunks.iter().enumerate() {
        buf.extend_from_slice(chunk);
        while let Some(frame) = assembler.decode(&mut buf).unwrap() {
            if let Ok(decoded) = codec.decode(&frame) {
                out.push((i, decoded));
            }
        }
    }
    out
}

#[test]
fn test_every_split_point_yields_one_frame() {
    let original = envelope(1, EventSource::Pty);
    let frame = encoded(SESSION_MESSAGES, &original);

    for split in 1..frame.len() {
        let (head, tail) = frame.split_at(split);
        let decoded = feed(&[head, tail]);

        assert_eq!(decoded.len(), 1, "split at {}", split);
        let (chunk, frame) = &decoded[0];
        assert_eq!(*chunk, 1, "frame emitted before final byte at split {}", split);
        assert_eq!(frame.topic, SESSION_MESSAGES);
        assert_eq!(frame.envelope, original);
    }
}

#[test]
fn test_one_byte_chunks() {
    let original = envelope(2, EventSource::Watcher);
    let frame = encoded(FILE_CHANGES, &original);
    let chunks: Vec<&[u8]> = frame.chunks(1).collect();

    let decoded = feed(&chunks);
    assert_eq!(decoded.len(), 1);
    assert_eq!(decoded[0].0, frame.len() - 1);
    assert_eq!(decoded[0].1.envelope, original);
}

#[test]
fn test_two_frames_in_one_chunk() {
    let first = envelope(1, EventSource::Jsonl);
    let second = envelope(2, EventSource::Proxy);
    let mut batch = encoded(SESSION_MESSAGES, &first);
    batch.extend_from_slice(&encoded(SYSTEM_EVENTS, &second));

    let decoded = feed(&[&batch]);
    assert_eq!(decoded.len(), 2);
    assert_eq!(decoded[0].1.topic, SESSION_MESSAGES);
    assert_eq!(decoded[0].1.envelope, first);
    assert_eq!(decoded[1].1.topic, SYSTEM_EVENTS);
    assert_eq!(decoded[1].1.envelope, second);
}

#[test]
fn test_unknown_codec_then_valid_frame() {
    let mut bad = encoded(SYSTEM_EVENTS, &envelope(1, EventSource::User));
    bad[2 + SYSTEM_EVENTS.len()] = 0x42;
    let good_envelope = envelope(2, EventSource::Jsonl);
    let mut batch = bad;
    batch.extend_from_slice(&encoded(SESSION_MESSAGES, &good_envelope));

    let decoded = feed(&[&batch]);
    assert_eq!(decoded.len(), 1);
    assert_eq!(decoded[0].1.topic, SESSION_MESSAGES);
    assert_eq!(decoded[0].1.envelope, good_envelope);
}

#[tokio::test]
async fn test_framed_read_over_stream() {
    let (mut writer, reader) = tokio::io::duplex(64);
    let frames: Vec<EventEnvelope> = (1..=5).map(|n| envelope(n, EventSource::Pty)).collect();

    let mut wire = BytesMut::new();
    for e in &frames {
        wire.extend_from_slice(&encoded(SESSION_MESSAGES, e));
    }

    let writer_task = tokio::spawn(async move {
        // Odd chunk size so frames straddle writes
        for chunk in wire.chunks(7) {
            writer.write_all(chunk).await.unwrap();
        }
    });

    let codec = FrameCodec::with_decompressor(Arc::new(passthrough));
    let mut stream = FramedRead::new(reader, FrameAssembler::new());
    let mut received = Vec::new();
    while let Some(frame) = stream.next().await {
        received.push(codec.decode(&frame.unwrap()).unwrap().envelope);
    }
    writer_task.await.unwrap();

    assert_eq!(received, frames);
}
