//! Per-sub-stream frame reader

use bytes::Bytes;
use futures::StreamExt;
use noaide_protocol::{FrameAssembler, ProtocolError};
use tokio::io::AsyncRead;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;

/// Read complete frames from one sub-stream until it ends, fails, or the
/// session is cancelled.
///
/// Each frame is handed to `on_frame` in arrival order. A framing violation
/// (oversized or truncated frame) closes this stream only; other streams
/// on the same connection are unaffected.
pub(crate) async fn read_stream<S, F>(
    stream: S,
    stream_id: u64,
    max_frame_size: usize,
    cancel: CancellationToken,
    mut on_frame: F,
) where
    S: AsyncRead + Unpin,
    F: FnMut(Bytes),
{
    let mut frames = FramedRead::new(stream, FrameAssembler::with_max_frame_size(max_frame_size));

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::trace!("Stream {} reader cancelled", stream_id);
                break;
            }

            next = frames.next() => match next {
                Some(Ok(frame)) => on_frame(frame),
                Some(Err(ProtocolError::Io(e))) => {
                    if !cancel.is_cancelled() {
                        tracing::warn!("Stream {} read error: {}", stream_id, e);
                    }
                    break;
                }
                Some(Err(e)) => {
                    tracing::warn!("Closing stream {}: {}", stream_id, e);
                    break;
                }
                None => {
                    tracing::debug!("Stream {} finished", stream_id);
                    break;
                }
            }
        }
    }
}
