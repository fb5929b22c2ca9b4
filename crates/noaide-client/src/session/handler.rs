//! Callbacks a session uses to report to its host

use noaide_protocol::{EventEnvelope, QualityTier};
use tokio::sync::mpsc;

use super::state::ConnectionStatus;

/// Receives everything a [`TransportSession`](super::TransportSession) reports.
///
/// Callbacks run on the session's background tasks and must not block.
/// All methods default to doing nothing.
pub trait SessionHandler: Send + Sync + 'static {
    /// A frame was decoded on some sub-stream
    fn on_event(&self, topic: &str, envelope: EventEnvelope) {
        let _ = (topic, envelope);
    }

    /// The session's connection status changed
    fn on_status_change(&self, status: ConnectionStatus) {
        let _ = status;
    }

    /// The quality tier changed
    fn on_tier_change(&self, tier: QualityTier) {
        let _ = tier;
    }
}

impl SessionHandler for () {}

/// Everything a session reports, as a single value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Decoded event
    Event {
        topic: String,
        envelope: EventEnvelope,
    },
    /// Status transition
    Status(ConnectionStatus),
    /// Tier change
    Tier(QualityTier),
}

/// Handler that forwards every callback into an unbounded channel.
///
/// Callbacks are synchronous, so the channel is unbounded; the receiver is
/// expected to keep up.
#[derive(Debug, Clone)]
pub struct ChannelHandler {
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl ChannelHandler {
    /// Create a handler and the receiver its events arrive on
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn forward(&self, event: SessionEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("Session event receiver dropped");
        }
    }
}

impl SessionHandler for ChannelHandler {
    fn on_event(&self, topic: &str, envelope: EventEnvelope) {
        self.forward(SessionEvent::Event {
            topic: topic.to_string(),
            envelope,
        });
    }

    fn on_status_change(&self, status: ConnectionStatus) {
        self.forward(SessionEvent::Status(status));
    }

    fn on_tier_change(&self, tier: QualityTier) {
        self.forward(SessionEvent::Tier(tier));
    }
}
