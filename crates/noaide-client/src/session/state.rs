//! Session state shared between the host handle and background tasks

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use noaide_protocol::QualityTier;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Connectivity of a transport session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionStatus {
    /// Handshake or transport setup in progress
    Connecting,
    /// Transport ready; sub-streams are being read
    Connected,
    /// No transport; a reconnect may be pending
    #[default]
    Disconnected,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
        };
        f.write_str(name)
    }
}

/// Mutable session state, always accessed under one lock
#[derive(Debug, Default)]
pub(crate) struct SessionState {
    pub status: ConnectionStatus,
    /// Bumped on every status change; orders handler notifications
    pub status_seq: u64,
    pub tier: QualityTier,
    /// Consecutive failures since the last successful connect
    pub reconnect_attempt: u32,
    /// Token for the current connect cycle; None after `disconnect()`
    pub cancel: Option<CancellationToken>,
    pub reconnect_task: Option<JoinHandle<()>>,
    /// Identifies the most recently scheduled reconnect timer
    pub reconnect_seq: u64,
    pub driver_task: Option<JoinHandle<()>>,
}

impl SessionState {
    /// Set the status, returning the new status sequence number if it changed
    pub fn set_status(&mut self, status: ConnectionStatus) -> Option<u64> {
        if self.status == status {
            return None;
        }
        self.status = status;
        self.status_seq += 1;
        Some(self.status_seq)
    }

    /// Token for the current cycle, creating a fresh one after a disconnect
    pub fn live_token(&mut self) -> CancellationToken {
        match &self.cancel {
            Some(token) if !token.is_cancelled() => token.clone(),
            _ => {
                let token = CancellationToken::new();
                self.cancel = Some(token.clone());
                token
            }
        }
    }
}

/// Delivers status notifications in the order the changes were made.
///
/// Changes are made under the state lock but reported outside it, so two
/// tasks can reach the handler in the opposite order. A notification older
/// than one already delivered is dropped.
#[derive(Debug, Default)]
pub(crate) struct StatusNotifier {
    delivered: Mutex<u64>,
}

impl StatusNotifier {
    /// Run `notify` for change `seq` unless a later change was delivered first
    pub fn deliver(&self, seq: Option<u64>, notify: impl FnOnce()) -> bool {
        let Some(seq) = seq else {
            return false;
        };
        let mut delivered = self.delivered.lock().unwrap_or_else(PoisonError::into_inner);
        if seq <= *delivered {
            return false;
        }
        *delivered = seq;
        notify();
        true
    }
}

/// Counters kept for the lifetime of a session
#[derive(Debug, Default)]
pub(crate) struct SessionCounters {
    pub frames_decoded: AtomicU64,
    pub frames_dropped: AtomicU64,
    pub streams_accepted: AtomicU64,
    pub reconnects_scheduled: AtomicU64,
}

impl SessionCounters {
    pub fn snapshot(&self) -> SessionStats {
        SessionStats {
            frames_decoded: self.frames_decoded.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            streams_accepted: self.streams_accepted.load(Ordering::Relaxed),
            reconnects_scheduled: self.reconnects_scheduled.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time session statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionStats {
    /// Frames decoded and delivered to the handler
    pub frames_decoded: u64,
    /// Frames dropped because they could not be decoded
    pub frames_dropped: u64,
    /// Sub-streams accepted across all connections
    pub streams_accepted: u64,
    /// Reconnects scheduled after a failure or closure
    pub reconnects_scheduled: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let state = SessionState::default();
        assert_eq!(state.status, ConnectionStatus::Disconnected);
        assert_eq!(state.tier, QualityTier::Full);
        assert_eq!(state.reconnect_attempt, 0);
    }

    #[test]
    fn test_set_status_reports_change() {
        let mut state = SessionState::default();
        assert_eq!(state.set_status(ConnectionStatus::Disconnected), None);
        assert_eq!(state.set_status(ConnectionStatus::Connecting), Some(1));
        assert_eq!(state.set_status(ConnectionStatus::Connecting), None);
        assert_eq!(state.set_status(ConnectionStatus::Connected), Some(2));
    }

    #[test]
    fn test_stale_status_notification_dropped() {
        let notifier = StatusNotifier::default();
        let mut seen = Vec::new();

        assert!(notifier.deliver(Some(2), || seen.push(2)));
        assert!(!notifier.deliver(Some(1), || seen.push(1)));
        assert!(!notifier.deliver(Some(2), || seen.push(2)));
        assert!(!notifier.deliver(None, || seen.push(0)));
        assert!(notifier.deliver(Some(3), || seen.push(3)));

        assert_eq!(seen, vec![2, 3]);
    }

    #[test]
    fn test_live_token_replaced_after_cancel() {
        let mut state = SessionState::default();
        let first = state.live_token();
        assert!(!state.live_token().is_cancelled());

        first.cancel();
        let second = state.live_token();
        assert!(!second.is_cancelled());
        assert!(first.is_cancelled());
    }
}
