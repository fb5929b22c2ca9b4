//! Reconnecting transport session
//!
//! A [`TransportSession`] owns one multiplexed connection at a time and runs
//! the `Disconnected -> Connecting -> Connected -> Disconnected` state
//! machine on background tasks:
//!
//! - a connect cycle fetches the certificate fingerprint, opens the
//!   transport, and starts a connection driver;
//! - the driver accepts sub-streams and runs one frame reader per stream;
//! - any failure or closure schedules a reconnect with exponential backoff.
//!
//! Every task of a cycle shares one cancellation token, raised by
//! [`TransportSession::disconnect`] or by dropping the session.

mod handler;
pub mod handshake;
mod reader;
mod reconnect;
mod state;

pub use handler::{ChannelHandler, SessionEvent, SessionHandler};
pub use reconnect::ExponentialBackoff;
pub use state::{ConnectionStatus, SessionStats};

use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use futures::future::{BoxFuture, FutureExt};
use noaide_protocol::{Decompressor, FrameCodec, QualityTier};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::config::ClientConfig;
use crate::error::{ClientError, HandshakeError, TransportError};
use crate::transport::{CertificateHash, Connection, Connector};
use state::{SessionCounters, SessionState, StatusNotifier};

/// Builder for [`TransportSession`]
pub struct SessionBuilder<C: Connector> {
    config: ClientConfig,
    connector: C,
    handler: Arc<dyn SessionHandler>,
    codec: FrameCodec,
}

impl<C: Connector> SessionBuilder<C> {
    /// Receive events and status changes through `handler`
    pub fn handler(mut self, handler: impl SessionHandler) -> Self {
        self.handler = Arc::new(handler);
        self
    }

    /// Use a handler that is shared with other owners
    pub fn shared_handler(mut self, handler: Arc<dyn SessionHandler>) -> Self {
        self.handler = handler;
        self
    }

    /// Decompress frame payloads with `decompressor`
    pub fn decompressor(mut self, decompressor: impl Decompressor + 'static) -> Self {
        self.codec.set_decompressor(Arc::new(decompressor));
        self
    }

    /// Validate the configuration and create the session, initially
    /// disconnected
    pub fn build(self) -> Result<TransportSession<C>, ClientError> {
        self.config.validate()?;

        let http = reqwest::Client::builder()
            .build()
            .map_err(HandshakeError::Http)?;

        let inner = Inner {
            backoff: ExponentialBackoff::from_config(&self.config.backoff),
            config: self.config,
            connector: self.connector,
            handler: self.handler,
            codec: RwLock::new(self.codec),
            http,
            state: Mutex::new(SessionState::default()),
            notifier: StatusNotifier::default(),
            stats: SessionCounters::default(),
        };

        Ok(TransportSession {
            inner: Arc::new(inner),
        })
    }
}

/// Handle to a reconnecting transport session.
///
/// Dropping the handle cancels all background work.
pub struct TransportSession<C: Connector> {
    inner: Arc<Inner<C>>,
}

impl<C: Connector> TransportSession<C> {
    /// Start building a session for `config`, opening connections with
    /// `connector`
    pub fn builder(config: ClientConfig, connector: C) -> SessionBuilder<C> {
        SessionBuilder {
            config,
            connector,
            handler: Arc::new(()),
            codec: FrameCodec::new(),
        }
    }

    /// Start connecting.
    ///
    /// Returns once the first attempt has either connected or failed (in
    /// which case a reconnect is already scheduled). Does nothing if the
    /// session is already connecting or connected. A reconnect timer that is
    /// still pending is superseded by this attempt.
    pub async fn connect(&self) {
        {
            let mut state = self.inner.lock_state();
            if state.status == ConnectionStatus::Disconnected {
                if let Some(task) = state.reconnect_task.take() {
                    task.abort();
                }
            }
        }

        // Dropping this future must not leave the session stuck in `Connecting`
        let cycle = tokio::spawn(Arc::clone(&self.inner).connect_cycle());
        if let Err(e) = cycle.await {
            if e.is_panic() {
                tracing::error!("Connect cycle panicked");
            }
        }
    }

    /// Stop the session.
    ///
    /// Cancels in-flight reads and any pending reconnect, closes the
    /// transport, and resets the attempt counter. No reconnection happens
    /// until [`connect`](Self::connect) is called again.
    pub async fn disconnect(&self) {
        let (seq, driver) = {
            let mut state = self.inner.lock_state();
            if let Some(token) = state.cancel.take() {
                token.cancel();
            }
            if let Some(task) = state.reconnect_task.take() {
                task.abort();
            }
            state.reconnect_attempt = 0;
            (
                state.set_status(ConnectionStatus::Disconnected),
                state.driver_task.take(),
            )
        };

        self.inner.notify_status(seq, ConnectionStatus::Disconnected);
        if let Some(driver) = driver {
            let _ = driver.await;
        }

        tracing::info!("Disconnected from {}", self.inner.config.url);
    }

    /// Whether the transport is up
    pub fn is_connected(&self) -> bool {
        self.current_status() == ConnectionStatus::Connected
    }

    /// Current connection status
    pub fn current_status(&self) -> ConnectionStatus {
        self.inner.lock_state().status
    }

    /// Quality tier last recorded with [`set_tier`](Self::set_tier)
    pub fn current_tier(&self) -> QualityTier {
        self.inner.lock_state().tier
    }

    /// Record a new quality tier, notifying the handler if it changed
    pub fn set_tier(&self, tier: QualityTier) {
        let changed = {
            let mut state = self.inner.lock_state();
            let changed = state.tier != tier;
            state.tier = tier;
            changed
        };

        if changed {
            tracing::info!("Quality tier changed to {}", tier);
            self.inner.handler.on_tier_change(tier);
        }
    }

    /// Replace the payload decompressor for all frames decoded from now on
    pub fn set_decompressor(&self, decompressor: impl Decompressor + 'static) {
        self.inner
            .codec
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .set_decompressor(Arc::new(decompressor));
    }

    /// Snapshot of the session counters
    pub fn stats(&self) -> SessionStats {
        self.inner.stats.snapshot()
    }

    /// Configuration the session was built with
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }
}

impl<C: Connector> Drop for TransportSession<C> {
    fn drop(&mut self) {
        let mut state = self.inner.lock_state();
        if let Some(token) = state.cancel.take() {
            token.cancel();
        }
        if let Some(task) = state.reconnect_task.take() {
            task.abort();
        }
    }
}

/// State shared by the handle and every background task
struct Inner<C: Connector> {
    config: ClientConfig,
    connector: C,
    handler: Arc<dyn SessionHandler>,
    /// Cloned per frame so decoding never holds the lock
    codec: RwLock<FrameCodec>,
    backoff: ExponentialBackoff,
    http: reqwest::Client,
    state: Mutex<SessionState>,
    notifier: StatusNotifier,
    stats: SessionCounters,
}

impl<C: Connector> Inner<C> {
    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Report the status change numbered `seq`, if any, to the handler
    fn notify_status(&self, seq: Option<u64>, status: ConnectionStatus) {
        let delivered = self
            .notifier
            .deliver(seq, || self.handler.on_status_change(status));
        if seq.is_some() && !delivered {
            tracing::trace!("Superseded {} notification dropped", status);
        }
    }

    /// One connect attempt. Boxed because a failed attempt schedules a
    /// reconnect task that runs this again.
    fn connect_cycle(self: Arc<Self>) -> BoxFuture<'static, ()> {
        async move {
            let (cancel, seq) = {
                let mut state = self.lock_state();
                if state.status != ConnectionStatus::Disconnected {
                    tracing::debug!("Connect skipped, session is {}", state.status);
                    return;
                }
                let token = state.live_token();
                (token, state.set_status(ConnectionStatus::Connecting))
            };
            self.notify_status(seq, ConnectionStatus::Connecting);

            let cert_hash = if self.config.pin_certificate {
                self.pinned_cert_hash().await
            } else {
                None
            };
            if cancel.is_cancelled() {
                return;
            }

            tracing::info!("Connecting to {}", self.config.url);
            let attempt = tokio::time::timeout(
                self.config.connect_timeout,
                self.connector.connect(&self.config.url, cert_hash.as_ref()),
            )
            .await;

            let connection = match attempt {
                Ok(Ok(connection)) => connection,
                Ok(Err(e)) => {
                    self.connection_failed(&cancel, e);
                    return;
                }
                Err(_) => {
                    let e = TransportError::Timeout(self.config.connect_timeout);
                    self.connection_failed(&cancel, e);
                    return;
                }
            };

            let connected = {
                let mut state = self.lock_state();
                if cancel.is_cancelled() {
                    None
                } else {
                    state.reconnect_attempt = 0;
                    Some(state.set_status(ConnectionStatus::Connected))
                }
            };
            let Some(seq) = connected else {
                connection.close().await;
                return;
            };

            tracing::info!("Connected to {}", self.config.url);
            self.notify_status(seq, ConnectionStatus::Connected);

            let driver = tokio::spawn(
                Arc::clone(&self).drive_connection(connection, cancel.clone()),
            );
            let mut state = self.lock_state();
            // A cancelled driver shuts itself down; only a live one is awaited
            // by `disconnect`.
            if !cancel.is_cancelled() {
                state.driver_task = Some(driver);
            }
        }
        .boxed()
    }

    async fn pinned_cert_hash(&self) -> Option<CertificateHash> {
        let url = self.config.cert_hash_url();
        match handshake::fetch_cert_hash(&self.http, &url, self.config.handshake_timeout).await {
            Ok(hash) => {
                tracing::debug!("Pinning server certificate {:?}", hash);
                Some(hash)
            }
            Err(e) => {
                tracing::warn!(
                    "Certificate hash unavailable from {}, using default trust: {}",
                    url,
                    e
                );
                None
            }
        }
    }

    fn connection_failed(self: &Arc<Self>, cancel: &CancellationToken, error: TransportError) {
        if cancel.is_cancelled() {
            return;
        }
        tracing::warn!("Connection to {} failed: {}", self.config.url, error);
        self.mark_disconnected(cancel);
    }

    /// Move to `Disconnected` and schedule a reconnect, unless the cycle was
    /// cancelled.
    ///
    /// Both happen under one lock: the timer is in place before the handler
    /// hears of the change.
    fn mark_disconnected(self: &Arc<Self>, cancel: &CancellationToken) {
        let seq = {
            let mut state = self.lock_state();
            if cancel.is_cancelled() {
                return;
            }
            let seq = state.set_status(ConnectionStatus::Disconnected);
            self.schedule_reconnect(&mut state, cancel);
            seq
        };
        self.notify_status(seq, ConnectionStatus::Disconnected);
    }

    fn schedule_reconnect(
        self: &Arc<Self>,
        state: &mut SessionState,
        cancel: &CancellationToken,
    ) {
        if cancel.is_cancelled() || state.status != ConnectionStatus::Disconnected {
            return;
        }
        if let Some(previous) = state.reconnect_task.take() {
            previous.abort();
        }

        let attempt = state.reconnect_attempt;
        let delay = self.backoff.delay_for_attempt(attempt);
        state.reconnect_attempt = attempt.saturating_add(1);
        self.stats.reconnects_scheduled.fetch_add(1, Ordering::Relaxed);

        tracing::info!(
            "Reconnecting to {} in {:?} (attempt {})",
            self.config.url,
            delay,
            state.reconnect_attempt
        );

        state.reconnect_seq += 1;
        let seq = state.reconnect_seq;
        let inner = Arc::clone(self);
        let cancel = cancel.clone();
        let task = tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }
            {
                let mut state = inner.lock_state();
                if cancel.is_cancelled() || state.reconnect_seq != seq {
                    return;
                }
                // Running now; a host `connect()` must not abort this cycle
                state.reconnect_task = None;
            }
            inner.connect_cycle().await;
        });
        state.reconnect_task = Some(task);
    }

    /// Accept sub-streams and watch for closure until the connection ends or
    /// the cycle is cancelled
    async fn drive_connection(
        self: Arc<Self>,
        connection: C::Connection,
        cancel: CancellationToken,
    ) {
        let mut readers = JoinSet::new();
        let mut accepting = true;
        let mut next_stream_id: u64 = 0;
        let mut closed = connection.closed();

        let outcome = loop {
            tokio::select! {
                _ = cancel.cancelled() => break None,

                result = &mut closed => break Some(result),

                accepted = connection.accept_stream(), if accepting => match accepted {
                    Ok(Some(stream)) => {
                        let stream_id = next_stream_id;
                        next_stream_id += 1;
                        self.stats.streams_accepted.fetch_add(1, Ordering::Relaxed);
                        tracing::debug!("Accepted stream {}", stream_id);

                        let inner = Arc::clone(&self);
                        readers.spawn(reader::read_stream(
                            stream,
                            stream_id,
                            self.config.max_frame_size,
                            cancel.clone(),
                            move |frame| inner.dispatch_frame(&frame),
                        ));
                    }
                    Ok(None) => {
                        tracing::debug!("Connection will open no more streams");
                        accepting = false;
                    }
                    Err(e) => break Some(Err(e)),
                },

                Some(joined) = readers.join_next(), if !readers.is_empty() => {
                    if let Err(e) = joined {
                        if e.is_panic() {
                            tracing::error!("Stream reader panicked");
                        }
                    }
                }
            }
        };
        drop(closed);
        readers.shutdown().await;

        match outcome {
            None => {
                connection.close().await;
                tracing::debug!("Connection driver stopped");
            }
            Some(result) => {
                if !cancel.is_cancelled() {
                    match result {
                        Ok(()) => tracing::info!("Connection to {} closed", self.config.url),
                        Err(e) => tracing::warn!("Connection to {} lost: {}", self.config.url, e),
                    }
                }
                self.mark_disconnected(&cancel);
            }
        }
    }

    /// Decode one frame and deliver it; failures drop only this frame
    fn dispatch_frame(&self, frame: &[u8]) {
        let codec = self
            .codec
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        match codec.decode(frame) {
            Ok(decoded) => {
                self.stats.frames_decoded.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(
                    "Event {} seq {} on {}",
                    decoded.envelope.event_id,
                    decoded.envelope.sequence,
                    decoded.topic
                );
                self.handler.on_event(&decoded.topic, decoded.envelope);
            }
            Err(e) => {
                self.stats.frames_dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!("Dropping frame of {} bytes: {}", frame.len(), e);
            }
        }
    }
}
