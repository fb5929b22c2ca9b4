//! Multiplexed transport abstraction
//!
//! A session only needs three things from its transport: open a connection,
//! accept server-initiated unidirectional sub-streams, and notice when the
//! connection goes away. [`Connector`] and [`Connection`] capture exactly
//! that so the session can run over WebTransport in production and over
//! in-memory pipes in tests.

use std::fmt;

use async_trait::async_trait;
use tokio::io::AsyncRead;

use crate::error::TransportError;

#[cfg(feature = "webtransport")]
mod webtransport;

#[cfg(feature = "webtransport")]
pub use webtransport::{WebTransportConnection, WebTransportConnector};

/// Pinned server certificate fingerprint
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct CertificateHash([u8; 32]);

impl CertificateHash {
    /// Wrap a SHA-256 digest
    pub fn sha256(digest: [u8; 32]) -> Self {
        Self(digest)
    }

    /// Raw SHA-256 digest
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for CertificateHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CertificateHash(sha-256:")?;
        for byte in &self.0[..4] {
            write!(f, "{:02x}", byte)?;
        }
        write!(f, "..)")
    }
}

/// Opens connections to the event server
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Connection: Connection;

    /// Open a connection and wait until it is ready.
    ///
    /// When `cert_hash` is given the server certificate must match it;
    /// otherwise the platform's default trust applies.
    async fn connect(
        &self,
        url: &str,
        cert_hash: Option<&CertificateHash>,
    ) -> Result<Self::Connection, TransportError>;
}

/// An established multiplexed connection
#[async_trait]
pub trait Connection: Send + Sync + 'static {
    type Stream: AsyncRead + Send + Unpin + 'static;

    /// Wait for the next server-initiated unidirectional stream.
    ///
    /// `Ok(None)` means no further streams will arrive on this connection.
    async fn accept_stream(&self) -> Result<Option<Self::Stream>, TransportError>;

    /// Resolve once the connection is closed, with the reason if abnormal
    async fn closed(&self) -> Result<(), TransportError>;

    /// Close the connection from this side
    async fn close(&self);
}
