//! WebTransport connector backed by `wtransport`

use async_trait::async_trait;
use wtransport::endpoint::endpoint_side;
use wtransport::tls::Sha256Digest;
use wtransport::{ClientConfig, Endpoint, RecvStream, VarInt};

use super::{CertificateHash, Connection, Connector};
use crate::error::TransportError;

/// Opens WebTransport sessions over HTTP/3
#[derive(Debug, Clone, Copy, Default)]
pub struct WebTransportConnector;

impl WebTransportConnector {
    /// Connector that opens a fresh WebTransport client endpoint per attempt
    pub fn new() -> Self {
        Self
    }

    fn client_config(cert_hash: Option<&CertificateHash>) -> ClientConfig {
        let builder = ClientConfig::builder().with_bind_default();
        match cert_hash {
            Some(hash) => builder
                .with_server_certificate_hashes([Sha256Digest::new(*hash.as_bytes())])
                .build(),
            None => builder.with_native_certs().build(),
        }
    }
}

#[async_trait]
impl Connector for WebTransportConnector {
    type Connection = WebTransportConnection;

    async fn connect(
        &self,
        url: &str,
        cert_hash: Option<&CertificateHash>,
    ) -> Result<Self::Connection, TransportError> {
        let endpoint = Endpoint::client(Self::client_config(cert_hash))
            .map_err(|e| TransportError::Connect(format!("Failed to bind endpoint: {}", e)))?;

        let inner = endpoint
            .connect(url)
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        tracing::debug!("WebTransport session established with {}", url);

        Ok(WebTransportConnection {
            inner,
            _endpoint: endpoint,
        })
    }
}

/// An established WebTransport session
pub struct WebTransportConnection {
    inner: wtransport::Connection,
    // Dropping the endpoint tears down the QUIC socket
    _endpoint: Endpoint<endpoint_side::Client>,
}

#[async_trait]
impl Connection for WebTransportConnection {
    type Stream = RecvStream;

    async fn accept_stream(&self) -> Result<Option<Self::Stream>, TransportError> {
        self.inner
            .accept_uni()
            .await
            .map(Some)
            .map_err(|e| TransportError::ConnectionLost(e.to_string()))
    }

    async fn closed(&self) -> Result<(), TransportError> {
        let reason = self.inner.closed().await;
        Err(TransportError::ConnectionLost(reason.to_string()))
    }

    async fn close(&self) {
        self.inner.close(VarInt::from_u32(0), b"client disconnect");
    }
}
