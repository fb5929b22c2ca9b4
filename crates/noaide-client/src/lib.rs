//! noaide-client: Reconnecting event stream client
//!
//! Keeps a multiplexed transport connection to the noaide server alive,
//! turns every server-opened sub-stream into a sequence of decoded
//! `(topic, envelope)` events, and reports connectivity and quality tier
//! changes to the host through a [`SessionHandler`].

pub mod config;
pub mod error;
pub mod session;
pub mod transport;

pub use config::{BackoffConfig, ClientConfig};
pub use error::{ClientError, ConfigError, HandshakeError, TransportError};
pub use session::{
    ChannelHandler, ConnectionStatus, SessionBuilder, SessionEvent, SessionHandler, SessionStats,
    TransportSession,
};
pub use transport::{CertificateHash, Connection, Connector};

#[cfg(feature = "webtransport")]
pub use transport::{WebTransportConnection, WebTransportConnector};
