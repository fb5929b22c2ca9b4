//! Error types for the noaide client
//!
//! None of these are fatal to the host: handshake failures fall back to
//! default certificate trust, transport failures lead to a scheduled
//! reconnect, and frame failures drop a single frame.

use std::path::PathBuf;
use std::time::Duration;

use noaide_protocol::ProtocolError;
use thiserror::Error;

/// Top-level error type for the client
#[derive(Error, Debug)]
pub enum ClientError {
    /// Protocol error
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Transport error
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Certificate hash handshake error
    #[error("Handshake error: {0}")]
    Handshake(#[from] HandshakeError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Failures of the underlying multiplexed transport
#[derive(Error, Debug)]
pub enum TransportError {
    /// Transport could not be constructed or never became ready
    #[error("Connect failed: {0}")]
    Connect(String),

    /// Transport did not become ready in time
    #[error("Connect timed out after {0:?}")]
    Timeout(Duration),

    /// Connection closed by the peer or the network
    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    /// Read failure on a sub-stream
    #[error("Stream error: {0}")]
    Stream(#[from] std::io::Error),
}

/// Failures fetching the pinned certificate fingerprint
#[derive(Error, Debug)]
pub enum HandshakeError {
    /// HTTP request failed or returned an error status
    #[error("Certificate hash request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Hash was not valid base64
    #[error("Certificate hash is not valid base64: {0}")]
    Encoding(#[from] base64::DecodeError),

    /// Only SHA-256 fingerprints can be pinned
    #[error("Unsupported certificate hash algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// Decoded hash has the wrong length for its algorithm
    #[error("Certificate hash has {actual} bytes, expected {expected}")]
    InvalidLength { expected: usize, actual: usize },
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Config file could not be read or written
    #[error("Config file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialize error
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}
