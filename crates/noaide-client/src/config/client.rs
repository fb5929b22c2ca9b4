//! Client configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use noaide_protocol::DEFAULT_MAX_FRAME_SIZE;

use super::serde_utils::duration_millis;
use crate::error::ConfigError;

/// Path of the certificate fingerprint endpoint under the HTTP API base
pub const CERT_HASH_PATH: &str = "/api/cert-hash";

/// Configuration for a transport session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Transport endpoint, e.g. `https://localhost:4433`
    pub url: String,

    /// Base URL of the server's HTTP API (serves the certificate hash)
    pub http_api_base: String,

    /// Fetch and pin the server certificate fingerprint before connecting
    pub pin_certificate: bool,

    /// Backoff configuration for reconnections
    pub backoff: BackoffConfig,

    /// How long to wait for the transport to become ready
    #[serde(with = "duration_millis")]
    pub connect_timeout: Duration,

    /// How long to wait for the certificate hash endpoint
    #[serde(with = "duration_millis")]
    pub handshake_timeout: Duration,

    /// Largest frame accepted on a sub-stream before it is closed
    pub max_frame_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: "https://localhost:4433".to_string(),
            http_api_base: "http://localhost:8080".to_string(),
            pin_certificate: true,
            backoff: BackoffConfig::default(),
            connect_timeout: Duration::from_secs(10),
            handshake_timeout: Duration::from_secs(5),
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

impl ClientConfig {
    /// Create a configuration for the given transport URL
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Full URL of the certificate hash endpoint
    pub fn cert_hash_url(&self) -> String {
        format!("{}{}", self.http_api_base.trim_end_matches('/'), CERT_HASH_PATH)
    }

    /// Reject values no session can run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.url.trim().is_empty() {
            return Err(ConfigError::Invalid("url must not be empty".to_string()));
        }
        if self.pin_certificate
            && !(self.http_api_base.starts_with("http://")
                || self.http_api_base.starts_with("https://"))
        {
            return Err(ConfigError::Invalid(format!(
                "http_api_base must be an http(s) URL, got {:?}",
                self.http_api_base
            )));
        }
        if self.max_frame_size == 0 {
            return Err(ConfigError::Invalid(
                "max_frame_size must be positive".to_string(),
            ));
        }
        if self.connect_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "connect_timeout must be positive".to_string(),
            ));
        }
        if self.backoff.initial > self.backoff.max {
            return Err(ConfigError::Invalid(format!(
                "backoff.initial ({:?}) exceeds backoff.max ({:?})",
                self.backoff.initial, self.backoff.max
            )));
        }
        Ok(())
    }
}

/// Exponential backoff configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    /// Delay before the first retry
    #[serde(with = "duration_millis")]
    pub initial: Duration,

    /// Maximum delay
    #[serde(with = "duration_millis")]
    pub max: Duration,

    /// Multiplier for each retry
    pub multiplier: f64,

    /// Jitter factor (0.0 to 1.0)
    pub jitter: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(500),
            max: Duration::from_secs(30),
            multiplier: 2.0,
            jitter: 0.0,
        }
    }
}
