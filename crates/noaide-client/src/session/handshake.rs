//! Certificate fingerprint handshake
//!
//! Before opening the transport the client asks the server's HTTP API for
//! the SHA-256 fingerprint of its (usually self-signed) certificate:
//!
//! ```text
//! GET <http_api_base>/api/cert-hash
//! { "algorithm": "sha-256", "hash": "<base64>" }
//! ```
//!
//! The fetch is best effort; the session falls back to default trust when it
//! fails.

use std::time::Duration;

use base64::prelude::{Engine, BASE64_STANDARD};
use serde::Deserialize;

use crate::error::HandshakeError;
use crate::transport::CertificateHash;

/// Body returned by the certificate hash endpoint
#[derive(Debug, Deserialize)]
struct CertHashResponse {
    algorithm: String,
    hash: String,
}

/// Fetch the certificate fingerprint from `url`
pub async fn fetch_cert_hash(
    client: &reqwest::Client,
    url: &str,
    timeout: Duration,
) -> Result<CertificateHash, HandshakeError> {
    let response: CertHashResponse = client
        .get(url)
        .timeout(timeout)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    parse_cert_hash(&response.algorithm, &response.hash)
}

/// Validate and decode an `(algorithm, base64 hash)` pair
pub fn parse_cert_hash(algorithm: &str, hash: &str) -> Result<CertificateHash, HandshakeError> {
    if !matches!(algorithm.to_ascii_lowercase().as_str(), "sha-256" | "sha256") {
        return Err(HandshakeError::UnsupportedAlgorithm(algorithm.to_string()));
    }

    let bytes = BASE64_STANDARD.decode(hash.trim())?;
    let digest: [u8; 32] =
        bytes
            .as_slice()
            .try_into()
            .map_err(|_| HandshakeError::InvalidLength {
                expected: 32,
                actual: bytes.len(),
            })?;

    Ok(CertificateHash::sha256(digest))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sha256() {
        let digest = [7u8; 32];
        let encoded = BASE64_STANDARD.encode(digest);

        let hash = parse_cert_hash("sha-256", &encoded).unwrap();
        assert_eq!(hash.as_bytes(), &digest);

        let hash = parse_cert_hash("SHA256", &encoded).unwrap();
        assert_eq!(hash.as_bytes(), &digest);
    }

    #[test]
    fn test_parse_rejects_other_algorithms() {
        let encoded = BASE64_STANDARD.encode([0u8; 48]);
        assert!(matches!(
            parse_cert_hash("sha-384", &encoded),
            Err(HandshakeError::UnsupportedAlgorithm(a)) if a == "sha-384"
        ));
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(matches!(
            parse_cert_hash("sha-256", "not base64!"),
            Err(HandshakeError::Encoding(_))
        ));
        assert!(matches!(
            parse_cert_hash("sha-256", &BASE64_STANDARD.encode([1u8; 16])),
            Err(HandshakeError::InvalidLength {
                expected: 32,
                actual: 16
            })
        ));
    }
}
