//! Certificate hash endpoint tests against a local HTTP server

mod common;

use std::time::Duration;

use noaide_client::session::handshake::fetch_cert_hash;
use noaide_client::HandshakeError;

use common::{closed_port, serve_once};

const TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::test]
async fn test_fetch_cert_hash() {
    let body = serde_json::json!({
        "algorithm": "sha-256",
        "hash": "AAECAwQFBgcICQoLDA0ODxAREhMUFRYXGBkaGxwdHh8=",
    });
    let addr = serve_once("200 OK", body.to_string()).await;

    let client = reqwest::Client::new();
    let url = format!("http://{}/api/cert-hash", addr);
    let hash = fetch_cert_hash(&client, &url, TIMEOUT).await.unwrap();

    let expected: Vec<u8> = (0u8..32).collect();
    assert_eq!(hash.as_bytes().as_slice(), expected.as_slice());
}

#[tokio::test]
async fn test_error_status_is_reported() {
    let addr = serve_once("503 Service Unavailable", "{}".to_string()).await;

    let client = reqwest::Client::new();
    let url = format!("http://{}/api/cert-hash", addr);
    let result = fetch_cert_hash(&client, &url, TIMEOUT).await;

    assert!(matches!(result, Err(HandshakeError::Http(_))));
}

#[tokio::test]
async fn test_unsupported_algorithm() {
    let body = serde_json::json!({ "algorithm": "sha-1", "hash": "AAAA" });
    let addr = serve_once("200 OK", body.to_string()).await;

    let client = reqwest::Client::new();
    let url = format!("http://{}/api/cert-hash", addr);
    let result = fetch_cert_hash(&client, &url, TIMEOUT).await;

    assert!(matches!(
        result,
        Err(HandshakeError::UnsupportedAlgorithm(name)) if name == "sha-1"
    ));
}

#[tokio::test]
async fn test_unreachable_endpoint() {
    let client = reqwest::Client::new();
    let url = format!("http://{}/api/cert-hash", closed_port().await);

    assert!(fetch_cert_hash(&client, &url, TIMEOUT).await.is_err());
}
