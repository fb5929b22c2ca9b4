//! Shared test fixtures: an in-memory transport and a one-shot HTTP server

#![allow(dead_code)]

use std::collections::VecDeque;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;

use noaide_client::{CertificateHash, Connection, Connector, SessionEvent, TransportError};
use noaide_protocol::{encode_frame, EventEnvelope, EventSource};

/// What the mock connector does on its next connect attempt
#[derive(Debug, Clone, Copy)]
pub enum Plan {
    Fail,
    Accept,
    Hang,
}

struct MockShared {
    plan: Mutex<VecDeque<Plan>>,
    attempts: Mutex<Vec<Instant>>,
    cert_hashes: Mutex<Vec<Option<CertificateHash>>>,
    servers: mpsc::UnboundedSender<ServerHandle>,
}

/// Connector that follows a script; attempts past the end of it fail
#[derive(Clone)]
pub struct MockConnector {
    shared: Arc<MockShared>,
}

impl MockConnector {
    pub fn new(
        plan: impl IntoIterator<Item = Plan>,
    ) -> (Self, mpsc::UnboundedReceiver<ServerHandle>) {
        let (servers, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(MockShared {
            plan: Mutex::new(plan.into_iter().collect()),
            attempts: Mutex::new(Vec::new()),
            cert_hashes: Mutex::new(Vec::new()),
            servers,
        });
        (Self { shared }, rx)
    }

    pub fn attempts(&self) -> Vec<Instant> {
        self.shared.attempts.lock().unwrap().clone()
    }

    pub fn cert_hashes(&self) -> Vec<Option<CertificateHash>> {
        self.shared.cert_hashes.lock().unwrap().clone()
    }
}

#[async_trait]
impl Connector for MockConnector {
    type Connection = MockConnection;

    async fn connect(
        &self,
        _url: &str,
        cert_hash: Option<&CertificateHash>,
    ) -> Result<MockConnection, TransportError> {
        self.shared.attempts.lock().unwrap().push(Instant::now());
        self.shared
            .cert_hashes
            .lock()
            .unwrap()
            .push(cert_hash.copied());
        let plan = self
            .shared
            .plan
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Plan::Fail);

        match plan {
            Plan::Fail => Err(TransportError::Connect("connection refused".to_string())),
            Plan::Hang => std::future::pending().await,
            Plan::Accept => {
                let (connection, server) = connection_pair();
                let _ = self.shared.servers.send(server);
                Ok(connection)
            }
        }
    }
}

pub struct MockConnection {
    streams: tokio::sync::Mutex<mpsc::UnboundedReceiver<DuplexStream>>,
    closed: watch::Receiver<bool>,
    client_closed: Arc<AtomicBool>,
}

#[async_trait]
impl Connection for MockConnection {
    type Stream = DuplexStream;

    async fn accept_stream(&self) -> Result<Option<DuplexStream>, TransportError> {
        Ok(self.streams.lock().await.recv().await)
    }

    async fn closed(&self) -> Result<(), TransportError> {
        let mut closed = self.closed.clone();
        let _ = closed.wait_for(|closed| *closed).await;
        Err(TransportError::ConnectionLost("server went away".to_string()))
    }

    async fn close(&self) {
        self.client_closed.store(true, Ordering::SeqCst);
    }
}

/// Server side of one mock connection
pub struct ServerHandle {
    streams: mpsc::UnboundedSender<DuplexStream>,
    close: watch::Sender<bool>,
    client_closed: Arc<AtomicBool>,
}

impl ServerHandle {
    /// Open a unidirectional stream towards the client
    pub fn open_stream(&self) -> DuplexStream {
        let (client, server) = tokio::io::duplex(64 * 1024);
        self.streams.send(client).unwrap();
        server
    }

    /// Drop the connection from the server side
    pub fn close(&self) {
        let _ = self.close.send(true);
    }

    /// Whether the client closed the connection itself
    pub fn client_closed(&self) -> bool {
        self.client_closed.load(Ordering::SeqCst)
    }
}

fn connection_pair() -> (MockConnection, ServerHandle) {
    let (stream_tx, stream_rx) = mpsc::unbounded_channel();
    let (close_tx, close_rx) = watch::channel(false);
    let client_closed = Arc::new(AtomicBool::new(false));

    let connection = MockConnection {
        streams: tokio::sync::Mutex::new(stream_rx),
        closed: close_rx,
        client_closed: Arc::clone(&client_closed),
    };
    let server = ServerHandle {
        streams: stream_tx,
        close: close_tx,
        client_closed,
    };
    (connection, server)
}

pub fn passthrough(input: &[u8]) -> io::Result<Vec<u8>> {
    Ok(input.to_vec())
}

pub fn envelope(sequence: u64) -> EventEnvelope {
    EventEnvelope::new(
        EventSource::Jsonl,
        sequence,
        sequence * 10,
        Bytes::from(vec![sequence as u8; 4]),
    )
}

pub fn frame(topic: &str, sequence: u64) -> BytesMut {
    let mut buf = BytesMut::new();
    encode_frame(topic, &envelope(sequence), &passthrough, &mut buf).unwrap();
    buf
}

/// Next session event, failing the test if none arrives
pub async fn next_event(events: &mut mpsc::UnboundedReceiver<SessionEvent>) -> SessionEvent {
    tokio::time::timeout(Duration::from_secs(60), events.recv())
        .await
        .expect("timed out waiting for a session event")
        .expect("session event channel closed")
}

/// Skip events until `expected` arrives
pub async fn wait_for(events: &mut mpsc::UnboundedReceiver<SessionEvent>, expected: SessionEvent) {
    loop {
        if next_event(events).await == expected {
            return;
        }
    }
}

/// Poll `condition` until it holds
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition never became true");
}

/// Serve one HTTP request with the given status line and JSON body
pub async fn serve_once(status: &'static str, body: String) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();

        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                return;
            }
            request.extend_from_slice(&buf[..n]);
        }

        let response = format!(
            "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        let _ = socket.shutdown().await;
    });

    addr
}

/// An address nothing is listening on
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}
