//! noaide-tail
//!
//! Connects to a noaide server over WebTransport and logs every event it
//! pushes, reconnecting with backoff whenever the connection drops.

use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use noaide_client::config::{self, ClientConfig};
use noaide_client::{ChannelHandler, SessionEvent, TransportSession, WebTransportConnector};
use noaide_protocol::EventEnvelope;

#[derive(Parser)]
#[command(name = "noaide-tail")]
#[command(about = "Stream events from a noaide server")]
#[command(version)]
struct Args {
    /// WebTransport endpoint
    /// Example: https://devbox:4433
    #[arg(short, long, env = "NOAIDE_URL")]
    url: Option<String>,

    /// Base URL of the server's HTTP API (serves the certificate hash)
    #[arg(long)]
    api: Option<String>,

    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Skip certificate pinning and use the platform trust store
    #[arg(long)]
    no_pin: bool,

    /// Write the effective configuration to the config path and exit
    #[arg(long)]
    save_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| args.log_level.clone()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(config::default_config_path);

    let mut config: ClientConfig = if config_path.exists() {
        config::load_config(&config_path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config from {:?}: {}", config_path, e);
            ClientConfig::default()
        })
    } else {
        ClientConfig::default()
    };
    apply_overrides(&mut config, &args);

    if args.save_config {
        config::save_config(&config_path, &config)
            .with_context(|| format!("Failed to write config to {:?}", config_path))?;
        tracing::info!("Configuration written to {:?}", config_path);
        return Ok(());
    }

    tracing::info!("noaide-tail starting, server {}", config.url);

    let (handler, mut events) = ChannelHandler::new();
    let session = TransportSession::builder(config, WebTransportConnector::new())
        .handler(handler)
        .decompressor(zstd_decompress)
        .build()
        .context("Failed to create transport session")?;

    session.connect().await;

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(event) => tracing::info!("{}", describe(&event)),
                None => break,
            },

            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    tracing::error!("Failed to listen for Ctrl-C: {}", e);
                }
                tracing::info!("Shutting down");
                break;
            }
        }
    }

    session.disconnect().await;

    let stats = session.stats();
    tracing::info!(
        "Received {} events ({} dropped) over {} streams",
        stats.frames_decoded,
        stats.frames_dropped,
        stats.streams_accepted
    );
    Ok(())
}

fn apply_overrides(config: &mut ClientConfig, args: &Args) {
    if let Some(url) = &args.url {
        config.url = url.clone();
    }
    if let Some(api) = &args.api {
        config.http_api_base = api.clone();
    }
    if args.no_pin {
        config.pin_certificate = false;
    }
}

/// Frame payloads are zstd-compressed by the server
fn zstd_decompress(input: &[u8]) -> io::Result<Vec<u8>> {
    zstd::stream::decode_all(input)
}

fn describe(event: &SessionEvent) -> String {
    match event {
        SessionEvent::Event { topic, envelope } => describe_envelope(topic, envelope),
        SessionEvent::Status(status) => format!("status: {}", status),
        SessionEvent::Tier(tier) => format!("quality tier: {}", tier),
    }
}

fn describe_envelope(topic: &str, envelope: &EventEnvelope) -> String {
    let mut line = format!(
        "{} #{} from {} ({} bytes)",
        topic,
        envelope.sequence,
        envelope.source,
        envelope.payload.len()
    );
    if let Some(session) = &envelope.session_id {
        line.push_str(&format!(" session {}", session));
    }
    line
}
