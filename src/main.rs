//! Keyline server binary.
//!
//! Parses flags, sets up logging, starts the serializer and accepts
//! connections until Ctrl+C.

use clap::Parser;
use keyline::config::{DEFAULT_LISTEN_ADDR, DEFAULT_QUEUE_DEPTH};
use keyline::server::{CommandSerializer, Server};
use keyline::storage::Store;
use keyline::ServerConfig;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

/// Minimal in-memory key-value server speaking the Redis protocol
#[derive(Parser, Debug)]
#[command(name = "keyline")]
#[command(version)]
struct Args {
    /// Listen address of the server (host:port, or :port for all interfaces)
    #[arg(short, long = "listen-addr", visible_alias = "listenAddr", default_value = DEFAULT_LISTEN_ADDR)]
    listen_addr: String,

    /// Commands that may wait for execution before clients are held back
    #[arg(short, long, default_value_t = DEFAULT_QUEUE_DEPTH)]
    queue_depth: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let config = ServerConfig::new()
        .listen_addr(args.listen_addr)
        .queue_depth(args.queue_depth);

    info!(version = keyline::VERSION, "Starting Keyline");

    let store = Arc::new(Store::new());
    let serializer = CommandSerializer::start(Arc::clone(&store), &config);

    let server = match Server::bind(&config, serializer.clone()).await {
        Ok(server) => server,
        Err(e) => {
            error!(error = %e, "Failed to start server");
            return Err(e.into());
        }
    };

    tokio::select! {
        _ = server.run() => {}
        result = signal::ctrl_c() => {
            if let Err(e) = result {
                error!(error = %e, "Failed to listen for Ctrl+C");
            }
            info!("Shutdown signal received, stopping server...");
        }
    }

    serializer.shutdown();
    serializer.stopped().await;
    info!(keys = store.len(), "Server shutdown complete");
    Ok(())
}
