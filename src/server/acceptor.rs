//! TCP acceptor.
//!
//! Binds the listening socket and spawns one connection task per client.

use crate::config::ServerConfig;
use crate::connection::handle_connection;
use crate::server::SerializerHandle;
use std::net::SocketAddr;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{error, info, trace};

/// Fatal server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// A bound listener feeding connections to the serializer.
pub struct Server {
    listener: TcpListener,
    serializer: SerializerHandle,
}

impl Server {
    /// Binds the configured listen address.
    pub async fn bind(config: &ServerConfig, serializer: SerializerHandle) -> Result<Self, ServerError> {
        let addr = config.bind_address();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind { addr: addr.clone(), source })?;

        info!(listen_addr = %addr, "Server listening");

        Ok(Self {
            listener,
            serializer,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts connections forever.
    ///
    /// Accept failures are logged and the loop keeps going.
    pub async fn run(self) {
        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    trace!(client = %addr, "Accepted connection");
                    let serializer = self.serializer.clone();
                    tokio::spawn(async move {
                        handle_connection(stream, addr, serializer).await;
                    });
                }
                Err(e) => {
                    error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }
}
