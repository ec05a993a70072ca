//! Server Module
//!
//! The acceptor and the command serializer.
//!
//! ```text
//! ┌──────────────┐  spawn per client  ┌─────────────────────┐
//! │    Server    │ ─────────────────> │  ConnectionHandler  │ (N)
//! │  (acceptor)  │                    └──────────┬──────────┘
//! └──────────────┘                               │ Envelope
//!                                                ▼
//!                                     ┌─────────────────────┐
//!                                     │  CommandSerializer  │ (1)
//!                                     └──────────┬──────────┘
//!                                                ▼
//!                                           Store (RwLock)
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use keyline::server::{CommandSerializer, Server};
//! use keyline::storage::Store;
//! use keyline::ServerConfig;
//! use std::sync::Arc;
//!
//! # async fn start() -> Result<(), keyline::server::ServerError> {
//! let config = ServerConfig::new().listen_addr("127.0.0.1:5001");
//! let serializer = CommandSerializer::start(Arc::new(Store::new()), &config);
//! let server = Server::bind(&config, serializer.clone()).await?;
//! server.run().await;
//! # Ok(())
//! # }
//! ```

pub mod acceptor;
pub mod serializer;

pub use acceptor::{Server, ServerError};
pub use serializer::{
    hello_reply, CommandSerializer, Envelope, ExecError, SerializerGone, SerializerHandle,
    SerializerStats,
};
