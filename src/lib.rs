//! # Keyline - A Minimal In-Memory Key-Value Server
//!
//! Keyline speaks the Redis wire protocol (RESP) and understands four
//! commands, enough for `redis-cli` and the common Redis client libraries to
//! connect, store and read values.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                              Keyline                                │
//! │                                                                     │
//! │  ┌────────────┐   ┌─────────────────┐   ┌───────────────────────┐   │
//! │  │  Server    │──>│ Connection      │──>│  CommandSerializer    │   │
//! │  │ (acceptor) │   │ Handler (1/conn)│   │  (exactly one task)   │   │
//! │  └────────────┘   └─────────────────┘   └───────┬───────────┬───┘   │
//! │                          ▲                      │           │       │
//! │                          │ RESP frames          ▼           │       │
//! │                   ┌──────┴──────┐        ┌────────────┐     │       │
//! │                   │ RespParser  │        │   Store    │     │       │
//! │                   └─────────────┘        │  (RwLock)  │     │       │
//! │                                          └────────────┘     │       │
//! │                   ┌─────────────┐        replies            │       │
//! │                   │ writer task │ <─────────────────────────┘       │
//! │                   │  (1/conn)   │                                   │
//! │                   └─────────────┘                                   │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Supported Commands
//!
//! - `SET key value` replies `+OK`
//! - `GET key` replies the value as a bulk string; a missing key gets **no
//!   reply at all**
//! - `HELLO version` replies `%1\r\n+server\r\n+redis\r\n`
//! - `CLIENT ...` replies `+OK`
//!
//! Verbs are case-sensitive. Anything else is logged and dropped without a
//! reply; the connection stays open.
//!
//! ## Quick Start
//!
//! ```no_run
//! use keyline::server::{CommandSerializer, Server};
//! use keyline::storage::Store;
//! use keyline::ServerConfig;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ServerConfig::default();
//!     let serializer = CommandSerializer::start(Arc::new(Store::new()), &config);
//!     Server::bind(&config, serializer).await?.run().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Module Overview
//!
//! - [`protocol`]: RESP parser and value types
//! - [`commands`]: the closed `Command` enum
//! - [`storage`]: the `RwLock`-guarded store
//! - [`connection`]: per-client read loop and reply writer
//! - [`server`]: acceptor and command serializer
//! - [`config`]: startup settings

pub mod commands;
pub mod config;
pub mod connection;
pub mod protocol;
pub mod server;
pub mod storage;

pub use commands::Command;
pub use config::ServerConfig;
pub use protocol::{ParseError, RespParser, RespValue};
pub use server::{CommandSerializer, Server, SerializerHandle};
pub use storage::Store;

/// Version of Keyline
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
