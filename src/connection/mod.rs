//! Connection Module
//!
//! One task per client reads and decodes requests; one writer task per
//! client delivers replies.
//!
//! ```text
//!                 TcpStream
//!            ┌────────┴────────┐
//!       read half          write half
//!            │                 ▲
//!            ▼                 │
//! ┌────────────────────┐  ┌────────────────┐
//! │ ConnectionHandler  │  │  writer task   │
//! │ parse -> Command   │  │ drains replies │
//! └─────────┬──────────┘  └───────▲────────┘
//!           │ Envelope + slot     │ RespValue
//!           ▼                     │
//! ┌───────────────────────────────┴─────────┐
//! │            CommandSerializer            │
//! └─────────────────────────────────────────┘
//! ```

pub mod handler;
pub mod peer;

pub use handler::{handle_connection, ConnectionError, ConnectionHandler};
pub use peer::{spawn_writer, Peer, PeerId, ReplySlot};
