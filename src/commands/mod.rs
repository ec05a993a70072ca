//! Command Module
//!
//! The closed set of commands the server executes.
//!
//! ```text
//! Client Request
//!       │
//!       ▼
//! ┌─────────────────┐
//! │  RESP Parser    │  (protocol module)
//! └────────┬────────┘
//!          │ RespValue::Array
//!          ▼
//! ┌─────────────────┐
//! │ Command         │  (this module)
//! │  Set / Get      │
//! │  Hello / Client │
//! └────────┬────────┘
//!          │ Envelope
//!          ▼
//! ┌─────────────────┐
//! │ Serializer      │  (server module)
//! └─────────────────┘
//! ```

pub mod command;

pub use command::{Command, CommandError};
