//! RESP Wire Codec
//!
//! Decoding of inbound request frames and encoding of replies for the
//! Redis serialization protocol.
//!
//! - `types`: the `RespValue` enum and its serialization
//! - `parser`: incremental decoder over a connection's read buffer
//!
//! ## Example
//!
//! ```
//! use keyline::protocol::{parse_message, RespValue};
//! use bytes::Bytes;
//!
//! let (value, consumed) = parse_message(b"*2\r\n$3\r\nGET\r\n$3\r\nfoo\r\n")
//!     .unwrap()
//!     .unwrap();
//! assert_eq!(consumed, 22);
//! assert!(value.is_array());
//!
//! let reply = RespValue::bulk_string(Bytes::from("bar"));
//! assert_eq!(reply.serialize(), b"$3\r\nbar\r\n");
//! ```

pub mod parser;
pub mod types;

pub use parser::{parse_message, ParseError, ParseResult, RespParser};
pub use types::RespValue;
