//! Command Model
//!
//! Turns one decoded request frame into a [`Command`].
//!
//! Verbs are matched case-sensitively against exactly `SET`, `GET`, `HELLO`
//! and `CLIENT`. Arguments are positional; anything after the arguments a
//! verb needs is ignored (`CLIENT SETINFO lib-name redis-rs` is a
//! `ClientInfo` carrying `SETINFO`).

use crate::protocol::RespValue;
use bytes::Bytes;
use thiserror::Error;

pub const VERB_SET: &str = "SET";
pub const VERB_GET: &str = "GET";
pub const VERB_HELLO: &str = "HELLO";
pub const VERB_CLIENT: &str = "CLIENT";

/// A request the serializer knows how to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `SET key value`
    Set { key: Bytes, value: Bytes },
    /// `GET key`
    Get { key: Bytes },
    /// `HELLO value`; the protocol version argument is not negotiated.
    Hello { value: String },
    /// `CLIENT value`; acknowledged without interpretation.
    ClientInfo { value: String },
}

/// Why an array frame did not produce a command.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// The first element is missing or is not a string.
    #[error("command has no verb")]
    InvalidVerb,

    #[error("unknown command '{0}'")]
    UnknownVerb(String),

    #[error("'{verb}' is missing argument {position}")]
    MissingArgument { verb: &'static str, position: usize },
}

impl Command {
    /// Builds a command from a decoded frame.
    ///
    /// Returns `Ok(None)` for frames that are not arrays; those are not
    /// requests and are skipped without complaint.
    ///
    /// ```
    /// use keyline::commands::Command;
    /// use keyline::protocol::parse_message;
    /// use bytes::Bytes;
    ///
    /// let (frame, _) = parse_message(b"*2\r\n$3\r\nGET\r\n$3\r\nfoo\r\n").unwrap().unwrap();
    /// let cmd = Command::from_frame(frame).unwrap().unwrap();
    /// assert_eq!(cmd, Command::Get { key: Bytes::from("foo") });
    /// ```
    pub fn from_frame(frame: RespValue) -> Result<Option<Command>, CommandError> {
        let args = match frame.into_array() {
            Some(args) => args,
            None => return Ok(None),
        };

        let verb = args
            .first()
            .and_then(RespValue::to_bytes)
            .ok_or(CommandError::InvalidVerb)?;

        let command = match &verb[..] {
            b"SET" => Command::Set {
                key: bytes_arg(&args, VERB_SET, 1)?,
                value: bytes_arg(&args, VERB_SET, 2)?,
            },
            b"GET" => Command::Get {
                key: bytes_arg(&args, VERB_GET, 1)?,
            },
            b"HELLO" => Command::Hello {
                value: text_arg(&args, VERB_HELLO, 1)?,
            },
            b"CLIENT" => Command::ClientInfo {
                value: text_arg(&args, VERB_CLIENT, 1)?,
            },
            other => {
                return Err(CommandError::UnknownVerb(
                    String::from_utf8_lossy(other).into_owned(),
                ))
            }
        };

        Ok(Some(command))
    }

    /// The wire verb, for logging.
    pub fn verb(&self) -> &'static str {
        match self {
            Command::Set { .. } => VERB_SET,
            Command::Get { .. } => VERB_GET,
            Command::Hello { .. } => VERB_HELLO,
            Command::ClientInfo { .. } => VERB_CLIENT,
        }
    }
}

fn bytes_arg(
    args: &[RespValue],
    verb: &'static str,
    position: usize,
) -> Result<Bytes, CommandError> {
    args.get(position)
        .and_then(RespValue::to_bytes)
        .ok_or(CommandError::MissingArgument { verb, position })
}

fn text_arg(
    args: &[RespValue],
    verb: &'static str,
    position: usize,
) -> Result<String, CommandError> {
    bytes_arg(args, verb, position).map(|b| String::from_utf8_lossy(&b).into_owned())
}
