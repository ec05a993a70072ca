//! Incremental RESP Parser
//!
//! Decodes one request frame at a time from a connection's read buffer.
//!
//! The parser never consumes bytes itself. It returns:
//! - `Ok(Some((value, consumed)))` when a full frame is available; the caller
//!   advances its buffer by `consumed`
//! - `Ok(None)` when the frame is still incomplete
//! - `Err(ParseError)` when the bytes cannot be RESP, which is terminal for
//!   the connection
//!
//! Lines that do not start with a RESP prefix are treated as inline
//! commands (`SET foo bar\r\n`), which is what `redis-cli` and telnet
//! sessions send. Blank lines between frames are skipped.

use crate::protocol::types::{prefix, RespValue, CRLF};
use bytes::Bytes;
use thiserror::Error;

/// Errors that can occur during RESP parsing.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    /// Invalid integer format in a length or integer line
    #[error("invalid integer: {0}")]
    InvalidInteger(String),

    /// Invalid UTF-8 where text is required
    #[error("invalid UTF-8: {0}")]
    InvalidUtf8(String),

    /// Bulk string length is negative (but not -1 for null)
    #[error("invalid bulk string length: {0}")]
    InvalidBulkLength(i64),

    /// Array length is negative (but not -1 for null)
    #[error("invalid array length: {0}")]
    InvalidArrayLength(i64),

    /// Protocol violation (missing CRLF, nesting too deep, blank array element)
    #[error("protocol error: {0}")]
    ProtocolError(String),

    /// A bulk string declares more bytes than allowed
    #[error("message too large: {size} bytes (max: {max})")]
    MessageTooLarge { size: usize, max: usize },
}

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// Maximum size for a single bulk string (512 MB, same as Redis)
pub const MAX_BULK_SIZE: usize = 512 * 1024 * 1024;

/// Maximum array nesting depth
pub const MAX_NESTING_DEPTH: usize = 32;

type Parsed = ParseResult<Option<(RespValue, usize)>>;

/// Stateless-between-frames RESP decoder.
///
/// ```
/// use keyline::protocol::{RespParser, RespValue};
/// use bytes::Bytes;
///
/// let mut parser = RespParser::new();
/// let (value, consumed) = parser
///     .parse(b"*2\r\n$3\r\nGET\r\n$3\r\nfoo\r\n")
///     .unwrap()
///     .unwrap();
/// assert_eq!(consumed, 22);
/// assert_eq!(
///     value,
///     RespValue::Array(vec![
///         RespValue::BulkString(Bytes::from("GET")),
///         RespValue::BulkString(Bytes::from("foo")),
///     ])
/// );
/// ```
#[derive(Debug, Default)]
pub struct RespParser {
    depth: usize,
}

impl RespParser {
    pub fn new() -> Self {
        Self { depth: 0 }
    }

    /// Attempts to decode one complete value from the front of `buf`.
    ///
    /// Leading blank lines are counted in `consumed`. A buffer holding
    /// nothing but blank lines is reported as incomplete.
    pub fn parse(&mut self, buf: &[u8]) -> Parsed {
        self.depth = 0;
        let skipped = blank_lines(buf);
        Ok(self
            .parse_value(&buf[skipped..])?
            .map(|(value, consumed)| (value, skipped + consumed)))
    }

    fn parse_value(&mut self, buf: &[u8]) -> Parsed {
        if buf.is_empty() {
            return Ok(None);
        }

        if self.depth > MAX_NESTING_DEPTH {
            return Err(ParseError::ProtocolError(format!(
                "maximum nesting depth exceeded: {}",
                MAX_NESTING_DEPTH
            )));
        }

        match buf[0] {
            prefix::SIMPLE_STRING => {
                Ok(read_text(buf)?.map(|(s, n)| (RespValue::SimpleString(s), n)))
            }
            prefix::ERROR => Ok(read_text(buf)?.map(|(s, n)| (RespValue::Error(s), n))),
            prefix::INTEGER => {
                Ok(read_number(buf)?.map(|(i, n)| (RespValue::Integer(i), n)))
            }
            prefix::BULK_STRING => self.parse_bulk_string(buf),
            prefix::ARRAY => self.parse_array(buf),
            _ => self.parse_inline(buf),
        }
    }

    /// `$<length>\r\n<data>\r\n`
    fn parse_bulk_string(&mut self, buf: &[u8]) -> Parsed {
        let (length, header) = match read_number(buf)? {
            Some(parsed) => parsed,
            None => return Ok(None),
        };

        if length == -1 {
            return Ok(Some((RespValue::Null, header)));
        }
        if length < 0 {
            return Err(ParseError::InvalidBulkLength(length));
        }

        let length = length as usize;
        if length > MAX_BULK_SIZE {
            return Err(ParseError::MessageTooLarge {
                size: length,
                max: MAX_BULK_SIZE,
            });
        }

        let total = header + length + CRLF.len();
        if buf.len() < total {
            return Ok(None);
        }

        if &buf[header + length..total] != CRLF {
            return Err(ParseError::ProtocolError(
                "bulk string missing trailing CRLF".to_string(),
            ));
        }

        let data = Bytes::copy_from_slice(&buf[header..header + length]);
        Ok(Some((RespValue::BulkString(data), total)))
    }

    /// `*<count>\r\n<elements...>`
    fn parse_array(&mut self, buf: &[u8]) -> Parsed {
        let (count, header) = match read_number(buf)? {
            Some(parsed) => parsed,
            None => return Ok(None),
        };

        if count == -1 {
            return Ok(Some((RespValue::Null, header)));
        }
        if count < 0 {
            return Err(ParseError::InvalidArrayLength(count));
        }

        // Cap the preallocation; the count is client-controlled.
        let mut elements = Vec::with_capacity((count as usize).min(64));
        let mut consumed = header;

        self.depth += 1;
        for _ in 0..count {
            match self.parse_value(&buf[consumed..])? {
                Some((value, used)) => {
                    elements.push(value);
                    consumed += used;
                }
                None => {
                    self.depth -= 1;
                    return Ok(None);
                }
            }
        }
        self.depth -= 1;

        Ok(Some((RespValue::Array(elements), consumed)))
    }

    /// A plain text line split on whitespace, e.g. `GET foo\r\n`.
    fn parse_inline(&mut self, buf: &[u8]) -> Parsed {
        let end = match find_crlf(buf) {
            Some(pos) => pos,
            None => return Ok(None),
        };

        let line = std::str::from_utf8(&buf[..end])
            .map_err(|e| ParseError::InvalidUtf8(e.to_string()))?;

        let elements: Vec<RespValue> = line
            .split_whitespace()
            .map(|part| RespValue::BulkString(Bytes::copy_from_slice(part.as_bytes())))
            .collect();

        if elements.is_empty() {
            return Err(ParseError::ProtocolError("blank inline element".to_string()));
        }

        Ok(Some((RespValue::Array(elements), end + CRLF.len())))
    }
}

/// Reads the text after the prefix byte up to CRLF.
fn read_text(buf: &[u8]) -> ParseResult<Option<(String, usize)>> {
    match find_crlf(&buf[1..]) {
        Some(pos) => {
            let s = std::str::from_utf8(&buf[1..1 + pos])
                .map_err(|e| ParseError::InvalidUtf8(e.to_string()))?;
            Ok(Some((s.to_string(), 1 + pos + CRLF.len())))
        }
        None => Ok(None),
    }
}

/// Reads the integer after the prefix byte up to CRLF.
fn read_number(buf: &[u8]) -> ParseResult<Option<(i64, usize)>> {
    match read_text(buf)? {
        Some((s, consumed)) => {
            let n = s
                .parse::<i64>()
                .map_err(|e| ParseError::InvalidInteger(format!("{:?}: {}", s, e)))?;
            Ok(Some((n, consumed)))
        }
        None => Ok(None),
    }
}

/// Length of the blank (whitespace only) lines at the front of `buf`.
///
/// Only looks at leading whitespace, so a partial line is never scanned.
pub fn blank_lines(buf: &[u8]) -> usize {
    let mut skipped = 0;
    let mut pos = 0;
    while pos < buf.len() {
        match buf[pos] {
            b'\r' if buf.get(pos + 1) == Some(&b'\n') => {
                pos += CRLF.len();
                skipped = pos;
            }
            b' ' | b'\t' => pos += 1,
            _ => break,
        }
    }
    skipped
}

/// Position of the first `\r\n` in `buf`.
#[inline]
pub fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == CRLF)
}

/// Decodes a single message with a fresh parser.
pub fn parse_message(buf: &[u8]) -> Parsed {
    RespParser::new().parse(buf)
}
