//! RESP Data Types
//!
//! The values exchanged with clients. Requests arrive as arrays of bulk
//! strings; replies go out as simple strings, bulk strings or (for `HELLO`)
//! a RESP3 map.
//!
//! ## Wire Format
//!
//! Each value starts with a type prefix byte and ends with CRLF:
//! - `+OK\r\n` simple string
//! - `-ERR message\r\n` error
//! - `:1000\r\n` integer
//! - `$5\r\nhello\r\n` bulk string (`$-1\r\n` is null)
//! - `*2\r\n$3\r\nGET\r\n$3\r\nfoo\r\n` array
//! - `%1\r\n+server\r\n+redis\r\n` map (RESP3)

use bytes::Bytes;

/// The CRLF terminator used in RESP protocol
pub const CRLF: &[u8] = b"\r\n";

/// RESP protocol type prefixes
pub mod prefix {
    pub const SIMPLE_STRING: u8 = b'+';
    pub const ERROR: u8 = b'-';
    pub const INTEGER: u8 = b':';
    pub const BULK_STRING: u8 = b'$';
    pub const ARRAY: u8 = b'*';
    pub const MAP: u8 = b'%';
}

/// A value in the RESP protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RespValue {
    /// Non-binary-safe string, cannot contain CRLF.
    SimpleString(String),

    /// Error message.
    Error(String),

    /// 64-bit signed integer.
    Integer(i64),

    /// Binary-safe string.
    BulkString(Bytes),

    /// Null bulk string or null array.
    Null,

    /// Ordered list of values. Every client request is one of these.
    Array(Vec<RespValue>),

    /// RESP3 map, serialized as `%<pairs>` followed by alternating keys and values.
    Map(Vec<(RespValue, RespValue)>),
}

impl RespValue {
    /// Creates a simple string reply.
    ///
    /// ```
    /// use keyline::protocol::RespValue;
    /// assert_eq!(RespValue::simple_string("OK").serialize(), b"+OK\r\n");
    /// ```
    pub fn simple_string(s: impl Into<String>) -> Self {
        RespValue::SimpleString(s.into())
    }

    /// Creates a bulk string reply.
    ///
    /// ```
    /// use keyline::protocol::RespValue;
    /// use bytes::Bytes;
    /// let bulk = RespValue::bulk_string(Bytes::from("bar"));
    /// assert_eq!(bulk.serialize(), b"$3\r\nbar\r\n");
    /// ```
    pub fn bulk_string(data: impl Into<Bytes>) -> Self {
        RespValue::BulkString(data.into())
    }

    pub fn array(values: Vec<RespValue>) -> Self {
        RespValue::Array(values)
    }

    pub fn map(pairs: Vec<(RespValue, RespValue)>) -> Self {
        RespValue::Map(pairs)
    }

    /// Status reply for successful writes.
    pub fn ok() -> Self {
        RespValue::SimpleString("OK".to_string())
    }

    /// Serializes the value to its wire representation.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.serialize_into(&mut buf);
        buf
    }

    /// Serializes the value into an existing buffer.
    pub fn serialize_into(&self, buf: &mut Vec<u8>) {
        match self {
            RespValue::SimpleString(s) => {
                buf.push(prefix::SIMPLE_STRING);
                buf.extend_from_slice(s.as_bytes());
                buf.extend_from_slice(CRLF);
            }
            RespValue::Error(s) => {
                buf.push(prefix::ERROR);
                buf.extend_from_slice(s.as_bytes());
                buf.extend_from_slice(CRLF);
            }
            RespValue::Integer(n) => {
                buf.push(prefix::INTEGER);
                buf.extend_from_slice(n.to_string().as_bytes());
                buf.extend_from_slice(CRLF);
            }
            RespValue::BulkString(data) => {
                buf.push(prefix::BULK_STRING);
                buf.extend_from_slice(data.len().to_string().as_bytes());
                buf.extend_from_slice(CRLF);
                buf.extend_from_slice(data);
                buf.extend_from_slice(CRLF);
            }
            RespValue::Null => {
                buf.push(prefix::BULK_STRING);
                buf.extend_from_slice(b"-1");
                buf.extend_from_slice(CRLF);
            }
            RespValue::Array(values) => {
                buf.push(prefix::ARRAY);
                buf.extend_from_slice(values.len().to_string().as_bytes());
                buf.extend_from_slice(CRLF);
                for value in values {
                    value.serialize_into(buf);
                }
            }
            RespValue::Map(pairs) => {
                buf.push(prefix::MAP);
                buf.extend_from_slice(pairs.len().to_string().as_bytes());
                buf.extend_from_slice(CRLF);
                for (key, value) in pairs {
                    key.serialize_into(buf);
                    value.serialize_into(buf);
                }
            }
        }
    }

    /// Raw payload of a simple or bulk string.
    pub fn to_bytes(&self) -> Option<Bytes> {
        match self {
            RespValue::SimpleString(s) => Some(Bytes::copy_from_slice(s.as_bytes())),
            RespValue::BulkString(b) => Some(b.clone()),
            _ => None,
        }
    }

    /// Consumes self and returns the elements if this is an array.
    pub fn into_array(self) -> Option<Vec<RespValue>> {
        match self {
            RespValue::Array(arr) => Some(arr),
            _ => None,
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(self, RespValue::Array(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ok_serialize() {
        assert_eq!(RespValue::ok().serialize(), b"+OK\r\n");
    }

    #[test]
    fn test_bulk_string_serialize() {
        let value = RespValue::bulk_string(Bytes::from("hello"));
        assert_eq!(value.serialize(), b"$5\r\nhello\r\n");
    }

    #[test]
    fn test_empty_bulk_string_serialize() {
        let value = RespValue::bulk_string(Bytes::new());
        assert_eq!(value.serialize(), b"$0\r\n\r\n");
    }

    #[test]
    fn test_null_serialize() {
        assert_eq!(RespValue::Null.serialize(), b"$-1\r\n");
    }

    #[test]
    fn test_array_serialize() {
        let value = RespValue::array(vec![
            RespValue::bulk_string(Bytes::from("GET")),
            RespValue::bulk_string(Bytes::from("name")),
        ]);
        assert_eq!(value.serialize(), b"*2\r\n$3\r\nGET\r\n$4\r\nname\r\n");
    }

    #[test]
    fn test_map_serialize() {
        let value = RespValue::map(vec![(
            RespValue::simple_string("server"),
            RespValue::simple_string("redis"),
        )]);
        assert_eq!(value.serialize(), b"%1\r\n+server\r\n+redis\r\n");
    }

    #[test]
    fn test_to_bytes_keeps_binary_payload() {
        let value = RespValue::bulk_string(Bytes::from_static(b"\xff\xfe"));
        assert_eq!(
            value.to_bytes(),
            Some(Bytes::from_static(b"\xff\xfe"))
        );
    }

    #[test]
    fn test_into_array() {
        let value = RespValue::array(vec![RespValue::Integer(1)]);
        assert!(value.is_array());
        assert_eq!(value.into_array(), Some(vec![RespValue::Integer(1)]));
        assert_eq!(RespValue::ok().into_array(), None);
    }
}
