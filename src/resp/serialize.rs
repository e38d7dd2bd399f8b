//! RESP2 reply serialization
//!
//! Encodes command results into the wire forms the protocol defines:
//! simple strings, errors, integers, bulk strings (nil as `$-1`), and
//! arrays of bulk strings (nil as `*-1`). Lengths are byte lengths.

use crate::commands::{CommandResult, ResponseValue};
use bytes::{BufMut, BytesMut};

/// Error replies starting with this prefix instruct the connection writer
/// to close the connection after sending them. On the wire they read as an
/// ordinary `-ERRTERM ...` error.
pub const TERMINATE_PREFIX: &str = "ERRTERM ";

/// Encode a command result into its wire representation
pub fn encode_result(result: &CommandResult) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(64);
    match result {
        CommandResult::Ok(value) => encode_value(value, &mut buf),
        CommandResult::Error(message) => encode_error(message, &mut buf),
    }
    buf.to_vec()
}

/// Encode a reply value
pub fn encode_value(value: &ResponseValue, buf: &mut BytesMut) {
    match value {
        ResponseValue::SimpleString(s) => {
            buf.put_u8(b'+');
            buf.extend_from_slice(s.as_bytes());
            buf.extend_from_slice(b"\r\n");
        }
        ResponseValue::BulkString(Some(s)) => {
            put_bulk(s, buf);
        }
        ResponseValue::BulkString(None) => {
            buf.extend_from_slice(b"$-1\r\n");
        }
        ResponseValue::Integer(i) => {
            buf.put_u8(b':');
            buf.extend_from_slice(i.to_string().as_bytes());
            buf.extend_from_slice(b"\r\n");
        }
        ResponseValue::Array(Some(items)) => {
            buf.put_u8(b'*');
            buf.extend_from_slice(items.len().to_string().as_bytes());
            buf.extend_from_slice(b"\r\n");
            for item in items {
                put_bulk(item, buf);
            }
        }
        ResponseValue::Array(None) => {
            buf.extend_from_slice(b"*-1\r\n");
        }
    }
}

/// Encode an error reply (the message already excludes the `-` marker)
pub fn encode_error(message: &str, buf: &mut BytesMut) {
    buf.put_u8(b'-');
    buf.extend_from_slice(message.as_bytes());
    buf.extend_from_slice(b"\r\n");
}

/// Whether this reply carries the terminate marker
pub fn is_terminal(result: &CommandResult) -> bool {
    matches!(result, CommandResult::Error(message) if message.starts_with(TERMINATE_PREFIX))
}

fn put_bulk(s: &str, buf: &mut BytesMut) {
    buf.put_u8(b'$');
    buf.extend_from_slice(s.len().to_string().as_bytes());
    buf.extend_from_slice(b"\r\n");
    buf.extend_from_slice(s.as_bytes());
    buf.extend_from_slice(b"\r\n");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(value: ResponseValue) -> Vec<u8> {
        encode_result(&CommandResult::Ok(value))
    }

    #[test]
    fn test_encode_simple_string() {
        assert_eq!(encoded(ResponseValue::SimpleString("OK".into())), b"+OK\r\n");
    }

    #[test]
    fn test_encode_error() {
        let result = CommandResult::Error("ERR boom".to_string());
        assert_eq!(encode_result(&result), b"-ERR boom\r\n");
    }

    #[test]
    fn test_encode_integer() {
        assert_eq!(encoded(ResponseValue::Integer(42)), b":42\r\n");
        assert_eq!(encoded(ResponseValue::Integer(-3)), b":-3\r\n");
    }

    #[test]
    fn test_encode_bulk_string() {
        assert_eq!(
            encoded(ResponseValue::BulkString(Some("hello".into()))),
            b"$5\r\nhello\r\n"
        );
    }

    #[test]
    fn test_encode_nil_bulk() {
        assert_eq!(encoded(ResponseValue::BulkString(None)), b"$-1\r\n");
    }

    #[test]
    fn test_bulk_length_is_bytes_not_chars() {
        assert_eq!(
            encoded(ResponseValue::BulkString(Some("héllo".into()))),
            "$6\r\nhéllo\r\n".as_bytes()
        );
    }

    #[test]
    fn test_encode_array() {
        let value = ResponseValue::Array(Some(vec!["a".into(), "bc".into()]));
        assert_eq!(encoded(value), b"*2\r\n$1\r\na\r\n$2\r\nbc\r\n");
    }

    #[test]
    fn test_encode_empty_array() {
        assert_eq!(encoded(ResponseValue::Array(Some(Vec::new()))), b"*0\r\n");
    }

    #[test]
    fn test_encode_nil_array() {
        assert_eq!(encoded(ResponseValue::Array(None)), b"*-1\r\n");
    }

    #[test]
    fn test_terminal_marker_detection() {
        let fatal = CommandResult::Error(format!("{TERMINATE_PREFIX}bad framing"));
        assert!(is_terminal(&fatal));

        let ordinary = CommandResult::Error("ERR unknown command".to_string());
        assert!(!is_terminal(&ordinary));

        let ok = CommandResult::Ok(ResponseValue::SimpleString("OK".into()));
        assert!(!is_terminal(&ok));
    }

    #[test]
    fn test_terminal_reply_on_the_wire() {
        let fatal = CommandResult::Error(format!("{TERMINATE_PREFIX}bad framing"));
        assert_eq!(encode_result(&fatal), b"-ERRTERM bad framing\r\n");
    }
}
