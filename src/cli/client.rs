//! Protocol client used by the interactive CLI
//!
//! Encodes a tokenized command as a RESP2 array of bulk strings, and
//! decodes whichever reply shape the server produces.

use crate::error::{CopperBeetError, Result};
use crate::resp::LineScanner;
use std::future::Future;
use std::pin::Pin;
use tokio::io::{AsyncRead, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tracing::debug;

/// A decoded server reply
#[derive(Debug, Clone, PartialEq)]
pub enum ClientReply {
    Simple(String),
    Error(String),
    Integer(i64),
    Bulk(Option<String>),
    Array(Option<Vec<ClientReply>>),
}

/// TCP client holding one connection to a copperbeet server
pub struct CliClient {
    address: String,
    reader: Option<LineScanner<OwnedReadHalf>>,
    writer: Option<OwnedWriteHalf>,
}

impl CliClient {
    pub fn with_address(address: String) -> Self {
        Self {
            address,
            reader: None,
            writer: None,
        }
    }

    pub async fn connect(&mut self) -> Result<()> {
        let stream = TcpStream::connect(&self.address).await.map_err(|e| {
            CopperBeetError::NetworkError {
                message: format!("Failed to connect to {}: {}", self.address, e),
                source: Some(Box::new(e)),
                connection_id: None,
            }
        })?;
        debug!("Connected to {}", self.address);

        let (read_half, write_half) = stream.into_split();
        self.reader = Some(LineScanner::new(read_half));
        self.writer = Some(write_half);
        Ok(())
    }

    pub async fn disconnect(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.shutdown().await?;
        }
        self.reader = None;
        Ok(())
    }

    /// Send one command (already tokenized) and read its reply
    pub async fn send_command(&mut self, parts: &[String]) -> Result<ClientReply> {
        let writer = self.writer.as_mut().ok_or_else(not_connected)?;

        let mut frame = format!("*{}\r\n", parts.len()).into_bytes();
        for part in parts {
            frame.extend_from_slice(format!("${}\r\n", part.len()).as_bytes());
            frame.extend_from_slice(part.as_bytes());
            frame.extend_from_slice(b"\r\n");
        }
        writer.write_all(&frame).await?;
        writer.flush().await?;

        let reader = self.reader.as_mut().ok_or_else(not_connected)?;
        read_reply(reader).await
    }

    /// Render a reply the way a human expects at the prompt
    pub fn format_response(&self, reply: &ClientReply) -> String {
        format_reply(reply, 0)
    }
}

fn not_connected() -> CopperBeetError {
    CopperBeetError::NetworkError {
        message: "Not connected".to_string(),
        source: None,
        connection_id: None,
    }
}

fn closed_early() -> CopperBeetError {
    CopperBeetError::NetworkError {
        message: "Server closed the connection".to_string(),
        source: None,
        connection_id: None,
    }
}

fn bad_reply(line: &str) -> CopperBeetError {
    CopperBeetError::ProtocolError {
        message: format!("Unexpected reply line {line:?}"),
        source: None,
    }
}

/// Decode one reply; arrays recurse
fn read_reply<'a, R>(
    scanner: &'a mut LineScanner<R>,
) -> Pin<Box<dyn Future<Output = Result<ClientReply>> + Send + 'a>>
where
    R: AsyncRead + Unpin + Send,
{
    Box::pin(async move {
        let line = scanner.next_line().await?.ok_or_else(closed_early)?;
        let (marker, rest) = match line.as_bytes().first() {
            Some(&marker) if marker.is_ascii() => (marker, &line[1..]),
            _ => return Err(bad_reply(&line)),
        };

        match marker {
            b'+' => Ok(ClientReply::Simple(rest.to_string())),
            b'-' => Ok(ClientReply::Error(rest.to_string())),
            b':' => Ok(ClientReply::Integer(
                rest.parse().map_err(|_| bad_reply(&line))?,
            )),
            b'$' => {
                let len: i64 = rest.parse().map_err(|_| bad_reply(&line))?;
                if len < 0 {
                    return Ok(ClientReply::Bulk(None));
                }
                let data = scanner.next_line().await?.ok_or_else(closed_early)?;
                if data.len() != len as usize {
                    return Err(bad_reply(&data));
                }
                Ok(ClientReply::Bulk(Some(data)))
            }
            b'*' => {
                let len: i64 = rest.parse().map_err(|_| bad_reply(&line))?;
                if len < 0 {
                    return Ok(ClientReply::Array(None));
                }
                let mut items = Vec::with_capacity(len as usize);
                for _ in 0..len {
                    items.push(read_reply(scanner).await?);
                }
                Ok(ClientReply::Array(Some(items)))
            }
            _ => Err(bad_reply(&line)),
        }
    })
}

fn format_reply(reply: &ClientReply, index: usize) -> String {
    match reply {
        ClientReply::Simple(s) => s.clone(),
        ClientReply::Error(s) => format!("(error) {s}"),
        ClientReply::Integer(i) => format!("(integer) {i}"),
        ClientReply::Bulk(Some(s)) => format!("{s:?}"),
        ClientReply::Bulk(None) => "(nil)".to_string(),
        ClientReply::Array(None) => "(nil)".to_string(),
        ClientReply::Array(Some(items)) if items.is_empty() => "(empty array)".to_string(),
        ClientReply::Array(Some(items)) => items
            .iter()
            .enumerate()
            .map(|(i, item)| format!("{}) {}", index + i + 1, format_reply(item, 0)))
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    async fn decode(input: &[u8]) -> Result<ClientReply> {
        let mut scanner = LineScanner::new(Cursor::new(input.to_vec()));
        read_reply(&mut scanner).await
    }

    #[tokio::test]
    async fn test_decode_simple_string() {
        assert_eq!(
            decode(b"+PONG\r\n").await.unwrap(),
            ClientReply::Simple("PONG".to_string())
        );
    }

    #[tokio::test]
    async fn test_decode_error() {
        assert_eq!(
            decode(b"-ERR nope\r\n").await.unwrap(),
            ClientReply::Error("ERR nope".to_string())
        );
    }

    #[tokio::test]
    async fn test_decode_integer() {
        assert_eq!(decode(b":42\r\n").await.unwrap(), ClientReply::Integer(42));
    }

    #[tokio::test]
    async fn test_decode_bulk_and_nil() {
        assert_eq!(
            decode(b"$5\r\nhello\r\n").await.unwrap(),
            ClientReply::Bulk(Some("hello".to_string()))
        );
        assert_eq!(decode(b"$-1\r\n").await.unwrap(), ClientReply::Bulk(None));
    }

    #[tokio::test]
    async fn test_decode_array() {
        let reply = decode(b"*2\r\n$1\r\na\r\n$1\r\nb\r\n").await.unwrap();
        assert_eq!(
            reply,
            ClientReply::Array(Some(vec![
                ClientReply::Bulk(Some("a".to_string())),
                ClientReply::Bulk(Some("b".to_string())),
            ]))
        );
    }

    #[tokio::test]
    async fn test_decode_nil_array() {
        assert_eq!(decode(b"*-1\r\n").await.unwrap(), ClientReply::Array(None));
    }

    #[tokio::test]
    async fn test_decode_garbage_is_error() {
        assert!(decode(b"@what\r\n").await.is_err());
    }

    #[test]
    fn test_format_nested_replies() {
        let client = CliClient::with_address("localhost:0".to_string());
        let reply = ClientReply::Array(Some(vec![
            ClientReply::Bulk(Some("Q".to_string())),
            ClientReply::Bulk(Some("hello".to_string())),
        ]));
        let rendered = client.format_response(&reply);
        assert_eq!(rendered, "1) \"Q\"\n2) \"hello\"");
    }

    #[test]
    fn test_format_scalars() {
        let client = CliClient::with_address("localhost:0".to_string());
        assert_eq!(client.format_response(&ClientReply::Integer(3)), "(integer) 3");
        assert_eq!(client.format_response(&ClientReply::Bulk(None)), "(nil)");
        assert_eq!(
            client.format_response(&ClientReply::Array(Some(Vec::new()))),
            "(empty array)"
        );
    }
}
