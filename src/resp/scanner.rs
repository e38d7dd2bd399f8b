//! CRLF line scanner over an async byte stream
//!
//! Splits an arbitrary octet stream into UTF-8 text lines on `\r\n`
//! boundaries, discarding the delimiter. A trailing non-terminated
//! fragment at end of stream is yielded as a final line. Cancellation is
//! applied by the caller racing `next_line` against the shutdown signal.

use crate::error::{CopperBeetError, Result};
use bytes::{Buf, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

/// Streaming line reader backed by an internal growable buffer
pub struct LineScanner<R> {
    reader: R,
    buf: BytesMut,
    eof: bool,
}

impl<R: AsyncRead + Unpin> LineScanner<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: BytesMut::with_capacity(4096),
            eof: false,
        }
    }

    /// Yield the next line, or `None` once the stream is exhausted.
    /// I/O errors from the underlying reader terminate the sequence.
    pub async fn next_line(&mut self) -> Result<Option<String>> {
        loop {
            if let Some(pos) = find_crlf(&self.buf) {
                let line = self.buf.split_to(pos);
                self.buf.advance(2);
                return Ok(Some(String::from_utf8(line.to_vec())?));
            }

            if self.eof {
                if self.buf.is_empty() {
                    return Ok(None);
                }
                let line = self.buf.split();
                return Ok(Some(String::from_utf8(line.to_vec())?));
            }

            let n = self
                .reader
                .read_buf(&mut self.buf)
                .await
                .map_err(|e| CopperBeetError::NetworkError {
                    message: format!("read failed: {e}"),
                    source: Some(Box::new(e)),
                    connection_id: None,
                })?;
            if n == 0 {
                self.eof = true;
            }
        }
    }
}

fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|pair| pair == b"\r\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    async fn collect(input: &[u8]) -> Vec<String> {
        let mut scanner = LineScanner::new(Cursor::new(input.to_vec()));
        let mut lines = Vec::new();
        while let Some(line) = scanner.next_line().await.unwrap() {
            lines.push(line);
        }
        lines
    }

    #[tokio::test]
    async fn test_splits_on_crlf() {
        let lines = collect(b"foo\r\nbar\r\n").await;
        assert_eq!(lines, vec!["foo", "bar"]);
    }

    #[tokio::test]
    async fn test_trailing_fragment_is_final_line() {
        let lines = collect(b"foo\r\nbar").await;
        assert_eq!(lines, vec!["foo", "bar"]);
    }

    #[tokio::test]
    async fn test_empty_stream_yields_nothing() {
        let lines = collect(b"").await;
        assert!(lines.is_empty());
    }

    #[tokio::test]
    async fn test_empty_lines_are_preserved() {
        let lines = collect(b"\r\n\r\nx\r\n").await;
        assert_eq!(lines, vec!["", "", "x"]);
    }

    #[tokio::test]
    async fn test_bare_lf_is_not_a_delimiter() {
        let lines = collect(b"foo\nbar\r\n").await;
        assert_eq!(lines, vec!["foo\nbar"]);
    }

    #[tokio::test]
    async fn test_none_is_sticky_after_eof() {
        let mut scanner = LineScanner::new(Cursor::new(b"one\r\n".to_vec()));
        assert_eq!(scanner.next_line().await.unwrap(), Some("one".to_string()));
        assert_eq!(scanner.next_line().await.unwrap(), None);
        assert_eq!(scanner.next_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_an_error() {
        let mut scanner = LineScanner::new(Cursor::new(vec![0xFF, 0xFE, b'\r', b'\n']));
        assert!(scanner.next_line().await.is_err());
    }
}
