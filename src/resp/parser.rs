//! RESP2 request parser
//!
//! Reads one client command per call from a CRLF line stream. A command is
//! an array header `*N` followed by `N` bulk strings, each a `$L` length
//! line and a payload line of exactly `L` bytes. Anything else is a fatal
//! protocol error that terminates the connection.

use crate::error::{CopperBeetError, Result};
use crate::resp::scanner::LineScanner;
use tokio::io::AsyncRead;

fn protocol_error(message: impl Into<String>) -> CopperBeetError {
    CopperBeetError::ProtocolError {
        message: message.into(),
        source: None,
    }
}

/// Read one command from the line stream. `Ok(None)` means the client
/// disconnected cleanly before sending anything; every malformed frame is
/// an `Err` the caller must treat as fatal for this connection.
pub async fn read_command<R: AsyncRead + Unpin>(
    scanner: &mut LineScanner<R>,
) -> Result<Option<Vec<String>>> {
    let header = match scanner.next_line().await? {
        Some(line) => line,
        None => return Ok(None),
    };

    let size = header
        .strip_prefix('*')
        .ok_or_else(|| protocol_error(format!("Expected array header '*', got {header:?}")))?;
    let size: usize = size
        .parse()
        .map_err(|_| protocol_error(format!("Could not extract array size from {header:?}")))?;

    let mut params = Vec::with_capacity(size);
    for _ in 0..size {
        let marker = scanner
            .next_line()
            .await?
            .ok_or_else(|| protocol_error("Unexpected end of stream while parsing array element"))?;

        let length = marker
            .strip_prefix('$')
            .ok_or_else(|| protocol_error(format!("Expected bulk string marker '$', got {marker:?}")))?;
        let length: usize = length
            .parse()
            .map_err(|_| protocol_error(format!("Invalid bulk string length in {marker:?}")))?;

        let data = scanner
            .next_line()
            .await?
            .ok_or_else(|| protocol_error("Unexpected end of stream while reading bulk string"))?;
        if data.len() != length {
            return Err(protocol_error(format!(
                "Bulk string length mismatch: expected {length} bytes, got {}",
                data.len()
            )));
        }

        params.push(data);
    }

    Ok(Some(params))
}
