//! Per-connection protocol loop
//!
//! Each accepted socket is driven by two tasks bridged by an mpsc reply
//! channel: a reader that parses RESP2 commands and dispatches them, and a
//! writer that serializes replies to the socket in dispatch order. The
//! reader awaits each handler before parsing the next command, so a
//! long-running command (BLPOP) blocks later commands on the same
//! connection — RESP2 pipelining semantics for one logical client.

use crate::commands::{CommandRegistry, CommandRequest, CommandResult};
use crate::error::CopperBeetError;
use crate::resp::{self, LineScanner};
use crate::storage::DataStore;
use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, warn};
use uuid::Uuid;

/// Metadata for one live client connection
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    pub client_id: Uuid,
    pub remote_addr: SocketAddr,
    pub connected_at: Instant,
}

/// Registry of live connections, used to enforce the connection limit and
/// to drain on shutdown
pub struct ConnectionPool {
    connections: DashMap<Uuid, ConnectionInfo>,
    max_connections: usize,
}

impl ConnectionPool {
    pub fn new(max_connections: usize) -> Self {
        Self {
            connections: DashMap::new(),
            max_connections,
        }
    }

    pub fn can_accept(&self) -> bool {
        self.connections.len() < self.max_connections
    }

    pub fn register(&self, client_id: Uuid, remote_addr: SocketAddr) {
        self.connections.insert(
            client_id,
            ConnectionInfo {
                client_id,
                remote_addr,
                connected_at: Instant::now(),
            },
        );
    }

    pub fn deregister(&self, client_id: Uuid) {
        self.connections.remove(&client_id);
    }

    pub fn active_connections(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

/// Parse commands off the socket and dispatch them, pushing each reply into
/// the connection's channel. Exits on clean EOF, fatal protocol error
/// (after queuing the terminating reply), or shutdown.
pub async fn read_worker(
    read_half: OwnedReadHalf,
    replies: mpsc::Sender<CommandResult>,
    registry: Arc<CommandRegistry>,
    store: Arc<DataStore>,
    mut shutdown: broadcast::Receiver<()>,
    client_id: Uuid,
) {
    let mut scanner = LineScanner::new(read_half);
    debug!(client = %client_id, "Read worker started");

    loop {
        let parsed = tokio::select! {
            _ = shutdown.recv() => {
                debug!(client = %client_id, "Read worker cancelled by shutdown");
                return;
            }
            parsed = resp::read_command(&mut scanner) => parsed,
        };

        let params = match parsed {
            Ok(Some(params)) => params,
            Ok(None) => {
                debug!(client = %client_id, "Client disconnected");
                return;
            }
            Err(error) => {
                error.log();
                let marker = terminating_reply(&error);
                let _ = replies.send(marker).await;
                return;
            }
        };

        let Some(request) = CommandRequest::from_params(params, client_id) else {
            let _ = replies.send(CommandResult::Error("ERR empty command".to_string())).await;
            continue;
        };

        // The dispatch itself must also wake on shutdown: a suspended BLPOP
        // would otherwise hold this task open indefinitely.
        let result = tokio::select! {
            _ = shutdown.recv() => {
                debug!(client = %client_id, "Read worker cancelled mid-command");
                return;
            }
            result = registry.execute(&request, &store) => result,
        };

        if replies.send(result).await.is_err() {
            // Writer gone; nothing left to do for this connection.
            return;
        }
    }
}

/// Drain the reply channel onto the socket in arrival order, flushing per
/// reply. Exits when the channel closes, shutdown fires, or a reply carries
/// the terminate marker (after writing it).
pub async fn write_worker(
    write_half: OwnedWriteHalf,
    mut replies: mpsc::Receiver<CommandResult>,
    mut shutdown: broadcast::Receiver<()>,
    client_id: Uuid,
) {
    let mut writer = BufWriter::new(write_half);
    debug!(client = %client_id, "Write worker started");

    loop {
        let reply = tokio::select! {
            _ = shutdown.recv() => {
                debug!(client = %client_id, "Write worker cancelled by shutdown");
                break;
            }
            reply = replies.recv() => match reply {
                Some(reply) => reply,
                None => {
                    debug!(client = %client_id, "Reply channel closed");
                    break;
                }
            },
        };

        let bytes = resp::encode_result(&reply);
        if let Err(e) = writer.write_all(&bytes).await {
            warn!(client = %client_id, error = %e, "Connection lost");
            break;
        }
        if let Err(e) = writer.flush().await {
            warn!(client = %client_id, error = %e, "Connection lost on flush");
            break;
        }

        if resp::is_terminal(&reply) {
            debug!(client = %client_id, "Terminating reply sent, closing connection");
            break;
        }
    }

    let _ = writer.shutdown().await;
}

fn terminating_reply(error: &CopperBeetError) -> CommandResult {
    CommandResult::Error(format!("{}{}", resp::TERMINATE_PREFIX, error))
}
