//! TCP listener and acceptor
//!
//! Binds the configured endpoint and spawns a reader/writer task pair per
//! accepted connection. On shutdown it stops accepting and waits for the
//! outstanding connection tasks to deregister themselves, bounded by the
//! configured drain timeout.

use crate::commands::{CommandRegistry, CommandResult};
use crate::config::Config;
use crate::error::{CopperBeetError, Result};
use crate::network::connection::{read_worker, write_worker, ConnectionPool};
use crate::storage::DataStore;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

const REPLY_CHANNEL_CAPACITY: usize = 64;

/// TCP server for handling client connections
pub struct TcpServer {
    config: Arc<Config>,
    store: Arc<DataStore>,
    registry: Arc<CommandRegistry>,
    pool: Arc<ConnectionPool>,
    shutdown_tx: broadcast::Sender<()>,
    listener: Option<TcpListener>,
}

impl TcpServer {
    pub fn new(
        config: Arc<Config>,
        store: Arc<DataStore>,
        registry: Arc<CommandRegistry>,
        shutdown_tx: broadcast::Sender<()>,
    ) -> Self {
        let pool = Arc::new(ConnectionPool::new(config.server.max_connections));
        Self {
            config,
            store,
            registry,
            pool,
            shutdown_tx,
            listener: None,
        }
    }

    /// Bind the configured endpoint and return the actual local address
    /// (useful with port 0)
    pub async fn bind(&mut self) -> Result<SocketAddr> {
        let endpoint = format!(
            "{}:{}",
            self.config.server.bind_address, self.config.server.port
        );
        let listener =
            TcpListener::bind(&endpoint)
                .await
                .map_err(|e| CopperBeetError::NetworkError {
                    message: format!("Failed to bind to {endpoint}: {e}"),
                    source: Some(Box::new(e)),
                    connection_id: None,
                })?;

        let local_addr = listener.local_addr().map_err(|e| CopperBeetError::NetworkError {
            message: format!("Failed to get local address: {e}"),
            source: Some(Box::new(e)),
            connection_id: None,
        })?;

        info!("Listening for client connections on {local_addr}");
        self.listener = Some(listener);
        Ok(local_addr)
    }

    /// Accept connections until shutdown, then drain
    pub async fn serve(mut self) -> Result<()> {
        let listener = match self.listener.take() {
            Some(listener) => listener,
            None => {
                return Err(CopperBeetError::InternalError {
                    message: "serve() called before bind()".to_string(),
                    component: Some("tcp_server".to_string()),
                    source: None,
                })
            }
        };

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received, no longer accepting connections");
                    break;
                }
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, addr)) => self.handle_new_connection(stream, addr),
                        Err(e) => {
                            error!("Error accepting connection: {e}");
                        }
                    }
                }
            }
        }

        drop(listener);
        self.drain_connections().await;
        info!("TCP server stopped");
        Ok(())
    }

    fn handle_new_connection(&self, mut stream: TcpStream, addr: SocketAddr) {
        if !self.pool.can_accept() {
            warn!(
                "Connection limit reached ({} active), rejecting connection from {addr}",
                self.pool.active_connections()
            );
            tokio::spawn(async move {
                let _ = stream.write_all(b"-ERR server connection limit reached\r\n").await;
                let _ = stream.shutdown().await;
            });
            return;
        }

        if let Err(e) = stream.set_nodelay(self.config.network.tcp_nodelay) {
            warn!("Failed to set TCP_NODELAY for {addr}: {e}");
        }

        let client_id = Uuid::new_v4();
        self.pool.register(client_id, addr);
        info!(
            "Client connected: {client_id} from {addr} (active connections: {})",
            self.pool.active_connections()
        );

        let (reply_tx, reply_rx) = mpsc::channel::<CommandResult>(REPLY_CHANNEL_CAPACITY);
        let (read_half, write_half) = stream.into_split();

        let reader = tokio::spawn(read_worker(
            read_half,
            reply_tx,
            Arc::clone(&self.registry),
            Arc::clone(&self.store),
            self.shutdown_tx.subscribe(),
            client_id,
        ));
        let writer = tokio::spawn(write_worker(
            write_half,
            reply_rx,
            self.shutdown_tx.subscribe(),
            client_id,
        ));

        let pool = Arc::clone(&self.pool);
        tokio::spawn(async move {
            let _ = reader.await;
            let _ = writer.await;
            pool.deregister(client_id);
            info!(
                "Client {client_id} from {addr} disconnected (active connections: {})",
                pool.active_connections()
            );
        });
    }

    /// Wait for per-connection tasks to exit, bounded by the configured
    /// shutdown timeout
    async fn drain_connections(&self) {
        let deadline = Duration::from_secs(self.config.server.shutdown_timeout_secs);
        let drained = tokio::time::timeout(deadline, async {
            while !self.pool.is_empty() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;

        match drained {
            Ok(()) => debug!("All connections drained"),
            Err(_) => warn!(
                "Shutdown drain timed out with {} connections still active",
                self.pool.active_connections()
            ),
        }
    }
}
