//! copperbeet - a single-node in-memory key/value server speaking RESP2
//!
//! copperbeet implements string GET/SET with millisecond TTL, list
//! push/pop/range, and a blocking list pop (BLPOP) that suspends a client
//! until a value arrives or a timeout elapses. Clients connect over TCP
//! and exchange RESP2 frames; one reader and one writer task per
//! connection keep replies in strict request order.

// Core modules
pub mod config;
pub mod error;

// Feature modules
pub mod cli;
pub mod commands;
pub mod network;
pub mod resp;
pub mod storage;

// Public API exports
pub use config::Config;
pub use error::{CopperBeetError, Result};

// Re-export commonly used types
pub use commands::{CommandRegistry, CommandResult, ResponseValue};
pub use network::TcpServer;
pub use storage::{BlockingDeque, DataStore, TtlMap};

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::info;

/// copperbeet server instance wiring configuration, the shared stores, the
/// command registry, and the TCP front end together
pub struct CopperBeetServer {
    config: Arc<Config>,
    store: Arc<DataStore>,
    registry: Arc<CommandRegistry>,
    shutdown_tx: broadcast::Sender<()>,
}

impl CopperBeetServer {
    /// Create a new server with the given configuration
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let (shutdown_tx, _) = broadcast::channel(16);

        Ok(Self {
            config: Arc::new(config),
            store: Arc::new(DataStore::new()),
            registry: Arc::new(CommandRegistry::with_default_commands()),
            shutdown_tx,
        })
    }

    /// The process-wide shutdown signal; any holder can trigger teardown
    pub fn shutdown_handle(&self) -> broadcast::Sender<()> {
        self.shutdown_tx.clone()
    }

    /// Request orderly shutdown
    pub fn shutdown(&self) {
        // Send fails only when nothing is listening yet, which is fine.
        let _ = self.shutdown_tx.send(());
    }

    pub fn store(&self) -> &Arc<DataStore> {
        &self.store
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Bind and serve until shutdown is requested
    pub async fn run(&self) -> Result<()> {
        let mut tcp_server = self.tcp_server();
        tcp_server.bind().await?;
        tcp_server.serve().await
    }

    /// Bind, spawn the accept loop in the background, and return the local
    /// address. Used by tests and embedders.
    pub async fn start_in_background(&self) -> Result<SocketAddr> {
        let mut tcp_server = self.tcp_server();
        let addr = tcp_server.bind().await?;
        tokio::spawn(async move {
            if let Err(e) = tcp_server.serve().await {
                e.log();
            }
        });
        Ok(addr)
    }

    fn tcp_server(&self) -> TcpServer {
        info!(
            "copperbeet serving {} commands on {}",
            self.registry.command_count(),
            self.config.summary()
        );
        TcpServer::new(
            Arc::clone(&self.config),
            Arc::clone(&self.store),
            Arc::clone(&self.registry),
            self.shutdown_tx.clone(),
        )
    }
}
