//! TCP server, listener, and per-connection protocol tasks

pub mod connection;
pub mod server;

pub use connection::{ConnectionInfo, ConnectionPool};
pub use server::TcpServer;
