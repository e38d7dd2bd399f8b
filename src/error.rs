//! Error types and handling for copperbeet
//!
//! This module defines all error types used throughout the system and the
//! conversions that turn them into client-facing `-ERR` reply text.

use thiserror::Error;
use tracing::{debug, error, warn};

/// Error categories for routing and log-level decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Client-side errors (invalid commands, wrong arguments, etc.)
    Client,
    /// Network-related errors (connection issues, timeouts, etc.)
    Network,
    /// Wire-protocol errors (malformed framing, length mismatches)
    Protocol,
    /// Configuration-related errors
    Configuration,
    /// Internal system errors
    System,
}

/// Main error type for copperbeet operations
#[derive(Debug, Error)]
pub enum CopperBeetError {
    #[error("Unrecognized command '{command}'!")]
    InvalidCommand { command: String },

    #[error("wrong number of arguments for '{command}' command: expected {expected}, got {actual}")]
    WrongArity {
        command: String,
        expected: String,
        actual: usize,
    },

    #[error("Could not convert '{value}' to an int for {purpose}")]
    NotAnInteger { value: String, purpose: String },

    #[error("{key} does not exist!")]
    KeyNotFound { key: String },

    #[error("Protocol error: {message}")]
    ProtocolError {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Network error: {message}")]
    NetworkError {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        connection_id: Option<String>,
    },

    #[error("Configuration error: {message}")]
    ConfigError {
        message: String,
        config_key: Option<String>,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Internal error: {message}")]
    InternalError {
        message: String,
        component: Option<String>,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

/// Convenience type alias for Results
pub type Result<T> = std::result::Result<T, CopperBeetError>;

impl CopperBeetError {
    /// Get the error category for routing and handling
    pub fn category(&self) -> ErrorCategory {
        match self {
            CopperBeetError::InvalidCommand { .. }
            | CopperBeetError::WrongArity { .. }
            | CopperBeetError::NotAnInteger { .. }
            | CopperBeetError::KeyNotFound { .. } => ErrorCategory::Client,

            CopperBeetError::NetworkError { .. } => ErrorCategory::Network,
            CopperBeetError::ProtocolError { .. } => ErrorCategory::Protocol,
            CopperBeetError::ConfigError { .. } => ErrorCategory::Configuration,
            CopperBeetError::InternalError { .. } => ErrorCategory::System,
        }
    }

    /// Check if the error originated from client input rather than the server
    pub fn is_client_error(&self) -> bool {
        matches!(self.category(), ErrorCategory::Client)
    }

    /// Convert error to client-facing error message (without the `-` marker)
    pub fn to_client_error(&self) -> String {
        match self {
            CopperBeetError::InvalidCommand { .. }
            | CopperBeetError::WrongArity { .. }
            | CopperBeetError::NotAnInteger { .. }
            | CopperBeetError::KeyNotFound { .. }
            | CopperBeetError::ProtocolError { .. } => format!("ERR {self}"),
            _ => "ERR internal server error".to_string(),
        }
    }

    /// Log the error at a level matching its category
    pub fn log(&self) {
        match self.category() {
            ErrorCategory::Client => {
                debug!(error = %self, "Client error");
            }
            ErrorCategory::Protocol => {
                warn!(error = %self, "Protocol error");
            }
            ErrorCategory::Network => {
                warn!(error = %self, "Network error");
            }
            ErrorCategory::Configuration | ErrorCategory::System => {
                error!(error = %self, category = ?self.category(), "Server error");
            }
        }
    }
}

// Standard error conversions for common system errors
impl From<std::io::Error> for CopperBeetError {
    fn from(error: std::io::Error) -> Self {
        CopperBeetError::NetworkError {
            message: error.to_string(),
            source: Some(Box::new(error)),
            connection_id: None,
        }
    }
}

impl From<std::num::ParseIntError> for CopperBeetError {
    fn from(error: std::num::ParseIntError) -> Self {
        CopperBeetError::NotAnInteger {
            value: error.to_string(),
            purpose: "argument".to_string(),
        }
    }
}

impl From<std::string::FromUtf8Error> for CopperBeetError {
    fn from(error: std::string::FromUtf8Error) -> Self {
        CopperBeetError::ProtocolError {
            message: format!("Invalid UTF-8 sequence: {error}"),
            source: Some(Box::new(error)),
        }
    }
}

impl From<serde_json::Error> for CopperBeetError {
    fn from(error: serde_json::Error) -> Self {
        CopperBeetError::ConfigError {
            message: error.to_string(),
            config_key: None,
            source: Some(Box::new(error)),
        }
    }
}
