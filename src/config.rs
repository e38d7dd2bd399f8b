//! Configuration management for copperbeet
//!
//! This module handles loading and validating configuration from a JSON
//! file, environment variables, and command line overrides applied by the
//! binaries.

use crate::error::{CopperBeetError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure for the copperbeet server
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub network: NetworkConfig,
    pub logging: LoggingConfig,
}

/// Server-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    pub bind_address: String,
    pub max_connections: usize,
    pub shutdown_timeout_secs: u64,
}

/// Network configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub tcp_nodelay: bool,
    pub write_buffer_size: usize,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file_path: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 6379,
            bind_address: "localhost".to_string(),
            max_connections: 10000,
            shutdown_timeout_secs: 10,
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            tcp_nodelay: true,
            write_buffer_size: 4096,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file_path: None,
        }
    }
}

impl Config {
    /// Load configuration from the default sources: a `COPPERBEET_CONFIG`
    /// file if the variable is set, otherwise built-in defaults, with
    /// environment overrides applied on top.
    pub fn load() -> Result<Self> {
        let mut config = match std::env::var_os("COPPERBEET_CONFIG") {
            Some(path) => Self::load_from_file(Path::new(&path))?,
            None => Config::default(),
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific JSON file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| CopperBeetError::ConfigError {
            message: format!("Failed to read config file {}: {}", path.display(), e),
            config_key: None,
            source: Some(Box::new(e)),
        })?;

        let config: Config = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from `COPPERBEET_*` environment variables
    fn apply_env_overrides(&mut self) {
        if let Ok(port) = std::env::var("COPPERBEET_PORT") {
            if let Ok(port) = port.parse() {
                self.server.port = port;
            }
        }
        if let Ok(bind) = std::env::var("COPPERBEET_BIND") {
            self.server.bind_address = bind;
        }
        if let Ok(level) = std::env::var("COPPERBEET_LOG_LEVEL") {
            self.logging.level = level;
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.server.bind_address.is_empty() {
            return Err(CopperBeetError::ConfigError {
                message: "bind_address cannot be empty".to_string(),
                config_key: Some("server.bind_address".to_string()),
                source: None,
            });
        }

        if self.server.max_connections == 0 {
            return Err(CopperBeetError::ConfigError {
                message: "max_connections must be at least 1".to_string(),
                config_key: Some("server.max_connections".to_string()),
                source: None,
            });
        }

        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
            other => Err(CopperBeetError::ConfigError {
                message: format!("Invalid log level: {other}"),
                config_key: Some("logging.level".to_string()),
                source: None,
            }),
        }
    }

    /// One-line summary for startup logging
    pub fn summary(&self) -> String {
        format!(
            "{}:{} (max_connections={}, log={})",
            self.server.bind_address, self.server.port, self.server.max_connections, self.logging.level
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.server.port, 6379);
        assert_eq!(config.server.bind_address, "localhost");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_invalid_log_level_rejected() {
        let mut config = Config::default();
        config.logging.level = "verbose".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_max_connections_rejected() {
        let mut config = Config::default();
        config.server.max_connections = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: Config = serde_json::from_str(r#"{"server": {"port": 7000}}"#).unwrap();
        assert_eq!(config.server.port, 7000);
        assert_eq!(config.server.bind_address, "localhost");
        assert!(config.network.tcp_nodelay);
    }

    #[test]
    fn test_summary_mentions_endpoint() {
        let config = Config::default();
        assert!(config.summary().contains("localhost:6379"));
    }
}
