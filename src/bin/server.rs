//! copperbeet server binary
//!
//! Loads configuration, initializes logging, and runs the server until a
//! shutdown trigger fires: the literal line `q` on stdin, SIGINT/SIGTERM,
//! or a listener failure.

use clap::{Arg, Command};
use copperbeet::{Config, CopperBeetServer};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

/// Command line arguments for the server
#[derive(Debug)]
struct ServerArgs {
    config_file: Option<PathBuf>,
    port: Option<u16>,
    bind_address: Option<String>,
    log_level: Option<String>,
}

fn parse_args() -> ServerArgs {
    let matches = Command::new("copperbeet-server")
        .version(env!("CARGO_PKG_VERSION"))
        .about("A single-node in-memory key/value server speaking RESP2")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .value_name("PORT")
                .help("Server port (overrides config file)")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new("bind")
                .short('b')
                .long("bind")
                .value_name("ADDRESS")
                .help("Bind address (overrides config file)")
                .value_parser(clap::value_parser!(String)),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("Log level: trace, debug, info, warn, error")
                .value_parser(["trace", "debug", "info", "warn", "error"]),
        )
        .get_matches();

    ServerArgs {
        config_file: matches.get_one::<PathBuf>("config").cloned(),
        port: matches.get_one::<u16>("port").copied(),
        bind_address: matches.get_one::<String>("bind").cloned(),
        log_level: matches.get_one::<String>("log-level").cloned(),
    }
}

fn apply_cli_overrides(mut config: Config, args: &ServerArgs) -> Config {
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(ref bind_address) = args.bind_address {
        config.server.bind_address = bind_address.clone();
    }
    if let Some(ref log_level) = args.log_level {
        config.logging.level = log_level.clone();
    }
    config
}

fn init_logging(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    let subscriber = fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_thread_ids(true);

    match &config.logging.file_path {
        Some(file_path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(file_path)
                .map_err(|e| format!("Failed to open log file {}: {}", file_path.display(), e))?;
            if subscriber.with_writer(Arc::new(file)).try_init().is_err() {
                debug!("Logging subscriber already initialized");
            }
        }
        None => {
            if subscriber.try_init().is_err() {
                debug!("Logging subscriber already initialized");
            }
        }
    }

    Ok(())
}

/// Watch stdin for the `q` token that requests orderly shutdown
async fn stdin_worker(shutdown_tx: broadcast::Sender<()>) {
    let stdin = tokio::io::stdin();
    let mut lines = BufReader::new(stdin).lines();
    let mut shutdown_rx = shutdown_tx.subscribe();

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => return,
            line = lines.next_line() => match line {
                Ok(Some(text)) => {
                    let input = text.trim();
                    if input.is_empty() {
                        continue;
                    }
                    if input == "q" {
                        info!("Shutdown requested from stdin");
                        let _ = shutdown_tx.send(());
                        return;
                    }
                    debug!(input, "Ignoring stdin input");
                }
                Ok(None) | Err(_) => return,
            },
        }
    }
}

/// Resolve on SIGINT or SIGTERM
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use signal::unix::{signal, SignalKind};

        let mut sigterm =
            signal(SignalKind::terminate()).expect("Failed to install SIGTERM signal handler");
        let mut sigint =
            signal(SignalKind::interrupt()).expect("Failed to install SIGINT signal handler");

        tokio::select! {
            _ = sigterm.recv() => warn!("Received SIGTERM, initiating graceful shutdown..."),
            _ = sigint.recv() => warn!("Received SIGINT (Ctrl+C), initiating graceful shutdown..."),
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C signal: {e}");
        } else {
            warn!("Received Ctrl+C, initiating graceful shutdown...");
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = parse_args();

    let config = if let Some(config_file) = &args.config_file {
        Config::load_from_file(Path::new(config_file)).map_err(|e| {
            eprintln!("Failed to load configuration from {}: {}", config_file.display(), e);
            e
        })?
    } else {
        Config::load().map_err(|e| {
            eprintln!("Failed to load configuration: {e}");
            e
        })?
    };
    let config = apply_cli_overrides(config, &args);
    config.validate()?;

    init_logging(&config)?;

    info!("copperbeet v{} starting", env!("CARGO_PKG_VERSION"));
    info!("Configuration: {}", config.summary());

    let server = CopperBeetServer::new(config)?;
    let shutdown_tx = server.shutdown_handle();

    tokio::spawn(stdin_worker(shutdown_tx.clone()));
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(());
    });

    match server.run().await {
        Ok(()) => {
            info!("Clean exit");
            Ok(())
        }
        Err(e) => {
            error!("Server failed: {e}");
            process::exit(1);
        }
    }
}
