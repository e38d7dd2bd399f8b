//! Interactive REPL mode for the CLI

use crate::cli::client::CliClient;
use crate::cli::tokenizer::tokenize_command_line;
use crate::error::Result;
use std::io::{self, Write};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;

/// Interactive REPL for the CLI client
pub struct InteractiveMode {
    client: CliClient,
}

impl InteractiveMode {
    pub fn new(address: String) -> Self {
        Self {
            client: CliClient::with_address(address),
        }
    }

    /// Start the interactive REPL
    pub async fn start(&mut self) -> Result<()> {
        println!("copperbeet CLI - interactive mode");
        println!("Type 'quit' or 'exit' to leave; HELP <command> for server help");
        println!();

        if let Err(e) = self.client.connect().await {
            eprintln!("Failed to connect to server: {e}");
            return Err(e);
        }

        let stdin = tokio::io::stdin();
        let mut reader = BufReader::new(stdin);
        let mut line = String::new();

        loop {
            print!("copperbeet> ");
            let _ = io::stdout().flush();

            line.clear();
            match reader.read_line(&mut line).await {
                Ok(0) => {
                    // EOF (Ctrl+D)
                    println!();
                    break;
                }
                Ok(_) => {
                    let input = line.trim();
                    if input.is_empty() {
                        continue;
                    }

                    match input.to_lowercase().as_str() {
                        "quit" | "exit" => {
                            println!("Goodbye!");
                            break;
                        }
                        _ => {}
                    }

                    let parts = tokenize_command_line(input);
                    if parts.is_empty() {
                        continue;
                    }

                    match self.client.send_command(&parts).await {
                        Ok(reply) => println!("{}", self.client.format_response(&reply)),
                        Err(e) => {
                            eprintln!("Error: {e}");
                            // The server may have closed on us; bail out so
                            // the user is not stuck typing into a dead pipe.
                            break;
                        }
                    }
                }
                Err(e) => {
                    eprintln!("Failed to read input: {e}");
                    break;
                }
            }
        }

        if let Err(e) = self.client.disconnect().await {
            warn!("Error during disconnect: {e}");
        }
        Ok(())
    }
}
