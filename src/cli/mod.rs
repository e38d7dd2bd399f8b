//! Interactive client: tokenizer, protocol client, and REPL
//!
//! The CLI is a consumer of the server's wire contract, not part of it.

pub mod client;
pub mod interactive;
pub mod tokenizer;

pub use client::{ClientReply, CliClient};
pub use interactive::InteractiveMode;
pub use tokenizer::tokenize_command_line;
