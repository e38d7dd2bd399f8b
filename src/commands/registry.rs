//! Command registry and execution framework

use crate::commands::{CommandArity, ResponseValue};
use crate::error::CopperBeetError;
use crate::storage::DataStore;
use async_trait::async_trait;
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

const HELP_USAGE: &str = "usage:
\tHELP <commandname>
summary:
\tShows specific help for the command given as argument.";

/// Trait for command implementations
#[async_trait]
pub trait Command: Send + Sync {
    /// Execute the command with given arguments (command name excluded)
    async fn execute(&self, args: &[String], store: &DataStore) -> CommandResult;

    /// Get the command name
    fn name(&self) -> &'static str;

    /// Get the command arity specification
    fn arity(&self) -> CommandArity;

    /// Usage text served by HELP
    fn usage(&self) -> &'static str;
}

/// Command execution result
#[derive(Debug, Clone, PartialEq)]
pub enum CommandResult {
    Ok(ResponseValue),
    Error(String),
}

/// One parsed client request
#[derive(Debug, Clone)]
pub struct CommandRequest {
    pub name: String,
    pub args: Vec<String>,
    pub client_id: Uuid,
}

impl CommandRequest {
    /// Build a request from the raw parameter array; the first element is
    /// the command name.
    pub fn from_params(mut params: Vec<String>, client_id: Uuid) -> Option<Self> {
        if params.is_empty() {
            return None;
        }
        let name = params.remove(0);
        Some(Self {
            name,
            args: params,
            client_id,
        })
    }

    /// Total number of arguments including the command name
    pub fn total_args(&self) -> usize {
        self.args.len() + 1
    }

    fn validate_arity(&self, arity: &CommandArity) -> Result<(), String> {
        let total = self.total_args();
        match arity {
            CommandArity::Fixed(expected) => {
                if total != *expected {
                    return Err(arity_error(&self.name, &expected.to_string(), total));
                }
            }
            CommandArity::Range(min, max) => {
                if total < *min || total > *max {
                    return Err(arity_error(&self.name, &format!("{min}-{max}"), total));
                }
            }
            CommandArity::AtLeast(min) => {
                if total < *min {
                    return Err(arity_error(&self.name, &format!("at least {min}"), total));
                }
            }
        }
        Ok(())
    }
}

fn arity_error(command: &str, expected: &str, actual: usize) -> String {
    CopperBeetError::WrongArity {
        command: command.to_string(),
        expected: expected.to_string(),
        actual,
    }
    .to_client_error()
}

/// Command registry for lookup and dispatch, keyed by uppercase name
pub struct CommandRegistry {
    commands: HashMap<String, Box<dyn Command>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self {
            commands: HashMap::new(),
        }
    }

    /// Create a registry with the full command set installed
    pub fn with_default_commands() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(crate::commands::PingCommand));
        registry.register(Box::new(crate::commands::EchoCommand));
        registry.register(Box::new(crate::commands::SetCommand));
        registry.register(Box::new(crate::commands::GetCommand));
        registry.register(Box::new(crate::commands::RpushCommand));
        registry.register(Box::new(crate::commands::LpushCommand));
        registry.register(Box::new(crate::commands::LlenCommand));
        registry.register(Box::new(crate::commands::LrangeCommand));
        registry.register(Box::new(crate::commands::LpopCommand));
        registry.register(Box::new(crate::commands::BlpopCommand));
        registry
    }

    /// Register a command under its uppercase name
    pub fn register(&mut self, command: Box<dyn Command>) {
        self.commands.insert(command.name().to_uppercase(), command);
    }

    /// Dispatch a request. Incoming names are uppercased before lookup, so
    /// lowercase clients are accepted. Unknown names and arity violations
    /// are non-fatal error replies.
    pub async fn execute(&self, request: &CommandRequest, store: &DataStore) -> CommandResult {
        let name = request.name.to_uppercase();
        debug!(command = %name, client = %request.client_id, "Command received");

        // HELP reads the table itself, so it lives here rather than behind
        // the Command trait.
        if name == "HELP" {
            return self.execute_help(request);
        }

        let command = match self.commands.get(&name) {
            Some(command) => command,
            None => {
                return CommandResult::Error(
                    CopperBeetError::InvalidCommand {
                        command: request.name.clone(),
                    }
                    .to_client_error(),
                )
            }
        };

        if let Err(message) = request.validate_arity(&command.arity()) {
            return CommandResult::Error(message);
        }

        command.execute(&request.args, store).await
    }

    fn execute_help(&self, request: &CommandRequest) -> CommandResult {
        if let Err(message) = request.validate_arity(&CommandArity::Fixed(2)) {
            return CommandResult::Error(message);
        }

        let target = request.args[0].to_uppercase();
        if target == "HELP" {
            return CommandResult::Ok(ResponseValue::BulkString(Some(HELP_USAGE.to_string())));
        }

        match self.commands.get(&target) {
            Some(command) => {
                CommandResult::Ok(ResponseValue::BulkString(Some(command.usage().to_string())))
            }
            None => CommandResult::Error(format!(
                "ERR Command '{}' is not supported",
                request.args[0]
            )),
        }
    }

    pub fn has_command(&self, name: &str) -> bool {
        self.commands.contains_key(&name.to_uppercase())
    }

    pub fn command_names(&self) -> Vec<String> {
        self.commands.keys().cloned().collect()
    }

    pub fn command_count(&self) -> usize {
        self.commands.len()
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::with_default_commands()
    }
}
