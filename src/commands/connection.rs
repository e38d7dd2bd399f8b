//! Connection commands (PING, ECHO)

use crate::commands::{Command, CommandArity, CommandResult, ResponseValue};
use crate::storage::DataStore;
use async_trait::async_trait;

/// PING command implementation
pub struct PingCommand;

#[async_trait]
impl Command for PingCommand {
    async fn execute(&self, _args: &[String], _store: &DataStore) -> CommandResult {
        CommandResult::Ok(ResponseValue::SimpleString("PONG".to_string()))
    }

    fn name(&self) -> &'static str {
        "PING"
    }

    fn arity(&self) -> CommandArity {
        CommandArity::Fixed(1)
    }

    fn usage(&self) -> &'static str {
        "usage:
\tPING
summary:
\tReturns PONG. Useful for testing whether a connection is still alive
\tand for measuring latency."
    }
}

/// ECHO command implementation
pub struct EchoCommand;

#[async_trait]
impl Command for EchoCommand {
    async fn execute(&self, args: &[String], _store: &DataStore) -> CommandResult {
        CommandResult::Ok(ResponseValue::BulkString(Some(args[0].clone())))
    }

    fn name(&self) -> &'static str {
        "ECHO"
    }

    fn arity(&self) -> CommandArity {
        CommandArity::Fixed(2)
    }

    fn usage(&self) -> &'static str {
        "usage:
\techo message
summary:
\tReturns message."
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ping_replies_pong() {
        let store = DataStore::new();
        let result = PingCommand.execute(&[], &store).await;
        assert_eq!(
            result,
            CommandResult::Ok(ResponseValue::SimpleString("PONG".to_string()))
        );
    }

    #[tokio::test]
    async fn test_echo_replies_argument() {
        let store = DataStore::new();
        let result = EchoCommand.execute(&["hello".to_string()], &store).await;
        assert_eq!(
            result,
            CommandResult::Ok(ResponseValue::BulkString(Some("hello".to_string())))
        );
    }

    #[tokio::test]
    async fn test_echo_preserves_empty_string() {
        let store = DataStore::new();
        let result = EchoCommand.execute(&["".to_string()], &store).await;
        assert_eq!(
            result,
            CommandResult::Ok(ResponseValue::BulkString(Some("".to_string())))
        );
    }
}
