//! String command implementations (SET, GET)

use crate::commands::{Command, CommandArity, CommandResult, ResponseValue};
use crate::storage::DataStore;
use async_trait::async_trait;
use std::time::Duration;

/// SET command implementation
///
/// Sets a key to hold the string value. Only the `PX <milliseconds>`
/// expiry option is honored; other options are accepted and ignored.
pub struct SetCommand;

#[async_trait]
impl Command for SetCommand {
    async fn execute(&self, args: &[String], store: &DataStore) -> CommandResult {
        let key = &args[0];
        let value = &args[1];

        if key.is_empty() {
            return CommandResult::Error("ERR Key cannot be empty!".to_string());
        }
        if value.is_empty() {
            return CommandResult::Error("ERR Value cannot be empty!".to_string());
        }

        let mut expiry_ms: u64 = 0;
        let mut i = 2;
        while i < args.len() {
            if args[i].eq_ignore_ascii_case("PX") {
                let Some(raw) = args.get(i + 1) else {
                    return CommandResult::Error("ERR No expiration specified!".to_string());
                };
                expiry_ms = match raw.parse() {
                    Ok(ms) => ms,
                    Err(_) => {
                        return CommandResult::Error(format!(
                            "ERR Could not convert '{raw}' to an int for expiry!"
                        ))
                    }
                };
                i += 1;
            }
            i += 1;
        }

        store.strings().set(
            key.clone(),
            value.clone(),
            Duration::from_millis(expiry_ms),
        );
        CommandResult::Ok(ResponseValue::SimpleString("OK".to_string()))
    }

    fn name(&self) -> &'static str {
        "SET"
    }

    fn arity(&self) -> CommandArity {
        CommandArity::AtLeast(3)
    }

    fn usage(&self) -> &'static str {
        "usage:
\tset key value [PX milliseconds]
summary:
\tSet key to hold the string value. If key already holds a value, it is
\toverwritten and any previous time to live is discarded. Only the PX
\tmilliseconds expiry option is implemented; other options are ignored."
    }
}

/// GET command implementation
pub struct GetCommand;

#[async_trait]
impl Command for GetCommand {
    async fn execute(&self, args: &[String], store: &DataStore) -> CommandResult {
        let key = &args[0];
        match store.strings().get(key) {
            Some(value) => CommandResult::Ok(ResponseValue::BulkString(Some(value))),
            None => CommandResult::Ok(ResponseValue::BulkString(None)),
        }
    }

    fn name(&self) -> &'static str {
        "GET"
    }

    fn arity(&self) -> CommandArity {
        CommandArity::Fixed(2)
    }

    fn usage(&self) -> &'static str {
        "usage:
\tget key
summary:
\tGet the value of key. If the key does not exist the special value nil
\tis returned."
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{advance, sleep};

    fn args(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let store = DataStore::new();

        let result = SetCommand.execute(&args(&["k", "v"]), &store).await;
        assert_eq!(
            result,
            CommandResult::Ok(ResponseValue::SimpleString("OK".to_string()))
        );

        let result = GetCommand.execute(&args(&["k"]), &store).await;
        assert_eq!(
            result,
            CommandResult::Ok(ResponseValue::BulkString(Some("v".to_string())))
        );
    }

    #[tokio::test]
    async fn test_get_missing_key_is_nil() {
        let store = DataStore::new();
        let result = GetCommand.execute(&args(&["nope"]), &store).await;
        assert_eq!(result, CommandResult::Ok(ResponseValue::BulkString(None)));
    }

    #[tokio::test]
    async fn test_set_rejects_empty_key_and_value() {
        let store = DataStore::new();

        let result = SetCommand.execute(&args(&["", "v"]), &store).await;
        assert_eq!(
            result,
            CommandResult::Error("ERR Key cannot be empty!".to_string())
        );

        let result = SetCommand.execute(&args(&["k", ""]), &store).await;
        assert_eq!(
            result,
            CommandResult::Error("ERR Value cannot be empty!".to_string())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_with_px_expires() {
        let store = DataStore::new();

        let result = SetCommand.execute(&args(&["k", "v1", "PX", "50"]), &store).await;
        assert_eq!(
            result,
            CommandResult::Ok(ResponseValue::SimpleString("OK".to_string()))
        );

        advance(Duration::from_millis(200)).await;
        let result = GetCommand.execute(&args(&["k"]), &store).await;
        assert_eq!(result, CommandResult::Ok(ResponseValue::BulkString(None)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_overwrite_discards_old_ttl() {
        let store = DataStore::new();

        SetCommand.execute(&args(&["k", "old", "PX", "10"]), &store).await;
        SetCommand.execute(&args(&["k", "new"]), &store).await;

        sleep(Duration::from_millis(50)).await;
        let result = GetCommand.execute(&args(&["k"]), &store).await;
        assert_eq!(
            result,
            CommandResult::Ok(ResponseValue::BulkString(Some("new".to_string())))
        );
    }

    #[tokio::test]
    async fn test_set_px_requires_numeric_value() {
        let store = DataStore::new();
        let result = SetCommand.execute(&args(&["k", "v", "PX", "soon"]), &store).await;
        match result {
            CommandResult::Error(msg) => assert!(msg.contains("Could not convert 'soon'")),
            other => panic!("expected error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_set_px_without_value_is_error() {
        let store = DataStore::new();
        let result = SetCommand.execute(&args(&["k", "v", "PX"]), &store).await;
        assert_eq!(
            result,
            CommandResult::Error("ERR No expiration specified!".to_string())
        );
    }

    #[tokio::test]
    async fn test_set_ignores_unknown_options() {
        let store = DataStore::new();
        let result = SetCommand.execute(&args(&["k", "v", "NX", "KEEPTTL"]), &store).await;
        assert_eq!(
            result,
            CommandResult::Ok(ResponseValue::SimpleString("OK".to_string()))
        );
        assert_eq!(store.strings().get(&"k".to_string()), Some("v".to_string()));
    }
}
