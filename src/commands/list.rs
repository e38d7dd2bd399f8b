//! List command implementations (RPUSH, LPUSH, LLEN, LRANGE, LPOP, BLPOP)

use crate::commands::{Command, CommandArity, CommandResult, ResponseValue};
use crate::error::CopperBeetError;
use crate::storage::DataStore;
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// RPUSH command implementation
pub struct RpushCommand;

#[async_trait]
impl Command for RpushCommand {
    async fn execute(&self, args: &[String], store: &DataStore) -> CommandResult {
        let list = store.list(&args[0]);
        let new_len = list.push_back(args[1..].to_vec());
        CommandResult::Ok(ResponseValue::Integer(new_len as i64))
    }

    fn name(&self) -> &'static str {
        "RPUSH"
    }

    fn arity(&self) -> CommandArity {
        CommandArity::AtLeast(3)
    }

    fn usage(&self) -> &'static str {
        "usage:
\trpush key element [element ...]
summary:
\tInsert all the specified values at the tail of the list stored at key.
\tIf key does not exist, it is created as an empty list before performing
\tthe push operation."
    }
}

/// LPUSH command implementation
pub struct LpushCommand;

#[async_trait]
impl Command for LpushCommand {
    async fn execute(&self, args: &[String], store: &DataStore) -> CommandResult {
        let list = store.list(&args[0]);
        let new_len = list.push_front(args[1..].to_vec());
        CommandResult::Ok(ResponseValue::Integer(new_len as i64))
    }

    fn name(&self) -> &'static str {
        "LPUSH"
    }

    fn arity(&self) -> CommandArity {
        CommandArity::AtLeast(3)
    }

    fn usage(&self) -> &'static str {
        "usage:
\tlpush key element [element ...]
summary:
\tInsert all the specified values at the head of the list stored at key.
\tIf key does not exist, it is created as an empty list before performing
\tthe push operations."
    }
}

/// LLEN command implementation
pub struct LlenCommand;

#[async_trait]
impl Command for LlenCommand {
    async fn execute(&self, args: &[String], store: &DataStore) -> CommandResult {
        match store.lists().get(&args[0]) {
            Some(list) => CommandResult::Ok(ResponseValue::Integer(list.len() as i64)),
            None => CommandResult::Error(
                CopperBeetError::KeyNotFound {
                    key: args[0].clone(),
                }
                .to_client_error(),
            ),
        }
    }

    fn name(&self) -> &'static str {
        "LLEN"
    }

    fn arity(&self) -> CommandArity {
        CommandArity::Fixed(2)
    }

    fn usage(&self) -> &'static str {
        "usage:
\tllen key
summary:
\tReturns the length of the list stored at key. An error is returned when
\tkey does not exist."
    }
}

/// LRANGE command implementation
pub struct LrangeCommand;

#[async_trait]
impl Command for LrangeCommand {
    async fn execute(&self, args: &[String], store: &DataStore) -> CommandResult {
        let start = match parse_index(&args[1], "start index") {
            Ok(i) => i,
            Err(message) => return CommandResult::Error(message),
        };
        let stop = match parse_index(&args[2], "stop index") {
            Ok(i) => i,
            Err(message) => return CommandResult::Error(message),
        };

        match store.lists().get(&args[0]) {
            Some(list) => CommandResult::Ok(ResponseValue::Array(Some(list.get_range(start, stop)))),
            None => CommandResult::Ok(ResponseValue::Array(Some(Vec::new()))),
        }
    }

    fn name(&self) -> &'static str {
        "LRANGE"
    }

    fn arity(&self) -> CommandArity {
        CommandArity::Fixed(4)
    }

    fn usage(&self) -> &'static str {
        "usage:
\tlrange key start stop
summary:
\tReturns the specified elements of the list stored at key. The offsets
\tstart and stop are zero-based indexes; they can be negative, indicating
\toffsets from the end of the list. Out of range indexes do not produce an
\terror: both endpoints are clamped and an inverted range yields an empty
\tlist."
    }
}

/// LPOP command implementation
pub struct LpopCommand;

#[async_trait]
impl Command for LpopCommand {
    async fn execute(&self, args: &[String], store: &DataStore) -> CommandResult {
        let count = if args.len() == 2 {
            match parse_index(&args[1], "count") {
                Ok(count) => count,
                Err(message) => return CommandResult::Error(message),
            }
        } else {
            1
        };

        if count < 1 {
            return CommandResult::Error("ERR Count must be a positive integer!".to_string());
        }

        match store.lists().get(&args[0]) {
            Some(list) => {
                CommandResult::Ok(ResponseValue::Array(Some(list.pop_front(count as usize))))
            }
            None => CommandResult::Ok(ResponseValue::BulkString(None)),
        }
    }

    fn name(&self) -> &'static str {
        "LPOP"
    }

    fn arity(&self) -> CommandArity {
        CommandArity::Range(2, 3)
    }

    fn usage(&self) -> &'static str {
        "usage:
\tlpop key [count]
summary:
\tRemoves and returns the first elements of the list stored at key. By
\tdefault a single element is popped; with the optional count argument the
\treply consists of up to count elements, depending on the list's length."
    }
}

/// BLPOP command implementation
///
/// The blocking variant of LPOP: when the list is empty the connection
/// suspends until a value is pushed or the timeout elapses. The reply is a
/// two-element array `[key, value]`, or a nil array on timeout.
pub struct BlpopCommand;

#[async_trait]
impl Command for BlpopCommand {
    async fn execute(&self, args: &[String], store: &DataStore) -> CommandResult {
        let key = &args[0];
        let timeout_secs = match args[1].parse::<u64>() {
            Ok(secs) => secs,
            Err(_) => {
                return CommandResult::Error(format!(
                    "ERR Could not convert '{}' to an int for timeout!",
                    args[1]
                ))
            }
        };

        let list = store.list(key);
        let delivery = list.pop_front_async(Duration::from_secs(timeout_secs));

        match delivery.await {
            Ok(mut values) => match values.pop() {
                Some(value) => CommandResult::Ok(ResponseValue::Array(Some(vec![
                    key.clone(),
                    value,
                ]))),
                None => CommandResult::Ok(ResponseValue::Array(None)),
            },
            // Delivery channel dropped without resolution (server teardown).
            Err(_) => {
                debug!(key = %key, "BLPOP delivery channel closed");
                CommandResult::Ok(ResponseValue::Array(None))
            }
        }
    }

    fn name(&self) -> &'static str {
        "BLPOP"
    }

    fn arity(&self) -> CommandArity {
        CommandArity::Fixed(3)
    }

    fn usage(&self) -> &'static str {
        "usage:
\tblpop key timeout
summary:
\tBLPOP is a blocking list pop primitive. It blocks the connection when
\tthere is no element to pop from the list stored at key, until another
\tclient pushes a value or the timeout (in seconds) elapses. A timeout of
\tzero blocks indefinitely."
    }
}

fn parse_index(raw: &str, purpose: &str) -> Result<i64, String> {
    raw.parse::<i64>().map_err(|_| {
        CopperBeetError::NotAnInteger {
            value: raw.to_string(),
            purpose: purpose.to_string(),
        }
        .to_client_error()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::time::sleep;

    fn args(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    fn integer(result: CommandResult) -> i64 {
        match result {
            CommandResult::Ok(ResponseValue::Integer(i)) => i,
            other => panic!("expected integer, got {other:?}"),
        }
    }

    fn array(result: CommandResult) -> Vec<String> {
        match result {
            CommandResult::Ok(ResponseValue::Array(Some(items))) => items,
            other => panic!("expected array, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_rpush_and_lrange() {
        let store = DataStore::new();

        let result = RpushCommand.execute(&args(&["L", "a", "b", "c"]), &store).await;
        assert_eq!(integer(result), 3);

        let result = LrangeCommand.execute(&args(&["L", "0", "-1"]), &store).await;
        assert_eq!(array(result), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_lpush_prepends() {
        let store = DataStore::new();
        RpushCommand.execute(&args(&["L", "a", "b", "c"]), &store).await;

        let result = LpushCommand.execute(&args(&["L", "z"]), &store).await;
        assert_eq!(integer(result), 4);

        let result = LrangeCommand.execute(&args(&["L", "0", "-1"]), &store).await;
        assert_eq!(array(result), vec!["z", "a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_llen_missing_key_is_error() {
        let store = DataStore::new();
        let result = LlenCommand.execute(&args(&["nope"]), &store).await;
        assert!(matches!(result, CommandResult::Error(_)));

        RpushCommand.execute(&args(&["L", "a"]), &store).await;
        let result = LlenCommand.execute(&args(&["L"]), &store).await;
        assert_eq!(integer(result), 1);
    }

    #[tokio::test]
    async fn test_lrange_missing_key_is_empty_array() {
        let store = DataStore::new();
        let result = LrangeCommand.execute(&args(&["nope", "0", "-1"]), &store).await;
        assert!(array(result).is_empty());
    }

    #[tokio::test]
    async fn test_lrange_rejects_non_numeric_indices() {
        let store = DataStore::new();
        let result = LrangeCommand.execute(&args(&["L", "zero", "-1"]), &store).await;
        assert!(matches!(result, CommandResult::Error(_)));
    }

    #[tokio::test]
    async fn test_lpop_single_and_counted() {
        let store = DataStore::new();
        RpushCommand.execute(&args(&["L", "a", "b", "c"]), &store).await;

        let result = LpopCommand.execute(&args(&["L"]), &store).await;
        assert_eq!(array(result), vec!["a"]);

        let result = LpopCommand.execute(&args(&["L", "5"]), &store).await;
        assert_eq!(array(result), vec!["b", "c"]);
    }

    #[tokio::test]
    async fn test_lpop_missing_key_is_nil_bulk() {
        let store = DataStore::new();
        let result = LpopCommand.execute(&args(&["nope"]), &store).await;
        assert_eq!(result, CommandResult::Ok(ResponseValue::BulkString(None)));
    }

    #[tokio::test]
    async fn test_lpop_rejects_non_positive_count() {
        let store = DataStore::new();
        RpushCommand.execute(&args(&["L", "a"]), &store).await;

        let result = LpopCommand.execute(&args(&["L", "0"]), &store).await;
        assert_eq!(
            result,
            CommandResult::Error("ERR Count must be a positive integer!".to_string())
        );

        let result = LpopCommand.execute(&args(&["L", "-2"]), &store).await;
        assert!(matches!(result, CommandResult::Error(_)));
    }

    #[tokio::test]
    async fn test_blpop_immediate_when_nonempty() {
        let store = DataStore::new();
        RpushCommand.execute(&args(&["Q", "ready"]), &store).await;

        let result = BlpopCommand.execute(&args(&["Q", "5"]), &store).await;
        assert_eq!(array(result), vec!["Q", "ready"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_blpop_timeout_is_nil_array() {
        let store = DataStore::new();
        let result = BlpopCommand.execute(&args(&["Q", "1"]), &store).await;
        assert_eq!(result, CommandResult::Ok(ResponseValue::Array(None)));
    }

    #[tokio::test]
    async fn test_blpop_woken_by_push() {
        let store = Arc::new(DataStore::new());

        let waiter = {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                BlpopCommand.execute(&args(&["Q", "5"]), &store).await
            })
        };

        sleep(Duration::from_millis(50)).await;
        let push_len = integer(RpushCommand.execute(&args(&["Q", "hello"]), &store).await);

        let result = waiter.await.unwrap();
        assert_eq!(array(result), vec!["Q", "hello"]);
        // Handed off directly, never buffered.
        assert_eq!(push_len, 0);
        assert_eq!(store.list("Q").len(), 0);
    }

    #[tokio::test]
    async fn test_blpop_rejects_non_numeric_timeout() {
        let store = DataStore::new();
        let result = BlpopCommand.execute(&args(&["Q", "soon"]), &store).await;
        assert!(matches!(result, CommandResult::Error(_)));
    }
}
