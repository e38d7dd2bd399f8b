//! In-memory storage: the string cache and the list store
//!
//! Both stores are process-global and independently locked; command
//! handlers touch at most one of them per operation.

pub mod deque;
pub mod ttl_map;

pub use deque::BlockingDeque;
pub use ttl_map::TtlMap;

use std::sync::Arc;

/// The server's shared data structures, handed to every command handler
#[derive(Default)]
pub struct DataStore {
    strings: TtlMap<String, String>,
    lists: TtlMap<String, Arc<BlockingDeque<String>>>,
}

impl DataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// String keys with per-key millisecond TTL
    pub fn strings(&self) -> &TtlMap<String, String> {
        &self.strings
    }

    /// List keys; each maps to the sole handle of its deque
    pub fn lists(&self) -> &TtlMap<String, Arc<BlockingDeque<String>>> {
        &self.lists
    }

    /// Fetch the deque for `key`, creating an empty one on first reference
    pub fn list(&self, key: &str) -> Arc<BlockingDeque<String>> {
        self.lists
            .get_or_create(&key.to_string(), || Arc::new(BlockingDeque::new()))
    }
}
