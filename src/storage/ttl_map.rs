//! Concurrent keyed map with per-key TTL
//!
//! A readers-writer-locked hash map where each entry may carry an expiry
//! deadline. Reads apply passive expiration (an entry past its deadline is
//! reported absent without being mutated); a per-entry timer task performs
//! the active deletion. Every write stamps the entry with a fresh
//! generation, and the timer deletes only if its generation still matches,
//! so a stale timer can never remove a value written after it was armed.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::trace;

#[derive(Debug)]
struct MapEntry<V> {
    data: V,
    expires_at: Option<Instant>,
    generation: u64,
    timer: Option<AbortHandle>,
}

impl<V> MapEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| now >= deadline)
    }
}

/// Concurrent map with per-key expiry and single-owner lazy construction
#[derive(Debug)]
pub struct TtlMap<K, V> {
    entries: Arc<RwLock<HashMap<K, MapEntry<V>>>>,
    generation: AtomicU64,
}

impl<K, V> Default for TtlMap<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> TtlMap<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            generation: AtomicU64::new(0),
        }
    }

    /// Fetch the value for `key`, treating entries past their deadline as
    /// absent. Never mutates; the timer task does the actual removal.
    pub fn get(&self, key: &K) -> Option<V> {
        let entries = self.entries.read().unwrap();
        let entry = entries.get(key)?;
        if entry.is_expired(Instant::now()) {
            return None;
        }
        Some(entry.data.clone())
    }

    /// Insert `value` under `key`, replacing any previous entry and
    /// cancelling its timer. A `ttl` of zero means the entry never expires;
    /// otherwise a timer task is armed that deletes the entry once the
    /// deadline passes, provided the entry still carries this write's
    /// generation.
    pub fn set(&self, key: K, value: V, ttl: Duration) {
        let mut entries = self.entries.write().unwrap();

        if let Some(previous) = entries.get(&key) {
            if let Some(timer) = &previous.timer {
                timer.abort();
            }
        }

        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let mut entry = MapEntry {
            data: value,
            expires_at: None,
            generation,
            timer: None,
        };

        if !ttl.is_zero() {
            let deadline = Instant::now() + ttl;
            entry.expires_at = Some(deadline);
            entry.timer = Some(Self::arm_timer(
                Arc::clone(&self.entries),
                key.clone(),
                generation,
                deadline,
            ));
        }

        entries.insert(key, entry);
    }

    /// Remove `key`, cancelling its timer. Returns whether an entry was
    /// present (expired or not).
    pub fn delete(&self, key: &K) -> bool {
        let mut entries = self.entries.write().unwrap();
        match entries.remove(key) {
            Some(entry) => {
                if let Some(timer) = &entry.timer {
                    timer.abort();
                }
                true
            }
            None => false,
        }
    }

    /// Return the live value for `key`, constructing it with `factory` if
    /// the key is absent or expired. The read-locked fast path covers the
    /// common hit; the write-locked slow path re-checks before invoking the
    /// factory, so the factory runs at most once per observed-absent state.
    /// Entries created here carry no expiry.
    pub fn get_or_create(&self, key: &K, factory: impl FnOnce() -> V) -> V {
        if let Some(data) = self.get(key) {
            return data;
        }

        let mut entries = self.entries.write().unwrap();

        if let Some(entry) = entries.get(key) {
            if !entry.is_expired(Instant::now()) {
                return entry.data.clone();
            }
            // Expired under our feet: cancel the doomed timer and overwrite.
            if let Some(timer) = &entry.timer {
                timer.abort();
            }
        }

        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let data = factory();
        entries.insert(
            key.clone(),
            MapEntry {
                data: data.clone(),
                expires_at: None,
                generation,
                timer: None,
            },
        );
        data
    }

    /// Number of entries, including not-yet-reaped expired ones
    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().unwrap().is_empty()
    }

    fn arm_timer(
        entries: Arc<RwLock<HashMap<K, MapEntry<V>>>>,
        key: K,
        generation: u64,
        deadline: Instant,
    ) -> AbortHandle {
        let task = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;

            let mut entries = entries.write().unwrap();
            // Delete only if the firing timer is the entry's registered one;
            // a later write replaced the generation and owns the key now.
            if entries
                .get(&key)
                .is_some_and(|entry| entry.generation == generation)
            {
                entries.remove(&key);
                trace!("Expired entry removed");
            }
        });
        task.abort_handle()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use tokio::time::{advance, sleep};

    #[tokio::test]
    async fn test_set_then_get() {
        let map = TtlMap::new();
        map.set("k".to_string(), "v".to_string(), Duration::ZERO);
        assert_eq!(map.get(&"k".to_string()), Some("v".to_string()));
        assert_eq!(map.get(&"missing".to_string()), None);
    }

    #[tokio::test]
    async fn test_get_is_idempotent() {
        let map = TtlMap::new();
        map.set("k".to_string(), "v".to_string(), Duration::ZERO);
        let first = map.get(&"k".to_string());
        let second = map.get(&"k".to_string());
        assert_eq!(first, second);
        assert_eq!(map.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_passive_expiration() {
        let map = TtlMap::new();
        map.set("k".to_string(), "v".to_string(), Duration::from_millis(50));
        assert_eq!(map.get(&"k".to_string()), Some("v".to_string()));

        advance(Duration::from_millis(51)).await;
        assert_eq!(map.get(&"k".to_string()), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_active_expiration_removes_entry() {
        let map = TtlMap::new();
        map.set("k".to_string(), "v".to_string(), Duration::from_millis(50));
        assert_eq!(map.len(), 1);

        // Let the timer task fire.
        sleep(Duration::from_millis(60)).await;
        assert_eq!(map.len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overwrite_cancels_previous_timer() {
        let map = TtlMap::new();

        for _ in 0..100 {
            map.set("race-key".to_string(), "old".to_string(), Duration::from_nanos(1));
            map.set("race-key".to_string(), "new".to_string(), Duration::from_secs(3600));

            // Give any runaway timer the chance to fire.
            sleep(Duration::from_millis(10)).await;

            assert_eq!(
                map.get(&"race-key".to_string()),
                Some("new".to_string()),
                "key was deleted by a stale timer"
            );
        }
    }

    #[tokio::test]
    async fn test_delete_removes_entry() {
        let map = TtlMap::new();
        map.set("k".to_string(), "v".to_string(), Duration::ZERO);
        assert!(map.delete(&"k".to_string()));
        assert!(!map.delete(&"k".to_string()));
        assert_eq!(map.get(&"k".to_string()), None);
    }

    #[tokio::test]
    async fn test_get_or_create_returns_existing() {
        let map = TtlMap::new();
        map.set("k".to_string(), "v".to_string(), Duration::ZERO);
        let value = map.get_or_create(&"k".to_string(), || "other".to_string());
        assert_eq!(value, "v");
    }

    #[tokio::test]
    async fn test_get_or_create_invokes_factory_once() {
        let map = Arc::new(TtlMap::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let map = Arc::clone(&map);
            let calls = Arc::clone(&calls);
            handles.push(tokio::spawn(async move {
                map.get_or_create(&"k".to_string(), || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    "created".to_string()
                })
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap(), "created");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_or_create_replaces_expired_entry() {
        let map = TtlMap::new();
        map.set("k".to_string(), "old".to_string(), Duration::from_millis(10));
        advance(Duration::from_millis(11)).await;

        let value = map.get_or_create(&"k".to_string(), || "fresh".to_string());
        assert_eq!(value, "fresh");
        assert_eq!(map.get(&"k".to_string()), Some("fresh".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_value_survives_full_ttl_window() {
        let map = TtlMap::new();
        map.set("k".to_string(), "v".to_string(), Duration::from_millis(100));

        advance(Duration::from_millis(99)).await;
        assert_eq!(map.get(&"k".to_string()), Some("v".to_string()));

        advance(Duration::from_millis(2)).await;
        assert_eq!(map.get(&"k".to_string()), None);
    }
}
