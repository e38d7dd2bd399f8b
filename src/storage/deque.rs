//! Concurrent double-ended ring-buffer deque with blocking consumers
//!
//! A power-of-two ring buffer that doubles as a single-producer /
//! multi-consumer blocking queue. Consumers that find the deque empty park
//! a one-shot delivery channel in a FIFO waiter queue; a later push hands
//! values directly to waiters, oldest first, without the handed-off value
//! ever entering the ring. A waiter resolves exactly once: delivery and
//! deadline expiry both have to remove it (and its sender) from the queue
//! under the exclusive lock, so the race settles to a single outcome.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::trace;

const INITIAL_CAPACITY: usize = 16;

struct Waiter<T> {
    id: u64,
    tx: oneshot::Sender<Vec<T>>,
}

struct DequeState<T> {
    buf: Vec<Option<T>>,
    head: usize,
    tail: usize,
    count: usize,
    waiters: VecDeque<Waiter<T>>,
}

impl<T> DequeState<T> {
    fn mask(&self) -> usize {
        self.buf.len() - 1
    }

    /// Grow by doubling until `target` elements fit, re-linearizing so the
    /// occupied region starts at index zero.
    fn reserve(&mut self, additional: usize) {
        let target = self.count + additional;
        if target <= self.buf.len() {
            return;
        }

        let mut new_size = self.buf.len().max(1);
        while new_size < target {
            new_size <<= 1;
        }

        let old_mask = self.mask();
        let mut new_buf: Vec<Option<T>> = (0..new_size).map(|_| None).collect();
        for i in 0..self.count {
            new_buf[i] = self.buf[(self.head + i) & old_mask].take();
        }

        self.buf = new_buf;
        self.head = 0;
        self.tail = self.count;
    }

    /// Offer `value` to the oldest pending waiter. Returns the value back
    /// when it must be stored instead (buffer non-empty, or no waiter left
    /// alive to take it).
    fn hand_off(&mut self, mut value: T) -> Option<T> {
        if self.count > 0 {
            return Some(value);
        }
        while let Some(waiter) = self.waiters.pop_front() {
            match waiter.tx.send(vec![value]) {
                Ok(()) => {
                    trace!(waiter = waiter.id, "Value handed off to waiter");
                    return None;
                }
                // Receiver abandoned (caller timed out or shut down); the
                // value moves on to the next waiter.
                Err(mut returned) => match returned.pop() {
                    Some(v) => value = v,
                    None => return None,
                },
            }
        }
        Some(value)
    }

    fn store_back(&mut self, value: T) {
        let mask = self.mask();
        self.buf[self.tail] = Some(value);
        self.tail = (self.tail + 1) & mask;
        self.count += 1;
    }

    fn store_front(&mut self, value: T) {
        let mask = self.mask();
        self.head = (self.head + self.buf.len() - 1) & mask;
        self.buf[self.head] = Some(value);
        self.count += 1;
    }

    fn pop_front(&mut self, n: usize) -> Vec<T> {
        let n = n.min(self.count);
        let mut result = Vec::with_capacity(n);
        for _ in 0..n {
            let mask = self.mask();
            if let Some(value) = self.buf[self.head].take() {
                result.push(value);
            }
            self.head = (self.head + 1) & mask;
            self.count -= 1;
        }
        result
    }
}

/// Concurrent deque whose `pop_front_async` suspends the caller until a
/// value arrives or a deadline fires
pub struct BlockingDeque<T> {
    state: RwLock<DequeState<T>>,
    next_waiter_id: AtomicU64,
}

impl<T> Default for BlockingDeque<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> BlockingDeque<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            state: RwLock::new(DequeState {
                buf: (0..INITIAL_CAPACITY).map(|_| None).collect(),
                head: 0,
                tail: 0,
                count: 0,
                waiters: VecDeque::new(),
            }),
            next_waiter_id: AtomicU64::new(0),
        }
    }

    /// Append `values`, handing them to pending waiters first (oldest
    /// waiter gets the first value). Returns the buffer length after the
    /// push; handed-off values never entered the buffer and are not
    /// counted.
    pub fn push_back(&self, values: Vec<T>) -> usize {
        let mut state = self.state.write().unwrap();
        state.reserve(values.len());
        for value in values {
            if let Some(value) = state.hand_off(value) {
                state.store_back(value);
            }
        }
        state.count
    }

    /// Prepend `values` one by one, so the last pushed value ends up at the
    /// head. Waiter handoff applies exactly as in `push_back`, in the order
    /// the values are given.
    pub fn push_front(&self, values: Vec<T>) -> usize {
        let mut state = self.state.write().unwrap();
        state.reserve(values.len());
        for value in values {
            if let Some(value) = state.hand_off(value) {
                state.store_front(value);
            }
        }
        state.count
    }

    /// Remove and return up to `n` elements from the head
    pub fn pop_front(&self, n: usize) -> Vec<T> {
        self.state.write().unwrap().pop_front(n)
    }

    /// Pop one element asynchronously. The returned channel yields a
    /// one-element sequence on success or an empty sequence when `timeout`
    /// elapses first; a zero `timeout` waits indefinitely.
    pub fn pop_front_async(self: &Arc<Self>, timeout: Duration) -> oneshot::Receiver<Vec<T>> {
        let (tx, rx) = oneshot::channel();

        let mut state = self.state.write().unwrap();
        if state.count > 0 {
            let values = state.pop_front(1);
            drop(state);
            let _ = tx.send(values);
            return rx;
        }

        let id = self.next_waiter_id.fetch_add(1, Ordering::Relaxed);
        state.waiters.push_back(Waiter { id, tx });
        drop(state);

        if !timeout.is_zero() {
            let deque = Arc::clone(self);
            tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                deque.expire_waiter(id);
            });
        }

        rx
    }

    /// Inclusive range read with Redis index semantics: negative indices
    /// count from the end, both endpoints are clamped to the valid range,
    /// and an inverted range yields nothing.
    pub fn get_range(&self, start: i64, stop: i64) -> Vec<T> {
        let state = self.state.read().unwrap();
        if state.count == 0 {
            return Vec::new();
        }

        let count = state.count as i64;
        let mut start = if start < 0 { count + start } else { start };
        let mut stop = if stop < 0 { count + stop } else { stop };

        start = start.max(0);
        stop = stop.min(count - 1);

        if start > stop {
            return Vec::new();
        }

        let n = (stop - start + 1) as usize;
        let mask = state.mask();
        let mut result = Vec::with_capacity(n);
        for i in 0..n {
            let physical = (state.head + start as usize + i) & mask;
            if let Some(value) = &state.buf[physical] {
                result.push(value.clone());
            }
        }
        result
    }

    pub fn len(&self) -> usize {
        self.state.read().unwrap().count
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove the waiter `id` if still pending and resolve it with the
    /// timeout outcome (an empty sequence)
    fn expire_waiter(&self, id: u64) {
        let mut state = self.state.write().unwrap();
        if let Some(pos) = state.waiters.iter().position(|w| w.id == id) {
            if let Some(waiter) = state.waiters.remove(pos) {
                drop(state);
                trace!(waiter = id, "Waiter deadline fired");
                let _ = waiter.tx.send(Vec::new());
            }
        }
    }
}
