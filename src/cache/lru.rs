//! LRU Order Module
//!
//! Tracks key access recency for eviction decisions.

use std::collections::VecDeque;

// == LRU Order ==
/// Access-order bookkeeping for LRU eviction.
///
/// Front of the deque is the most recently used key, back is the least.
/// The O(n) removal is acceptable at the tens-to-hundreds-of-entries scale
/// this cache is designed for.
#[derive(Debug, Default)]
pub struct LruOrder {
    order: VecDeque<String>,
}

impl LruOrder {
    /// Creates an empty order tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a key as most recently used.
    pub fn touch(&mut self, key: &str) {
        self.forget(key);
        self.order.push_front(key.to_string());
    }

    /// Drops a key from the bookkeeping, if present.
    pub fn forget(&mut self, key: &str) {
        self.order.retain(|k| k != key);
    }

    /// Removes and returns the least recently used key.
    pub fn pop_lru(&mut self) -> Option<String> {
        self.order.pop_back()
    }

    /// Least recently used key without removing it.
    #[allow(dead_code)]
    pub fn peek_lru(&self) -> Option<&String> {
        self.order.back()
    }

    /// Number of tracked keys.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Drops all bookkeeping.
    pub fn clear(&mut self) {
        self.order.clear();
    }
}
