//! Per-key bounded histories.

use std::hash::Hash;

use hashbrown::HashMap;

use crate::BoundedHistory;

/// One [`BoundedHistory`] per key, all sharing the same capacity.
///
/// # Example
///
/// ```
/// use scan_history::KeyedHistory;
///
/// let mut history = KeyedHistory::new(2);
/// history.record("a", 1);
/// history.record("a", 2);
/// history.record("a", 3);
/// history.record("b", 10);
///
/// assert_eq!(history.snapshot(&"a"), vec![2, 3]);
/// assert_eq!(history.latest(&"b"), Some(&10));
/// ```
#[derive(Debug, Clone)]
pub struct KeyedHistory<K, T> {
    capacity: usize,
    entries: HashMap<K, BoundedHistory<T>>,
}

impl<K: Eq + Hash, T> KeyedHistory<K, T> {
    /// Creates an empty map whose per-key histories hold `capacity` entries.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: HashMap::new(),
        }
    }

    /// Per-key capacity.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Appends under `key`, returning the evicted entry if that key was full.
    pub fn record(&mut self, key: K, value: T) -> Option<T> {
        let capacity = self.capacity;
        self.entries
            .entry(key)
            .or_insert_with(|| BoundedHistory::new(capacity))
            .push(value)
    }

    /// History for `key`, if anything was recorded.
    #[must_use]
    pub fn get(&self, key: &K) -> Option<&BoundedHistory<T>> {
        self.entries.get(key)
    }

    /// Newest entry for `key`.
    #[must_use]
    pub fn latest(&self, key: &K) -> Option<&T> {
        self.entries.get(key).and_then(BoundedHistory::latest)
    }

    /// Entry count for `key`.
    #[must_use]
    pub fn len_of(&self, key: &K) -> usize {
        self.entries.get(key).map_or(0, BoundedHistory::len)
    }

    /// Drops the history for `key` and returns its entries, oldest first.
    pub fn remove(&mut self, key: &K) -> Option<Vec<T>> {
        self.entries.remove(key).map(|mut h| h.drain())
    }

    /// Keys with a recorded history.
    pub fn keys(&self) -> impl Iterator<Item = &K> + '_ {
        self.entries.keys()
    }

    /// Number of keys.
    #[must_use]
    pub fn key_count(&self) -> usize {
        self.entries.len()
    }
}

impl<K: Eq + Hash, T: Clone> KeyedHistory<K, T> {
    /// Owned copy of the history for `key`, oldest first. Empty if unknown.
    #[must_use]
    pub fn snapshot(&self, key: &K) -> Vec<T> {
        self.entries
            .get(key)
            .map(BoundedHistory::snapshot)
            .unwrap_or_default()
    }
}
