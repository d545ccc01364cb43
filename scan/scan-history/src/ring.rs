//! Fixed-capacity ring buffer.

use std::collections::VecDeque;

/// A fixed-capacity history that evicts its oldest entry on overflow.
///
/// Push and eviction are O(1).
///
/// # Example
///
/// ```
/// use scan_history::BoundedHistory;
///
/// let mut history = BoundedHistory::new(3);
/// for i in 0..5 {
///     history.push(i);
/// }
///
/// assert_eq!(history.len(), 3);
/// assert_eq!(history.oldest(), Some(&2));
/// assert_eq!(history.latest(), Some(&4));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundedHistory<T> {
    capacity: usize,
    entries: VecDeque<T>,
}

impl<T> BoundedHistory<T> {
    /// Creates an empty history. A capacity of zero is raised to one.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity.min(1024)),
        }
    }

    /// Maximum number of retained entries.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of retained entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns true if the next push evicts.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    /// Appends an entry, returning the evicted oldest entry if at capacity.
    pub fn push(&mut self, value: T) -> Option<T> {
        let evicted = if self.is_full() {
            self.entries.pop_front()
        } else {
            None
        };
        self.entries.push_back(value);
        evicted
    }

    /// Most recent entry.
    #[must_use]
    pub fn latest(&self) -> Option<&T> {
        self.entries.back()
    }

    /// Oldest retained entry.
    #[must_use]
    pub fn oldest(&self) -> Option<&T> {
        self.entries.front()
    }

    /// Iterates oldest to newest.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + ExactSizeIterator + '_ {
        self.entries.iter()
    }

    /// Removes all entries.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Removes and returns all entries, oldest first.
    pub fn drain(&mut self) -> Vec<T> {
        self.entries.drain(..).collect()
    }
}

impl<T: Clone> BoundedHistory<T> {
    /// Owned copy of the entries, oldest first.
    #[must_use]
    pub fn snapshot(&self) -> Vec<T> {
        self.entries.iter().cloned().collect()
    }

    /// Owned copy of the newest `n` entries, oldest first.
    #[must_use]
    pub fn last_n(&self, n: usize) -> Vec<T> {
        let skip = self.entries.len().saturating_sub(n);
        self.entries.iter().skip(skip).cloned().collect()
    }
}

impl<T> Extend<T> for BoundedHistory<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for value in iter {
            self.push(value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_capacity_is_raised() {
        let mut h = BoundedHistory::new(0);
        assert_eq!(h.capacity(), 1);
        assert_eq!(h.push('a'), None);
        assert_eq!(h.push('b'), Some('a'));
        assert_eq!(h.snapshot(), vec!['b']);
    }

    #[test]
    fn evicts_oldest_first() {
        let mut h = BoundedHistory::new(3);
        assert_eq!(h.push(1), None);
        assert_eq!(h.push(2), None);
        assert_eq!(h.push(3), None);
        assert!(h.is_full());
        assert_eq!(h.push(4), Some(1));
        assert_eq!(h.push(5), Some(2));
        assert_eq!(h.snapshot(), vec![3, 4, 5]);
    }

    #[test]
    fn last_n_and_drain() {
        let mut h = BoundedHistory::new(10);
        h.extend(0..6);
        assert_eq!(h.last_n(2), vec![4, 5]);
        assert_eq!(h.last_n(100).len(), 6);
        assert_eq!(h.drain(), vec![0, 1, 2, 3, 4, 5]);
        assert!(h.is_empty());
    }

    #[test]
    fn iter_is_oldest_to_newest() {
        let mut h = BoundedHistory::new(2);
        h.extend(["x", "y", "z"]);
        let collected: Vec<_> = h.iter().copied().collect();
        assert_eq!(collected, vec!["y", "z"]);
        assert_eq!(h.iter().rev().next(), Some(&"z"));
    }
}
