//! Fixed-capacity FIFO history.

use std::collections::VecDeque;

/// Ordered history that evicts its oldest entry once full
#[derive(Debug, Clone)]
pub struct BoundedHistory<T> {
    entries: VecDeque<T>,
    capacity: usize,
}

impl<T: Clone> BoundedHistory<T> {
    /// Create an empty history holding at most `capacity` entries
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append an entry, evicting the oldest one when at capacity
    pub fn push(&mut self, entry: T) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    /// Copy of the entries, oldest first
    pub fn to_vec(&self) -> Vec<T> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_below_capacity() {
        let mut history = BoundedHistory::new(3);
        history.push(1);
        history.push(2);
        assert_eq!(history.to_vec(), vec![1, 2]);
        assert_eq!(history.capacity(), 3);
    }

    #[test]
    fn test_evicts_oldest_first() {
        let mut history = BoundedHistory::new(3);
        for i in 1..=5 {
            history.push(i);
        }
        assert_eq!(history.to_vec(), vec![3, 4, 5]);
    }

    #[test]
    fn test_length_never_exceeds_capacity() {
        let mut history = BoundedHistory::new(7);
        for i in 0..100 {
            history.push(i);
            assert!(history.len() <= 7);
        }
        assert_eq!(history.len(), 7);
        assert_eq!(history.to_vec().first(), Some(&93));
    }

    #[test]
    fn test_zero_capacity_retains_nothing() {
        let mut history = BoundedHistory::new(0);
        history.push("a");
        assert!(history.is_empty());
    }
}
