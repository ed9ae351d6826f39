//! Bounded drop-oldest queue

use std::collections::VecDeque;

/// FIFO that keeps the newest `capacity` items.
///
/// Pushing into a full queue evicts the oldest item.
#[derive(Debug, Clone)]
pub struct PacketQueue<T> {
    items: VecDeque<T>,
    capacity: usize,
    dropped: u64,
}

impl<T> PacketQueue<T> {
    /// A capacity of 0 is raised to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self { items: VecDeque::with_capacity(capacity), capacity, dropped: 0 }
    }

    /// Append `item`, returning the evicted item if the queue was full.
    pub fn push(&mut self, item: T) -> Option<T> {
        let evicted = if self.items.len() >= self.capacity {
            self.dropped += 1;
            self.items.pop_front()
        } else {
            None
        };
        self.items.push_back(item);
        evicted
    }

    /// Oldest item.
    pub fn pop(&mut self) -> Option<T> {
        self.items.pop_front()
    }

    /// Everything queued, oldest first.
    pub fn drain(&mut self) -> Vec<T> {
        self.items.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Items evicted since creation.
    pub fn dropped_count(&self) -> u64 {
        self.dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn overflow_drops_oldest() {
        let mut queue = PacketQueue::new(100);
        for i in 0..150 {
            queue.push(i);
        }
        assert_eq!(queue.len(), 100);
        assert_eq!(queue.dropped_count(), 50);
        assert_eq!(queue.drain(), (50..150).collect::<Vec<_>>());
        assert!(queue.is_empty());
    }

    #[test]
    fn push_returns_evicted_item() {
        let mut queue = PacketQueue::new(2);
        assert_eq!(queue.push('a'), None);
        assert_eq!(queue.push('b'), None);
        assert_eq!(queue.push('c'), Some('a'));
        assert_eq!(queue.pop(), Some('b'));
        assert_eq!(queue.pop(), Some('c'));
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn zero_capacity_holds_one() {
        let mut queue = PacketQueue::new(0);
        queue.push(1);
        queue.push(2);
        assert_eq!(queue.capacity(), 1);
        assert_eq!(queue.drain(), vec![2]);
    }

    proptest! {
        #[test]
        fn prop_drain_returns_newest_in_order(capacity in 1usize..64, pushes in 0usize..256) {
            let mut queue = PacketQueue::new(capacity);
            for i in 0..pushes {
                queue.push(i);
            }
            let expected: Vec<_> = (pushes.saturating_sub(capacity)..pushes).collect();
            prop_assert_eq!(queue.drain(), expected);
            prop_assert_eq!(queue.dropped_count(), pushes.saturating_sub(capacity) as u64);
        }
    }
}
