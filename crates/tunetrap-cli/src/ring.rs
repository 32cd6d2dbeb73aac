//! Fixed-capacity FIFO that overwrites the oldest entry when full.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug)]
pub struct RingBuffer<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> RingBuffer<T> {
    /// A zero capacity is bumped to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append `item`, returning the evicted oldest entry if the buffer was full.
    pub fn push(&mut self, item: T) -> Option<T> {
        let evicted = if self.items.len() == self.capacity {
            self.items.pop_front()
        } else {
            None
        };
        self.items.push_back(item);
        evicted
    }

    pub fn pop(&mut self) -> Option<T> {
        self.items.pop_front()
    }
}

/// A [`RingBuffer`] shared between the capture thread and the renderer.
#[derive(Debug)]
pub struct SharedRing<T>(Arc<Mutex<RingBuffer<T>>>);

impl<T> Clone for SharedRing<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T> SharedRing<T> {
    pub fn new(capacity: usize) -> Self {
        Self(Arc::new(Mutex::new(RingBuffer::new(capacity))))
    }

    // A panicking holder cannot leave the deque half-updated, so poison is ignored.
    fn lock(&self) -> MutexGuard<'_, RingBuffer<T>> {
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn push(&self, item: T) -> Option<T> {
        self.lock().push(item)
    }

    pub fn pop(&self) -> Option<T> {
        self.lock().pop()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_order() {
        let mut ring = RingBuffer::new(3);
        ring.push(1);
        ring.push(2);
        assert_eq!(ring.pop(), Some(1));
        assert_eq!(ring.pop(), Some(2));
        assert_eq!(ring.pop(), None);
    }

    #[test]
    fn test_overwrite_evicts_oldest() {
        let mut ring = RingBuffer::new(2);
        assert_eq!(ring.push("a"), None);
        assert_eq!(ring.push("b"), None);
        assert_eq!(ring.push("c"), Some("a"));
        assert_eq!(ring.pop(), Some("b"));
        assert_eq!(ring.pop(), Some("c"));
    }

    #[test]
    fn test_zero_capacity() {
        let mut ring = RingBuffer::new(0);
        ring.push(1);
        assert_eq!(ring.push(2), Some(1));
        assert_eq!(ring.pop(), Some(2));
    }

    #[test]
    fn test_shared_across_threads() {
        let ring = SharedRing::new(2);
        let producer = ring.clone();
        std::thread::spawn(move || {
            for i in 0..10 {
                producer.push(i);
            }
        })
        .join()
        .unwrap();

        assert_eq!(ring.pop(), Some(8));
        assert_eq!(ring.pop(), Some(9));
        assert_eq!(ring.pop(), None);
    }
}
