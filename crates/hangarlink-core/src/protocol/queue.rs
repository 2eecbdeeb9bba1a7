//! Bounded message queue
//!
//! Hand-off between the reader thread (producer) and the session (consumer).
//! The producer never blocks: when the queue is full the newest frame is
//! dropped. Consumers block, block with a timeout, or peek.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};
use std::time::Duration;

use super::MESSAGE_QUEUE_CAPACITY;

struct QueueState {
    items: VecDeque<String>,
    shutdown: bool,
}

/// Bounded FIFO of received frames with blocking and timed access
pub struct MessageQueue {
    state: Mutex<QueueState>,
    available: Condvar,
    capacity: usize,
}

impl MessageQueue {
    /// Create a queue with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(MESSAGE_QUEUE_CAPACITY)
    }

    /// Create a queue with an explicit capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "queue capacity must be non-zero");
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::with_capacity(capacity),
                shutdown: false,
            }),
            available: Condvar::new(),
            capacity,
        }
    }

    /// Enqueue a frame without blocking.
    ///
    /// Returns `false` when the queue is full (the frame is dropped) or the
    /// queue has been shut down. The caller is expected to log the drop.
    pub fn push(&self, frame: String) -> bool {
        let mut state = self.state.lock().expect("queue lock poisoned");
        if state.shutdown || state.items.len() >= self.capacity {
            return false;
        }
        state.items.push_back(frame);
        drop(state);
        self.available.notify_one();
        true
    }

    /// Dequeue a frame, blocking until one is available.
    ///
    /// Returns `None` once the queue is shut down; a pending shutdown beats
    /// any frames still enqueued, since those belong to a closed port.
    pub fn take(&self) -> Option<String> {
        let mut state = self.state.lock().expect("queue lock poisoned");
        loop {
            if state.shutdown {
                return None;
            }
            if let Some(frame) = state.items.pop_front() {
                return Some(frame);
            }
            state = self.available.wait(state).expect("queue lock poisoned");
        }
    }

    /// Dequeue a frame, blocking at most `timeout`.
    ///
    /// Returns `None` on expiry or shutdown.
    pub fn poll(&self, timeout: Duration) -> Option<String> {
        let deadline = std::time::Instant::now() + timeout;
        let mut state = self.state.lock().expect("queue lock poisoned");
        loop {
            if state.shutdown {
                return None;
            }
            if let Some(frame) = state.items.pop_front() {
                return Some(frame);
            }
            let now = std::time::Instant::now();
            if now >= deadline {
                return None;
            }
            let (next, result) = self
                .available
                .wait_timeout(state, deadline - now)
                .expect("queue lock poisoned");
            state = next;
            if result.timed_out() && state.items.is_empty() {
                return None;
            }
        }
    }

    /// Non-blocking check for a pending frame.
    pub fn is_empty(&self) -> bool {
        self.state.lock().expect("queue lock poisoned").items.is_empty()
    }

    /// Number of pending frames.
    pub fn len(&self) -> usize {
        self.state.lock().expect("queue lock poisoned").items.len()
    }

    /// Drain pending frames and wake all blocked consumers with `None`.
    pub fn shutdown(&self) {
        let mut state = self.state.lock().expect("queue lock poisoned");
        state.shutdown = true;
        state.items.clear();
        drop(state);
        self.available.notify_all();
    }

    /// Reopen the queue for the next port, discarding any leftovers.
    pub fn reset(&self) {
        let mut state = self.state.lock().expect("queue lock poisoned");
        state.shutdown = false;
        state.items.clear();
    }
}

impl Default for MessageQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use std::time::Instant;

    #[test]
    fn test_fifo_order() {
        let queue = MessageQueue::new();
        assert!(queue.push("a".into()));
        assert!(queue.push("b".into()));
        assert!(queue.push("c".into()));
        assert_eq!(queue.take().as_deref(), Some("a"));
        assert_eq!(queue.take().as_deref(), Some("b"));
        assert_eq!(queue.take().as_deref(), Some("c"));
    }

    #[test]
    fn test_overflow_drops_newest() {
        let queue = MessageQueue::with_capacity(2);
        assert!(queue.push("first".into()));
        assert!(queue.push("second".into()));
        assert!(!queue.push("third".into()));
        // Earlier items survive in order.
        assert_eq!(queue.take().as_deref(), Some("first"));
        assert_eq!(queue.take().as_deref(), Some("second"));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_poll_timeout_expires() {
        let queue = MessageQueue::new();
        let start = Instant::now();
        assert_eq!(queue.poll(Duration::from_millis(50)), None);
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn test_poll_returns_pushed_frame() {
        let queue = Arc::new(MessageQueue::new());
        let producer = Arc::clone(&queue);
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            producer.push("late".into());
        });
        assert_eq!(
            queue.poll(Duration::from_secs(2)).as_deref(),
            Some("late")
        );
        handle.join().unwrap();
    }

    #[test]
    fn test_shutdown_wakes_blocked_take() {
        let queue = Arc::new(MessageQueue::new());
        let consumer = Arc::clone(&queue);
        let handle = std::thread::spawn(move || consumer.take());
        std::thread::sleep(Duration::from_millis(20));
        queue.shutdown();
        assert_eq!(handle.join().unwrap(), None);
    }

    #[test]
    fn test_reset_reopens_after_shutdown() {
        let queue = MessageQueue::new();
        queue.push("stale".into());
        queue.shutdown();
        assert!(!queue.push("rejected".into()));
        queue.reset();
        assert!(queue.push("fresh".into()));
        assert_eq!(queue.take().as_deref(), Some("fresh"));
    }

    #[test]
    fn test_is_empty_peek() {
        let queue = MessageQueue::new();
        assert!(queue.is_empty());
        queue.push("x".into());
        assert!(!queue.is_empty());
        assert_eq!(queue.len(), 1);
    }
}
