//! Thread-safe FIFO handoff queue with blocking and non-blocking consumers.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};

use thiserror::Error;

/// What a bounded queue does when a send arrives at capacity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Evict the head to make room for the new item.
    #[default]
    DropOldest,
    /// Hand the new item back to the sender.
    Reject,
}

/// A send that could not be queued; the item is returned to the caller.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SendError<T> {
    #[error("queue closed")]
    Closed(T),
    #[error("queue full")]
    Full(T),
}

impl<T> SendError<T> {
    #[allow(dead_code)]
    pub fn into_inner(self) -> T {
        match self {
            SendError::Closed(item) | SendError::Full(item) => item,
        }
    }
}

/// Lifetime counters; advisory like [`MessageQueue::len`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub sent: u64,
    pub received: u64,
    pub dropped: u64,
    pub rejected: u64,
}

/// A minimal, synchronized FIFO queue for handing items between threads.
pub struct MessageQueue<T> {
    inner: Mutex<QueueState<T>>,
    available: Condvar,
}

struct QueueState<T> {
    queue: VecDeque<T>,
    closed: bool,
    limit: Option<(usize, OverflowPolicy)>,
    stats: QueueStats,
}

impl<T> QueueState<T> {
    fn pop(&mut self) -> Option<T> {
        let item = self.queue.pop_front()?;
        self.stats.received += 1;
        Some(item)
    }
}

impl<T> MessageQueue<T> {
    /// Create an empty, unbounded queue.
    pub fn new() -> Self {
        Self::with_limit(None)
    }

    /// Create an empty queue holding at most `capacity` items.
    pub fn bounded(capacity: usize, policy: OverflowPolicy) -> Self {
        debug_assert!(capacity > 0, "capacity must be > 0");
        Self::with_limit(Some((capacity.max(1), policy)))
    }

    fn with_limit(limit: Option<(usize, OverflowPolicy)>) -> Self {
        Self {
            inner: Mutex::new(QueueState {
                queue: VecDeque::new(),
                closed: false,
                limit,
                stats: QueueStats::default(),
            }),
            available: Condvar::new(),
        }
    }

    /// Append an item; never blocks.
    pub fn send(&self, item: T) -> Result<(), SendError<T>> {
        let mut guard = self.inner.lock().expect("message queue mutex poisoned");
        if guard.closed {
            return Err(SendError::Closed(item));
        }
        if let Some((capacity, policy)) = guard.limit {
            if guard.queue.len() >= capacity {
                match policy {
                    OverflowPolicy::DropOldest => {
                        guard.queue.pop_front();
                        guard.stats.dropped += 1;
                    }
                    OverflowPolicy::Reject => {
                        guard.stats.rejected += 1;
                        return Err(SendError::Full(item));
                    }
                }
            }
        }
        guard.queue.push_back(item);
        guard.stats.sent += 1;
        self.available.notify_one();
        Ok(())
    }

    /// Try to take the head immediately without blocking.
    pub fn try_receive(&self) -> Option<T> {
        let mut guard = self.inner.lock().expect("message queue mutex poisoned");
        guard.pop()
    }

    /// Block until an item is available; `None` once closed and drained.
    pub fn receive_blocking(&self) -> Option<T> {
        let mut guard = self.inner.lock().expect("message queue mutex poisoned");
        loop {
            if let Some(item) = guard.pop() {
                return Some(item);
            }
            if guard.closed {
                return None;
            }
            // Wait releases the lock and re-acquires it before returning.
            guard = self.available.wait(guard).expect("condvar wait failed");
        }
    }

    /// Close the queue and wake all blocked receivers.
    pub fn close(&self) {
        let mut guard = self.inner.lock().expect("message queue mutex poisoned");
        guard.closed = true;
        self.available.notify_all();
    }

    /// Current number of queued items.
    pub fn len(&self) -> usize {
        let guard = self.inner.lock().expect("message queue mutex poisoned");
        guard.queue.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> QueueStats {
        let guard = self.inner.lock().expect("message queue mutex poisoned");
        guard.stats
    }
}

impl<T> Default for MessageQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
