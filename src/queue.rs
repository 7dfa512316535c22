//! The prioritized hand-off between command producers and the single
//! transmit consumer.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::sync::{Condvar, Mutex};

use crate::protocol::Frame;

/// Delivery priority bands. Lower rank drains first: keep-alives jump the
/// line, the shutdown sentinel waits behind everything already queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
    /// Keep-alive frames.
    Max = 0,
    /// User commands.
    Med = 10,
    /// Shutdown sentinel.
    Min = 100,
}

/// Unit of work handed to the transmit consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Work {
    /// Deliver this frame.
    Frame(Frame),
    /// Stop the consumer loop.
    Shutdown,
}

/// Queue entry. Ordering is `(priority, seq)` with `seq` assigned under the
/// queue lock, so equal priorities drain strictly in arrival order even
/// though the heap itself is not stable.
#[derive(Debug, Clone)]
pub struct QueuedItem {
    pub priority: Priority,
    pub seq: u64,
    pub work: Work,
}

impl PartialEq for QueuedItem {
    fn eq(&self, other: &Self) -> bool {
        (self.priority, self.seq) == (other.priority, other.seq)
    }
}

impl Eq for QueuedItem {}

impl PartialOrd for QueuedItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedItem {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.priority, self.seq).cmp(&(other.priority, other.seq))
    }
}

#[derive(Default)]
struct Inner {
    heap: BinaryHeap<Reverse<QueuedItem>>,
    next_seq: u64,
}

/// Thread-safe priority queue. Producers push and never block; the consumer
/// parks in [`WorkQueue::pop`] until something arrives.
#[derive(Default)]
pub struct WorkQueue {
    inner: Mutex<Inner>,
    ready: Condvar,
}

impl WorkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an item.
    pub fn push(&self, priority: Priority, work: Work) {
        let mut inner = self.inner.lock().unwrap();
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.heap.push(Reverse(QueuedItem { priority, seq, work }));
        drop(inner);
        self.ready.notify_one();
    }

    /// Remove and return the front item, blocking while the queue is empty.
    pub fn pop(&self) -> QueuedItem {
        let mut inner = self.inner.lock().unwrap();
        loop {
            if let Some(Reverse(item)) = inner.heap.pop() {
                return item;
            }
            inner = self.ready.wait(inner).unwrap();
        }
    }

    /// Items currently queued.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Discard everything still queued, returning how many frames (sentinels
    /// excluded) were dropped.
    pub fn drain_remaining(&self) -> usize {
        let mut inner = self.inner.lock().unwrap();
        let mut dropped = 0;
        while let Some(Reverse(item)) = inner.heap.pop() {
            if matches!(item.work, Work::Frame(_)) {
                dropped += 1;
            }
        }
        dropped
    }
}
