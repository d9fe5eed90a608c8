/*!
 * Priority transfer queue: highest `Priority` first, FIFO among equal
 * priorities (spec §4.2 "Scheduling"). Blocking dequeue built on a
 * `Mutex`+`Condvar`, in the same style as the concurrency limiter's
 * semaphore — one internal lock guards the heap, the condvar wakes a
 * blocked worker when work arrives or the queue is shut down.
 */

use crate::model::{Priority, TransferId};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::{Condvar, Mutex};
use std::time::Duration;

#[derive(Debug, Eq, PartialEq)]
struct QueueEntry {
    priority: Priority,
    sequence: u64,
    id: TransferId,
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap: higher priority sorts first; among equal
        // priorities, the lower sequence number (enqueued earlier) sorts
        // first, so we invert the sequence comparison.
        self.priority.cmp(&other.priority).then_with(|| other.sequence.cmp(&self.sequence))
    }
}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

struct QueueState {
    heap: BinaryHeap<QueueEntry>,
    next_sequence: u64,
    closed: bool,
}

/// A blocking, priority-ordered work queue of transfer ids.
pub struct TransferQueue {
    state: Mutex<QueueState>,
    condvar: Condvar,
}

impl TransferQueue {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState { heap: BinaryHeap::new(), next_sequence: 0, closed: false }),
            condvar: Condvar::new(),
        }
    }

    pub fn push(&self, id: TransferId, priority: Priority) {
        let mut state = self.state.lock().unwrap();
        let sequence = state.next_sequence;
        state.next_sequence += 1;
        state.heap.push(QueueEntry { priority, sequence, id });
        self.condvar.notify_one();
    }

    /// Blocks until a transfer is available, the queue is closed, or
    /// `timeout` elapses — whichever comes first.
    pub fn pop_timeout(&self, timeout: Duration) -> Option<TransferId> {
        let mut state = self.state.lock().unwrap();
        loop {
            if let Some(entry) = state.heap.pop() {
                return Some(entry.id);
            }
            if state.closed {
                return None;
            }
            let (guard, result) = self.condvar.wait_timeout(state, timeout).unwrap();
            state = guard;
            if result.timed_out() && state.heap.is_empty() {
                return None;
            }
        }
    }

    /// Remove a queued-but-not-yet-dequeued transfer (used by `cancel()` on
    /// a still-`Queued` transfer, spec §4.2).
    pub fn remove(&self, id: TransferId) -> bool {
        let mut state = self.state.lock().unwrap();
        let before = state.heap.len();
        state.heap = state.heap.drain().filter(|entry| entry.id != id).collect();
        state.heap.len() != before
    }

    pub fn len(&self) -> usize {
        self.state.lock().unwrap().heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().unwrap().closed
    }

    /// Wake every blocked worker permanently; subsequent `pop_timeout` calls
    /// return `None` once the queue drains (used by coordinator shutdown).
    pub fn close(&self) {
        self.state.lock().unwrap().closed = true;
        self.condvar.notify_all();
    }
}

impl Default for TransferQueue {
    fn default() -> Self {
        Self::new()
    }
}
