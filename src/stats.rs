/*!
 * Coordinator statistics: simple in-memory counters for files and bytes
 * transferred (spec §6 supplement, grounded on the teacher's
 * `instrumentation::OperationStats`). Not persisted — the system-of-record
 * for transfer history lives outside this crate (spec §1).
 */

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct CoordinatorStats {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    completed: AtomicU64,
    errored: AtomicU64,
    cancelled: AtomicU64,
    skipped: AtomicU64,
    bytes_transferred: AtomicU64,
    started_at: Instant,
}

/// A point-in-time read of the counters, safe to hand to a caller without
/// exposing the live atomics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub completed: u64,
    pub errored: u64,
    pub cancelled: u64,
    pub skipped: u64,
    pub bytes_transferred: u64,
    pub elapsed_seconds: u64,
}

impl CoordinatorStats {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                completed: AtomicU64::new(0),
                errored: AtomicU64::new(0),
                cancelled: AtomicU64::new(0),
                skipped: AtomicU64::new(0),
                bytes_transferred: AtomicU64::new(0),
                started_at: Instant::now(),
            }),
        }
    }

    pub fn record_completed(&self, bytes: u64) {
        self.inner.completed.fetch_add(1, Ordering::Relaxed);
        self.inner.bytes_transferred.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.inner.errored.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cancelled(&self) {
        self.inner.cancelled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skipped(&self) {
        self.inner.skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            completed: self.inner.completed.load(Ordering::Relaxed),
            errored: self.inner.errored.load(Ordering::Relaxed),
            cancelled: self.inner.cancelled.load(Ordering::Relaxed),
            skipped: self.inner.skipped.load(Ordering::Relaxed),
            bytes_transferred: self.inner.bytes_transferred.load(Ordering::Relaxed),
            elapsed_seconds: self.inner.started_at.elapsed().as_secs(),
        }
    }
}

impl Default for CoordinatorStats {
    fn default() -> Self {
        Self::new()
    }
}
