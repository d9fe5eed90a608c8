/*!
 * TransferRecord — identity, paths, status, totals, timing, priority (spec §3)
 */

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Opaque unique token, immutable and globally unique for the process lifetime.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct TransferId(u64);

impl TransferId {
    fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for TransferId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "xfer-{:016x}", self.0)
    }
}

static NEXT_TRANSFER_ID: AtomicU64 = AtomicU64::new(1);

/// Mint a fresh, process-unique transfer id.
pub fn next_transfer_id() -> TransferId {
    TransferId::from_raw(NEXT_TRANSFER_ID.fetch_add(1, Ordering::Relaxed))
}

#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct BatchId(u64);

static NEXT_BATCH_ID: AtomicU64 = AtomicU64::new(1);

pub fn next_batch_id() -> BatchId {
    BatchId(NEXT_BATCH_ID.fetch_add(1, Ordering::Relaxed))
}

impl std::fmt::Display for BatchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "batch-{:016x}", self.0)
    }
}

/// Transfer priority; higher enum value wins ties on the scheduler (spec §4.2).
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum Priority {
    Low = 0,
    Normal = 1,
    High = 2,
    Urgent = 3,
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Normal
    }
}

/// Monotonic status progression (spec §3):
/// `Queued -> Running -> (Completed | Error | Cancelled | Skipped)`,
/// with `Running <-> Paused` as the only reversible edge.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum TransferStatus {
    Queued,
    Running,
    Paused,
    Completed,
    Error,
    Cancelled,
    Skipped,
}

impl TransferStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransferStatus::Completed
                | TransferStatus::Error
                | TransferStatus::Cancelled
                | TransferStatus::Skipped
        )
    }

    /// Whether `self -> next` is a legal edge per the §3 status graph.
    pub fn can_transition_to(&self, next: TransferStatus) -> bool {
        use TransferStatus::*;
        match (self, next) {
            (Queued, Running) | (Queued, Cancelled) => true,
            (Running, Paused)
            | (Running, Completed)
            | (Running, Error)
            | (Running, Cancelled)
            | (Running, Skipped) => true,
            (Paused, Running) | (Paused, Cancelled) => true,
            (Error, Queued) => true, // retry()
            _ => false,
        }
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// One (source file, target file) unit of work, exclusively owned by the
/// coordinator; workers hold a borrowed reference for the duration of
/// execution (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferRecord {
    pub id: TransferId,
    pub source_path: PathBuf,
    pub target_path: PathBuf,
    pub total_bytes: u64,
    pub transferred_bytes: u64,
    pub priority: Priority,
    pub status: TransferStatus,
    pub started_at: Option<u64>,
    pub ended_at: Option<u64>,
    pub error_message: Option<String>,
    pub batch_id: Option<BatchId>,
    pub enqueued_at: u64,
    /// Source volume this transfer reads from, if known (for volume-detach collateral).
    pub source_volume: Option<crate::model::volume::VolumeId>,
    /// Number of automatic retries already consumed (spec §7 `retry_count`).
    pub attempt: u32,
}

impl TransferRecord {
    pub fn new(source_path: PathBuf, target_path: PathBuf, total_bytes: u64, priority: Priority) -> Self {
        Self {
            id: next_transfer_id(),
            source_path,
            target_path,
            total_bytes,
            transferred_bytes: 0,
            priority,
            status: TransferStatus::Queued,
            started_at: None,
            ended_at: None,
            error_message: None,
            batch_id: None,
            enqueued_at: now_millis(),
            source_volume: None,
            attempt: 0,
        }
    }

    pub fn transition(&mut self, next: TransferStatus) -> bool {
        if !self.status.can_transition_to(next) {
            return false;
        }
        match next {
            TransferStatus::Running if matches!(self.status, TransferStatus::Queued) => {
                self.started_at = Some(now_millis());
            }
            _ => {}
        }
        if next.is_terminal() {
            self.ended_at = Some(now_millis());
        }
        self.status = next;
        true
    }

    /// Fingerprint used for at-most-once-per-fingerprint deduplication (spec §4.2, glossary).
    pub fn fingerprint(source_path: &std::path::Path, size: u64) -> (String, u64) {
        let basename = source_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        (basename, size)
    }
}
