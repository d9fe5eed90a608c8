/*!
 * Batch — a named group of transfers reported together (spec §3 "Batch")
 */

use super::transfer_record::{BatchId, TransferId, TransferStatus};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub enum BatchStatus {
    Running,
    Completed,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Batch {
    pub id: BatchId,
    pub name: String,
    pub description: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub members: HashSet<TransferId>,
    pub status: BatchStatus,
}

impl Batch {
    pub fn new(name: impl Into<String>, description: Option<String>) -> Self {
        Self {
            id: super::transfer_record::next_batch_id(),
            name: name.into(),
            description,
            created_at: chrono::Utc::now(),
            members: HashSet::new(),
            status: BatchStatus::Running,
        }
    }

    /// Recompute aggregate status from member statuses (spec §3 invariant):
    /// `Completed` only when every member is terminal; `Error` if any member errored.
    pub fn recompute_status<'a>(&mut self, member_statuses: impl Iterator<Item = &'a TransferStatus>) {
        let mut any_error = false;
        let mut all_terminal = true;
        let mut saw_any = false;
        for status in member_statuses {
            saw_any = true;
            if matches!(status, TransferStatus::Error) {
                any_error = true;
            }
            if !status.is_terminal() {
                all_terminal = false;
            }
        }
        self.status = if !saw_any {
            BatchStatus::Running
        } else if any_error {
            BatchStatus::Error
        } else if all_terminal {
            BatchStatus::Completed
        } else {
            BatchStatus::Running
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completes_only_when_all_terminal() {
        let mut batch = Batch::new("ingest-1", None);
        let statuses = vec![TransferStatus::Completed, TransferStatus::Running];
        batch.recompute_status(statuses.iter());
        assert_eq!(batch.status, BatchStatus::Running);

        let statuses = vec![TransferStatus::Completed, TransferStatus::Skipped];
        batch.recompute_status(statuses.iter());
        assert_eq!(batch.status, BatchStatus::Completed);
    }

    #[test]
    fn any_error_yields_error_status() {
        let mut batch = Batch::new("ingest-2", None);
        let statuses = vec![TransferStatus::Completed, TransferStatus::Error];
        batch.recompute_status(statuses.iter());
        assert_eq!(batch.status, BatchStatus::Error);
    }
}
