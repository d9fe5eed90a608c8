/*!
 * Data model types shared across the ingest core (spec §3)
 */

pub mod batch;
pub mod progress;
pub mod transfer_record;
pub mod volume;

pub use batch::{Batch, BatchStatus};
pub use progress::{ProgressSample, SpeedSmoother};
pub use transfer_record::{next_batch_id, next_transfer_id, BatchId, Priority, TransferId, TransferRecord, TransferStatus};
pub use volume::{Volume, VolumeClass, VolumeId};

/// Verification policy applied after a copy completes (spec §3 "Verification policy").
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationPolicy {
    None,
    SizeOnly,
    SampledHash,
    FullHash,
}

impl Default for VerificationPolicy {
    fn default() -> Self {
        VerificationPolicy::SizeOnly
    }
}
