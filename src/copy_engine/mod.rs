/*!
 * Copy engine: adaptive strategy selection, atomic publish, verification,
 * and metadata restoration for a single transfer (spec §4.1).
 */

mod chunked;
mod conflict;
mod large_file;
mod mapped;

pub use conflict::ConflictOutcome;

use crate::error::{DailiesError, Result};
use crate::hashing::{full_hash, sampled_hash};
use crate::metadata::MetadataPort;
use crate::model::{ProgressSample, SpeedSmoother, TransferId, VerificationPolicy};
use crate::rate_limiter::BandwidthLimiter;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

const SAMPLED_HASH_WINDOW: u64 = 64 * 1024;

/// A cooperative cancellation flag, checked at chunk/window boundaries by
/// every copy strategy (spec §5 "Bounded cancellation latency").
#[derive(Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// What the copy engine actually did, for the coordinator to fold back into
/// the transfer record and event stream.
pub enum CopyOutcome {
    Completed { transferred_bytes: u64 },
    Skipped { reason: String },
}

/// Parameters for a single transfer's copy (deliberately flat rather than
/// threading `Settings` through — the engine should not need to know about
/// config persistence).
pub struct CopyRequest<'a> {
    pub transfer_id: TransferId,
    pub source: &'a Path,
    pub target: &'a Path,
    pub total_bytes: u64,
    pub chunk_size: u64,
    pub buffer_size: u64,
    pub verify_mode: VerificationPolicy,
    pub limiter: &'a BandwidthLimiter,
    pub cancel: &'a CancellationToken,
    pub metadata: &'a dyn MetadataPort,
    /// Invoked on the temporary file immediately before verification, with
    /// no effect in production; lets tests corrupt a copy in flight to
    /// exercise the verification-failure path (spec §8 scenario 5).
    pub before_verify: Option<&'a dyn Fn(&Path)>,
}

/// Runs one transfer end to end: conflict resolution, strategy dispatch,
/// atomic publish, verification, metadata restore. `on_progress` is invoked
/// at most once per ~100ms of wall time (spec §4.1 "Progress sampling"),
/// plus once more with the final 100%/zero-speed sample.
pub fn run_copy(request: CopyRequest<'_>, mut on_progress: impl FnMut(ProgressSample)) -> Result<CopyOutcome> {
    if !request.source.exists() {
        return Err(DailiesError::not_found(request.source));
    }

    match conflict::resolve(request.target, request.total_bytes)
        .map_err(|e| DailiesError::io_read(e))?
    {
        ConflictOutcome::Skip => {
            return Ok(CopyOutcome::Skipped { reason: "identical-size file already at target".into() });
        }
        ConflictOutcome::NoConflict => {}
        ConflictOutcome::Disambiguate(alt_target) => {
            return run_copy(CopyRequest { target: &alt_target, ..request }, on_progress);
        }
    }

    if let Some(parent) = request.target.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let tmp_target = tmp_path_for(request.target);
    let cleanup_tmp = |path: &Path| {
        let _ = std::fs::remove_file(path);
    };

    let start = Instant::now();
    let mut smoother = SpeedSmoother::new();
    let mut last_sample_at = Instant::now();
    let total_bytes = request.total_bytes;
    let transfer_id = request.transfer_id;

    let mut emit = |transferred: u64, force: bool| {
        let now = Instant::now();
        if !force && now.duration_since(last_sample_at).as_millis() < 100 {
            return;
        }
        last_sample_at = now;
        let elapsed = start.elapsed().as_secs_f64().max(1e-6);
        let instantaneous_bps = transferred as f64 / elapsed;
        let smoothed_bps = smoother.sample(instantaneous_bps);
        let eta_seconds = if smoothed_bps > 0.0 && total_bytes > transferred {
            Some((total_bytes - transferred) as f64 / smoothed_bps)
        } else {
            None
        };
        on_progress(ProgressSample {
            transfer_id,
            transferred_bytes: transferred,
            total_bytes,
            instantaneous_bps,
            smoothed_bps,
            eta_seconds,
        });
    };

    let copy_result = if total_bytes >= large_file::LARGE_FILE_THRESHOLD {
        large_file::copy_large_file(
            request.source,
            &tmp_target,
            request.buffer_size,
            request.limiter,
            request.cancel,
            |t| emit(t, false),
        )
    } else if total_bytes > request.buffer_size {
        mapped::copy_mapped(
            request.source,
            &tmp_target,
            request.buffer_size,
            request.limiter,
            request.cancel,
            |t| emit(t, false),
        )
    } else {
        chunked::copy_chunked(request.source, &tmp_target, request.chunk_size, request.limiter, request.cancel, |t| {
            emit(t, false)
        })
    };

    let transferred = match copy_result {
        Ok(n) => n,
        Err(e) => {
            cleanup_tmp(&tmp_target);
            return Err(e);
        }
    };

    if let Some(hook) = request.before_verify {
        hook(&tmp_target);
    }

    if let Err(e) = verify(request.source, &tmp_target, request.verify_mode) {
        cleanup_tmp(&tmp_target);
        return Err(e);
    }

    if let Err(e) = std::fs::rename(&tmp_target, request.target) {
        cleanup_tmp(&tmp_target);
        return Err(DailiesError::io_write(e));
    }

    request.metadata.restore(request.source, request.target);

    // Final sample: 100% progress, zero instantaneous speed (spec §4.1).
    on_progress(ProgressSample {
        transfer_id,
        transferred_bytes: transferred,
        total_bytes,
        instantaneous_bps: 0.0,
        smoothed_bps: 0.0,
        eta_seconds: Some(0.0),
    });

    Ok(CopyOutcome::Completed { transferred_bytes: transferred })
}

/// The temp file a transfer copies into before the atomic publish rename —
/// `target` with a literal `.tmp` suffix appended (spec §4.1, §6).
fn tmp_path_for(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_os_string();
    name.push(".tmp");
    PathBuf::from(name)
}

fn verify(source: &Path, tmp_target: &Path, policy: VerificationPolicy) -> Result<()> {
    match policy {
        VerificationPolicy::None => Ok(()),
        VerificationPolicy::SizeOnly => {
            let source_len = std::fs::metadata(source)?.len();
            let target_len = std::fs::metadata(tmp_target)?.len();
            if source_len == target_len {
                Ok(())
            } else {
                Err(DailiesError::verification_failed())
            }
        }
        VerificationPolicy::SampledHash => {
            let source_hash = sampled_hash(source, SAMPLED_HASH_WINDOW)?;
            let target_hash = sampled_hash(tmp_target, SAMPLED_HASH_WINDOW)?;
            if source_hash == target_hash {
                Ok(())
            } else {
                Err(DailiesError::verification_failed())
            }
        }
        VerificationPolicy::FullHash => {
            let source_hash = full_hash(source)?;
            let target_hash = full_hash(tmp_target)?;
            if source_hash == target_hash {
                Ok(())
            } else {
                Err(DailiesError::verification_failed())
            }
        }
    }
}
