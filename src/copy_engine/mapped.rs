/*!
 * Memory-mapped copy strategy — used for files above `buffer_size` and at
 * or below the large-file threshold (spec §4.1 "Adaptive copy strategy").
 * The source is mapped once; writes still stream out in `buffer_size`
 * windows so progress sampling and cancellation keep the same per-window
 * cadence as the buffered strategy (spec §4.1: "mapped read: map the source
 * read-only, write to target in buffer_size windows").
 */

use super::CancellationToken;
use crate::error::{DailiesError, Result};
use crate::rate_limiter::BandwidthLimiter;
use memmap2::Mmap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

pub fn copy_mapped(
    source: &Path,
    tmp_target: &Path,
    buffer_size: u64,
    limiter: &BandwidthLimiter,
    cancel: &CancellationToken,
    mut on_progress: impl FnMut(u64),
) -> Result<u64> {
    let source_file = File::open(source)?;
    let size = source_file.metadata()?.len();

    if size == 0 {
        File::create(tmp_target)?;
        return Ok(0);
    }

    let mmap = unsafe { Mmap::map(&source_file)? };
    let mut writer = BufWriter::with_capacity(buffer_size as usize, File::create(tmp_target)?);

    let buffer_size = buffer_size.max(1) as usize;
    let mut transferred: u64 = 0;

    for window in mmap.chunks(buffer_size) {
        if cancel.is_cancelled() {
            return Err(DailiesError::cancelled());
        }
        writer.write_all(window)?;
        limiter.acquire(window.len() as u64);
        transferred += window.len() as u64;
        on_progress(transferred);
    }

    writer.flush()?;
    Ok(transferred)
}
