/*!
 * Chunked buffered copy strategy — used for files at or below the
 * configured `buffer_size` (spec §4.1 "Adaptive copy strategy").
 */

use super::CancellationToken;
use crate::error::{DailiesError, Result};
use crate::rate_limiter::BandwidthLimiter;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

/// Copy `source` into `tmp_target` in `chunk_size`-sized reads, invoking
/// `on_progress` with cumulative bytes written after each chunk. Checks
/// `cancel` between chunks so cancellation latency is bounded by one
/// chunk's write time (spec §5 "Bounded cancellation latency").
pub fn copy_chunked(
    source: &Path,
    tmp_target: &Path,
    chunk_size: u64,
    limiter: &BandwidthLimiter,
    cancel: &CancellationToken,
    mut on_progress: impl FnMut(u64),
) -> Result<u64> {
    let mut reader = BufReader::with_capacity(chunk_size as usize, File::open(source)?);
    let mut writer = BufWriter::with_capacity(chunk_size as usize, File::create(tmp_target)?);

    let mut buffer = vec![0u8; chunk_size.max(1) as usize];
    let mut transferred: u64 = 0;

    loop {
        if cancel.is_cancelled() {
            return Err(DailiesError::cancelled());
        }

        let n = reader.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        writer.write_all(&buffer[..n])?;
        limiter.acquire(n as u64);
        transferred += n as u64;
        on_progress(transferred);
    }

    writer.flush()?;
    Ok(transferred)
}
