/*!
 * Large-file copy strategy — files above the 100MiB large-file threshold
 * (spec §4.1 "Adaptive copy strategy"). Maps the source and writes in
 * `buffer_size` windows like the mapped strategy, but yields the scheduler
 * between windows so one large transfer cannot starve other workers'
 * cancellation checks or progress sampling on a busy thread pool.
 */

use super::CancellationToken;
use crate::error::{DailiesError, Result};
use crate::rate_limiter::BandwidthLimiter;
use memmap2::Mmap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Files at or above this size use the large-file strategy.
pub const LARGE_FILE_THRESHOLD: u64 = 100 * 1024 * 1024;

pub fn copy_large_file(
    source: &Path,
    tmp_target: &Path,
    buffer_size: u64,
    limiter: &BandwidthLimiter,
    cancel: &CancellationToken,
    mut on_progress: impl FnMut(u64),
) -> Result<u64> {
    let source_file = File::open(source)?;
    let size = source_file.metadata()?.len();
    let buffer_size = buffer_size.max(1) as usize;

    let mmap = unsafe { Mmap::map(&source_file)? };
    let mut writer = BufWriter::with_capacity(buffer_size, File::create(tmp_target)?);

    let mut transferred: u64 = 0;
    for window in mmap.chunks(buffer_size) {
        if cancel.is_cancelled() {
            return Err(DailiesError::cancelled());
        }
        writer.write_all(window)?;
        limiter.acquire(window.len() as u64);
        transferred += window.len() as u64;
        on_progress(transferred);
        std::thread::yield_now();
    }

    writer.flush()?;
    debug_assert_eq!(transferred, size);
    Ok(transferred)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::copy_engine::CancellationToken;
    use tempfile::tempdir;

    const TEST_WINDOW: u64 = 1024 * 1024;

    #[test]
    fn copies_contents_spanning_multiple_windows() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("source.bin");
        let target = dir.path().join("target.bin.tmp");
        let data = vec![3u8; (TEST_WINDOW as usize) * 2 + 123];
        std::fs::write(&source, &data).unwrap();

        let cancel = CancellationToken::new();
        let transferred =
            copy_large_file(&source, &target, TEST_WINDOW, &BandwidthLimiter::unlimited(), &cancel, |_| {})
                .unwrap();

        assert_eq!(transferred, data.len() as u64);
        assert_eq!(std::fs::metadata(&target).unwrap().len(), data.len() as u64);
    }

    #[test]
    fn cancellation_stops_before_completion() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("source.bin");
        let target = dir.path().join("target.bin.tmp");
        std::fs::write(&source, vec![1u8; (TEST_WINDOW as usize) * 3]).unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();
        let result =
            copy_large_file(&source, &target, TEST_WINDOW, &BandwidthLimiter::unlimited(), &cancel, |_| {});
        assert!(result.is_err());
    }
}
