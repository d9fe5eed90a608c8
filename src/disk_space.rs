/*!
 * Pre-flight free-space validation (spec §4.1 "Disk space check").
 */

use crate::error::{DailiesError, Result};
use crate::system_info::SystemInfoPort;
use std::path::Path;

/// Extra headroom required beyond the transfer size itself, so a large copy
/// never drives the target volume to exactly zero free bytes.
const SAFETY_MARGIN_BYTES: u64 = 64 * 1024 * 1024;

/// Confirm the target volume has room for `required_bytes` plus a fixed
/// safety margin. Returns `ErrorKind::DiskSpace` naming both figures when it
/// doesn't (spec §4.1, §7).
pub fn ensure_sufficient_space(
    system_info: &dyn SystemInfoPort,
    target_path: &Path,
    required_bytes: u64,
) -> Result<()> {
    let Some(available) = system_info.available_space(target_path) else {
        tracing::warn!(path = %target_path.display(), "could not determine available disk space, proceeding without a preflight check");
        return Ok(());
    };

    let total_required = required_bytes.saturating_add(SAFETY_MARGIN_BYTES);
    if available < total_required {
        return Err(DailiesError::disk_space(total_required, available));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system_info::MockSystemInfoPort;

    #[test]
    fn passes_when_space_is_ample() {
        let port = MockSystemInfoPort::new().with_space("/mnt/target", 10 * 1024 * 1024 * 1024);
        assert!(ensure_sufficient_space(&port, Path::new("/mnt/target/clip.mov"), 1024).is_ok());
    }

    #[test]
    fn fails_when_space_is_insufficient() {
        let port = MockSystemInfoPort::new().with_space("/mnt/target", 1024);
        let err = ensure_sufficient_space(&port, Path::new("/mnt/target/clip.mov"), 1_000_000_000).unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::DiskSpace);
    }

    #[test]
    fn proceeds_when_volume_cannot_be_resolved() {
        let port = MockSystemInfoPort::new();
        assert!(ensure_sufficient_space(&port, Path::new("/unknown/clip.mov"), 1024).is_ok());
    }
}
