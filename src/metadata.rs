/*!
 * Metadata restoration on the copied target (spec §4.1 "Metadata
 * restoration"): mtime, permissions, and platform-specific attributes.
 * Failures here are logged and do not fail the transfer — a copy with
 * missing extended attributes is still a successful copy.
 */

use filetime::{set_file_times, FileTime};
use std::path::Path;

/// Best-effort metadata restoration, abstracted so tests can assert it was
/// attempted without depending on platform-specific filesystem features.
pub trait MetadataPort: Send + Sync {
    fn restore(&self, source: &Path, target: &Path);
}

#[derive(Debug, Default)]
pub struct FilesystemMetadataPort;

impl FilesystemMetadataPort {
    pub fn new() -> Self {
        Self
    }
}

impl MetadataPort for FilesystemMetadataPort {
    fn restore(&self, source: &Path, target: &Path) {
        let metadata = match std::fs::metadata(source) {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!(source = %source.display(), error = %e, "could not read source metadata, skipping restoration");
                return;
            }
        };

        if let Err(e) = std::fs::set_permissions(target, metadata.permissions()) {
            tracing::warn!(target = %target.display(), error = %e, "failed to restore permissions");
        }

        let accessed = FileTime::from_last_access_time(&metadata);
        let modified = FileTime::from_last_modification_time(&metadata);
        if let Err(e) = set_file_times(target, accessed, modified) {
            tracing::warn!(target = %target.display(), error = %e, "failed to restore timestamps");
        }

        #[cfg(all(unix, feature = "extended-metadata"))]
        restore_xattrs(source, target);

        #[cfg(windows)]
        restore_windows_attributes(source, target);
    }
}

#[cfg(all(unix, feature = "extended-metadata"))]
fn restore_xattrs(source: &Path, target: &Path) {
    let names = match xattr::list(source) {
        Ok(names) => names,
        Err(e) => {
            tracing::debug!(source = %source.display(), error = %e, "no extended attributes to restore");
            return;
        }
    };

    for name in names {
        match xattr::get(source, &name) {
            Ok(Some(value)) => {
                if let Err(e) = xattr::set(target, &name, &value) {
                    tracing::warn!(target = %target.display(), attr = ?name, error = %e, "failed to restore extended attribute");
                }
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(source = %source.display(), attr = ?name, error = %e, "failed to read extended attribute");
            }
        }
    }
}

#[cfg(windows)]
fn restore_windows_attributes(source: &Path, target: &Path) {
    use std::os::windows::ffi::OsStrExt;
    use windows_sys::Win32::Storage::FileSystem::{GetFileAttributesW, SetFileAttributesW};

    fn to_wide(path: &Path) -> Vec<u16> {
        path.as_os_str().encode_wide().chain(std::iter::once(0)).collect()
    }

    let source_wide = to_wide(source);
    let target_wide = to_wide(target);

    unsafe {
        let attrs = GetFileAttributesW(source_wide.as_ptr());
        if attrs == u32::MAX {
            tracing::debug!(source = %source.display(), "could not read source attributes");
            return;
        }
        if SetFileAttributesW(target_wide.as_ptr(), attrs) == 0 {
            tracing::warn!(target = %target.display(), "failed to restore file attributes");
        }
    }
}

/// Fixed-outcome test double: records every `(source, target)` pair it was
/// asked to restore, performing no filesystem work.
#[cfg(test)]
#[derive(Default)]
pub struct RecordingMetadataPort {
    pub calls: std::sync::Mutex<Vec<(std::path::PathBuf, std::path::PathBuf)>>,
}

#[cfg(test)]
impl MetadataPort for RecordingMetadataPort {
    fn restore(&self, source: &Path, target: &Path) {
        self.calls.lock().unwrap().push((source.to_path_buf(), target.to_path_buf()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn restores_mtime_from_source() {
        let mut source = NamedTempFile::new().unwrap();
        source.write_all(b"source").unwrap();
        source.flush().unwrap();

        let mut target = NamedTempFile::new().unwrap();
        target.write_all(b"target").unwrap();
        target.flush().unwrap();

        let old_mtime = FileTime::from_last_modification_time(&std::fs::metadata(source.path()).unwrap());
        let shifted = FileTime::from_unix_time(old_mtime.unix_seconds() - 1000, 0);
        filetime::set_file_mtime(source.path(), shifted).unwrap();

        FilesystemMetadataPort::new().restore(source.path(), target.path());

        let source_meta = std::fs::metadata(source.path()).unwrap();
        let target_meta = std::fs::metadata(target.path()).unwrap();
        assert_eq!(
            FileTime::from_last_modification_time(&source_meta),
            FileTime::from_last_modification_time(&target_meta)
        );
    }

    #[test]
    fn recording_port_tracks_calls() {
        let port = RecordingMetadataPort::default();
        port.restore(Path::new("/a"), Path::new("/b"));
        assert_eq!(port.calls.lock().unwrap().len(), 1);
    }
}
