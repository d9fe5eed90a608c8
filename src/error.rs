/*!
 * Error types for Dailies
 */

use std::fmt;
use std::io;

pub type Result<T> = std::result::Result<T, DailiesError>;

/// Stable error kind tag, reported alongside `error_message` (spec §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    IoRead,
    IoWrite,
    DiskSpace,
    VerificationFailed,
    Timeout,
    Cancelled,
    SourceVolumeDetached,
    InvalidState,
    UnknownId,
    DuplicateTransfer,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::IoRead => "io_read",
            ErrorKind::IoWrite => "io_write",
            ErrorKind::DiskSpace => "disk_space",
            ErrorKind::VerificationFailed => "verification_failed",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::SourceVolumeDetached => "source_volume_detached",
            ErrorKind::InvalidState => "invalid_state",
            ErrorKind::UnknownId => "unknown_id",
            ErrorKind::DuplicateTransfer => "duplicate_transfer",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug)]
pub struct DailiesError {
    pub kind: ErrorKind,
    message: String,
}

impl DailiesError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn not_found(path: &std::path::Path) -> Self {
        Self::new(ErrorKind::NotFound, format!("source not found: {}", path.display()))
    }

    pub fn io_read(err: impl fmt::Display) -> Self {
        Self::new(ErrorKind::IoRead, format!("read failed: {err}"))
    }

    pub fn io_write(err: impl fmt::Display) -> Self {
        Self::new(ErrorKind::IoWrite, format!("write failed: {err}"))
    }

    pub fn disk_space(required: u64, available: u64) -> Self {
        Self::new(
            ErrorKind::DiskSpace,
            format!("insufficient disk space: {required} bytes required, {available} bytes available"),
        )
    }

    pub fn verification_failed() -> Self {
        Self::new(ErrorKind::VerificationFailed, "verification_failed")
    }

    pub fn cancelled() -> Self {
        Self::new(ErrorKind::Cancelled, "cancelled")
    }

    pub fn source_volume_detached() -> Self {
        Self::new(ErrorKind::SourceVolumeDetached, "source_volume_detached")
    }

    pub fn invalid_state(op: &str) -> Self {
        Self::new(ErrorKind::InvalidState, format!("invalid_state: {op}"))
    }

    pub fn unknown_id() -> Self {
        Self::new(ErrorKind::UnknownId, "unknown_id")
    }

    /// A fingerprint already has an active transfer in flight (spec §4.2);
    /// distinct from `invalid_state`, which is reserved for operations
    /// called against the wrong transfer status.
    pub fn duplicate_transfer(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::DuplicateTransfer, message.into())
    }

    /// Retry-eligible errors (§7: only `timeout`) are re-queued automatically
    /// up to `retry_count`. Everything else is terminal to the transfer.
    pub fn is_retry_eligible(&self) -> bool {
        matches!(self.kind, ErrorKind::Timeout)
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for DailiesError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for DailiesError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}

impl From<io::Error> for DailiesError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => DailiesError::new(ErrorKind::NotFound, err.to_string()),
            _ => DailiesError::new(ErrorKind::IoRead, err.to_string()),
        }
    }
}

impl From<serde_json::Error> for DailiesError {
    fn from(err: serde_json::Error) -> Self {
        DailiesError::new(ErrorKind::IoRead, format!("config error: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_eligibility() {
        assert!(DailiesError::new(ErrorKind::Timeout, "x").is_retry_eligible());
        assert!(!DailiesError::verification_failed().is_retry_eligible());
        assert!(!DailiesError::cancelled().is_retry_eligible());
    }

    #[test]
    fn kind_display() {
        assert_eq!(ErrorKind::SourceVolumeDetached.to_string(), "source_volume_detached");
        assert_eq!(ErrorKind::NotFound.to_string(), "not_found");
    }

    #[test]
    fn io_not_found_maps_to_not_found_kind() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "gone");
        let err: DailiesError = io_err.into();
        assert_eq!(err.kind, ErrorKind::NotFound);
    }
}
