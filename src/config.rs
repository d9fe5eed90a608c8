/*!
 * Configuration: the §6 key/value settings set, persisted as UTF-8 JSON
 */

use crate::error::{DailiesError, ErrorKind, Result};
use crate::model::VerificationPolicy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The full settings surface exposed to a host shell (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    /// extension (".mp4") -> absolute target directory
    #[serde(default)]
    pub mappings: HashMap<String, PathBuf>,

    #[serde(default)]
    pub excluded_volumes: Vec<String>,

    #[serde(default = "default_parallel_copies")]
    pub parallel_copies: u8,

    #[serde(default = "default_buffer_size")]
    pub buffer_size: u64,

    #[serde(default = "default_chunk_size")]
    pub chunk_size: u64,

    #[serde(default)]
    pub verify_mode: VerificationPolicy,

    #[serde(default)]
    pub delete_source_on_success: bool,

    #[serde(default = "default_poll_interval_seconds")]
    pub poll_interval_seconds: u64,

    #[serde(default)]
    pub auto_start_on_attach: bool,

    #[serde(default)]
    pub bandwidth_limit_bytes_per_second: u64,

    /// Base delay before a retry-eligible transfer (spec §7 `is_retry_eligible`)
    /// is re-queued, in milliseconds. Doubles per attempt up to `retry_backoff_cap`.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Ceiling on the exponential retry backoff, in milliseconds.
    #[serde(default = "default_retry_backoff_cap_ms")]
    pub retry_backoff_cap_ms: u64,

    /// Maximum automatic re-queues for a retry-eligible error (spec §7, default 3).
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,

    /// UI locale tag — consumed by the shell, not the core.
    #[serde(default)]
    pub language: String,
}

fn default_parallel_copies() -> u8 {
    4
}

fn default_buffer_size() -> u64 {
    8 * 1024 * 1024
}

fn default_chunk_size() -> u64 {
    1024 * 1024
}

fn default_poll_interval_seconds() -> u64 {
    5
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_retry_backoff_cap_ms() -> u64 {
    30_000
}

fn default_retry_count() -> u32 {
    3
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            mappings: HashMap::new(),
            excluded_volumes: Vec::new(),
            parallel_copies: default_parallel_copies(),
            buffer_size: default_buffer_size(),
            chunk_size: default_chunk_size(),
            verify_mode: VerificationPolicy::default(),
            delete_source_on_success: false,
            poll_interval_seconds: default_poll_interval_seconds(),
            auto_start_on_attach: false,
            bandwidth_limit_bytes_per_second: 0,
            retry_delay_ms: default_retry_delay_ms(),
            retry_backoff_cap_ms: default_retry_backoff_cap_ms(),
            retry_count: default_retry_count(),
            language: String::new(),
        }
    }
}

impl Settings {
    /// `parallel_copies` must fall in 1-16 per spec §6.
    pub fn validate(&self) -> Result<()> {
        if !(1..=16).contains(&self.parallel_copies) {
            return Err(DailiesError::new(
                ErrorKind::InvalidState,
                format!("parallel_copies must be 1-16, got {}", self.parallel_copies),
            ));
        }
        Ok(())
    }

    /// Exponential backoff delay before the `attempt`-th retry (0-indexed),
    /// capped at `retry_backoff_cap_ms` (spec §6 supplement, grounded on
    /// the teacher's retry-delay doubling).
    pub fn retry_delay_for(&self, attempt: u32) -> std::time::Duration {
        let doubled = self.retry_delay_ms.saturating_mul(1u64 << attempt.min(32));
        std::time::Duration::from_millis(doubled.min(self.retry_backoff_cap_ms))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let settings: Self = serde_json::from_str(&content)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        self.validate()?;
        let content = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load from `path`, falling back to defaults (with a warning) if the
    /// file is absent or unparsable. Mirrors the fallback-chain shape the
    /// teacher uses for its TOML config, adapted to the §6-mandated JSON
    /// format and a caller-supplied path (the shell owns persistence).
    pub fn load_with_fallback(path: &Path) -> Self {
        match Self::load(path) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!(error = %e, path = %path.display(), "falling back to default settings");
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn round_trips_through_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let mut settings = Settings::default();
        settings.mappings.insert(".mp4".into(), "/videos".into());
        settings.parallel_copies = 8;
        settings.save(&path).unwrap();

        let loaded = Settings::load(&path).unwrap();
        assert_eq!(loaded, settings);
    }

    #[test]
    fn rejects_out_of_range_parallel_copies() {
        let mut settings = Settings::default();
        settings.parallel_copies = 0;
        assert!(settings.validate().is_err());
        settings.parallel_copies = 17;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn retry_delay_doubles_then_caps() {
        let settings = Settings::default();
        assert_eq!(settings.retry_delay_for(0).as_millis(), 1000);
        assert_eq!(settings.retry_delay_for(1).as_millis(), 2000);
        assert_eq!(settings.retry_delay_for(10).as_millis() as u64, settings.retry_backoff_cap_ms);
    }

    #[test]
    fn fallback_returns_default_when_missing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing.json");
        let settings = Settings::load_with_fallback(&path);
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn defaults_match_spec() {
        let settings = Settings::default();
        assert_eq!(settings.buffer_size, 8 * 1024 * 1024);
        assert_eq!(settings.chunk_size, 1024 * 1024);
        assert_eq!(settings.parallel_copies, 4);
        assert_eq!(settings.bandwidth_limit_bytes_per_second, 0);
    }
}
