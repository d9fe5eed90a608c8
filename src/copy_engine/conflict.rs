/*!
 * Target conflict resolution (spec §4.1 "Conflict resolution"): when the
 * target path already exists, decide whether to skip, overwrite, or
 * disambiguate with a `name (N).ext` suffix.
 */

use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictOutcome {
    /// No existing file at the target path; copy proceeds as-is.
    NoConflict,
    /// An identically-sized file already occupies the target; the transfer
    /// should move straight to `Skipped` without touching the filesystem.
    Skip,
    /// A differently-sized file occupies the target; copy to this
    /// disambiguated path instead.
    Disambiguate(PathBuf),
}

/// Resolve what to do about an existing file at `target`, given the
/// incoming source's size. The size-match skip check applies only to
/// `target` itself; if it differs in size, probes `target (1)`, `target (2)`,
/// ... for the first free slot.
pub fn resolve(target: &Path, source_size: u64) -> std::io::Result<ConflictOutcome> {
    if !target.exists() {
        return Ok(ConflictOutcome::NoConflict);
    }

    if std::fs::metadata(target)?.len() == source_size {
        return Ok(ConflictOutcome::Skip);
    }

    let stem = target.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
    let ext = target.extension().map(|e| e.to_string_lossy().into_owned());
    let parent = target.parent().unwrap_or_else(|| Path::new(""));

    for n in 1..=9999u32 {
        let candidate_name = match &ext {
            Some(ext) => format!("{stem} ({n}).{ext}"),
            None => format!("{stem} ({n})"),
        };
        let candidate = parent.join(candidate_name);
        if !candidate.exists() {
            return Ok(ConflictOutcome::Disambiguate(candidate));
        }
    }

    // Exhausted the disambiguation space; treat as a hard conflict the
    // caller should surface rather than loop forever.
    Ok(ConflictOutcome::Disambiguate(parent.join(format!("{stem}.{}.overflow", source_size))))
}
