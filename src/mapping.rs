/*!
 * Extension-to-directory mapping resolution (spec §4.5 "Mapping Resolver").
 * Normalizes the several ways an extension can be written in settings
 * (`*.mp4`, `.mp4`, `mp4`) to a single canonical lowercase key.
 */

use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Normalize an extension string to its canonical form: a leading dot,
/// lowercase, with any `*` glob prefix stripped.
pub fn normalize_extension(raw: &str) -> String {
    let trimmed = raw.trim().trim_start_matches('*');
    let trimmed = trimmed.strip_prefix('.').unwrap_or(trimmed);
    format!(".{}", trimmed.to_ascii_lowercase())
}

/// Resolves a source file's extension to its configured target directory.
pub struct MappingResolver {
    /// Normalized extension -> absolute target directory.
    mappings: HashMap<String, PathBuf>,
}

impl MappingResolver {
    pub fn new(mappings: &HashMap<String, PathBuf>) -> Self {
        let normalized = mappings
            .iter()
            .map(|(ext, dir)| (normalize_extension(ext), dir.clone()))
            .collect();
        Self { mappings: normalized }
    }

    /// Returns the configured target directory for `path`'s extension, or
    /// `None` if the extension is unmapped or the path has no extension.
    pub fn resolve(&self, path: &Path) -> Option<&Path> {
        let ext = path.extension()?.to_string_lossy();
        let key = normalize_extension(&ext);
        self.mappings.get(&key).map(|p| p.as_path())
    }
}
