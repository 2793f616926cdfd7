//! Source file records (§3 "Source file").

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// An immutable record of a file discovered under some enumeration root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceFile {
    pub absolute_path: PathBuf,
    pub path_relative_to_enum_root: PathBuf,
    pub name: String,
    pub size_bytes: u64,
}

impl SourceFile {
    /// Builds a `SourceFile` for `absolute_path`, which must live under
    /// `enum_root`.
    ///
    /// # Errors
    /// Returns an error if `absolute_path` cannot be stripped of
    /// `enum_root`'s prefix, or its metadata cannot be read.
    pub fn new(absolute_path: &Path, enum_root: &Path) -> std::io::Result<Self> {
        let metadata = std::fs::metadata(absolute_path)?;
        let path_relative_to_enum_root = absolute_path
            .strip_prefix(enum_root)
            .unwrap_or(absolute_path)
            .to_path_buf();
        let name = absolute_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        Ok(Self {
            absolute_path: absolute_path.to_path_buf(),
            path_relative_to_enum_root,
            name,
            size_bytes: metadata.len(),
        })
    }

    #[must_use]
    pub fn extension_lowercase(&self) -> String {
        self.absolute_path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default()
    }
}
