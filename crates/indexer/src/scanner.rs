use crate::{IndexerError, Result};
use std::path::{Path, PathBuf};

/// Scanner for session context files (`contexts/*.md`, not recursive).
pub struct ContextScanner {
    contexts_dir: PathBuf,
}

impl ContextScanner {
    pub fn new(contexts_dir: impl AsRef<Path>) -> Self {
        Self {
            contexts_dir: contexts_dir.as_ref().to_path_buf(),
        }
    }

    /// Matching files sorted by path. A missing directory yields no files.
    pub fn scan(&self) -> Result<Vec<PathBuf>> {
        let pattern = self.contexts_dir.join("*.md");
        let pattern = pattern.to_string_lossy();
        let entries = glob::glob(&pattern).map_err(|e| IndexerError::Pattern(e.to_string()))?;

        let mut files = Vec::new();
        for entry in entries {
            match entry {
                Ok(path) if path.is_file() => files.push(path),
                Ok(_) => {}
                Err(e) => log::warn!("Failed to read entry: {e}"),
            }
        }
        files.sort();

        log::debug!(
            "Found {} context files in {}",
            files.len(),
            self.contexts_dir.display()
        );
        Ok(files)
    }
}
