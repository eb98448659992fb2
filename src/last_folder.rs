//! Remembers the last browsed folder in a one-line text file.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct LastFolderStore {
    file: PathBuf,
}

impl LastFolderStore {
    #[must_use]
    pub fn new(file: impl Into<PathBuf>) -> Self {
        Self { file: file.into() }
    }

    #[must_use]
    pub fn file(&self) -> &Path {
        &self.file
    }

    /// The stored folder, trimmed. Missing, empty or unreadable files give
    /// `None`.
    #[must_use]
    pub fn load(&self) -> Option<PathBuf> {
        match fs::read_to_string(&self.file) {
            Ok(s) => {
                let trimmed = s.trim();
                (!trimmed.is_empty()).then(|| PathBuf::from(trimmed))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(file = %self.file.display(), "no last folder recorded");
                None
            }
            Err(e) => {
                warn!(file = %self.file.display(), error = %e, "failed to read last folder");
                None
            }
        }
    }

    /// # Errors
    /// Returns the underlying IO error if the file cannot be written.
    pub fn save(&self, folder: &Path) -> io::Result<()> {
        fs::write(&self.file, folder.to_string_lossy().as_bytes())
    }
}
