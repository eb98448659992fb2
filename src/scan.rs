//! Folder listing for environment map candidates.

use std::path::{Path, PathBuf};

use tracing::warn;
use walkdir::WalkDir;

use crate::error::Error;

/// Return `true` if `path` has one of `exts` (lowercase, without dot) as its
/// extension, compared case-insensitively.
#[must_use]
pub fn is_supported_image<S: AsRef<str>>(path: &Path, exts: &[S]) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .is_some_and(|ext| {
            let ext = ext.to_ascii_lowercase();
            exts.iter().any(|e| e.as_ref() == ext)
        })
}

/// List the files directly inside `folder` whose extension is in `exts`.
///
/// Subdirectories are not entered. Results are sorted by file name so the
/// grid layout is stable between runs. Entries that cannot be resolved, such
/// as dangling symlinks, are logged and skipped.
///
/// # Errors
/// Returns [`Error::InvalidFolder`] if `folder` is missing or not a directory,
/// and [`Error::Io`] if the directory itself cannot be read.
pub fn list_images<S: AsRef<str>>(folder: &Path, exts: &[S]) -> Result<Vec<PathBuf>, Error> {
    if !folder.is_dir() {
        return Err(Error::InvalidFolder(folder.to_path_buf()));
    }

    let mut out = Vec::new();
    for entry in WalkDir::new(folder)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name()
    {
        let entry = match entry {
            Ok(entry) => entry,
            // Depth 0 is the folder itself; nothing was listed.
            Err(e) if e.depth() == 0 => {
                return Err(match e.into_io_error() {
                    Some(io) => Error::Io(io),
                    None => Error::InvalidFolder(folder.to_path_buf()),
                });
            }
            Err(e) => {
                warn!(path = ?e.path(), error = %e, "skipping unreadable entry");
                continue;
            }
        };
        let path = entry.path();
        if entry.file_type().is_file() && is_supported_image(path, exts) {
            out.push(path.to_path_buf());
        }
    }
    Ok(out)
}
