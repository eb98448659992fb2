//! Folder browsing state owned by the coordinating thread.
//!
//! A [`BrowseSession`] lists a folder, hands one [`ThumbnailTask`] per file to
//! its [`WorkerPool`], and folds the reports back into per-item state. Every
//! open bumps the [`Generation`]; reports carrying any other generation are
//! dropped, so a slow decode from a previous folder can never land in the
//! current grid.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::{debug, info, instrument, warn};

use crate::config::Configuration;
use crate::decode::{ImageMeta, Preview, PreviewOptions};
use crate::error::Error;
use crate::events::{Generation, TaskReport};
use crate::scan;
use crate::tasks::pool::WorkerPool;
use crate::tasks::thumbnail::ThumbnailTask;

pub const STATUS_INVALID_FOLDER: &str = "Invalid folder path";
pub const STATUS_NO_FILES: &str = "No HDRI files found";
pub const CAPTION_LOADING: &str = "Loading...";
pub const FAILED_MARKER: &str = "⚠ Failed to load";

/// How long one receive waits when `wait_until_complete` has no deadline.
const UNBOUNDED_WAIT_SLICE: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone, PartialEq)]
pub enum ItemState {
    Pending,
    Loading,
    Loaded(Preview),
    Failed(String),
}

impl ItemState {
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Loaded(_) | Self::Failed(_))
    }
}

/// One grid cell: a file and where its thumbnail stands.
#[derive(Debug, Clone)]
pub struct ImageItem {
    pub path: PathBuf,
    pub name: String,
    pub state: ItemState,
}

impl ImageItem {
    fn new(path: PathBuf) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self {
            path,
            name,
            state: ItemState::Pending,
        }
    }

    #[must_use]
    pub fn preview(&self) -> Option<&Preview> {
        match &self.state {
            ItemState::Loaded(preview) => Some(preview),
            _ => None,
        }
    }

    #[must_use]
    pub fn meta(&self) -> Option<ImageMeta> {
        self.preview().map(|p| p.meta)
    }

    #[must_use]
    pub fn error(&self) -> Option<&str> {
        match &self.state {
            ItemState::Failed(message) => Some(message),
            _ => None,
        }
    }

    /// Text shown in place of the thumbnail, if there is no bitmap.
    #[must_use]
    pub fn placeholder(&self) -> Option<&'static str> {
        match &self.state {
            ItemState::Pending | ItemState::Loading => Some(CAPTION_LOADING),
            ItemState::Loaded(_) => None,
            ItemState::Failed(_) => Some(FAILED_MARKER),
        }
    }

    /// Text shown under the thumbnail.
    #[must_use]
    pub fn caption(&self) -> String {
        match &self.state {
            ItemState::Pending | ItemState::Loading => CAPTION_LOADING.to_string(),
            ItemState::Loaded(preview) => preview.meta.summary(),
            ItemState::Failed(message) => message.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusTone {
    Idle,
    Busy,
    Done,
    Warning,
    Error,
}

/// Text for the status label plus how loud it should look.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub text: String,
    pub tone: StatusTone,
}

impl Status {
    fn new(text: impl Into<String>, tone: StatusTone) -> Self {
        Self {
            text: text.into(),
            tone,
        }
    }

    #[must_use]
    pub fn idle() -> Self {
        Self::new("", StatusTone::Idle)
    }

    #[must_use]
    pub fn progress(completed: usize, total: usize) -> Self {
        if completed >= total {
            let plural = if total == 1 { "" } else { "s" };
            Self::new(format!("✓ Loaded {total} HDRI file{plural}"), StatusTone::Done)
        } else {
            Self::new(
                format!("Loading {completed}/{total} HDRI files..."),
                StatusTone::Busy,
            )
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Lowercase extensions without a dot.
    pub extensions: Vec<String>,
    pub preview: PreviewOptions,
    pub grid_columns: usize,
    pub timing: bool,
}

impl From<&Configuration> for SessionOptions {
    fn from(cfg: &Configuration) -> Self {
        Self {
            extensions: cfg.normalized_extensions(),
            preview: PreviewOptions {
                max_edge: cfg.thumbnail_size,
                error_limit: cfg.error_message_limit,
            },
            grid_columns: cfg.grid_columns.max(1),
            timing: cfg.timing,
        }
    }
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::from(&Configuration::default())
    }
}

pub struct BrowseSession {
    pool: WorkerPool,
    options: SessionOptions,
    folder: Option<PathBuf>,
    items: Vec<ImageItem>,
    by_path: HashMap<PathBuf, usize>,
    total: usize,
    completed: usize,
    generation: Generation,
    status: Status,
    opened_at: Option<Instant>,
}

impl BrowseSession {
    #[must_use]
    pub fn new(pool: WorkerPool, options: SessionOptions) -> Self {
        Self {
            pool,
            options,
            folder: None,
            items: Vec::new(),
            by_path: HashMap::new(),
            total: 0,
            completed: 0,
            generation: Generation::default(),
            status: Status::idle(),
            opened_at: None,
        }
    }

    /// List `folder` and queue a thumbnail for every matching file.
    ///
    /// Returns how many tasks were submitted; zero means the folder had no
    /// matching files, which is reported in the status but is not an error.
    ///
    /// # Errors
    /// [`Error::InvalidFolder`] if `folder` is not a directory; nothing is
    /// cleared or submitted in that case. [`Error::Io`] if listing fails
    /// after the previous folder was already dropped.
    #[instrument(skip(self, folder), fields(folder = %folder.display()))]
    pub fn open_folder(&mut self, folder: &Path) -> Result<usize, Error> {
        if !folder.is_dir() {
            warn!("not a directory");
            self.status = Status::new(STATUS_INVALID_FOLDER, StatusTone::Error);
            return Err(Error::InvalidFolder(folder.to_path_buf()));
        }

        self.clear();
        let started = Instant::now();
        let files = match scan::list_images(folder, &self.options.extensions) {
            Ok(files) => files,
            Err(err) => {
                warn!(error = %err, "folder listing failed");
                self.status = Status::new(STATUS_INVALID_FOLDER, StatusTone::Error);
                return Err(err);
            }
        };
        self.folder = Some(folder.to_path_buf());

        if files.is_empty() {
            info!("no matching files");
            self.status = Status::new(STATUS_NO_FILES, StatusTone::Warning);
            return Ok(0);
        }

        self.total = files.len();
        self.items = files.into_iter().map(ImageItem::new).collect();
        self.by_path = self
            .items
            .iter()
            .enumerate()
            .map(|(idx, item)| (item.path.clone(), idx))
            .collect();
        self.status = Status::progress(0, self.total);
        self.opened_at = Some(started);

        for item in &mut self.items {
            item.state = ItemState::Loading;
            let task = ThumbnailTask::new(self.generation, item.path.clone(), self.options.preview)
                .with_timing(self.options.timing);
            self.pool.submit(task);
        }

        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        if self.options.timing {
            info!(count = self.total, generation = %self.generation, elapsed_ms, "folder opened");
        } else {
            debug!(count = self.total, generation = %self.generation, elapsed_ms, "folder opened");
        }
        Ok(self.total)
    }

    /// Drop the current listing and detach from any outstanding work.
    pub fn clear(&mut self) {
        self.generation = self.generation.next();
        self.pool.clear();
        self.folder = None;
        self.items.clear();
        self.by_path.clear();
        self.total = 0;
        self.completed = 0;
        self.status = Status::idle();
        self.opened_at = None;
    }

    /// Fold one task report into the item table.
    ///
    /// Returns `false` when the report was ignored: stale generation, unknown
    /// path, or an item that already reached a terminal state.
    pub fn apply(&mut self, report: TaskReport) -> bool {
        let TaskReport {
            generation,
            path,
            outcome,
        } = report;

        if generation != self.generation {
            debug!(path = %path.display(), %generation, current = %self.generation, "discarding stale report");
            return false;
        }
        let Some(&idx) = self.by_path.get(&path) else {
            warn!(path = %path.display(), "report for unknown item");
            return false;
        };
        let item = &mut self.items[idx];
        if item.state.is_terminal() {
            warn!(path = %path.display(), "duplicate report ignored");
            return false;
        }

        item.state = match outcome {
            Ok(preview) => ItemState::Loaded(preview),
            Err(err) => ItemState::Failed(err.message),
        };
        self.completed += 1;
        self.status = Status::progress(self.completed, self.total);

        if self.is_complete() {
            let elapsed_ms = self
                .opened_at
                .map(|t| t.elapsed().as_secs_f64() * 1000.0)
                .unwrap_or_default();
            let failed = self.items.iter().filter(|i| i.error().is_some()).count();
            if self.options.timing {
                info!(total = self.total, failed, elapsed_ms, "all thumbnails loaded");
            } else {
                debug!(total = self.total, failed, elapsed_ms, "all thumbnails loaded");
            }
        }
        true
    }

    /// Apply every report already delivered. Returns how many were applied.
    pub fn pump(&mut self) -> usize {
        let mut applied = 0;
        while let Some(report) = self.pool.try_next() {
            if self.apply(report) {
                applied += 1;
            }
        }
        applied
    }

    /// Block the calling thread, applying reports as they arrive, until every
    /// item is terminal or `timeout` elapses. Returns whether it completed.
    pub fn wait_until_complete(&mut self, timeout: Duration) -> bool {
        // A timeout too large to add to the clock means no deadline.
        let deadline = Instant::now().checked_add(timeout);
        self.pump();
        while !self.is_complete() {
            let remaining = match deadline {
                Some(deadline) => deadline.saturating_duration_since(Instant::now()),
                None => UNBOUNDED_WAIT_SLICE,
            };
            if remaining.is_zero() {
                return false;
            }
            if let Some(report) = self.pool.next_timeout(remaining) {
                self.apply(report);
            }
        }
        true
    }

    /// Whether every listed item reached a terminal state.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.completed >= self.total
    }

    #[must_use]
    pub fn items(&self) -> &[ImageItem] {
        &self.items
    }

    #[must_use]
    pub fn item(&self, path: &Path) -> Option<&ImageItem> {
        self.by_path.get(path).map(|&idx| &self.items[idx])
    }

    #[must_use]
    pub fn folder(&self) -> Option<&Path> {
        self.folder.as_deref()
    }

    #[must_use]
    pub const fn generation(&self) -> Generation {
        self.generation
    }

    #[must_use]
    pub const fn total(&self) -> usize {
        self.total
    }

    #[must_use]
    pub const fn completed(&self) -> usize {
        self.completed
    }

    #[must_use]
    pub fn status(&self) -> &Status {
        &self.status
    }

    #[must_use]
    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Row and column of the `index`-th item in a row-major grid.
    #[must_use]
    pub fn grid_position(&self, index: usize) -> (usize, usize) {
        let cols = self.options.grid_columns;
        (index / cols, index % cols)
    }

    /// Items with their grid cell, in listing order.
    pub fn grid(&self) -> impl Iterator<Item = ((usize, usize), &ImageItem)> + '_ {
        self.items
            .iter()
            .enumerate()
            .map(|(idx, item)| (self.grid_position(idx), item))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DecodeError;
    use std::fs;

    fn session() -> BrowseSession {
        BrowseSession::new(WorkerPool::inline(), SessionOptions::default())
    }

    fn failed(generation: Generation, path: &Path) -> TaskReport {
        TaskReport {
            generation,
            path: path.to_path_buf(),
            outcome: Err(DecodeError::new(path, "boom", 30)),
        }
    }

    #[test]
    fn status_texts() {
        assert_eq!(Status::progress(0, 3).text, "Loading 0/3 HDRI files...");
        assert_eq!(Status::progress(3, 3).text, "✓ Loaded 3 HDRI files");
        assert_eq!(Status::progress(1, 1).text, "✓ Loaded 1 HDRI file");
        assert_eq!(Status::progress(1, 1).tone, StatusTone::Done);
    }

    #[test]
    fn invalid_folder_keeps_previous_state() {
        let mut s = session();
        let before = s.generation();
        let err = s.open_folder(Path::new("/no/such/folder")).unwrap_err();
        assert!(matches!(err, Error::InvalidFolder(_)));
        assert_eq!(s.generation(), before);
        assert_eq!(s.status().text, STATUS_INVALID_FOLDER);
        assert_eq!(s.status().tone, StatusTone::Error);
    }

    #[test]
    fn stale_and_duplicate_reports_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.exr");
        fs::write(&path, b"not an exr").unwrap();

        let mut s = session();
        assert_eq!(s.open_folder(dir.path()).unwrap(), 1);
        let current = s.generation();

        assert!(!s.apply(failed(Generation(current.0 - 1), &path)));
        assert_eq!(s.completed(), 0);

        assert!(s.apply(failed(current, &path)));
        assert!(!s.apply(failed(current, &path)));
        assert_eq!(s.completed(), 1);
        assert!(s.is_complete());

        // The inline pool's own report arrives after ours and is rejected.
        assert_eq!(s.pump(), 0);
    }

    #[test]
    fn huge_timeouts_do_not_overflow() {
        let mut s = session();
        assert!(s.wait_until_complete(Duration::MAX));
        assert!(s.wait_until_complete(Duration::from_secs(u64::MAX)));

        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.exr"), b"not an exr").unwrap();
        s.open_folder(dir.path()).unwrap();
        assert!(s.wait_until_complete(Duration::MAX));
        assert_eq!(s.completed(), 1);
    }

    #[test]
    fn unknown_paths_are_ignored() {
        let mut s = session();
        let g = s.generation();
        assert!(!s.apply(failed(g, Path::new("/elsewhere/x.exr"))));
    }

    #[test]
    fn grid_is_row_major() {
        let s = session();
        assert_eq!(s.grid_position(0), (0, 0));
        assert_eq!(s.grid_position(3), (0, 3));
        assert_eq!(s.grid_position(4), (1, 0));
        assert_eq!(s.grid_position(9), (2, 1));
    }

    #[test]
    fn captions_follow_state() {
        let mut item = ImageItem::new(PathBuf::from("/x/sky.hdr"));
        assert_eq!(item.name, "sky.hdr");
        assert_eq!(item.caption(), CAPTION_LOADING);
        item.state = ItemState::Failed("bad header".into());
        assert_eq!(item.placeholder(), Some(FAILED_MARKER));
        assert_eq!(item.caption(), "bad header");
        assert_eq!(item.error(), Some("bad header"));
    }
}
