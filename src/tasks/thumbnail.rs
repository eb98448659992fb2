use std::path::PathBuf;
use std::time::Instant;

use tracing::{debug, info, trace};

use crate::decode::{PreviewOptions, decode_preview};
use crate::events::{Generation, TaskReport};

/// One decode job: a file, the folder generation it belongs to, and how to
/// shape the preview.
#[derive(Debug, Clone)]
pub struct ThumbnailTask {
    pub generation: Generation,
    pub path: PathBuf,
    pub options: PreviewOptions,
    /// Report elapsed time at info level instead of trace.
    pub timing: bool,
}

impl ThumbnailTask {
    #[must_use]
    pub fn new(generation: Generation, path: PathBuf, options: PreviewOptions) -> Self {
        Self {
            generation,
            path,
            options,
            timing: false,
        }
    }

    #[must_use]
    pub const fn with_timing(mut self, timing: bool) -> Self {
        self.timing = timing;
        self
    }

    /// Decode the file. Runs on a worker thread and touches no shared state.
    pub fn run(self) -> TaskReport {
        let started = Instant::now();
        let outcome = decode_preview(&self.path, &self.options);
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

        match &outcome {
            Ok(preview) => debug!(
                path = %self.path.display(),
                generation = %self.generation,
                meta = %preview.meta.summary(),
                "thumbnail decoded"
            ),
            Err(err) => debug!(
                path = %self.path.display(),
                generation = %self.generation,
                error = %err,
                "thumbnail failed"
            ),
        }
        if self.timing {
            info!(path = %self.path.display(), elapsed_ms, ok = outcome.is_ok(), "thumbnail timing");
        } else {
            trace!(path = %self.path.display(), elapsed_ms, "thumbnail timing");
        }

        TaskReport {
            generation: self.generation,
            path: self.path,
            outcome,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_keeps_generation_and_path() {
        let task = ThumbnailTask::new(
            Generation(7),
            PathBuf::from("/nope/missing.hdr"),
            PreviewOptions::default(),
        );
        let report = task.run();
        assert_eq!(report.generation, Generation(7));
        assert_eq!(report.path, PathBuf::from("/nope/missing.hdr"));
        let err = report.outcome.unwrap_err();
        assert!(err.message.chars().count() <= 30);
    }
}
