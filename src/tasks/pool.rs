//! Bounded thumbnail worker pool.
//!
//! Decodes run as blocking tasks on a private tokio runtime whose blocking
//! pool is capped at the worker count; extra submissions wait in the
//! runtime's queue. Finished tasks post a [`TaskReport`] on a crossbeam
//! channel that only the coordinating thread drains, so workers never touch
//! session state.
//!
//! Cancellation is cooperative. [`WorkerPool::clear`] trips the current
//! cancellation token: queued tasks see it before starting and skip the
//! decode, running tasks finish but drop their report. A report can still
//! slip through if it was sent just before the token tripped, which is why
//! the session also filters by generation.

use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use tokio::runtime::{Builder, Runtime};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::config::Configuration;
use crate::error::DecodeError;
use crate::events::TaskReport;
use crate::tasks::thumbnail::ThumbnailTask;

pub struct WorkerPool {
    /// `None` runs every task inline on the submitting thread.
    runtime: Option<Runtime>,
    workers: usize,
    cancel: CancellationToken,
    results_tx: Sender<TaskReport>,
    results_rx: Receiver<TaskReport>,
    /// Tasks of the current batch that have neither reported nor been skipped.
    outstanding: Arc<AtomicUsize>,
}

impl WorkerPool {
    /// Spawn a pool running at most `workers` decodes at once.
    ///
    /// # Errors
    /// Fails if the runtime threads cannot be created.
    pub fn new(workers: usize) -> io::Result<Self> {
        let workers = workers.max(1);
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(workers)
            .thread_name("thumbnail-worker")
            .build()?;
        debug!(workers, "thumbnail pool started");
        Ok(Self::with_runtime(Some(runtime), workers))
    }

    /// A pool that decodes synchronously inside [`WorkerPool::submit`].
    #[must_use]
    pub fn inline() -> Self {
        debug!("thumbnail pool running inline");
        Self::with_runtime(None, 0)
    }

    /// Threaded or inline pool depending on `multithreading`.
    ///
    /// # Errors
    /// Fails if the runtime threads cannot be created.
    pub fn from_config(cfg: &Configuration) -> io::Result<Self> {
        if cfg.multithreading {
            Self::new(cfg.worker_count())
        } else {
            Ok(Self::inline())
        }
    }

    fn with_runtime(runtime: Option<Runtime>, workers: usize) -> Self {
        let (results_tx, results_rx) = unbounded();
        Self {
            runtime,
            workers,
            cancel: CancellationToken::new(),
            results_tx,
            results_rx,
            outstanding: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of worker threads; 0 when running inline.
    #[must_use]
    pub const fn workers(&self) -> usize {
        self.workers
    }

    /// Tasks submitted since the last clear that have not finished yet.
    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.outstanding() == 0
    }

    /// Queue `task`. Never blocks on the decode unless the pool is inline.
    pub fn submit(&self, task: ThumbnailTask) {
        self.outstanding.fetch_add(1, Ordering::AcqRel);
        let job = Job {
            task,
            cancel: self.cancel.clone(),
            results: self.results_tx.clone(),
            outstanding: Arc::clone(&self.outstanding),
        };
        match &self.runtime {
            Some(rt) => {
                // Detached: the report travels over the channel, not the handle.
                drop(rt.spawn_blocking(move || job.execute()));
            }
            None => job.execute(),
        }
    }

    /// Cancel queued tasks, detach running ones, and discard reports that
    /// have been delivered but not yet taken.
    pub fn clear(&mut self) {
        self.cancel.cancel();
        self.cancel = CancellationToken::new();
        // Detached jobs keep counting down the old batch's counter.
        self.outstanding = Arc::new(AtomicUsize::new(0));
        let dropped = self.results_rx.try_iter().count();
        debug!(dropped, "thumbnail pool cleared");
    }

    /// Take a delivered report without waiting.
    pub fn try_next(&self) -> Option<TaskReport> {
        self.results_rx.try_recv().ok()
    }

    /// Wait up to `timeout` for the next report.
    pub fn next_timeout(&self, timeout: Duration) -> Option<TaskReport> {
        match self.results_rx.recv_timeout(timeout) {
            Ok(report) => Some(report),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => {
                warn!("thumbnail result channel disconnected");
                None
            }
        }
    }

    /// Receiver for front ends that want to select on delivery themselves.
    /// Reports must still be applied on the coordinating thread.
    #[must_use]
    pub fn results(&self) -> Receiver<TaskReport> {
        self.results_rx.clone()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(rt) = self.runtime.take() {
            // Do not wait for a decode that is mid-file.
            rt.shutdown_background();
        }
    }
}

struct Job {
    task: ThumbnailTask,
    cancel: CancellationToken,
    results: Sender<TaskReport>,
    outstanding: Arc<AtomicUsize>,
}

impl Job {
    fn execute(self) {
        let Job {
            task,
            cancel,
            results,
            outstanding,
        } = self;

        if cancel.is_cancelled() {
            trace!(path = %task.path.display(), "skipping cancelled thumbnail task");
            outstanding.fetch_sub(1, Ordering::AcqRel);
            return;
        }

        let generation = task.generation;
        let path = task.path.clone();
        let limit = task.options.error_limit;
        let report = panic::catch_unwind(AssertUnwindSafe(|| task.run())).unwrap_or_else(|_| {
            warn!(path = %path.display(), "thumbnail decoder panicked");
            TaskReport {
                generation,
                path: path.clone(),
                outcome: Err(DecodeError::new(&path, "decoder panicked", limit)),
            }
        });

        if cancel.is_cancelled() {
            trace!(path = %path.display(), "dropping report from cleared batch");
        } else if let Err(err) = results.send(report) {
            trace!(path = %err.0.path.display(), "result channel closed; report dropped");
        }
        outstanding.fetch_sub(1, Ordering::AcqRel);
    }
}
