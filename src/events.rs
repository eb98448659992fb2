use std::fmt;
use std::path::PathBuf;

use crate::decode::Preview;
use crate::error::DecodeError;

/// Version of the open folder. Bumped on every open or clear so results from
/// an earlier listing can be told apart from current ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Generation(pub u64);

impl Generation {
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "g{}", self.0)
    }
}

/// What a finished thumbnail task produced.
pub type TaskOutcome = Result<Preview, DecodeError>;

/// Result of one thumbnail task, sent from a worker to the coordinating thread.
#[derive(Debug)]
pub struct TaskReport {
    pub generation: Generation,
    pub path: PathBuf,
    pub outcome: TaskOutcome,
}
