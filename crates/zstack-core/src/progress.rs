use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, warn};

use crate::error::{FusionError, Result};

/// Processing phase, used for status reporting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FusionStage {
    Validating,
    Merging,
    Blending,
    SubbandVote,
    NeighbourSmooth,
    Finishing,
    DetectingArtifacts,
    RepairingArtifacts,
}

impl std::fmt::Display for FusionStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validating => write!(f, "Validating slices"),
            Self::Merging => write!(f, "Merging slices"),
            Self::Blending => write!(f, "Blending slices"),
            Self::SubbandVote => write!(f, "Voting across subbands"),
            Self::NeighbourSmooth => write!(f, "Smoothing depth map"),
            Self::Finishing => write!(f, "Finishing"),
            Self::DetectingArtifacts => write!(f, "Detecting artifacts"),
            Self::RepairingArtifacts => write!(f, "Repairing artifacts"),
        }
    }
}

/// Thread-safe progress reporting for fusion jobs.
///
/// Implementors can use this to drive progress bars, logging, or any other
/// UI feedback. All methods have default no-op implementations.
pub trait ProgressReporter: Send + Sync {
    /// A new stage has started. `total_items` is the number of work items
    /// in this stage (e.g., slice count), if known.
    fn begin_stage(&self, _stage: FusionStage, _total_items: Option<usize>) {}

    /// One work item within the current stage has completed.
    fn advance(&self, _items_done: usize) {}

    /// The current stage is finished.
    fn finish_stage(&self) {}

    /// Advisory diagnostic. Never aborts the job.
    fn warning(&self, _message: &str) {}
}

/// Reporter that ignores everything.
pub struct NoOpReporter;
impl ProgressReporter for NoOpReporter {}

static NO_OP: NoOpReporter = NoOpReporter;

/// Per-call cancellation flag and progress sink.
///
/// The flag is owned by the caller and only ever read here; cancellation is
/// observed at slice and row boundaries.
#[derive(Clone, Copy)]
pub struct JobControl<'a> {
    cancel: Option<&'a AtomicBool>,
    reporter: &'a dyn ProgressReporter,
}

impl Default for JobControl<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> JobControl<'a> {
    pub fn new() -> Self {
        Self {
            cancel: None,
            reporter: &NO_OP,
        }
    }

    pub fn with_cancel(mut self, flag: &'a AtomicBool) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn with_reporter(mut self, reporter: &'a dyn ProgressReporter) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    /// `Err(Cancelled)` once the caller has raised the flag.
    pub fn checkpoint(&self) -> Result<()> {
        if self.is_cancelled() {
            debug!("Cancellation observed");
            return Err(FusionError::Cancelled);
        }
        Ok(())
    }

    pub fn begin_stage(&self, stage: FusionStage, total_items: Option<usize>) {
        debug!(%stage, total = ?total_items, "Stage started");
        self.reporter.begin_stage(stage, total_items);
    }

    pub fn advance(&self, items_done: usize) {
        self.reporter.advance(items_done);
    }

    pub fn finish_stage(&self) {
        self.reporter.finish_stage();
    }

    pub fn warning(&self, message: &str) {
        warn!("{message}");
        self.reporter.warning(message);
    }
}
