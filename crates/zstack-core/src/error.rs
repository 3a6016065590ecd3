use thiserror::Error;

use crate::grid::GridSize;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FusionError {
    #[error("Empty slice stack")]
    EmptyStack,

    #[error("Slice {slice}: coefficient grid is empty")]
    EmptyGrid { slice: usize },

    #[error("Slice {slice}: size mismatch (expected {expected}, got {got})")]
    SizeMismatch {
        slice: usize,
        expected: GridSize,
        got: GridSize,
    },

    #[error("Stack of {count} slices exceeds the depth map range (max {max})")]
    TooManySlices { count: usize, max: usize },

    #[error("Slice index {index} out of range (total: {total})")]
    SliceIndexOutOfRange { index: usize, total: usize },

    #[error("Session has no accumulated slices")]
    SessionNotStarted,

    #[error("Neighbour smoothing needs every slice cached ({cached} of {slices} cached)")]
    MissingSliceCache { cached: usize, slices: usize },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Invalid consistency level: {0} (expected 0, 1 or 2)")]
    InvalidConsistency(u8),

    #[error("Operation cancelled")]
    Cancelled,
}

impl FusionError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Every variant except cancellation is raised before any state is touched.
    pub fn is_validation(&self) -> bool {
        !self.is_cancelled()
    }
}

pub type Result<T> = std::result::Result<T, FusionError>;
