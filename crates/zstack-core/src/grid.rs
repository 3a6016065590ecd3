use std::fmt;

use ndarray::Array2;
use num_complex::Complex32;
use serde::{Deserialize, Serialize};

use crate::consts::MAX_SLICES;
use crate::error::{FusionError, Result};

/// Per-pixel provenance: index of the slice the fused value came from.
pub type DepthMap = Array2<u16>;

/// Per-pixel confidence in [0, 1] that fused detail is unsupported by any slice.
pub type ArtifactConfidenceMap = Array2<f32>;

/// Width and height of a coefficient grid.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridSize {
    pub width: usize,
    pub height: usize,
}

impl GridSize {
    pub fn new(width: usize, height: usize) -> Self {
        Self { width, height }
    }

    /// Size of an ndarray with shape `(height, width)`.
    pub fn of<T>(data: &Array2<T>) -> Self {
        let (h, w) = data.dim();
        Self::new(w, h)
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.height, self.width)
    }

    pub fn pixel_count(&self) -> usize {
        self.width * self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl fmt::Display for GridSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Wavelet transform of one grayscale slice, packed in the usual quadrant
/// layout. Row-major, shape = (height, width).
#[derive(Clone, Debug, PartialEq)]
pub struct CoefficientGrid {
    pub data: Array2<Complex32>,
}

impl CoefficientGrid {
    pub fn new(data: Array2<Complex32>) -> Self {
        Self { data }
    }

    pub fn zeros(size: GridSize) -> Self {
        Self::new(Array2::zeros(size.shape()))
    }

    pub fn width(&self) -> usize {
        self.data.ncols()
    }

    pub fn height(&self) -> usize {
        self.data.nrows()
    }

    pub fn size(&self) -> GridSize {
        GridSize::of(&self.data)
    }

    /// Squared magnitude of every coefficient. Only the ordering matters, so
    /// no square root is taken.
    pub fn energy(&self) -> Array2<f32> {
        self.data.mapv(energy)
    }

    pub fn count_non_finite(&self) -> usize {
        self.data
            .iter()
            .filter(|c| !(c.re.is_finite() && c.im.is_finite()))
            .count()
    }
}

impl From<Array2<Complex32>> for CoefficientGrid {
    fn from(data: Array2<Complex32>) -> Self {
        Self::new(data)
    }
}

/// Squared magnitude `re^2 + im^2`.
#[inline]
pub fn energy(c: Complex32) -> f32 {
    c.re * c.re + c.im * c.im
}

/// Post-merge cleanup intensity of the depth map.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsistencyLevel {
    /// Raw PMax decision.
    #[default]
    Off,
    /// Majority vote across the three detail subbands of each level.
    SubbandVote,
    /// Vote, then smooth isolated depth extrema and resample coefficients.
    NeighbourSmooth,
}

impl ConsistencyLevel {
    pub fn as_u8(self) -> u8 {
        match self {
            Self::Off => 0,
            Self::SubbandVote => 1,
            Self::NeighbourSmooth => 2,
        }
    }

    pub fn votes(self) -> bool {
        self >= Self::SubbandVote
    }

    pub fn smooths(self) -> bool {
        self >= Self::NeighbourSmooth
    }
}

impl TryFrom<u8> for ConsistencyLevel {
    type Error = FusionError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Self::Off),
            1 => Ok(Self::SubbandVote),
            2 => Ok(Self::NeighbourSmooth),
            other => Err(FusionError::InvalidConsistency(other)),
        }
    }
}

impl fmt::Display for ConsistencyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Off => write!(f, "Off"),
            Self::SubbandVote => write!(f, "Subband Vote"),
            Self::NeighbourSmooth => write!(f, "Neighbour Smooth"),
        }
    }
}

/// Result of a fusion run: merged coefficients plus provenance.
#[derive(Clone, Debug)]
pub struct FusionOutput {
    pub merged: CoefficientGrid,
    /// Winner-take-all (PMax) depth map. Diagnostic for weighted blending.
    pub depth: DepthMap,
    /// Per-pixel slice with the largest blending weight (weighted blending only).
    pub weighted_depth: Option<DepthMap>,
}

/// Check one incoming grid against the stack's expected size.
pub fn validate_grid(slice: usize, grid: &CoefficientGrid, expected: GridSize) -> Result<()> {
    let got = grid.size();
    if got.is_empty() {
        return Err(FusionError::EmptyGrid { slice });
    }
    if got != expected {
        return Err(FusionError::SizeMismatch {
            slice,
            expected,
            got,
        });
    }
    Ok(())
}

/// Check a full stack: non-empty, indexable by `u16`, uniform size.
///
/// Returns the common grid size.
pub fn validate_stack(stack: &[CoefficientGrid]) -> Result<GridSize> {
    let first = stack.first().ok_or(FusionError::EmptyStack)?;
    if stack.len() > MAX_SLICES {
        return Err(FusionError::TooManySlices {
            count: stack.len(),
            max: MAX_SLICES,
        });
    }
    let size = first.size();
    for (i, grid) in stack.iter().enumerate() {
        validate_grid(i, grid, size)?;
    }
    Ok(size)
}
