use serde::{Deserialize, Serialize};

use crate::error::{FusionError, Result};
use crate::grid::{CoefficientGrid, ConsistencyLevel, FusionOutput, GridSize};
use crate::levels::LevelPolicyConfig;
use crate::progress::JobControl;

use super::streaming::StreamingMergeSession;
use super::weighted::{WeightedBlendSession, WeightedParams};

/// How slices are combined.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum FusionStrategy {
    /// Per-pixel hard selection of the highest-energy slice (PMax).
    #[default]
    HardSelect,
    /// Energy-weighted blend of all slices.
    WeightedBlend(WeightedParams),
}

impl std::fmt::Display for FusionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::HardSelect => write!(f, "Hard Select (PMax)"),
            Self::WeightedBlend(p) => write!(
                f,
                "Weighted Blend (sigma0={}, power={})",
                p.sigma0, p.power
            ),
        }
    }
}

/// Initialize / accumulate / finish interface shared by every fusion strategy.
pub trait SliceAccumulator {
    /// Fold in the next slice of a stack whose grids are all `size`.
    fn merge_slice(
        &mut self,
        grid: &CoefficientGrid,
        size: GridSize,
        consistency: ConsistencyLevel,
        control: &JobControl,
    ) -> Result<()>;

    /// Produce the fused result from everything accumulated so far.
    fn finish(&self, consistency: ConsistencyLevel, control: &JobControl) -> Result<FusionOutput>;

    fn slice_count(&self) -> usize;

    fn reset(&mut self);
}

impl SliceAccumulator for StreamingMergeSession {
    fn merge_slice(
        &mut self,
        grid: &CoefficientGrid,
        size: GridSize,
        consistency: ConsistencyLevel,
        control: &JobControl,
    ) -> Result<()> {
        StreamingMergeSession::merge_slice(self, grid, size, consistency, control)
    }

    fn finish(&self, consistency: ConsistencyLevel, control: &JobControl) -> Result<FusionOutput> {
        StreamingMergeSession::finish(self, consistency, control)
    }

    fn slice_count(&self) -> usize {
        StreamingMergeSession::slice_count(self)
    }

    fn reset(&mut self) {
        StreamingMergeSession::reset(self)
    }
}

impl SliceAccumulator for WeightedBlendSession {
    fn merge_slice(
        &mut self,
        grid: &CoefficientGrid,
        size: GridSize,
        _consistency: ConsistencyLevel,
        control: &JobControl,
    ) -> Result<()> {
        self.merge_slice_weighted(grid, size, control)
    }

    fn finish(&self, consistency: ConsistencyLevel, control: &JobControl) -> Result<FusionOutput> {
        self.finish_weighted(consistency, control)
    }

    fn slice_count(&self) -> usize {
        WeightedBlendSession::slice_count(self)
    }

    fn reset(&mut self) {
        WeightedBlendSession::reset(self)
    }
}

/// A fusion session of either strategy.
pub enum FusionSession {
    HardSelect(StreamingMergeSession),
    WeightedBlend(WeightedBlendSession),
}

impl FusionSession {
    pub fn for_strategy(strategy: &FusionStrategy, levels: &LevelPolicyConfig) -> Self {
        match strategy {
            FusionStrategy::HardSelect => {
                Self::HardSelect(StreamingMergeSession::with_policy(levels.build()))
            }
            FusionStrategy::WeightedBlend(params) => Self::WeightedBlend(
                WeightedBlendSession::with_policy(params.clone(), levels.build()),
            ),
        }
    }

    fn inner(&self) -> &dyn SliceAccumulator {
        match self {
            Self::HardSelect(s) => s,
            Self::WeightedBlend(s) => s,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn SliceAccumulator {
        match self {
            Self::HardSelect(s) => s,
            Self::WeightedBlend(s) => s,
        }
    }
}

impl SliceAccumulator for FusionSession {
    fn merge_slice(
        &mut self,
        grid: &CoefficientGrid,
        size: GridSize,
        consistency: ConsistencyLevel,
        control: &JobControl,
    ) -> Result<()> {
        self.inner_mut().merge_slice(grid, size, consistency, control)
    }

    fn finish(&self, consistency: ConsistencyLevel, control: &JobControl) -> Result<FusionOutput> {
        self.inner().finish(consistency, control)
    }

    fn slice_count(&self) -> usize {
        self.inner().slice_count()
    }

    fn reset(&mut self) {
        self.inner_mut().reset()
    }
}

/// Reset `session`, feed it every grid of `stack` in order, and finish.
pub fn fuse_stack<A: SliceAccumulator + ?Sized>(
    session: &mut A,
    stack: &[CoefficientGrid],
    consistency: ConsistencyLevel,
    control: &JobControl,
) -> Result<FusionOutput> {
    let first = stack.first().ok_or(FusionError::EmptyStack)?;
    let size = first.size();
    session.reset();
    for grid in stack {
        session.merge_slice(grid, size, consistency, control)?;
    }
    session.finish(consistency, control)
}
