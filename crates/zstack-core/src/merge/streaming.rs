use tracing::{debug, info};

use crate::consts::MAX_SLICES;
use crate::error::{FusionError, Result};
use crate::grid::{validate_grid, CoefficientGrid, ConsistencyLevel, FusionOutput, GridSize};
use crate::levels::{resolve_levels, HalvingPolicy, LevelPolicy};
use crate::progress::{FusionStage, JobControl};

use super::consistency::apply_consistency;
use super::pmax::{warn_non_finite, PmaxAccumulator};

/// Accumulated state of one stack.
struct StreamState {
    size: GridSize,
    acc: PmaxAccumulator,
    slices: usize,
    /// Slice copies, kept only while merging at consistency 2.
    cache: Vec<CoefficientGrid>,
}

impl StreamState {
    fn new(size: GridSize) -> Self {
        Self {
            size,
            acc: PmaxAccumulator::new(size),
            slices: 0,
            cache: Vec::new(),
        }
    }
}

/// Incremental PMax fusion, one slice at a time.
///
/// Memory stays at a few grids regardless of stack depth, except at
/// consistency 2 where every slice is cached for coefficient resampling.
/// Output matches [`WaveletMergeEngine::merge`](super::WaveletMergeEngine::merge)
/// bit for bit on the same stack.
pub struct StreamingMergeSession {
    policy: Box<dyn LevelPolicy>,
    state: Option<StreamState>,
}

impl Default for StreamingMergeSession {
    fn default() -> Self {
        Self::new(HalvingPolicy::default())
    }
}

impl StreamingMergeSession {
    pub fn new(policy: impl LevelPolicy + 'static) -> Self {
        Self::with_policy(Box::new(policy))
    }

    pub fn with_policy(policy: Box<dyn LevelPolicy>) -> Self {
        Self {
            policy,
            state: None,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.state.is_some()
    }

    pub fn slice_count(&self) -> usize {
        self.state.as_ref().map_or(0, |s| s.slices)
    }

    /// Size of the stack currently being accumulated.
    pub fn size(&self) -> Option<GridSize> {
        self.state.as_ref().map(|s| s.size)
    }

    /// Drop all accumulated state.
    pub fn reset(&mut self) {
        self.state = None;
    }

    /// Fold the next slice of a stack of `size` grids into the session.
    ///
    /// A first call, or a call with a different `size`, starts a new stack.
    /// Invalid input and cancellation leave the session untouched.
    pub fn merge_slice(
        &mut self,
        grid: &CoefficientGrid,
        size: GridSize,
        consistency: ConsistencyLevel,
        control: &JobControl,
    ) -> Result<()> {
        control.checkpoint()?;

        let continuing = self.state.as_ref().filter(|s| s.size == size);
        let index = continuing.map_or(0, |s| s.slices);
        validate_grid(index, grid, size)?;
        if index >= MAX_SLICES {
            return Err(FusionError::TooManySlices {
                count: index + 1,
                max: MAX_SLICES,
            });
        }

        if continuing.is_none() {
            debug!(size = %size, "Starting new streaming stack");
            self.state = Some(StreamState::new(size));
            control.begin_stage(FusionStage::Merging, None);
        }
        warn_non_finite(index, grid, control);

        let Some(state) = self.state.as_mut() else {
            return Err(FusionError::SessionNotStarted);
        };
        state.acc.accumulate(&grid.data, index as u16);
        if consistency.smooths() {
            state.cache.push(grid.clone());
        }
        state.slices += 1;
        control.advance(state.slices);
        Ok(())
    }

    /// Apply the consistency passes to the accumulated stack and return copies.
    ///
    /// The session is not reset; a later `merge_slice` with a new size starts over.
    pub fn finish(&self, consistency: ConsistencyLevel, control: &JobControl) -> Result<FusionOutput> {
        control.checkpoint()?;

        let state = self
            .state
            .as_ref()
            .filter(|s| s.slices > 0)
            .ok_or(FusionError::SessionNotStarted)?;
        if consistency.smooths() && state.cache.len() != state.slices {
            return Err(FusionError::MissingSliceCache {
                cached: state.cache.len(),
                slices: state.slices,
            });
        }
        control.finish_stage();

        let mut fused = state.acc.fused.clone();
        let mut depth = state.acc.depth.clone();
        let levels = resolve_levels(self.policy.as_ref(), state.size);
        let cache = consistency.smooths().then_some(state.cache.as_slice());
        apply_consistency(consistency, &mut fused, &mut depth, cache, levels, control)?;

        info!(
            slices = state.slices,
            size = %state.size,
            levels,
            consistency = %consistency,
            "Streaming PMax merge complete"
        );

        Ok(FusionOutput {
            merged: CoefficientGrid::new(fused),
            depth,
            weighted_depth: None,
        })
    }
}
