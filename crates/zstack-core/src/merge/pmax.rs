use ndarray::{Array2, Zip};
use num_complex::Complex32;
use tracing::info;

use crate::consts::ENERGY_SENTINEL;
use crate::error::Result;
use crate::grid::{
    energy, validate_stack, CoefficientGrid, ConsistencyLevel, DepthMap, FusionOutput, GridSize,
};
use crate::levels::{resolve_levels, HalvingPolicy, LevelPolicy};
use crate::progress::{FusionStage, JobControl};

use super::consistency::apply_consistency;

/// Running winner-take-all state.
///
/// Shared by the batch and streaming paths so both produce bit-identical
/// output for the same stack.
#[derive(Clone, Debug)]
pub(crate) struct PmaxAccumulator {
    pub max_energy: Array2<f32>,
    pub fused: Array2<Complex32>,
    pub depth: DepthMap,
}

impl PmaxAccumulator {
    pub fn new(size: GridSize) -> Self {
        Self {
            max_energy: Array2::from_elem(size.shape(), ENERGY_SENTINEL),
            fused: Array2::zeros(size.shape()),
            depth: Array2::zeros(size.shape()),
        }
    }

    /// Fold slice `index` into the running maximum. A strict `>` never
    /// displaces an earlier winner, so ties keep the lower index.
    pub fn accumulate(&mut self, grid: &Array2<Complex32>, index: u16) {
        Zip::from(&mut self.max_energy)
            .and(&mut self.fused)
            .and(&mut self.depth)
            .and(grid)
            .for_each(|max, fused, depth, &c| {
                let e = energy(c);
                if e > *max {
                    *max = e;
                    *fused = c;
                    *depth = index;
                }
            });
    }
}

/// Report non-finite coefficients without failing the job.
pub(crate) fn warn_non_finite(slice: usize, grid: &CoefficientGrid, control: &JobControl) {
    let bad = grid.count_non_finite();
    if bad > 0 {
        control.warning(&format!(
            "Slice {slice}: {bad} non-finite coefficients will never win selection"
        ));
    }
}

/// One-shot PMax fusion of a fully loaded slice stack.
pub struct WaveletMergeEngine {
    policy: Box<dyn LevelPolicy>,
}

impl Default for WaveletMergeEngine {
    fn default() -> Self {
        Self::new(HalvingPolicy::default())
    }
}

impl WaveletMergeEngine {
    pub fn new(policy: impl LevelPolicy + 'static) -> Self {
        Self {
            policy: Box::new(policy),
        }
    }

    pub fn with_policy(policy: Box<dyn LevelPolicy>) -> Self {
        Self { policy }
    }

    /// Fuse `stack` by per-pixel maximum coefficient energy.
    ///
    /// Nothing is returned on cancellation; the stack is only read.
    pub fn merge(
        &self,
        stack: &[CoefficientGrid],
        consistency: ConsistencyLevel,
        control: &JobControl,
    ) -> Result<FusionOutput> {
        control.checkpoint()?;

        control.begin_stage(FusionStage::Validating, Some(stack.len()));
        let size = validate_stack(stack)?;
        for (i, grid) in stack.iter().enumerate() {
            warn_non_finite(i, grid, control);
        }
        control.finish_stage();

        control.begin_stage(FusionStage::Merging, Some(stack.len()));
        let mut acc = PmaxAccumulator::new(size);
        for (i, grid) in stack.iter().enumerate() {
            control.checkpoint()?;
            acc.accumulate(&grid.data, i as u16);
            control.advance(i + 1);
        }
        control.finish_stage();

        let levels = resolve_levels(self.policy.as_ref(), size);
        let PmaxAccumulator {
            mut fused,
            mut depth,
            ..
        } = acc;
        apply_consistency(consistency, &mut fused, &mut depth, Some(stack), levels, control)?;

        info!(
            slices = stack.len(),
            size = %size,
            levels,
            consistency = %consistency,
            "PMax merge complete"
        );

        Ok(FusionOutput {
            merged: CoefficientGrid::new(fused),
            depth,
            weighted_depth: None,
        })
    }
}
