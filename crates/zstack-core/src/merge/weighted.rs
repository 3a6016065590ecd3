use ndarray::{s, Array2, Zip};
use num_complex::Complex32;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::consts::{
    DEFAULT_EPS_ENERGY, DEFAULT_EPS_WEIGHT, DEFAULT_WEIGHT_POWER, DEFAULT_WEIGHT_SIGMA0,
    ENERGY_SENTINEL, MAX_SLICES,
};
use crate::error::{FusionError, Result};
use crate::filters::gaussian_blur::gaussian_blur_array;
use crate::grid::{
    energy, validate_grid, CoefficientGrid, ConsistencyLevel, DepthMap, FusionOutput, GridSize,
};
use crate::levels::{HalvingPolicy, LevelPolicy, SubbandKind, SubbandLayout, SubbandRect};
use crate::progress::{FusionStage, JobControl};

use super::consistency::subband_vote;
use super::pmax::warn_non_finite;

/// Parameters for weighted subband blending.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WeightedParams {
    /// Gaussian sigma for weight smoothing at the finest level; doubles per coarser level.
    pub sigma0: f32,
    /// Exponent applied to normalized energy. Higher = closer to hard selection.
    pub power: f32,
    /// Added to each subband's max energy before normalizing.
    pub eps_energy: f32,
    /// Weight floor, also the minimum divisor in the final normalization.
    pub eps_weight: f32,
    /// Blend the lowpass band by its own energy instead of a plain average.
    #[serde(default)]
    pub include_lowpass: bool,
    /// Pick the lowpass band by hard PMax instead of blending it.
    #[serde(default = "default_true")]
    pub protect_lowpass_level0: bool,
}

fn default_true() -> bool {
    true
}

impl Default for WeightedParams {
    fn default() -> Self {
        Self {
            sigma0: DEFAULT_WEIGHT_SIGMA0,
            power: DEFAULT_WEIGHT_POWER,
            eps_energy: DEFAULT_EPS_ENERGY,
            eps_weight: DEFAULT_EPS_WEIGHT,
            include_lowpass: false,
            protect_lowpass_level0: true,
        }
    }
}

impl WeightedParams {
    pub fn validate(&self) -> Result<()> {
        let finite_non_negative = |name: &str, v: f32| {
            if v.is_finite() && v >= 0.0 {
                Ok(())
            } else {
                Err(FusionError::InvalidParameter(format!(
                    "{name} must be finite and >= 0, got {v}"
                )))
            }
        };
        finite_non_negative("sigma0", self.sigma0)?;
        finite_non_negative("power", self.power)?;
        for (name, v) in [("eps_energy", self.eps_energy), ("eps_weight", self.eps_weight)] {
            if !(v.is_finite() && v > 0.0) {
                return Err(FusionError::InvalidParameter(format!(
                    "{name} must be finite and > 0, got {v}"
                )));
            }
        }
        Ok(())
    }

    /// Weight-smoothing sigma for a subband at `level` (0 = finest).
    pub fn sigma_at(&self, level: usize) -> f32 {
        self.sigma0 * (1u64 << level.min(62)) as f32
    }
}

/// Hard-PMax competition restricted to the lowpass band.
struct ProtectedLowpass {
    rect: SubbandRect,
    max_energy: Array2<f32>,
    coeff: Array2<Complex32>,
    depth: DepthMap,
}

impl ProtectedLowpass {
    fn new(rect: SubbandRect) -> Self {
        let shape = (rect.height, rect.width);
        Self {
            rect,
            max_energy: Array2::from_elem(shape, ENERGY_SENTINEL),
            coeff: Array2::zeros(shape),
            depth: Array2::zeros(shape),
        }
    }

    fn update(&mut self, grid: &Array2<Complex32>, index: u16) {
        let band = grid.slice(s![self.rect.rows(), self.rect.cols()]);
        Zip::from(&mut self.max_energy)
            .and(&mut self.coeff)
            .and(&mut self.depth)
            .and(&band)
            .for_each(|max, coeff, depth, &c| {
                let e = energy(c);
                if e > *max {
                    *max = e;
                    *coeff = c;
                    *depth = index;
                }
            });
    }
}

struct WeightedState {
    size: GridSize,
    layout: SubbandLayout,
    max_energy: Array2<f32>,
    energy_depth: DepthMap,
    coeff_sum: Array2<Complex32>,
    weight_sum: Array2<f32>,
    max_weight: Array2<f32>,
    weight_depth: DepthMap,
    protected: Option<ProtectedLowpass>,
    slices: usize,
}

impl WeightedState {
    fn new(size: GridSize, layout: SubbandLayout, protect_lowpass: bool) -> Self {
        let shape = size.shape();
        let protected = protect_lowpass.then(|| ProtectedLowpass::new(layout.lowpass()));
        Self {
            size,
            layout,
            max_energy: Array2::from_elem(shape, ENERGY_SENTINEL),
            energy_depth: Array2::zeros(shape),
            coeff_sum: Array2::zeros(shape),
            weight_sum: Array2::zeros(shape),
            max_weight: Array2::from_elem(shape, ENERGY_SENTINEL),
            weight_depth: Array2::zeros(shape),
            protected,
            slices: 0,
        }
    }

    /// Diagnostic winner-take-all map, same rule as PMax.
    fn update_energy_winner(&mut self, grid: &Array2<Complex32>, index: u16) {
        Zip::from(&mut self.max_energy)
            .and(&mut self.energy_depth)
            .and(grid)
            .for_each(|max, depth, &c| {
                let e = energy(c);
                if e > *max {
                    *max = e;
                    *depth = index;
                }
            });
    }

    /// Add `weights * coefficients` and `weights` of one subband into the running sums.
    fn accumulate_band(
        &mut self,
        rect: &SubbandRect,
        band: &Array2<Complex32>,
        weights: &Array2<f32>,
        index: u16,
    ) {
        let rows = rect.rows();
        let cols = rect.cols();
        Zip::from(self.coeff_sum.slice_mut(s![rows.clone(), cols.clone()]))
            .and(self.weight_sum.slice_mut(s![rows.clone(), cols.clone()]))
            .and(self.max_weight.slice_mut(s![rows.clone(), cols.clone()]))
            .and(self.weight_depth.slice_mut(s![rows, cols]))
            .and(band)
            .and(weights)
            .for_each(|coeff_sum, weight_sum, max_weight, depth, &c, &w| {
                *coeff_sum += c * w;
                *weight_sum += w;
                if w > *max_weight {
                    *max_weight = w;
                    *depth = index;
                }
            });
    }
}

/// Energy-normalized, spatially smoothed blend weights for one subband.
fn band_weights(band: &Array2<Complex32>, params: &WeightedParams, sigma: f32) -> Array2<f32> {
    let energies = band.mapv(energy);
    let max = energies.iter().copied().fold(0.0f32, f32::max);
    let denom = max + params.eps_energy;
    let raw = energies.mapv(|e| {
        let normalized = if e.is_finite() { e / denom } else { 0.0 };
        (normalized + params.eps_weight).powf(params.power)
    });
    gaussian_blur_array(&raw, sigma)
}

/// Blended fusion: every slice contributes to every coefficient in proportion
/// to its smoothed local energy.
///
/// Seams are softer than hard selection at the cost of some edge contrast.
/// The PMax depth map is still tracked for diagnostics.
pub struct WeightedBlendSession {
    params: WeightedParams,
    policy: Box<dyn LevelPolicy>,
    state: Option<WeightedState>,
}

impl WeightedBlendSession {
    pub fn new(params: WeightedParams) -> Self {
        Self::with_policy(params, Box::new(HalvingPolicy::default()))
    }

    pub fn with_policy(params: WeightedParams, policy: Box<dyn LevelPolicy>) -> Self {
        Self {
            params,
            policy,
            state: None,
        }
    }

    pub fn params(&self) -> &WeightedParams {
        &self.params
    }

    pub fn slice_count(&self) -> usize {
        self.state.as_ref().map_or(0, |s| s.slices)
    }

    pub fn size(&self) -> Option<GridSize> {
        self.state.as_ref().map(|s| s.size)
    }

    pub fn reset(&mut self) {
        self.state = None;
    }

    /// Every level up to and including the lowpass band needs a finite blur sigma.
    fn check_sigma(&self, levels: usize) -> Result<()> {
        let coarsest = self.params.sigma_at(levels);
        if !coarsest.is_finite() {
            return Err(FusionError::InvalidParameter(format!(
                "sigma0 {} overflows at level {levels}",
                self.params.sigma0
            )));
        }
        Ok(())
    }

    /// Fold the next slice into the running weight and coefficient sums.
    ///
    /// A first call, or a call with a different `size`, starts a new stack.
    /// Invalid input and cancellation leave the session untouched.
    pub fn merge_slice_weighted(
        &mut self,
        grid: &CoefficientGrid,
        size: GridSize,
        control: &JobControl,
    ) -> Result<()> {
        control.checkpoint()?;
        self.params.validate()?;

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
            let layout = SubbandLayout::from_policy(size, self.policy.as_ref());
            self.check_sigma(layout.levels())?;
            debug!(size = %size, levels = layout.levels(), "Starting new weighted stack");
            self.state = Some(WeightedState::new(
                size,
                layout,
                self.params.protect_lowpass_level0,
            ));
            control.begin_stage(FusionStage::Blending, None);
        }
        warn_non_finite(index, grid, control);

        let params = &self.params;
        let Some(state) = self.state.as_mut() else {
            return Err(FusionError::SessionNotStarted);
        };
        let index16 = index as u16;
        state.update_energy_winner(&grid.data, index16);

        let rects: Vec<SubbandRect> = state.layout.coarse_to_fine().collect();
        for rect in rects.iter().filter(|r| !r.is_empty()) {
            let band = grid.data.slice(s![rect.rows(), rect.cols()]).to_owned();
            let weights = match rect.kind {
                SubbandKind::Lowpass => {
                    if let Some(protected) = state.protected.as_mut() {
                        protected.update(&grid.data, index16);
                        continue;
                    }
                    if params.include_lowpass {
                        band_weights(&band, params, params.sigma_at(rect.level))
                    } else {
                        Array2::ones(band.dim())
                    }
                }
                _ => band_weights(&band, params, params.sigma_at(rect.level)),
            };
            state.accumulate_band(rect, &band, &weights, index16);
        }

        state.slices += 1;
        control.advance(state.slices);
        Ok(())
    }

    /// Normalize the running sums into the blended result.
    ///
    /// Consistency voting only cleans the weighted depth map; coefficients are
    /// never resampled, since a blend has no single source slice.
    pub fn finish_weighted(
        &self,
        consistency: ConsistencyLevel,
        control: &JobControl,
    ) -> Result<FusionOutput> {
        control.checkpoint()?;

        let state = self
            .state
            .as_ref()
            .filter(|s| s.slices > 0)
            .ok_or(FusionError::SessionNotStarted)?;
        control.finish_stage();
        control.begin_stage(FusionStage::Finishing, None);

        let eps = self.params.eps_weight;
        let mut merged = state.coeff_sum.clone();
        Zip::from(&mut merged)
            .and(&state.weight_sum)
            .for_each(|c, &w| *c /= w.max(eps));

        let mut weighted_depth = state.weight_depth.clone();
        if let Some(protected) = &state.protected {
            let (rows, cols) = (protected.rect.rows(), protected.rect.cols());
            merged
                .slice_mut(s![rows.clone(), cols.clone()])
                .assign(&protected.coeff);
            weighted_depth
                .slice_mut(s![rows, cols])
                .assign(&protected.depth);
        }
        control.finish_stage();

        if consistency.votes() {
            control.checkpoint()?;
            control.begin_stage(FusionStage::SubbandVote, None);
            let voted = subband_vote(&mut weighted_depth, state.layout.levels());
            debug!(voted, "Weighted depth map vote complete");
            control.finish_stage();
        }

        info!(
            slices = state.slices,
            size = %state.size,
            levels = state.layout.levels(),
            protected_lowpass = state.protected.is_some(),
            "Weighted blend complete"
        );

        Ok(FusionOutput {
            merged: CoefficientGrid::new(merged),
            depth: state.energy_depth.clone(),
            weighted_depth: Some(weighted_depth),
        })
    }
}
