//! Wavelet level-count policy and subband geometry.
//!
//! Grids use the quadrant (Mallat) packing: the level-`l` region (`l = 0` is
//! the finest) is anchored at the origin, its top-left `ceil(w/2) x ceil(h/2)`
//! block holds the next coarser level, and the remaining three blocks hold the
//! horizontal (top-right), vertical (bottom-left) and diagonal (bottom-right)
//! details. After the last level the top-left block is the lowpass band.
//! Together the rectangles tile the grid exactly.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::consts::{DEFAULT_MAX_LEVELS, DEFAULT_MIN_LEVELS, DEFAULT_MIN_SUBBAND};
use crate::grid::GridSize;

/// Chooses how many decomposition levels a grid of a given size carries.
///
/// The count has to match whatever the paired forward transform produced.
pub trait LevelPolicy: Send + Sync {
    fn level_count(&self, size: GridSize) -> usize;
}

/// Halve (rounding up) while the next lowpass keeps at least `min_subband`
/// pixels on both axes, then clamp to `[min_levels, max_levels]`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HalvingPolicy {
    pub min_subband: usize,
    pub min_levels: usize,
    pub max_levels: usize,
}

impl Default for HalvingPolicy {
    fn default() -> Self {
        Self {
            min_subband: DEFAULT_MIN_SUBBAND,
            min_levels: DEFAULT_MIN_LEVELS,
            max_levels: DEFAULT_MAX_LEVELS,
        }
    }
}

impl LevelPolicy for HalvingPolicy {
    fn level_count(&self, size: GridSize) -> usize {
        let (mut w, mut h) = (size.width, size.height);
        let mut levels = 0;
        while levels < self.max_levels {
            let (nw, nh) = (w.div_ceil(2), h.div_ceil(2));
            if nw.min(nh) < self.min_subband.max(1) || w < 2 || h < 2 {
                break;
            }
            levels += 1;
            w = nw;
            h = nh;
        }
        levels.max(self.min_levels).min(self.max_levels)
    }
}

/// Always the same level count.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixedLevels(pub usize);

impl LevelPolicy for FixedLevels {
    fn level_count(&self, _size: GridSize) -> usize {
        self.0
    }
}

/// Serializable policy selection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum LevelPolicyConfig {
    Halving(HalvingPolicy),
    Fixed { levels: usize },
}

impl Default for LevelPolicyConfig {
    fn default() -> Self {
        Self::Halving(HalvingPolicy::default())
    }
}

impl LevelPolicyConfig {
    pub fn build(&self) -> Box<dyn LevelPolicy> {
        match self {
            Self::Halving(p) => Box::new(p.clone()),
            Self::Fixed { levels } => Box::new(FixedLevels(*levels)),
        }
    }
}

impl std::fmt::Display for LevelPolicyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Halving(p) => write!(
                f,
                "Halving (min subband {}px, {}..={} levels)",
                p.min_subband, p.min_levels, p.max_levels
            ),
            Self::Fixed { levels } => write!(f, "Fixed ({levels} levels)"),
        }
    }
}

/// Deepest decomposition whose detail subbands are all at least one pixel.
pub fn max_fitting_levels(size: GridSize) -> usize {
    let (mut w, mut h) = (size.width, size.height);
    let mut levels = 0;
    while w >= 2 && h >= 2 {
        levels += 1;
        w = w.div_ceil(2);
        h = h.div_ceil(2);
    }
    levels
}

/// Level count for `size`, never deeper than the grid allows.
pub fn resolve_levels(policy: &dyn LevelPolicy, size: GridSize) -> usize {
    policy.level_count(size).min(max_fitting_levels(size))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SubbandKind {
    Lowpass,
    Horizontal,
    Vertical,
    Diagonal,
}

impl SubbandKind {
    pub const DETAILS: [SubbandKind; 3] = [Self::Horizontal, Self::Vertical, Self::Diagonal];
}

/// One subband rectangle inside a packed grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SubbandRect {
    /// Detail level (0 = finest). The lowpass band reports the level count.
    pub level: usize,
    pub kind: SubbandKind,
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

impl SubbandRect {
    pub fn rows(&self) -> Range<usize> {
        self.y..self.y + self.height
    }

    pub fn cols(&self) -> Range<usize> {
        self.x..self.x + self.width
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn area(&self) -> usize {
        self.width * self.height
    }
}

/// Extent of one level region and of its low half.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LevelRegion {
    pub level: usize,
    pub width: usize,
    pub height: usize,
    pub low_width: usize,
    pub low_height: usize,
}

impl LevelRegion {
    fn new(level: usize, width: usize, height: usize) -> Self {
        Self {
            level,
            width,
            height,
            low_width: width.div_ceil(2),
            low_height: height.div_ceil(2),
        }
    }

    pub fn detail(&self, kind: SubbandKind) -> SubbandRect {
        let (lw, lh) = (self.low_width, self.low_height);
        let (dw, dh) = (self.width - lw, self.height - lh);
        let (x, y, width, height) = match kind {
            SubbandKind::Horizontal => (lw, 0, dw, lh),
            SubbandKind::Vertical => (0, lh, lw, dh),
            SubbandKind::Diagonal => (lw, lh, dw, dh),
            SubbandKind::Lowpass => (0, 0, lw, lh),
        };
        SubbandRect {
            level: self.level,
            kind,
            x,
            y,
            width,
            height,
        }
    }
}

/// Explicit subband rectangles of a grid decomposed `levels` times.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubbandLayout {
    pub size: GridSize,
    regions: Vec<LevelRegion>,
}

impl SubbandLayout {
    /// `levels` is clamped to what the grid can hold.
    pub fn new(size: GridSize, levels: usize) -> Self {
        let levels = levels.min(max_fitting_levels(size));
        let mut regions = Vec::with_capacity(levels);
        let (mut w, mut h) = (size.width, size.height);
        for level in 0..levels {
            let region = LevelRegion::new(level, w, h);
            w = region.low_width;
            h = region.low_height;
            regions.push(region);
        }
        Self { size, regions }
    }

    pub fn from_policy(size: GridSize, policy: &dyn LevelPolicy) -> Self {
        Self::new(size, resolve_levels(policy, size))
    }

    pub fn levels(&self) -> usize {
        self.regions.len()
    }

    /// Level regions, finest first.
    pub fn regions(&self) -> &[LevelRegion] {
        &self.regions
    }

    pub fn lowpass(&self) -> SubbandRect {
        let (width, height) = self
            .regions
            .last()
            .map(|r| (r.low_width, r.low_height))
            .unwrap_or((self.size.width, self.size.height));
        SubbandRect {
            level: self.levels(),
            kind: SubbandKind::Lowpass,
            x: 0,
            y: 0,
            width,
            height,
        }
    }

    /// Lowpass first, then the detail bands of each level from coarsest to finest.
    pub fn coarse_to_fine(&self) -> impl Iterator<Item = SubbandRect> + '_ {
        std::iter::once(self.lowpass()).chain(self.regions.iter().rev().flat_map(|region| {
            SubbandKind::DETAILS
                .into_iter()
                .map(move |kind| region.detail(kind))
        }))
    }
}
