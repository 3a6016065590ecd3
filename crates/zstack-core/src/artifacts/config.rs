use serde::{Deserialize, Serialize};

use crate::consts::{
    DEFAULT_DEPTH_BOOST, DEFAULT_DEPTH_EDGE_THRESH, DEFAULT_DETAIL_THRESHOLD,
    DEFAULT_LAPLACIAN_KSIZE, DEFAULT_REPAIR_THRESHOLD, DEFAULT_SUPPORT_RATIO,
};
use crate::error::{FusionError, Result};
use crate::filters::laplacian::validate_ksize;

/// Detector variant.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArtifactMethod {
    /// Unsupported fused edges only.
    #[default]
    Simple,
    /// Unsupported fused edges, boosted along depth-map discontinuities.
    MultiScale,
}

impl std::fmt::Display for ArtifactMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Simple => write!(f, "Simple"),
            Self::MultiScale => write!(f, "Multi-Scale"),
        }
    }
}

/// Configuration for artifact confidence estimation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ArtifactOptions {
    #[serde(default)]
    pub method: ArtifactMethod,
    /// Odd Laplacian aperture (1, 3, 5 or 7).
    #[serde(default = "default_ksize")]
    pub laplacian_ksize: usize,
    /// Fraction of the best slice's edge response that counts as support.
    #[serde(default = "default_support_ratio")]
    pub support_ratio: f32,
    /// Fused edge response below this is never flagged.
    #[serde(default = "default_detail_threshold")]
    pub detail_threshold: f32,
    #[serde(default = "default_true")]
    pub enable_depth_edges: bool,
    /// Depth-map Laplacian magnitude above which a pixel is a depth edge.
    #[serde(default = "default_depth_edge_thresh")]
    pub depth_edge_thresh: f32,
    /// Confidence added on depth edges (multi-scale only).
    #[serde(default = "default_depth_boost")]
    pub depth_boost: f32,
    /// Radius of the final Gaussian blur. 0 = no blur.
    #[serde(default)]
    pub blur_radius: usize,
}

fn default_ksize() -> usize {
    DEFAULT_LAPLACIAN_KSIZE
}
fn default_support_ratio() -> f32 {
    DEFAULT_SUPPORT_RATIO
}
fn default_detail_threshold() -> f32 {
    DEFAULT_DETAIL_THRESHOLD
}
fn default_true() -> bool {
    true
}
fn default_depth_edge_thresh() -> f32 {
    DEFAULT_DEPTH_EDGE_THRESH
}
fn default_depth_boost() -> f32 {
    DEFAULT_DEPTH_BOOST
}

impl Default for ArtifactOptions {
    fn default() -> Self {
        Self {
            method: ArtifactMethod::default(),
            laplacian_ksize: DEFAULT_LAPLACIAN_KSIZE,
            support_ratio: DEFAULT_SUPPORT_RATIO,
            detail_threshold: DEFAULT_DETAIL_THRESHOLD,
            enable_depth_edges: true,
            depth_edge_thresh: DEFAULT_DEPTH_EDGE_THRESH,
            depth_boost: DEFAULT_DEPTH_BOOST,
            blur_radius: 0,
        }
    }
}

impl ArtifactOptions {
    pub fn validate(&self) -> Result<()> {
        validate_ksize(self.laplacian_ksize)?;
        for (name, v) in [
            ("support_ratio", self.support_ratio),
            ("detail_threshold", self.detail_threshold),
            ("depth_edge_thresh", self.depth_edge_thresh),
            ("depth_boost", self.depth_boost),
        ] {
            if !v.is_finite() || v < 0.0 {
                return Err(FusionError::InvalidParameter(format!(
                    "{name} must be finite and >= 0, got {v}"
                )));
            }
        }
        Ok(())
    }
}

/// Which pixels to repair and where to take replacements from.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RepairParams {
    /// Pixels with confidence at or above this are replaced.
    pub threshold: f32,
    /// Index of the aligned slice used as replacement source.
    pub background_slice: usize,
}

impl Default for RepairParams {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_REPAIR_THRESHOLD,
            background_slice: 0,
        }
    }
}
