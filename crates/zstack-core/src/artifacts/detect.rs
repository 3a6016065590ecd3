use ndarray::{Array2, Zip};
use tracing::info;

use crate::consts::{EPSILON, FLAGGED_CONFIDENCE};
use crate::error::{FusionError, Result};
use crate::filters::gaussian_blur::{gaussian_blur_array, sigma_for_radius};
use crate::filters::laplacian::laplacian_magnitude;
use crate::grid::{ArtifactConfidenceMap, DepthMap, GridSize};
use crate::progress::{FusionStage, JobControl};

use super::config::{ArtifactMethod, ArtifactOptions};

/// Fused edge response that no slice can account for, scaled to [0, 1].
///
/// `unsupported = fused_edge - support_ratio * max_i(slice_edge_i)`, clamped
/// at zero and forced to zero where the fused edge is below
/// `detail_threshold`, then divided by its own maximum. An all-zero field is
/// returned when nothing is unsupported.
pub fn detect_unsupported_laplacian(
    fused: &Array2<f32>,
    slices: &[Array2<f32>],
    ksize: usize,
    support_ratio: f32,
    detail_threshold: f32,
    control: &JobControl,
) -> Result<Array2<f32>> {
    check_image_stack(fused, slices)?;
    let fused_edge = laplacian_magnitude(fused, ksize)?;

    let mut best_support = Array2::<f32>::zeros(fused.dim());
    for (i, slice) in slices.iter().enumerate() {
        control.checkpoint()?;
        let edge = laplacian_magnitude(slice, ksize)?;
        Zip::from(&mut best_support)
            .and(&edge)
            .for_each(|best, &e| *best = best.max(e));
        control.checkpoint()?;
        control.advance(i + 1);
    }

    let mut unsupported = fused_edge;
    Zip::from(&mut unsupported)
        .and(&best_support)
        .for_each(|u, &support| {
            *u = if *u < detail_threshold {
                0.0
            } else {
                (*u - support_ratio * support).max(0.0)
            };
        });

    let max = unsupported.iter().copied().fold(0.0f32, f32::max);
    if max <= EPSILON {
        unsupported.fill(0.0);
    } else {
        unsupported.mapv_inplace(|v| v / max);
    }
    Ok(unsupported)
}

/// Add `boost` wherever the depth map's Laplacian exceeds `threshold`.
///
/// Returns the number of boosted pixels.
pub fn boost_depth_edges(
    confidence: &mut Array2<f32>,
    depth: &DepthMap,
    threshold: f32,
    boost: f32,
) -> Result<usize> {
    check_aux_size("depth map", GridSize::of(depth), GridSize::of(confidence))?;
    let depth_f = depth.mapv(|d| d as f32);
    let depth_edge = laplacian_magnitude(&depth_f, 1)?;
    let mut boosted = 0;
    Zip::from(confidence)
        .and(&depth_edge)
        .for_each(|c, &e| {
            if e > threshold {
                *c += boost;
                boosted += 1;
            }
        });
    Ok(boosted)
}

/// Per-pixel confidence that fused detail is a fusion hallucination.
///
/// `fused` and every slice are grayscale images of the same size. `depth` is
/// the fusion's provenance map (used by [`ArtifactMethod::MultiScale`]);
/// `mask`, when given, limits detection to `true` pixels. Nothing is
/// returned on cancellation.
pub fn detect_artifacts(
    fused: &Array2<f32>,
    slices: &[Array2<f32>],
    depth: Option<&DepthMap>,
    mask: Option<&Array2<bool>>,
    options: &ArtifactOptions,
    control: &JobControl,
) -> Result<ArtifactConfidenceMap> {
    control.checkpoint()?;
    options.validate()?;

    let size = check_image_stack(fused, slices)?;
    if let Some(depth) = depth {
        check_aux_size("depth map", GridSize::of(depth), size)?;
    }
    if let Some(mask) = mask {
        check_aux_size("mask", GridSize::of(mask), size)?;
    }

    control.begin_stage(FusionStage::DetectingArtifacts, Some(slices.len()));
    let mut confidence = detect_unsupported_laplacian(
        fused,
        slices,
        options.laplacian_ksize,
        options.support_ratio,
        options.detail_threshold,
        control,
    )?;

    if options.method == ArtifactMethod::MultiScale && options.enable_depth_edges {
        match depth {
            Some(depth) => {
                boost_depth_edges(
                    &mut confidence,
                    depth,
                    options.depth_edge_thresh,
                    options.depth_boost,
                )?;
            }
            None => control.warning("Multi-scale detection without a depth map; depth edges skipped"),
        }
    }

    if options.blur_radius > 0 {
        confidence = gaussian_blur_array(&confidence, sigma_for_radius(options.blur_radius));
    }
    if let Some(mask) = mask {
        Zip::from(&mut confidence).and(mask).for_each(|c, &keep| {
            if !keep {
                *c = 0.0;
            }
        });
    }
    confidence.mapv_inplace(|c| c.clamp(0.0, 1.0));
    control.finish_stage();

    let flagged = confidence.iter().filter(|&&c| c >= FLAGGED_CONFIDENCE).count();
    info!(
        method = %options.method,
        slices = slices.len(),
        flagged,
        "Artifact detection complete"
    );
    Ok(confidence)
}

/// Every slice must match the fused image's size.
fn check_image_stack(fused: &Array2<f32>, slices: &[Array2<f32>]) -> Result<GridSize> {
    if slices.is_empty() {
        return Err(FusionError::EmptyStack);
    }
    let size = GridSize::of(fused);
    for (i, slice) in slices.iter().enumerate() {
        let got = GridSize::of(slice);
        if got != size {
            return Err(FusionError::SizeMismatch {
                slice: i,
                expected: size,
                got,
            });
        }
    }
    Ok(size)
}

fn check_aux_size(what: &str, got: GridSize, expected: GridSize) -> Result<()> {
    if got != expected {
        return Err(FusionError::InvalidParameter(format!(
            "{what} is {got}, expected {expected}"
        )));
    }
    Ok(())
}
