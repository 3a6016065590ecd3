use ndarray::{Array2, Zip};
use num_complex::Complex32;
use tracing::debug;

use crate::error::{FusionError, Result};
use crate::grid::{CoefficientGrid, ConsistencyLevel, DepthMap, GridSize};
use crate::levels::{SubbandKind, SubbandLayout};
use crate::progress::{FusionStage, JobControl};

/// Majority vote across the three detail subbands of every level.
///
/// At each position the horizontal, vertical and diagonal depth values are
/// compared. When exactly two agree the third is overwritten; unanimous and
/// three-way-split positions are left alone. Returns the number of cells
/// rewritten.
pub fn subband_vote(depth: &mut DepthMap, levels: usize) -> usize {
    let layout = SubbandLayout::new(GridSize::of(depth), levels);
    let mut corrected = 0;

    for region in layout.regions() {
        let h_band = region.detail(SubbandKind::Horizontal);
        let v_band = region.detail(SubbandKind::Vertical);
        let d_band = region.detail(SubbandKind::Diagonal);

        // The diagonal band is the smallest of the three in both axes.
        for y in 0..d_band.height {
            for x in 0..d_band.width {
                let hp = [h_band.y + y, h_band.x + x];
                let vp = [v_band.y + y, v_band.x + x];
                let dp = [d_band.y + y, d_band.x + x];
                let (a, b, c) = (depth[hp], depth[vp], depth[dp]);

                if a == b && b != c {
                    depth[dp] = a;
                } else if a == c && a != b {
                    depth[vp] = a;
                } else if b == c && a != b {
                    depth[hp] = b;
                } else {
                    continue;
                }
                corrected += 1;
            }
        }
    }

    corrected
}

/// Flatten isolated depth extrema and resample the fused coefficients.
///
/// Every interior pixel whose depth is strictly above or strictly below all
/// four axis neighbours takes the rounded neighbour mean, and its fused
/// coefficient is re-read from the newly chosen slice. Neighbours are read
/// from a snapshot, so the result does not depend on scan order. Returns the
/// number of pixels rewritten.
pub fn neighbour_smooth(
    merged: &mut Array2<Complex32>,
    depth: &mut DepthMap,
    slices: &[CoefficientGrid],
) -> usize {
    let (h, w) = depth.dim();
    if h < 3 || w < 3 {
        return 0;
    }
    let snapshot = depth.clone();
    let mut smoothed = 0;

    for row in 1..h - 1 {
        for col in 1..w - 1 {
            let v = snapshot[[row, col]];
            let neighbours = [
                snapshot[[row - 1, col]],
                snapshot[[row + 1, col]],
                snapshot[[row, col - 1]],
                snapshot[[row, col + 1]],
            ];
            let local_max = neighbours.iter().all(|&n| n < v);
            let local_min = neighbours.iter().all(|&n| n > v);
            if !(local_max || local_min) {
                continue;
            }

            let sum: u32 = neighbours.iter().map(|&n| n as u32).sum();
            let replacement = ((sum + 2) / 4) as u16;
            depth[[row, col]] = replacement;
            merged[[row, col]] = slices[replacement as usize].data[[row, col]];
            smoothed += 1;
        }
    }

    smoothed
}

/// Re-read the fused coefficient wherever `depth` no longer matches `before`.
fn resample_changed(
    merged: &mut Array2<Complex32>,
    depth: &DepthMap,
    before: &DepthMap,
    slices: &[CoefficientGrid],
) -> usize {
    let mut resampled = 0;
    Zip::indexed(merged)
        .and(depth)
        .and(before)
        .for_each(|(row, col), fused, &now, &was| {
            if now != was {
                *fused = slices[now as usize].data[[row, col]];
                resampled += 1;
            }
        });
    resampled
}

/// Run the cleanup passes selected by `level` over a merged result.
///
/// Level 1 votes on the depth map only. Level 2 votes, smooths, and keeps
/// every fused coefficient consistent with its final depth index, which
/// requires the original slices.
pub(crate) fn apply_consistency(
    level: ConsistencyLevel,
    merged: &mut Array2<Complex32>,
    depth: &mut DepthMap,
    slices: Option<&[CoefficientGrid]>,
    levels: usize,
    control: &JobControl,
) -> Result<()> {
    if !level.votes() {
        return Ok(());
    }

    let slices = if level.smooths() {
        Some(slices.ok_or_else(|| {
            FusionError::InvalidParameter("neighbour smoothing needs the original slices".into())
        })?)
    } else {
        None
    };

    control.checkpoint()?;
    control.begin_stage(FusionStage::SubbandVote, None);
    let raw = slices.map(|_| depth.clone());
    let voted = subband_vote(depth, levels);
    debug!(voted, levels, "Subband vote complete");
    control.finish_stage();

    if let (Some(slices), Some(raw)) = (slices, raw) {
        control.checkpoint()?;
        control.begin_stage(FusionStage::NeighbourSmooth, None);
        let smoothed = neighbour_smooth(merged, depth, slices);
        let resampled = resample_changed(merged, depth, &raw, slices);
        debug!(smoothed, resampled, "Neighbour smoothing complete");
        control.finish_stage();
    }

    Ok(())
}
