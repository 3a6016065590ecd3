use ndarray::{s, Array2, Array3};
use tracing::info;

use crate::error::{FusionError, Result};
use crate::grid::GridSize;
use crate::progress::{FusionStage, JobControl};

use super::config::RepairParams;

/// Replace every pixel whose confidence reaches `params.threshold` with the
/// same pixel (all channels) of the background slice.
///
/// `image` and each slice are `(height, width, channels)`. Cancellation is
/// checked before each row; a cancelled repair leaves the rows already
/// processed modified, so the caller must discard `image`. Returns the
/// number of repaired pixels.
pub fn repair_artifacts(
    image: &mut Array3<f32>,
    confidence: &Array2<f32>,
    slices: &[Array3<f32>],
    params: &RepairParams,
    control: &JobControl,
) -> Result<usize> {
    control.checkpoint()?;

    if params.threshold.is_nan() {
        return Err(FusionError::InvalidParameter(
            "repair threshold must not be NaN".into(),
        ));
    }
    let (h, w, _) = image.dim();
    let size = GridSize::new(w, h);
    let conf_size = GridSize::of(confidence);
    if conf_size != size {
        return Err(FusionError::InvalidParameter(format!(
            "confidence map is {conf_size}, expected {size}"
        )));
    }
    if params.background_slice >= slices.len() {
        return Err(FusionError::SliceIndexOutOfRange {
            index: params.background_slice,
            total: slices.len(),
        });
    }
    for (i, slice) in slices.iter().enumerate() {
        if slice.dim() != image.dim() {
            let (sh, sw, _) = slice.dim();
            return Err(FusionError::SizeMismatch {
                slice: i,
                expected: size,
                got: GridSize::new(sw, sh),
            });
        }
    }
    let background = &slices[params.background_slice];

    control.begin_stage(FusionStage::RepairingArtifacts, Some(h));
    let mut repaired = 0;
    for row in 0..h {
        control.checkpoint()?;
        for col in 0..w {
            if confidence[[row, col]] >= params.threshold {
                image
                    .slice_mut(s![row, col, ..])
                    .assign(&background.slice(s![row, col, ..]));
                repaired += 1;
            }
        }
        control.advance(row + 1);
    }
    control.finish_stage();

    info!(
        repaired,
        threshold = params.threshold,
        background = params.background_slice,
        "Artifact repair complete"
    );
    Ok(repaired)
}
