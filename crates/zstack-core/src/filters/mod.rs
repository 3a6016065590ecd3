pub mod gaussian_blur;
pub mod laplacian;

use ndarray::{Array2, Axis};
use rayon::prelude::*;

use crate::consts::PARALLEL_PIXEL_THRESHOLD;

/// Fill `result` row by row, in parallel for large images.
///
/// Rows are independent, so both paths produce identical output.
pub(crate) fn for_each_row<F>(result: &mut Array2<f32>, fill: F)
where
    F: Fn(usize, &mut [f32]) + Sync,
{
    let (h, w) = result.dim();
    if h * w >= PARALLEL_PIXEL_THRESHOLD {
        result
            .axis_iter_mut(Axis(0))
            .into_par_iter()
            .enumerate()
            .for_each(|(row, mut out)| {
                if let Some(slice) = out.as_slice_mut() {
                    fill(row, slice);
                }
            });
    } else {
        for (row, mut out) in result.axis_iter_mut(Axis(0)).enumerate() {
            if let Some(slice) = out.as_slice_mut() {
                fill(row, slice);
            }
        }
    }
}
