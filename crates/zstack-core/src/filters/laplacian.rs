use ndarray::Array2;

use crate::error::{FusionError, Result};

use super::for_each_row;

/// Largest supported Laplacian aperture.
pub const MAX_LAPLACIAN_KSIZE: usize = 7;

/// Absolute Laplacian response of a grayscale image.
///
/// `ksize == 1` uses the 4-neighbour kernel
///   0  1  0
///   1 -4  1
///   0  1  0
/// Larger odd apertures sum separable second-derivative Sobel kernels
/// (`ksize == 3` gives `[2 0 2; 0 -8 0; 2 0 2]`). Borders reflect without
/// repeating the edge pixel.
pub fn laplacian_magnitude(data: &Array2<f32>, ksize: usize) -> Result<Array2<f32>> {
    validate_ksize(ksize)?;
    if data.is_empty() {
        return Ok(data.clone());
    }

    let smooth = binomial_kernel(ksize);
    let second = second_derivative_kernel(ksize.max(3));

    let d2x = convolve_cols(&convolve_rows(data, &second), &smooth);
    let d2y = convolve_cols(&convolve_rows(data, &smooth), &second);

    let mut out = d2x;
    out.zip_mut_with(&d2y, |a, &b| *a = (*a + b).abs());
    Ok(out)
}

pub fn validate_ksize(ksize: usize) -> Result<()> {
    if ksize % 2 == 0 || ksize > MAX_LAPLACIAN_KSIZE {
        return Err(FusionError::InvalidParameter(format!(
            "Laplacian ksize must be odd and at most {MAX_LAPLACIAN_KSIZE}, got {ksize}"
        )));
    }
    Ok(())
}

/// Row `n - 1` of Pascal's triangle, e.g. `[1, 2, 1]` for `n == 3`.
fn binomial_kernel(n: usize) -> Vec<f32> {
    let mut row = vec![1.0f32];
    for _ in 1..n {
        let mut next = vec![1.0f32; row.len() + 1];
        for i in 1..row.len() {
            next[i] = row[i - 1] + row[i];
        }
        row = next;
    }
    row
}

/// Binomial smoothing of size `n - 2` convolved with `[1, -2, 1]`.
fn second_derivative_kernel(n: usize) -> Vec<f32> {
    let base = binomial_kernel(n - 2);
    let diff = [1.0f32, -2.0, 1.0];
    let mut out = vec![0.0f32; n];
    for (i, &b) in base.iter().enumerate() {
        for (j, &d) in diff.iter().enumerate() {
            out[i + j] += b * d;
        }
    }
    out
}

/// Reflect an index into `[0, size)` without repeating the border sample.
pub fn reflect_101(idx: isize, size: usize) -> usize {
    if size <= 1 {
        return 0;
    }
    let last = size as isize - 1;
    let mut i = idx;
    while i < 0 || i > last {
        if i < 0 {
            i = -i;
        }
        if i > last {
            i = 2 * last - i;
        }
    }
    i as usize
}

fn convolve_rows(data: &Array2<f32>, kernel: &[f32]) -> Array2<f32> {
    let (h, w) = data.dim();
    let radius = (kernel.len() / 2) as isize;
    let mut result = Array2::<f32>::zeros((h, w));

    let filter_row = |row: usize, out: &mut [f32]| {
        for (col, dst) in out.iter_mut().enumerate() {
            *dst = kernel
                .iter()
                .enumerate()
                .map(|(ki, &kv)| data[[row, reflect_101(col as isize + ki as isize - radius, w)]] * kv)
                .sum();
        }
    };
    for_each_row(&mut result, filter_row);
    result
}

fn convolve_cols(data: &Array2<f32>, kernel: &[f32]) -> Array2<f32> {
    let (h, w) = data.dim();
    let radius = (kernel.len() / 2) as isize;
    let mut result = Array2::<f32>::zeros((h, w));

    let filter_row = |row: usize, out: &mut [f32]| {
        for (col, dst) in out.iter_mut().enumerate() {
            *dst = kernel
                .iter()
                .enumerate()
                .map(|(ki, &kv)| data[[reflect_101(row as isize + ki as isize - radius, h), col]] * kv)
                .sum();
        }
    };
    for_each_row(&mut result, filter_row);
    result
}
