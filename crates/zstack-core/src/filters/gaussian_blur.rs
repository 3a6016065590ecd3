use ndarray::Array2;

use super::for_each_row;

/// Apply Gaussian blur to a raw array using separable 1D convolution.
///
/// Borders replicate the edge pixel. `sigma <= 0` returns an unchanged copy.
/// The kernel radius never exceeds the longer side of `data`.
pub fn gaussian_blur_array(data: &Array2<f32>, sigma: f32) -> Array2<f32> {
    if sigma.is_nan() || sigma <= 0.0 || data.is_empty() {
        return data.clone();
    }
    let (h, w) = data.dim();
    let kernel = make_gaussian_kernel(sigma, h.max(w));
    let row_pass = convolve_rows(data, &kernel);
    convolve_cols(&row_pass, &kernel)
}

/// Sigma matching an odd `2 * radius + 1` kernel when no sigma is given.
pub fn sigma_for_radius(radius: usize) -> f32 {
    if radius == 0 {
        return 0.0;
    }
    0.3 * (radius as f32 - 1.0) + 0.8
}

pub(crate) fn make_gaussian_kernel(sigma: f32, max_radius: usize) -> Vec<f32> {
    let reach = (sigma * 3.0).ceil();
    let radius = if reach < max_radius as f32 {
        reach as usize
    } else {
        max_radius
    };
    let size = 2 * radius + 1;
    let mut kernel = vec![0.0f32; size];
    let s2 = 2.0 * sigma * sigma;
    let mut sum = 0.0f32;

    for (i, k) in kernel.iter_mut().enumerate() {
        let x = i as f32 - radius as f32;
        *k = (-x * x / s2).exp();
        sum += *k;
    }

    for v in &mut kernel {
        *v /= sum;
    }

    kernel
}

fn convolve_rows(data: &Array2<f32>, kernel: &[f32]) -> Array2<f32> {
    let (h, w) = data.dim();
    let radius = kernel.len() / 2;
    let mut result = Array2::<f32>::zeros((h, w));

    for_each_row(&mut result, |row, out| {
        for (col, dst) in out.iter_mut().enumerate() {
            let mut sum = 0.0f32;
            for (ki, &kv) in kernel.iter().enumerate() {
                let src_col =
                    (col as isize + ki as isize - radius as isize).clamp(0, w as isize - 1) as usize;
                sum += data[[row, src_col]] * kv;
            }
            *dst = sum;
        }
    });
    result
}

fn convolve_cols(data: &Array2<f32>, kernel: &[f32]) -> Array2<f32> {
    let (h, w) = data.dim();
    let radius = kernel.len() / 2;
    let mut result = Array2::<f32>::zeros((h, w));

    for_each_row(&mut result, |row, out| {
        for (col, dst) in out.iter_mut().enumerate() {
            let mut sum = 0.0f32;
            for (ki, &kv) in kernel.iter().enumerate() {
                let src_row =
                    (row as isize + ki as isize - radius as isize).clamp(0, h as isize - 1) as usize;
                sum += data[[src_row, col]] * kv;
            }
            *dst = sum;
        }
    });
    result
}
