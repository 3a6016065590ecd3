use ndarray::{Array2, Array3, Axis};

use crate::consts::{LUMINANCE_B, LUMINANCE_G, LUMINANCE_R};

/// Collapse an interleaved `(height, width, channels)` image to grayscale.
///
/// One- and two-channel images keep their first channel. Three or more
/// channels are read as R, G, B (extra channels such as alpha are ignored)
/// and weighted with the BT.601 luminance coefficients.
pub fn to_grayscale(image: &Array3<f32>) -> Array2<f32> {
    let (h, w, channels) = image.dim();
    if channels < 3 {
        if channels == 0 {
            return Array2::zeros((h, w));
        }
        return image.index_axis(Axis(2), 0).to_owned();
    }

    let mut data = Array2::<f32>::zeros((h, w));
    for row in 0..h {
        for col in 0..w {
            data[[row, col]] = LUMINANCE_R * image[[row, col, 0]]
                + LUMINANCE_G * image[[row, col, 1]]
                + LUMINANCE_B * image[[row, col, 2]];
        }
    }
    data
}
