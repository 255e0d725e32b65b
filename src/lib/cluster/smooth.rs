//! 3-point gaussian smoothing applied separably to 2D fields.

use ndarray::Array2;

// hardcoded weights for a 3-point gaussian convolution
const KERNEL: [f32; 3] = [0.24, 0.52, 0.24];

/// Smooth rows then columns with the 3-point kernel; border cells are
/// copied through unchanged.
pub fn smooth_2d(image: &Array2<f32>) -> Array2<f32> {
    let (rows, cols) = image.dim();
    if rows < 3 || cols < 3 {
        return image.clone();
    }

    let mut pass1 = image.clone();
    for i in 0..rows {
        for j in 1..cols - 1 {
            pass1[[i, j]] = KERNEL[0] * image[[i, j - 1]]
                + KERNEL[1] * image[[i, j]]
                + KERNEL[2] * image[[i, j + 1]];
        }
    }
    let mut out = pass1.clone();
    for j in 0..cols {
        for i in 1..rows - 1 {
            out[[i, j]] = KERNEL[0] * pass1[[i - 1, j]]
                + KERNEL[1] * pass1[[i, j]]
                + KERNEL[2] * pass1[[i + 1, j]];
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn impulse_spreads_to_neighbors() {
        let mut image: Array2<f32> = Array2::zeros((5, 5));
        image[[2, 2]] = 100.0;
        let smoothed = smooth_2d(&image);
        assert_abs_diff_eq!(smoothed[[2, 2]], 0.52 * 0.52 * 100.0, epsilon = 1e-4);
        assert_abs_diff_eq!(smoothed[[2, 1]], 0.52 * 0.24 * 100.0, epsilon = 1e-4);
        assert_abs_diff_eq!(smoothed[[1, 1]], 0.24 * 0.24 * 100.0, epsilon = 1e-4);
        // Peak stays the argmax.
        assert!(smoothed[[2, 2]] > smoothed[[2, 1]]);
    }

    #[test]
    fn tiny_fields_pass_through() {
        let image = Array2::from_elem((2, 2), 3.0f32);
        assert_eq!(smooth_2d(&image), image);
    }
}
