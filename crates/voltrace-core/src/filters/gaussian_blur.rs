use ndarray::{Array2, ArrayView2};
use rayon::prelude::*;

use crate::consts::PARALLEL_PIXEL_THRESHOLD;

/// Separable Gaussian kernel: an odd tap count and a standard deviation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BlurKernel {
    pub size: usize,
    pub sigma: f64,
}

impl BlurKernel {
    pub fn new(size: usize, sigma: f64) -> Self {
        Self { size, sigma }
    }

    /// Kernel spanning two standard deviations on each side: `2*ceil(2*sigma)+1` taps.
    pub fn for_sigma(sigma: f64) -> Self {
        Self {
            size: 2 * (2.0 * sigma).ceil() as usize + 1,
            sigma,
        }
    }

    /// Normalised 1-D taps.
    pub fn taps(&self) -> Vec<f64> {
        let size = self.size.max(1);
        let center = (size - 1) as f64 / 2.0;
        let s2 = 2.0 * self.sigma * self.sigma;
        let mut kernel: Vec<f64> = (0..size)
            .map(|i| {
                let x = i as f64 - center;
                if s2 > 0.0 {
                    (-x * x / s2).exp()
                } else if x == 0.0 {
                    1.0
                } else {
                    0.0
                }
            })
            .collect();
        let sum: f64 = kernel.iter().sum();
        for v in &mut kernel {
            *v /= sum;
        }
        kernel
    }
}

/// Blur a 2-D image. Pixels beyond the border replicate the edge pixel.
pub fn gaussian_blur_array(data: ArrayView2<f64>, kernel: &BlurKernel) -> Array2<f64> {
    let taps = kernel.taps();
    let row_pass = convolve_rows(data, &taps);
    convolve_cols(row_pass.view(), &taps)
}

/// Blur every frame of a [time, pixel] matrix whose rows are row-major
/// `(height, width)` images.
pub fn blur_frames(
    data: &Array2<f64>,
    frame_dim: (usize, usize),
    kernel: &BlurKernel,
) -> Array2<f64> {
    let (t, p) = data.dim();
    let (h, w) = frame_dim;
    debug_assert_eq!(h * w, p);

    let blur_one = |frame: usize| -> Vec<f64> {
        let row = data.row(frame);
        let image = Array2::from_shape_fn((h, w), |(r, c)| row[r * w + c]);
        gaussian_blur_array(image.view(), kernel).into_iter().collect()
    };

    let frames: Vec<Vec<f64>> = if t * p >= PARALLEL_PIXEL_THRESHOLD {
        (0..t).into_par_iter().map(blur_one).collect()
    } else {
        (0..t).map(blur_one).collect()
    };

    let mut result = Array2::<f64>::zeros((t, p));
    for (frame, values) in frames.into_iter().enumerate() {
        for (px, v) in values.into_iter().enumerate() {
            result[[frame, px]] = v;
        }
    }
    result
}

fn convolve_rows(data: ArrayView2<f64>, kernel: &[f64]) -> Array2<f64> {
    let (h, w) = data.dim();
    let radius = kernel.len() / 2;
    let mut result = Array2::<f64>::zeros((h, w));
    for row in 0..h {
        for col in 0..w {
            let mut sum = 0.0;
            for (ki, &kv) in kernel.iter().enumerate() {
                let src_col =
                    (col as isize + ki as isize - radius as isize).clamp(0, w as isize - 1) as usize;
                sum += data[[row, src_col]] * kv;
            }
            result[[row, col]] = sum;
        }
    }
    result
}

fn convolve_cols(data: ArrayView2<f64>, kernel: &[f64]) -> Array2<f64> {
    let (h, w) = data.dim();
    let radius = kernel.len() / 2;
    let mut result = Array2::<f64>::zeros((h, w));
    for row in 0..h {
        for col in 0..w {
            let mut sum = 0.0;
            for (ki, &kv) in kernel.iter().enumerate() {
                let src_row =
                    (row as isize + ki as isize - radius as isize).clamp(0, h as isize - 1) as usize;
                sum += data[[src_row, col]] * kv;
            }
            result[[row, col]] = sum;
        }
    }
    result
}
