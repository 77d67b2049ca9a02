pub mod butterworth;
pub mod gaussian_blur;

pub use butterworth::{filter_columns, signal_filter, Butterworth, FilterMode};
pub use gaussian_blur::{blur_frames, gaussian_blur_array, BlurKernel};
