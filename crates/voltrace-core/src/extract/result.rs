use ndarray::Array2;

use crate::movie::ContextBox;

/// Outcome of the first detection pass on the ROI-averaged trace.
#[derive(Clone, Debug)]
pub struct RawRoiResult {
    /// Background-corrected initial trace.
    pub t: Vec<f64>,
    /// Matched-filter output of the first pass.
    pub ts: Vec<f64>,
    pub spikes: Vec<usize>,
    /// The ROI cropped to the context window.
    pub spatial_filter: Array2<bool>,
    pub template: Vec<f64>,
    pub dff: Vec<f64>,
}

/// Everything extracted for one cell.
#[derive(Clone, Debug)]
pub struct CellResult {
    pub cell_id: usize,
    /// Final trace before matched filtering.
    pub t: Vec<f64>,
    /// Final matched-filter output.
    pub ts: Vec<f64>,
    /// Spike train convolved with the template.
    pub t_rec: Vec<f64>,
    /// Low-passed residual of `t` after removing `t_rec`.
    pub t_sub: Vec<f64>,
    pub spikes: Vec<usize>,
    /// Spike count after the first pass and after every iteration.
    pub num_spikes: Vec<usize>,
    pub low_spikes: bool,
    pub template: Vec<f64>,
    pub snr: f64,
    pub threshold: f64,
    /// Blurred weights embedded in the full field of view.
    pub spatial_filter: Array2<f64>,
    /// Regression weights embedded in the full field of view.
    pub weights: Array2<f64>,
    pub locality: bool,
    pub context: ContextBox,
    /// Per-pixel temporal mean over the context window.
    pub mean_im: Array2<f64>,
    pub f0: Vec<f64>,
    pub dff: Vec<f64>,
    pub false_positive_rate: Option<f64>,
    pub detection_rate: Option<f64>,
    pub raw_roi: RawRoiResult,
}

impl CellResult {
    /// Spatial filter restricted to the context window.
    pub fn local_spatial_filter(&self) -> Array2<f64> {
        self.context.crop(&self.spatial_filter)
    }
}
