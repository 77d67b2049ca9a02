use serde::{Deserialize, Serialize};

use crate::consts::{
    DEFAULT_CENSOR_SIZE, DEFAULT_CLIP, DEFAULT_CONTEXT_SIZE, DEFAULT_FLIP_SIGNAL,
    DEFAULT_HP_FREQ, DEFAULT_HP_FREQ_PB, DEFAULT_MIN_SPIKES, DEFAULT_N_ITER, DEFAULT_N_PC_BG,
    DEFAULT_PNORM, DEFAULT_PNORM_INITIAL, DEFAULT_RIDGE_BG, DEFAULT_SIGMAS, DEFAULT_SUB_FREQ,
    DEFAULT_THRESHOLD, SPATIAL_SIGMA_INDEX,
};
use crate::error::{Result, VoltraceError};
use crate::spikes::{DenoiseParams, ThresholdMethod};

use super::weights::WeightUpdateMethod;

/// Parameters of a single-cell extraction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Side of the square the ROI is dilated by to form the context window.
    #[serde(default = "default_context_size")]
    pub context_size: usize,
    /// Radius of the disk around the ROI excluded from the background.
    #[serde(default = "default_censor_size")]
    pub censor_size: usize,
    /// Negate the movie first (for indicators that dim on depolarisation).
    #[serde(default = "default_flip_signal")]
    pub flip_signal: bool,
    /// High-pass cutoff (Hz) removing photobleaching from every pixel.
    #[serde(default = "default_hp_freq_pb")]
    pub hp_freq_pb: f64,
    /// Number of background principal components removed from the trace.
    #[serde(default = "default_n_pc_bg", alias = "nPC_bg")]
    pub n_pc_bg: usize,
    /// Ridge strength per background component.
    #[serde(default = "default_ridge_bg")]
    pub ridge_bg: f64,
    /// High-pass cutoff (Hz) applied to traces before spike detection.
    #[serde(default = "default_hp_freq")]
    pub hp_freq: f64,
    /// Most peaks used to build the template; 0 disables the ceiling.
    #[serde(default = "default_clip")]
    pub clip: usize,
    #[serde(default)]
    pub threshold_method: ThresholdMethod,
    /// Fewest spikes a detection pass may return.
    #[serde(default = "default_min_spikes")]
    pub min_spikes: usize,
    /// Noise multiple for the simple threshold.
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    /// Adaptive trade-off exponent of the template-building pass.
    #[serde(default = "default_pnorm_initial")]
    pub pnorm_initial: f64,
    /// Adaptive trade-off exponent of the detection pass.
    #[serde(default = "default_pnorm")]
    pub pnorm: f64,
    /// Spatial blur sigmas; the second entry shapes the regression design.
    #[serde(default = "default_sigmas")]
    pub sigmas: Vec<f64>,
    /// Spatial/temporal alternations after the first detection.
    #[serde(default = "default_n_iter")]
    pub n_iter: usize,
    #[serde(default)]
    pub weight_update: WeightUpdateMethod,
    /// Cross-validate the ridge strength. Not available.
    #[serde(default)]
    pub do_cross_val: bool,
    /// Low-pass cutoff (Hz) for the subthreshold trace.
    #[serde(default = "default_sub_freq")]
    pub sub_freq: f64,
}

fn default_context_size() -> usize {
    DEFAULT_CONTEXT_SIZE
}
fn default_censor_size() -> usize {
    DEFAULT_CENSOR_SIZE
}
fn default_flip_signal() -> bool {
    DEFAULT_FLIP_SIGNAL
}
fn default_hp_freq_pb() -> f64 {
    DEFAULT_HP_FREQ_PB
}
fn default_n_pc_bg() -> usize {
    DEFAULT_N_PC_BG
}
fn default_ridge_bg() -> f64 {
    DEFAULT_RIDGE_BG
}
fn default_hp_freq() -> f64 {
    DEFAULT_HP_FREQ
}
fn default_clip() -> usize {
    DEFAULT_CLIP
}
fn default_min_spikes() -> usize {
    DEFAULT_MIN_SPIKES
}
fn default_threshold() -> f64 {
    DEFAULT_THRESHOLD
}
fn default_pnorm_initial() -> f64 {
    DEFAULT_PNORM_INITIAL
}
fn default_pnorm() -> f64 {
    DEFAULT_PNORM
}
fn default_sigmas() -> Vec<f64> {
    DEFAULT_SIGMAS.to_vec()
}
fn default_n_iter() -> usize {
    DEFAULT_N_ITER
}
fn default_sub_freq() -> f64 {
    DEFAULT_SUB_FREQ
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            context_size: DEFAULT_CONTEXT_SIZE,
            censor_size: DEFAULT_CENSOR_SIZE,
            flip_signal: DEFAULT_FLIP_SIGNAL,
            hp_freq_pb: DEFAULT_HP_FREQ_PB,
            n_pc_bg: DEFAULT_N_PC_BG,
            ridge_bg: DEFAULT_RIDGE_BG,
            hp_freq: DEFAULT_HP_FREQ,
            clip: DEFAULT_CLIP,
            threshold_method: ThresholdMethod::default(),
            min_spikes: DEFAULT_MIN_SPIKES,
            threshold: DEFAULT_THRESHOLD,
            pnorm_initial: DEFAULT_PNORM_INITIAL,
            pnorm: DEFAULT_PNORM,
            sigmas: DEFAULT_SIGMAS.to_vec(),
            n_iter: DEFAULT_N_ITER,
            weight_update: WeightUpdateMethod::default(),
            do_cross_val: false,
            sub_freq: DEFAULT_SUB_FREQ,
        }
    }
}

impl ExtractionConfig {
    /// Reject configurations that cannot run, before touching any data.
    pub fn validate(&self) -> Result<()> {
        if self.do_cross_val {
            return Err(VoltraceError::CrossValidationUnsupported);
        }
        for (name, value) in [
            ("hp_freq_pb", self.hp_freq_pb),
            ("hp_freq", self.hp_freq),
            ("sub_freq", self.sub_freq),
            ("pnorm_initial", self.pnorm_initial),
            ("pnorm", self.pnorm),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(VoltraceError::InvalidConfig(format!(
                    "{name} must be positive, got {value}"
                )));
            }
        }
        if !(self.ridge_bg.is_finite() && self.ridge_bg >= 0.0) {
            return Err(VoltraceError::InvalidConfig(format!(
                "ridge_bg must be non-negative, got {}",
                self.ridge_bg
            )));
        }
        if !self.threshold.is_finite() {
            return Err(VoltraceError::InvalidConfig(
                "threshold must be finite".into(),
            ));
        }
        if self.sigmas.len() <= SPATIAL_SIGMA_INDEX {
            return Err(VoltraceError::InvalidConfig(format!(
                "sigmas needs at least {} entries, got {}",
                SPATIAL_SIGMA_INDEX + 1,
                self.sigmas.len()
            )));
        }
        if let Some(s) = self.sigmas.iter().find(|s| !(s.is_finite() && **s > 0.0)) {
            return Err(VoltraceError::InvalidConfig(format!(
                "sigmas must be positive, got {s}"
            )));
        }
        Ok(())
    }

    /// Sigma of the regression blur.
    pub fn spatial_sigma(&self) -> f64 {
        self.sigmas[SPATIAL_SIGMA_INDEX]
    }

    pub(crate) fn denoise_params(&self, window: usize, frame_rate: f64) -> DenoiseParams {
        DenoiseParams {
            window,
            frame_rate,
            hp_freq: self.hp_freq,
            clip: self.clip,
            min_spikes: self.min_spikes,
            method: self.threshold_method,
            threshold: self.threshold,
            pnorm_initial: self.pnorm_initial,
            pnorm: self.pnorm,
        }
    }
}
