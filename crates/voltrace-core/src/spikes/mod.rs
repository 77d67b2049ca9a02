pub mod denoise;
pub mod kde;
pub mod peaks;
pub mod threshold;
pub mod whitening;

pub use denoise::{denoise_spikes, DenoiseOutput, DenoiseParams};
pub use threshold::{
    AdaptiveThreshold, PeakThreshold, SimpleThreshold, SpikeBudget, ThresholdMethod,
    ThresholdOutcome,
};
pub use whitening::{welch_psd, whitened_matched_filter};
