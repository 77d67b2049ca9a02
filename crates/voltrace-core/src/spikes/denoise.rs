use tracing::{debug, warn};

use crate::consts::{INITIAL_SIMPLE_MULTIPLIER, TRACE_FILTER_ORDER};
use crate::error::Result;
use crate::filters::{signal_filter, FilterMode};

use super::peaks::{center_on_median, convolve_same, mean_at, median};
use super::threshold::{PeakThreshold, SpikeBudget, ThresholdMethod};
use super::whitening::whitened_matched_filter;

/// Parameters of one denoising call.
#[derive(Clone, Debug)]
pub struct DenoiseParams {
    /// Template half-width in samples.
    pub window: usize,
    pub frame_rate: f64,
    pub hp_freq: f64,
    pub clip: usize,
    pub min_spikes: usize,
    pub method: ThresholdMethod,
    /// Noise multiple of the second simple pass.
    pub threshold: f64,
    pub pnorm_initial: f64,
    pub pnorm: f64,
}

/// Denoised trace and detected spikes.
#[derive(Clone, Debug, Default)]
pub struct DenoiseOutput {
    /// Matched-filter output, rescaled to the high-passed trace.
    pub filtered: Vec<f64>,
    pub spikes: Vec<usize>,
    /// Spike indicator convolved with the template.
    pub reconstructed: Vec<f64>,
    /// Peak-triggered median of the high-passed trace, minimum at zero.
    pub template: Vec<f64>,
    pub low_spikes: bool,
    /// Second-pass threshold, rescaled like `filtered`.
    pub threshold: f64,
    pub false_positive_rate: Option<f64>,
    pub detection_rate: Option<f64>,
}

impl DenoiseOutput {
    /// Output of a pass that found nothing usable.
    pub fn empty(len: usize, window: usize) -> Self {
        Self {
            filtered: vec![0.0; len],
            spikes: Vec::new(),
            reconstructed: vec![0.0; len],
            template: vec![0.0; 2 * window + 1],
            low_spikes: true,
            threshold: 0.0,
            false_positive_rate: None,
            detection_rate: None,
        }
    }
}

/// Find spikes in a 1-D trace and build its denoised version.
///
/// The trace is high-passed, thresholded once to build a template, whitened and
/// matched-filtered, then thresholded again. Returned spikes satisfy
/// `window < s < len - window`.
pub fn denoise_spikes(data: &[f64], params: &DenoiseParams) -> Result<DenoiseOutput> {
    let n = data.len();
    let w = params.window;

    let mut centred = data.to_vec();
    center_on_median(&mut centred);
    let mut hp = signal_filter(
        &centred,
        params.hp_freq,
        params.frame_rate,
        TRACE_FILTER_ORDER,
        FilterMode::High,
    )?;
    center_on_median(&mut hp);

    let first: Box<dyn PeakThreshold> = params
        .method
        .policy(INITIAL_SIMPLE_MULTIPLIER, params.pnorm_initial);
    let initial = first.select(
        &hp,
        &SpikeBudget {
            min_spikes: params.min_spikes,
            clip: params.clip,
        },
    )?;
    let locs = inside_window(&initial.peaks, n, w);
    debug!(
        threshold = initial.threshold,
        peaks = locs.len(),
        "Initial threshold pass"
    );

    let template = peak_triggered_median(&hp, &locs, w);

    let mut filtered = whitened_matched_filter(&hp, &locs, w)?;
    let med = median(&filtered);
    for v in &mut filtered {
        *v -= med;
    }

    let second = params.method.policy(params.threshold, params.pnorm);
    let detected = second.select(
        &filtered,
        &SpikeBudget {
            min_spikes: params.min_spikes,
            clip: 0,
        },
    )?;
    let spikes = inside_window(&detected.peaks, n, w);

    let mut indicator = vec![0.0; n];
    for &s in &spikes {
        indicator[s] = 1.0;
    }
    let reconstructed = convolve_same(&indicator, &template);

    let factor = match (mean_at(&hp, &spikes), mean_at(&filtered, &spikes)) {
        (Some(num), Some(den)) if den != 0.0 => num / den,
        _ => 1.0,
    };
    for v in &mut filtered {
        *v *= factor;
    }

    let low_spikes = initial.low_spikes || detected.low_spikes;
    if low_spikes {
        warn!(
            spikes = spikes.len(),
            min_spikes = params.min_spikes,
            "Spike count fell back to the minimum"
        );
    }

    Ok(DenoiseOutput {
        filtered,
        spikes,
        reconstructed,
        template,
        low_spikes,
        threshold: detected.threshold * factor,
        false_positive_rate: detected.false_positive_rate,
        detection_rate: detected.detection_rate,
    })
}

fn inside_window(peaks: &[usize], len: usize, w: usize) -> Vec<usize> {
    peaks
        .iter()
        .copied()
        .filter(|&p| p > w && p + w < len)
        .collect()
}

/// Per-offset median of the segments `x[l - w ..= l + w]`, shifted so its
/// minimum is zero.
fn peak_triggered_median(x: &[f64], locs: &[usize], w: usize) -> Vec<f64> {
    let width = 2 * w + 1;
    if locs.is_empty() {
        return vec![0.0; width];
    }
    let mut column = Vec::with_capacity(locs.len());
    let mut pta: Vec<f64> = (0..width)
        .map(|k| {
            column.clear();
            column.extend(locs.iter().map(|&l| x[l - w + k]));
            median(&column)
        })
        .collect();
    let floor = pta.iter().copied().fold(f64::INFINITY, f64::min);
    for v in &mut pta {
        *v -= floor;
    }
    pta
}
