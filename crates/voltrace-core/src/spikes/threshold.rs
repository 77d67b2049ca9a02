use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::consts::{KDE_GRID_POINTS, KDE_RANGE_PADDING};
use crate::error::{Result, VoltraceError};

use super::kde::{linspace, GaussianKde};
use super::peaks::{find_peaks, heights, median, negative_lobe_std, percentile};

/// Policy used to turn a signal into spike locations.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ThresholdMethod {
    /// Fixed multiple of the noise level estimated from the negative lobe.
    Simple,
    /// Threshold chosen from a kernel density estimate of peak heights.
    #[default]
    Adaptive,
}

impl FromStr for ThresholdMethod {
    type Err = VoltraceError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "simple" => Ok(Self::Simple),
            "adaptive" | "adaptive_threshold" => Ok(Self::Adaptive),
            _ => Err(VoltraceError::UnknownThresholdPolicy(s.to_string())),
        }
    }
}

impl TryFrom<String> for ThresholdMethod {
    type Error = VoltraceError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<ThresholdMethod> for String {
    fn from(m: ThresholdMethod) -> Self {
        m.to_string()
    }
}

impl std::fmt::Display for ThresholdMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Simple => write!(f, "simple"),
            Self::Adaptive => write!(f, "adaptive"),
        }
    }
}

/// Bounds on the number of selected peaks.
#[derive(Clone, Copy, Debug)]
pub struct SpikeBudget {
    /// Lower the threshold until at least this many peaks are kept.
    pub min_spikes: usize,
    /// Raise the threshold so at most this many peaks are kept; 0 disables.
    pub clip: usize,
}

impl SpikeBudget {
    /// Move `threshold` to the height percentile that keeps exactly
    /// `min_spikes` (or `clip`) peaks when the count falls outside the budget.
    /// The flag is true when the floor was applied.
    pub fn correct(&self, threshold: f64, peak_heights: &[f64]) -> (f64, bool) {
        let count = peak_heights.iter().filter(|&&h| h >= threshold).count();
        let n = peak_heights.len() as f64;
        if count < self.min_spikes {
            warn!(
                found = count,
                min_spikes = self.min_spikes,
                "Too few spikes, keeping the largest peaks"
            );
            self.floor(peak_heights)
        } else if self.clip > 0 && count > self.clip {
            warn!(found = count, clip = self.clip, "Selecting top peaks only");
            let q = 100.0 * (1.0 - self.clip as f64 / n);
            (percentile(peak_heights, q), false)
        } else {
            (threshold, false)
        }
    }

    /// Threshold keeping the `min_spikes` largest peaks. Always flags low spikes.
    pub fn floor(&self, peak_heights: &[f64]) -> (f64, bool) {
        let q = 100.0 * (1.0 - self.min_spikes as f64 / peak_heights.len() as f64);
        (percentile(peak_heights, q), true)
    }
}

/// Result of one thresholding pass.
#[derive(Clone, Debug)]
pub struct ThresholdOutcome {
    pub threshold: f64,
    /// Peak indices at or above `threshold`, ascending.
    pub peaks: Vec<usize>,
    pub low_spikes: bool,
    pub false_positive_rate: Option<f64>,
    pub detection_rate: Option<f64>,
}

/// A spike thresholding policy.
pub trait PeakThreshold: Send + Sync {
    /// Select peaks of `signal` (assumed median-centred) within `budget`.
    ///
    /// Fails with `InsufficientPeaks` when the signal has no local maxima.
    fn select(&self, signal: &[f64], budget: &SpikeBudget) -> Result<ThresholdOutcome>;
}

/// `threshold = multiplier * noise` with noise taken from the negative lobe.
#[derive(Clone, Copy, Debug)]
pub struct SimpleThreshold {
    pub multiplier: f64,
}

impl PeakThreshold for SimpleThreshold {
    fn select(&self, signal: &[f64], budget: &SpikeBudget) -> Result<ThresholdOutcome> {
        let all = find_peaks(signal, None);
        if all.is_empty() {
            return Err(VoltraceError::InsufficientPeaks(
                "signal has no local maxima".into(),
            ));
        }
        let pks = heights(signal, &all);
        let noise = negative_lobe_std(signal);
        let (threshold, low_spikes) = budget.correct(self.multiplier * noise, &pks);

        Ok(ThresholdOutcome {
            threshold,
            peaks: keep_at_or_above(&all, &pks, threshold),
            low_spikes,
            false_positive_rate: None,
            detection_rate: None,
        })
    }
}

/// Threshold balancing detection against a mirrored noise model of the peak
/// height distribution; `pnorm` weights the trade-off.
#[derive(Clone, Copy, Debug)]
pub struct AdaptiveThreshold {
    pub pnorm: f64,
}

impl PeakThreshold for AdaptiveThreshold {
    fn select(&self, signal: &[f64], budget: &SpikeBudget) -> Result<ThresholdOutcome> {
        let all = find_peaks(signal, None);
        if all.is_empty() {
            return Err(VoltraceError::InsufficientPeaks(
                "signal has no local maxima".into(),
            ));
        }
        let pks = heights(signal, &all);
        let model = PeakHeightModel::fit(&pks, self.pnorm)?;
        let (threshold, low_spikes) = match model.best_threshold() {
            Some(best) => budget.correct(best, &pks),
            None => {
                warn!(
                    peaks = pks.len(),
                    min_spikes = budget.min_spikes,
                    "Peak heights match the noise model, keeping the largest peaks"
                );
                budget.floor(&pks)
            }
        };
        let (fpr, detection) = model.rates_at(threshold);

        Ok(ThresholdOutcome {
            threshold,
            peaks: keep_at_or_above(&all, &pks, threshold),
            low_spikes,
            false_positive_rate: Some(fpr),
            detection_rate: Some(detection),
        })
    }
}

impl ThresholdMethod {
    /// Build the policy. `multiplier` feeds the simple policy, `pnorm` the adaptive one.
    pub fn policy(&self, multiplier: f64, pnorm: f64) -> Box<dyn PeakThreshold> {
        match self {
            Self::Simple => Box::new(SimpleThreshold { multiplier }),
            Self::Adaptive => Box::new(AdaptiveThreshold { pnorm }),
        }
    }
}

fn keep_at_or_above(idx: &[usize], pks: &[f64], threshold: f64) -> Vec<usize> {
    idx.iter()
        .zip(pks)
        .filter(|(_, &h)| h >= threshold)
        .map(|(&i, _)| i)
        .collect()
}

/// Empirical peak-height density against a symmetric noise model.
struct PeakHeightModel {
    grid: Vec<f64>,
    /// Mass of the data density above each grid point.
    data_tail: Vec<f64>,
    /// Mass of the noise model above each grid point.
    model_tail: Vec<f64>,
    /// `None` when no height separates the data from the model.
    best: Option<usize>,
}

impl PeakHeightModel {
    fn fit(pks: &[f64], pnorm: f64) -> Result<Self> {
        let kde = GaussianKde::new(pks).ok_or_else(|| {
            VoltraceError::InsufficientPeaks(format!(
                "{} peak heights are not enough for a density estimate",
                pks.len()
            ))
        })?;

        let lo = pks.iter().copied().fold(f64::INFINITY, f64::min);
        let hi = pks.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let pad = (hi - lo) * KDE_RANGE_PADDING;
        let grid = linspace(lo - pad, hi + pad, KDE_GRID_POINTS);
        let f = kde.evaluate_many(&grid);
        let len = f.len();

        let med = median(pks);
        let center = grid.iter().position(|&x| x > med).unwrap_or(len - 1);

        // Mirror the lower half of the density about its centre.
        let mut fmodel: Vec<f64> = f[..=center].to_vec();
        fmodel.extend(f[..center].iter().rev());
        if fmodel.len() < len {
            let floor = fmodel.iter().copied().fold(f64::INFINITY, f64::min);
            fmodel.resize(len, floor);
        } else {
            fmodel.truncate(len);
        }

        // The model may not exceed the data once the two distributions cross.
        let sum_f: f64 = f.iter().sum();
        let sum_model: f64 = fmodel.iter().sum();
        let csf: Vec<f64> = cumsum(&f).into_iter().map(|v| v / sum_f).collect();
        let norm = sum_f.max(sum_model);
        let csmodel: Vec<f64> = cumsum(&fmodel).into_iter().map(|v| v / norm).collect();
        let lastpt = (0..len - 1)
            .find(|&i| csf[i] > csmodel[i] + f64::EPSILON && csf[i + 1] < csmodel[i + 1])
            .unwrap_or(center);
        fmodel[..=lastpt].copy_from_slice(&f[..=lastpt]);
        for i in lastpt..len {
            fmodel[i] = fmodel[i].min(f[i]);
        }

        let data_tail = tail_mass(&f);
        let model_tail = tail_mass(&fmodel);
        let best = best_index(&data_tail, &model_tail, pnorm);

        Ok(Self {
            grid,
            data_tail,
            model_tail,
            best,
        })
    }

    fn best_threshold(&self) -> Option<f64> {
        self.best.map(|i| self.grid[i])
    }

    /// False-positive rate and detection rate at the grid point nearest `threshold`.
    fn rates_at(&self, threshold: f64) -> (f64, f64) {
        let ix = self
            .grid
            .iter()
            .enumerate()
            .min_by(|a, b| (a.1 - threshold).abs().total_cmp(&(b.1 - threshold).abs()))
            .map(|(i, _)| i)
            .unwrap_or(0);
        let data = self.data_tail[ix];
        let model = self.model_tail[ix];
        let fpr = if data > 0.0 { model / data } else { 0.0 };
        let max_gap = self
            .data_tail
            .iter()
            .zip(&self.model_tail)
            .map(|(d, m)| d - m)
            .fold(f64::NEG_INFINITY, f64::max);
        let detection = if max_gap > 0.0 {
            (data - model) / max_gap
        } else {
            0.0
        };
        (fpr, detection)
    }
}

/// Grid index maximising `data_tail^p - model_tail^p`, or `None` when the
/// objective is nowhere positive.
fn best_index(data_tail: &[f64], model_tail: &[f64], pnorm: f64) -> Option<usize> {
    let (best, best_obj) = data_tail
        .iter()
        .zip(model_tail)
        .map(|(d, m)| d.powf(pnorm) - m.powf(pnorm))
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |(bi, bo), (i, obj)| {
            if obj > bo {
                (i, obj)
            } else {
                (bi, bo)
            }
        });
    (best_obj > 0.0).then_some(best)
}

fn cumsum(x: &[f64]) -> Vec<f64> {
    x.iter()
        .scan(0.0, |acc, &v| {
            *acc += v;
            Some(*acc)
        })
        .collect()
}

/// `total - cumsum(x)`, clamped at zero.
fn tail_mass(x: &[f64]) -> Vec<f64> {
    let cs = cumsum(x);
    let total = cs.last().copied().unwrap_or(0.0);
    cs.into_iter().map(|c| (total - c).max(0.0)).collect()
}
