use std::f64::consts::PI;

use num_complex::Complex;
use rustfft::FftPlanner;

use crate::consts::{
    PSD_FLOOR_FRACTION, PSD_MEDIAN_FLOOR, WELCH_MIN_SEGMENTS, WELCH_SEGMENT_LENGTH,
};
use crate::error::{Result, VoltraceError};

use super::peaks::{convolve_same, median};

/// Whiten `data` with a noise spectrum estimated away from `locs`, then
/// matched-filter it with the whitened peak-triggered average.
///
/// `window` is the half-width of the template. Peaks whose window would run off
/// either end are ignored. The output has the length of `data`.
pub fn whitened_matched_filter(data: &[f64], locs: &[usize], window: usize) -> Result<Vec<f64>> {
    let n = data.len();
    let usable: Vec<usize> = locs
        .iter()
        .copied()
        .filter(|&l| l >= window && l + window < n)
        .collect();
    if usable.is_empty() {
        return Err(VoltraceError::InsufficientPeaks(
            "no peak leaves room for a full template window".into(),
        ));
    }

    let noise = censored_samples(data, &usable, window);
    if noise.len() < 2 {
        return Err(VoltraceError::InsufficientPeaks(format!(
            "{} noise samples left after censoring",
            noise.len()
        )));
    }

    let nfft = n.next_power_of_two();
    let psd = welch_psd(&noise, nfft);
    let scale = whitening_scale(&psd, nfft);

    let mut planner = FftPlanner::<f64>::new();
    let forward = planner.plan_fft_forward(nfft);
    let inverse = planner.plan_fft_inverse(nfft);

    let mut spectrum: Vec<Complex<f64>> = data
        .iter()
        .map(|&v| Complex::new(v, 0.0))
        .chain(std::iter::repeat(Complex::new(0.0, 0.0)).take(nfft - n))
        .collect();
    forward.process(&mut spectrum);
    for (c, s) in spectrum.iter_mut().zip(&scale) {
        *c *= *s;
    }
    inverse.process(&mut spectrum);
    let norm = 1.0 / nfft as f64;
    let whitened: Vec<f64> = spectrum.iter().map(|c| c.re * norm).collect();

    let width = 2 * window + 1;
    let mut template = vec![0.0; width];
    for &l in &usable {
        for (k, t) in template.iter_mut().enumerate() {
            *t += whitened[l - window + k];
        }
    }
    let count = usable.len() as f64;
    for t in &mut template {
        *t /= count;
    }

    let reversed: Vec<f64> = template.iter().rev().copied().collect();
    let mut filtered = convolve_same(&whitened, &reversed);
    filtered.truncate(n);
    Ok(filtered)
}

/// Samples farther than `window` from every peak.
fn censored_samples(data: &[f64], locs: &[usize], window: usize) -> Vec<f64> {
    let mut keep = vec![true; data.len()];
    for &l in locs {
        let lo = l.saturating_sub(window);
        let hi = (l + window).min(data.len() - 1);
        for k in &mut keep[lo..=hi] {
            *k = false;
        }
    }
    data.iter()
        .zip(&keep)
        .filter(|(_, &k)| k)
        .map(|(&v, _)| v)
        .collect()
}

/// Periodic Hamming window.
fn hamming(len: usize) -> Vec<f64> {
    (0..len)
        .map(|i| 0.54 - 0.46 * (2.0 * PI * i as f64 / len as f64).cos())
        .collect()
}

/// One-sided Welch power spectral density at a sampling rate of `2π`:
/// Hamming segments with 50% overlap, no detrending, `nfft / 2 + 1` bins.
///
/// Segments are at most `WELCH_SEGMENT_LENGTH` long and short records are cut
/// into at least `WELCH_MIN_SEGMENTS` segment lengths, so the estimate is
/// always an average of several periodograms.
pub fn welch_psd(x: &[f64], nfft: usize) -> Vec<f64> {
    let seg = WELCH_SEGMENT_LENGTH.min(x.len() / WELCH_MIN_SEGMENTS).max(1);
    let nfft = nfft.max(seg);
    let step = (seg - seg / 2).max(1);
    let win = hamming(seg);
    let fs = 2.0 * PI;
    let scale = 1.0 / (fs * win.iter().map(|w| w * w).sum::<f64>());
    let bins = nfft / 2 + 1;

    let mut planner = FftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(nfft);
    let mut psd = vec![0.0; bins];
    let mut segments = 0usize;
    let mut buf = vec![Complex::new(0.0, 0.0); nfft];
    let mut start = 0;
    while start + seg <= x.len() {
        for (i, b) in buf.iter_mut().enumerate() {
            *b = if i < seg {
                Complex::new(x[start + i] * win[i], 0.0)
            } else {
                Complex::new(0.0, 0.0)
            };
        }
        fft.process(&mut buf);
        for (p, c) in psd.iter_mut().zip(&buf) {
            *p += c.norm_sqr() * scale;
        }
        segments += 1;
        start += step;
    }

    let segments = segments.max(1) as f64;
    let last = bins - 1;
    for (k, p) in psd.iter_mut().enumerate() {
        *p /= segments;
        let nyquist = nfft % 2 == 0 && k == last;
        if k != 0 && !nyquist {
            *p *= 2.0;
        }
    }
    psd
}

/// `1/sqrt(psd)` mirrored onto all `nfft` bins. The spectrum is floored at a
/// fraction of its median, which bounds the gain of bins the filters emptied.
fn whitening_scale(psd: &[f64], nfft: usize) -> Vec<f64> {
    let peak = psd.iter().copied().fold(0.0, f64::max);
    let floor = (median(psd) * PSD_MEDIAN_FLOOR)
        .max(peak * PSD_FLOOR_FRACTION)
        .max(f64::MIN_POSITIVE);
    (0..nfft)
        .map(|k| {
            let bin = if k < psd.len() { k } else { nfft - k };
            1.0 / psd[bin].max(floor).sqrt()
        })
        .collect()
}
