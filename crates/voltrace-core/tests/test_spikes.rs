mod common;

use std::f64::consts::PI;

use approx::assert_abs_diff_eq;

use voltrace_core::spikes::kde::{linspace, GaussianKde};
use voltrace_core::spikes::peaks::{convolve_same, find_peaks, negative_lobe_std, percentile};
use voltrace_core::spikes::{
    denoise_spikes, welch_psd, whitened_matched_filter, AdaptiveThreshold, DenoiseParams,
    PeakThreshold, SimpleThreshold, SpikeBudget, ThresholdMethod,
};
use voltrace_core::VoltraceError;

use common::{white_noise, FRAME_RATE};

// ---------------------------------------------------------------------------
// Peaks
// ---------------------------------------------------------------------------

#[test]
fn test_find_peaks_simple_and_plateau() {
    let x = [0.0, 2.0, 1.0, 3.0, 3.0, 3.0, 0.0, 5.0];
    assert_eq!(find_peaks(&x, None), vec![1, 4]);
}

#[test]
fn test_find_peaks_ignores_edges_and_rising_plateaus() {
    let x = [5.0, 1.0, 2.0, 2.0, 3.0, 4.0];
    assert!(find_peaks(&x, None).is_empty());
}

#[test]
fn test_find_peaks_height_is_inclusive() {
    let x = [0.0, 1.0, 0.0, 2.0, 0.0, 3.0, 0.0];
    assert_eq!(find_peaks(&x, Some(2.0)), vec![3, 5]);
}

#[test]
fn test_percentile_interpolates() {
    let v = [4.0, 1.0, 3.0, 2.0];
    assert_abs_diff_eq!(percentile(&v, 50.0), 2.5);
    assert_abs_diff_eq!(percentile(&v, 100.0), 4.0);
    assert_abs_diff_eq!(percentile(&v, -20.0), 1.0);
    assert_abs_diff_eq!(percentile(&v, 25.0), 1.75);
}

#[test]
fn test_negative_lobe_ignores_positive_samples() {
    let x = [-3.0, 4.0, -4.0, 100.0, 0.0];
    assert_abs_diff_eq!(negative_lobe_std(&x), (12.5f64).sqrt());
    assert_eq!(negative_lobe_std(&[1.0, 2.0]), 0.0);
}

#[test]
fn test_same_convolution_centres_kernel() {
    let mut impulse = vec![0.0; 9];
    impulse[4] = 1.0;
    let out = convolve_same(&impulse, &[1.0, 2.0, 3.0]);
    assert_eq!(out, vec![0.0, 0.0, 0.0, 1.0, 2.0, 3.0, 0.0, 0.0, 0.0]);
    assert_eq!(convolve_same(&[1.0, 1.0, 1.0], &[1.0, 1.0, 1.0]), vec![2.0, 3.0, 2.0]);
}

// ---------------------------------------------------------------------------
// Kernel density
// ---------------------------------------------------------------------------

#[test]
fn test_kde_integrates_to_one() {
    let kde = GaussianKde::new(&[0.0, 1.0, 1.5, 4.0, 4.2]).unwrap();
    let grid = linspace(-10.0, 15.0, 5001);
    let dx = grid[1] - grid[0];
    let area: f64 = kde.evaluate_many(&grid).iter().sum::<f64>() * dx;
    assert_abs_diff_eq!(area, 1.0, epsilon = 1e-6);
}

#[test]
fn test_kde_scott_bandwidth() {
    let kde = GaussianKde::new(&[1.0, 2.0, 3.0, 4.0]).unwrap();
    let std = (5.0f64 / 3.0).sqrt();
    assert_abs_diff_eq!(kde.bandwidth(), std * 4f64.powf(-0.2), epsilon = 1e-12);
}

#[test]
fn test_kde_degenerate_inputs() {
    assert!(GaussianKde::new(&[1.0]).is_none());
    assert!(GaussianKde::new(&[2.0, 2.0, 2.0]).is_none());
    assert_eq!(linspace(-1.0, 1.0, 5), vec![-1.0, -0.5, 0.0, 0.5, 1.0]);
}

// ---------------------------------------------------------------------------
// Thresholding
// ---------------------------------------------------------------------------

#[test]
fn test_threshold_method_names() {
    assert_eq!("simple".parse::<ThresholdMethod>().unwrap(), ThresholdMethod::Simple);
    assert_eq!(
        "adaptive_threshold".parse::<ThresholdMethod>().unwrap(),
        ThresholdMethod::Adaptive
    );
}

#[test]
fn test_simple_floor_keeps_exactly_min_spikes() {
    let x = comb_signal(20, &[50.0, 60.0]);
    let policy = SimpleThreshold { multiplier: 3.0 };
    let budget = SpikeBudget {
        min_spikes: 5,
        clip: 100,
    };
    let out = policy.select(&x, &budget).unwrap();
    assert_eq!(out.peaks.len(), 5);
    assert!(out.low_spikes);
    assert!(out.peaks.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn test_simple_clip_keeps_exactly_clip() {
    let x = comb_signal(20, &[50.0, 60.0]);
    let policy = SimpleThreshold { multiplier: 0.01 };
    let budget = SpikeBudget {
        min_spikes: 2,
        clip: 10,
    };
    let out = policy.select(&x, &budget).unwrap();
    assert_eq!(out.peaks.len(), 10);
    assert!(!out.low_spikes);
    // The two tallest peaks always survive clipping.
    assert!(out.peaks.contains(&205) && out.peaks.contains(&215));
}

#[test]
fn test_simple_within_budget_uses_noise_multiple() {
    let x = comb_signal(20, &[50.0, 60.0, 70.0]);
    let policy = SimpleThreshold { multiplier: 3.0 };
    let budget = SpikeBudget {
        min_spikes: 2,
        clip: 0,
    };
    let out = policy.select(&x, &budget).unwrap();
    assert_eq!(out.threshold, 3.0);
    assert_eq!(out.peaks, vec![205, 215, 225]);
    assert!(out.false_positive_rate.is_none());
}

#[test]
fn test_no_local_maxima_is_insufficient() {
    let x: Vec<f64> = (0..50).map(|i| i as f64).collect();
    let budget = SpikeBudget {
        min_spikes: 1,
        clip: 0,
    };
    for method in [ThresholdMethod::Simple, ThresholdMethod::Adaptive] {
        let err = method.policy(3.0, 0.5).select(&x, &budget).unwrap_err();
        assert!(matches!(err, VoltraceError::InsufficientPeaks(_)));
    }
}

#[test]
fn test_adaptive_separates_large_events_from_noise() {
    let mut x = white_noise(2000, 11);
    let events: Vec<usize> = (0..30).map(|k| 100 + 60 * k).collect();
    for &e in &events {
        x[e] = 8.0;
    }
    let policy = AdaptiveThreshold { pnorm: 0.5 };
    let budget = SpikeBudget {
        min_spikes: 5,
        clip: 0,
    };
    let out = policy.select(&x, &budget).unwrap();
    for e in &events {
        assert!(out.peaks.contains(e), "event at {e} missed");
    }
    assert!(out.threshold < 8.0 && out.threshold > 0.0, "threshold = {}", out.threshold);
    assert!(out.peaks.len() < 60, "selected {}", out.peaks.len());
    assert!(!out.low_spikes);
    let fpr = out.false_positive_rate.unwrap();
    let dr = out.detection_rate.unwrap();
    assert!((0.0..=1.0).contains(&fpr), "fpr = {fpr}");
    assert!((0.0..=1.0 + 1e-12).contains(&dr), "detection = {dr}");
}

#[test]
fn test_adaptive_without_separation_keeps_largest_peaks() {
    // Everything above the median sits in one cluster, so the mirrored lower
    // half covers the upper tail and no height beats the noise model.
    let mut heights: Vec<f64> = (0..20).map(|k| k as f64).collect();
    heights.extend(std::iter::repeat_n(20.0, 21));
    let x = comb_heights(&heights);

    let budget = SpikeBudget {
        min_spikes: 5,
        clip: 0,
    };
    let out = AdaptiveThreshold { pnorm: 0.5 }.select(&x, &budget).unwrap();
    assert!(out.low_spikes);
    assert_eq!(out.threshold, 20.0);
    assert_eq!(out.peaks.len(), 21);
    assert_eq!(out.detection_rate, Some(0.0));
}

#[test]
fn test_adaptive_on_pure_noise_keeps_min_spikes() {
    let x = white_noise(3000, 23);
    let budget = SpikeBudget {
        min_spikes: 8,
        clip: 0,
    };
    let out = AdaptiveThreshold { pnorm: 0.5 }.select(&x, &budget).unwrap();
    assert!(out.peaks.len() >= 8, "selected {}", out.peaks.len());
    assert!(out.threshold.is_finite());
}

#[test]
fn test_budget_floor() {
    let budget = SpikeBudget {
        min_spikes: 10,
        clip: 0,
    };
    let (thr, low) = budget.correct(100.0, &[1.0, 2.0, 3.0]);
    assert!(low);
    assert_eq!(thr, 1.0);

    let budget = SpikeBudget {
        min_spikes: 3,
        clip: 0,
    };
    let heights: Vec<f64> = (1..=10).map(|v| v as f64).collect();
    let (thr, low) = budget.floor(&heights);
    assert!(low);
    assert_abs_diff_eq!(thr, 7.3, epsilon = 1e-12);
    assert_eq!(heights.iter().filter(|&&h| h >= thr).count(), 3);
}

// ---------------------------------------------------------------------------
// Whitening
// ---------------------------------------------------------------------------

#[test]
fn test_welch_of_white_noise_is_flat() {
    let x = white_noise(8000, 3);
    let psd = welch_psd(&x, 1024);
    assert_eq!(psd.len(), 513);
    // Unit-variance noise spread over [0, pi] one-sided: density 1/pi.
    let mid: f64 = psd[10..500].iter().sum::<f64>() / 490.0;
    assert_abs_diff_eq!(mid, 1.0 / PI, epsilon = 0.03);
}

#[test]
fn test_welch_handles_short_input() {
    let x = white_noise(37, 5);
    let psd = welch_psd(&x, 64);
    assert_eq!(psd.len(), 33);
    assert!(psd.iter().all(|p| p.is_finite() && *p >= 0.0));
}

#[test]
fn test_welch_of_short_record_stays_near_flat() {
    // 600 samples: several short segments are averaged instead of one
    // zero-padded periodogram.
    let x = white_noise(600, 17);
    let psd = welch_psd(&x, 1024);
    assert_eq!(psd.len(), 513);
    let mean = psd.iter().sum::<f64>() / psd.len() as f64;
    let lowest = psd[5..508].iter().copied().fold(f64::INFINITY, f64::min);
    assert!(lowest > 0.05 * mean, "lowest bin {lowest} vs mean {mean}");
}

#[test]
fn test_matched_filter_emphasises_repeated_events() {
    let mut x: Vec<f64> = white_noise(4000, 9).iter().map(|v| 0.3 * v).collect();
    let shape = [0.3, 1.0, 0.4];
    let locs: Vec<usize> = (0..25).map(|k| 80 + 150 * k).collect();
    for &l in &locs {
        for (k, s) in shape.iter().enumerate() {
            x[l - 1 + k] += 4.0 * s;
        }
    }
    let out = whitened_matched_filter(&x, &locs, 4).unwrap();
    assert_eq!(out.len(), x.len());

    let mean_at_events: f64 = locs.iter().map(|&l| out[l]).sum::<f64>() / 25.0;
    let rms = (out.iter().map(|v| v * v).sum::<f64>() / x.len() as f64).sqrt();
    assert!(mean_at_events > 3.0 * rms, "{mean_at_events} vs rms {rms}");
}

#[test]
fn test_matched_filter_needs_room_for_template() {
    let x = white_noise(100, 1);
    let err = whitened_matched_filter(&x, &[1, 98], 5).unwrap_err();
    assert!(matches!(err, VoltraceError::InsufficientPeaks(_)));
}

// ---------------------------------------------------------------------------
// Denoising
// ---------------------------------------------------------------------------

#[test]
fn test_denoise_recovers_injected_spikes() {
    for method in [ThresholdMethod::Simple, ThresholdMethod::Adaptive] {
        let (x, truth) = spiking_trace(21);
        let out = denoise_spikes(&x, &denoise_params(method)).unwrap();
        let hits = truth
            .iter()
            .filter(|&&t| out.spikes.iter().any(|&s| s.abs_diff(t) <= 1))
            .count();
        assert!(hits >= 28, "{method}: {hits} of 30 recovered");
        assert!(out.spikes.len() <= 40, "{method}: {} spikes", out.spikes.len());
        assert!(!out.low_spikes);
        assert_eq!(out.template.len(), 17);
        assert_eq!(out.filtered.len(), x.len());
        assert_eq!(out.reconstructed.len(), x.len());
    }
}

#[test]
fn test_denoise_spikes_stay_inside_template_window() {
    let (mut x, _) = spiking_trace(4);
    x[3] += 40.0;
    x[2995] += 40.0;
    let p = denoise_params(ThresholdMethod::Simple);
    let out = denoise_spikes(&x, &p).unwrap();
    assert!(out
        .spikes
        .iter()
        .all(|&s| s > p.window && s + p.window < x.len()));
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Baseline of -1 with isolated peaks every 10 samples.
fn comb_signal(small: usize, large: &[f64]) -> Vec<f64> {
    let mut heights: Vec<f64> = (0..small).map(|k| 0.05 + 0.1 * k as f64).collect();
    heights.extend_from_slice(large);
    comb_heights(&heights)
}

/// Baseline of -1 with peak `k` at sample `10k + 5`.
fn comb_heights(heights: &[f64]) -> Vec<f64> {
    let mut x = vec![-1.0; 10 * heights.len() + 10];
    for (k, &h) in heights.iter().enumerate() {
        x[10 * k + 5] = h;
    }
    x
}

fn denoise_params(method: ThresholdMethod) -> DenoiseParams {
    DenoiseParams {
        window: 8,
        frame_rate: FRAME_RATE,
        hp_freq: 1.0,
        clip: 100,
        min_spikes: 5,
        method,
        threshold: 3.0,
        pnorm_initial: 0.25,
        pnorm: 0.5,
    }
}

/// Unit noise on a slow drift with 30 three-sample spikes.
fn spiking_trace(seed: u64) -> (Vec<f64>, Vec<usize>) {
    let mut x: Vec<f64> = white_noise(3000, seed)
        .into_iter()
        .enumerate()
        .map(|(i, v)| v + 5.0 * (i as f64 * 0.002).sin())
        .collect();
    let spikes: Vec<usize> = (0..30).map(|k| 60 + 95 * k).collect();
    for &s in &spikes {
        x[s - 1] += 4.0;
        x[s] += 12.0;
        x[s + 1] += 5.0;
    }
    (x, spikes)
}
