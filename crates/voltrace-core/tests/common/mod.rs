#![allow(dead_code)]

use ndarray::{Array2, Array3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

use voltrace_core::spikes::ThresholdMethod;
use voltrace_core::{ExtractionConfig, Movie};

pub const FRAME_RATE: f64 = 400.0;

/// A synthetic recording of one cell with known spike times.
pub struct SyntheticCell {
    pub movie: Movie,
    pub roi: Array2<bool>,
    pub spikes: Vec<usize>,
}

/// Spike waveform sampled from one frame before the peak.
const SPIKE_SHAPE: [f64; 4] = [0.3, 1.0, 0.5, 0.2];

/// Background oscillations (Hz) shared by all pixels with different weights.
const BACKGROUND_FREQS: [f64; 3] = [0.7, 3.0, 11.0];

/// `n` unit-variance Gaussian samples.
pub fn white_noise(n: usize, seed: u64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n).map(|_| rng.sample(StandardNormal)).collect()
}

/// `frames`×`size`×`size` movie with a Gaussian cell in the centre, `n_spikes`
/// spikes at least 40 frames apart, three shared background oscillations and
/// unit pixel noise.
pub fn synthetic_cell(frames: usize, size: usize, n_spikes: usize, seed: u64) -> SyntheticCell {
    let mut rng = StdRng::seed_from_u64(seed);
    let centre = (size as f64 - 1.0) / 2.0;

    let first = 60;
    let spacing = ((frames - 2 * first) / n_spikes.max(1)).max(40);
    let spikes: Vec<usize> = (0..n_spikes)
        .map(|k| first + k * spacing + rng.random_range(0..5))
        .filter(|&s| s + SPIKE_SHAPE.len() < frames)
        .collect();

    let mut activity = vec![0.0; frames];
    for &s in &spikes {
        for (k, v) in SPIKE_SHAPE.iter().enumerate() {
            activity[s - 1 + k] += 8.0 * v;
        }
    }

    let footprint = Array2::from_shape_fn((size, size), |(r, c)| {
        let d2 = (r as f64 - centre).powi(2) + (c as f64 - centre).powi(2);
        (-d2 / (2.0 * 2.0 * 2.0)).exp()
    });
    let patterns: Vec<Array2<f64>> = (0..BACKGROUND_FREQS.len())
        .map(|k| {
            Array2::from_shape_fn((size, size), |(r, c)| match k {
                0 => 1.0 + r as f64 / size as f64,
                1 => 1.0 + c as f64 / size as f64,
                _ => 1.0 + ((r + c) as f64 * 0.4).cos() * 0.5,
            })
        })
        .collect();
    let background: Vec<Vec<f64>> = BACKGROUND_FREQS
        .iter()
        .map(|f| {
            (0..frames)
                .map(|t| 2.0 * (std::f64::consts::TAU * f * t as f64 / FRAME_RATE).sin())
                .collect()
        })
        .collect();

    let mut data = Array3::<f32>::zeros((frames, size, size));
    for t in 0..frames {
        for r in 0..size {
            for c in 0..size {
                let mut v = 100.0 + footprint[[r, c]] * activity[t];
                for (pattern, trace) in patterns.iter().zip(&background) {
                    v += pattern[[r, c]] * trace[t];
                }
                v += rng.sample::<f64, _>(StandardNormal);
                data[[t, r, c]] = v as f32;
            }
        }
    }

    let roi = Array2::from_shape_fn((size, size), |(r, c)| {
        (r as f64 - centre).powi(2) + (c as f64 - centre).powi(2) <= 9.0
    });

    SyntheticCell {
        movie: Movie::new(data),
        roi,
        spikes,
    }
}

/// Positive-going indicator, small censor region, one background component
/// per oscillation.
pub fn test_config() -> ExtractionConfig {
    ExtractionConfig {
        flip_signal: false,
        censor_size: 4,
        n_pc_bg: 3,
        threshold_method: ThresholdMethod::Adaptive,
        ..Default::default()
    }
}

/// Fraction of `truth` with a detection within `tolerance` frames.
pub fn recall(truth: &[usize], found: &[usize], tolerance: usize) -> f64 {
    if truth.is_empty() {
        return 1.0;
    }
    let hits = truth
        .iter()
        .filter(|&&t| found.iter().any(|&s| s.abs_diff(t) <= tolerance))
        .count();
    hits as f64 / truth.len() as f64
}
