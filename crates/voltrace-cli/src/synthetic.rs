use std::f64::consts::TAU;

use ndarray::{Array2, Array3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use voltrace_core::Movie;

/// Spike waveform, one frame before the peak to two after.
const SPIKE_SHAPE: [f64; 4] = [0.3, 1.0, 0.5, 0.2];
const SPIKE_AMPLITUDE: f64 = 8.0;
const FOOTPRINT_SIGMA: f64 = 2.0;
const ROI_RADIUS: f64 = 3.0;
const BASELINE: f64 = 100.0;
/// Shared background oscillations (Hz) and their amplitude.
const BACKGROUND_FREQS: [f64; 3] = [0.7, 3.0, 11.0];
const BACKGROUND_AMPLITUDE: f64 = 2.0;
const MIN_SPIKE_GAP: usize = 40;

pub struct Recording {
    pub movie: Movie,
    pub roi: Array2<bool>,
    pub spikes: Vec<usize>,
}

/// Simulate a square field of view with one cell in the middle.
pub fn simulate(frames: usize, size: usize, n_spikes: usize, frame_rate: f64, seed: u64) -> Recording {
    let mut rng = StdRng::seed_from_u64(seed);
    let centre = (size as f64 - 1.0) / 2.0;

    let margin = (frames / 10).max(SPIKE_SHAPE.len());
    let span = frames.saturating_sub(2 * margin);
    let spacing = (span / n_spikes.max(1)).max(MIN_SPIKE_GAP);
    let jitter = spacing.saturating_sub(MIN_SPIKE_GAP).max(1);
    let spikes: Vec<usize> = (0..n_spikes)
        .map(|k| margin + k * spacing + rng.random_range(0..jitter))
        .filter(|&s| s >= 1 && s + SPIKE_SHAPE.len() < frames)
        .collect();

    let mut activity = vec![0.0; frames];
    for &s in &spikes {
        for (k, v) in SPIKE_SHAPE.iter().enumerate() {
            activity[s - 1 + k] += SPIKE_AMPLITUDE * v;
        }
    }

    let dist2 = |r: usize, c: usize| (r as f64 - centre).powi(2) + (c as f64 - centre).powi(2);
    let footprint = Array2::from_shape_fn((size, size), |(r, c)| {
        (-dist2(r, c) / (2.0 * FOOTPRINT_SIGMA * FOOTPRINT_SIGMA)).exp()
    });
    let background: Vec<Vec<f64>> = BACKGROUND_FREQS
        .iter()
        .map(|f| {
            (0..frames)
                .map(|t| BACKGROUND_AMPLITUDE * (TAU * f * t as f64 / frame_rate).sin())
                .collect()
        })
        .collect();
    let weight = |k: usize, r: usize, c: usize| match k {
        0 => 1.0 + r as f64 / size as f64,
        1 => 1.0 + c as f64 / size as f64,
        _ => 1.0 + 0.5 * ((r + c) as f64 * 0.4).cos(),
    };

    let mut data = Array3::<f32>::zeros((frames, size, size));
    for ((t, r, c), v) in data.indexed_iter_mut() {
        let mut value = BASELINE + footprint[[r, c]] * activity[t];
        for (k, trace) in background.iter().enumerate() {
            value += weight(k, r, c) * trace[t];
        }
        value += rng.sample::<f64, _>(StandardNormal);
        *v = value as f32;
    }

    let roi = Array2::from_shape_fn((size, size), |(r, c)| dist2(r, c) <= ROI_RADIUS * ROI_RADIUS);

    Recording {
        movie: Movie::new(data),
        roi,
        spikes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spikes_are_separated_and_in_range() {
        let rec = simulate(1000, 20, 20, 400.0, 1);
        assert_eq!(rec.spikes.len(), 20);
        assert!(rec.spikes.windows(2).all(|w| w[1] - w[0] >= MIN_SPIKE_GAP));
        assert!(rec.spikes.iter().all(|&s| s > 0 && s + 4 < 1000));
        assert_eq!(rec.movie.data.dim(), (1000, 20, 20));
        assert!(rec.roi.iter().any(|&v| v));
    }

    #[test]
    fn same_seed_same_movie() {
        let a = simulate(200, 8, 3, 400.0, 42);
        let b = simulate(200, 8, 3, 400.0, 42);
        assert_eq!(a.spikes, b.spikes);
        assert_eq!(a.movie.data, b.movie.data);
    }
}
