use std::f64::consts::PI;

use ndarray::{Array1, Array2};
use num_complex::Complex;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::consts::PARALLEL_COLUMN_THRESHOLD;
use crate::error::{Result, VoltraceError};
use crate::linalg::solve_dense;

/// Which side of the cutoff the filter keeps.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterMode {
    High,
    Low,
}

impl std::fmt::Display for FilterMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::High => write!(f, "high-pass"),
            Self::Low => write!(f, "low-pass"),
        }
    }
}

/// Digital Butterworth filter in transfer-function form, `a[0] == 1`.
#[derive(Clone, Debug)]
pub struct Butterworth {
    pub b: Vec<f64>,
    pub a: Vec<f64>,
}

impl Butterworth {
    /// Design an `order`-th order filter with cutoff `freq` for a signal
    /// sampled at `sampling_rate`.
    pub fn design(order: usize, freq: f64, sampling_rate: f64, mode: FilterMode) -> Result<Self> {
        let normalized = freq / (sampling_rate / 2.0);
        if !(normalized > 0.0 && normalized < 1.0) {
            return Err(VoltraceError::InvalidFrequency { freq, normalized });
        }
        if order == 0 {
            return Err(VoltraceError::InvalidConfig(
                "filter order must be at least 1".into(),
            ));
        }

        // Analog prototype, cutoff 1 rad/s.
        let n = order as f64;
        let prototype: Vec<Complex<f64>> = (0..order)
            .map(|k| {
                let m = 2.0 * k as f64 - (n - 1.0);
                -Complex::from_polar(1.0, PI * m / (2.0 * n))
            })
            .collect();

        // Pre-warp for the bilinear transform at fs = 2.
        let fs = 2.0;
        let warped = 2.0 * fs * (PI * normalized / fs).tan();

        let (zeros, poles, gain) = match mode {
            FilterMode::Low => {
                let poles: Vec<_> = prototype.iter().map(|p| *p * warped).collect();
                (Vec::new(), poles, warped.powi(order as i32))
            }
            FilterMode::High => {
                let poles: Vec<_> = prototype
                    .iter()
                    .map(|p| Complex::new(warped, 0.0) / *p)
                    .collect();
                let prod: Complex<f64> = prototype.iter().map(|p| -*p).product();
                let gain = (Complex::new(1.0, 0.0) / prod).re;
                (vec![Complex::new(0.0, 0.0); order], poles, gain)
            }
        };

        let fs2 = Complex::new(2.0 * fs, 0.0);
        let mut zeros_d: Vec<_> = zeros.iter().map(|z| (fs2 + *z) / (fs2 - *z)).collect();
        let poles_d: Vec<_> = poles.iter().map(|p| (fs2 + *p) / (fs2 - *p)).collect();
        zeros_d.extend(std::iter::repeat(Complex::new(-1.0, 0.0)).take(poles.len() - zeros.len()));
        let num: Complex<f64> = zeros.iter().map(|z| fs2 - *z).product();
        let den: Complex<f64> = poles.iter().map(|p| fs2 - *p).product();
        let gain_d = gain * (num / den).re;

        let b = poly(&zeros_d).into_iter().map(|c| c * gain_d).collect();
        let a = poly(&poles_d);
        Ok(Self { b, a })
    }

    /// Steady-state initial conditions of the direct-form II transposed
    /// filter for a unit step input.
    fn initial_state(&self) -> Result<Vec<f64>> {
        let n = self.a.len().max(self.b.len());
        if n < 2 {
            return Ok(Vec::new());
        }
        let m = n - 1;
        let mut system = Array2::<f64>::eye(m);
        for row in 0..m {
            system[[row, 0]] += self.a[row + 1];
        }
        for i in 1..m {
            system[[i - 1, i]] -= 1.0;
        }
        let rhs = Array1::from_shape_fn(m, |i| self.b[i + 1] - self.a[i + 1] * self.b[0]);
        Ok(solve_dense(&system, &rhs)?.to_vec())
    }

    /// Causal filtering starting from state `zi`.
    fn lfilter(&self, x: &[f64], zi: &[f64]) -> Vec<f64> {
        let n = self.a.len();
        let mut z = zi.to_vec();
        let mut y = Vec::with_capacity(x.len());
        for &xn in x {
            let yn = self.b[0] * xn + z.first().copied().unwrap_or(0.0);
            for i in 0..n - 1 {
                let next = if i + 1 < n - 1 { z[i + 1] } else { 0.0 };
                z[i] = self.b[i + 1] * xn - self.a[i + 1] * yn + next;
            }
            y.push(yn);
        }
        y
    }

    /// Padding applied at each end of the signal before forward-backward filtering.
    pub fn pad_len(&self) -> usize {
        3 * (self.a.len().max(self.b.len()) - 1)
    }

    /// Zero-phase forward-backward filtering with odd reflection at both ends.
    pub fn filtfilt(&self, x: &[f64]) -> Result<Vec<f64>> {
        let len = x.len();
        let padlen = self.pad_len();
        if len <= padlen {
            return Err(VoltraceError::SignalTooShort { len, padlen });
        }

        let mut ext = Vec::with_capacity(len + 2 * padlen);
        for i in (1..=padlen).rev() {
            ext.push(2.0 * x[0] - x[i]);
        }
        ext.extend_from_slice(x);
        for i in 1..=padlen {
            ext.push(2.0 * x[len - 1] - x[len - 1 - i]);
        }

        let zi = self.initial_state()?;
        let scaled = |v: f64| zi.iter().map(|z| z * v).collect::<Vec<_>>();

        let forward = self.lfilter(&ext, &scaled(ext[0]));
        let mut reversed: Vec<f64> = forward.into_iter().rev().collect();
        let backward = self.lfilter(&reversed, &scaled(reversed[0]));
        reversed.clear();
        reversed.extend(backward.into_iter().rev());

        Ok(reversed[padlen..padlen + len].to_vec())
    }
}

/// Expand `prod(x - r)` into polynomial coefficients, highest power first.
fn poly(roots: &[Complex<f64>]) -> Vec<f64> {
    let mut coeffs = vec![Complex::new(1.0, 0.0)];
    for r in roots {
        coeffs.push(Complex::new(0.0, 0.0));
        for i in (1..coeffs.len()).rev() {
            let prev = coeffs[i - 1];
            coeffs[i] -= *r * prev;
        }
    }
    coeffs.into_iter().map(|c| c.re).collect()
}

/// High- or low-pass filter a 1-D signal with a zero-phase Butterworth filter.
pub fn signal_filter(
    signal: &[f64],
    freq: f64,
    sampling_rate: f64,
    order: usize,
    mode: FilterMode,
) -> Result<Vec<f64>> {
    Butterworth::design(order, freq, sampling_rate, mode)?.filtfilt(signal)
}

/// Filter every column of a [time, channel] matrix independently.
pub fn filter_columns(
    data: &Array2<f64>,
    freq: f64,
    sampling_rate: f64,
    order: usize,
    mode: FilterMode,
) -> Result<Array2<f64>> {
    let filter = Butterworth::design(order, freq, sampling_rate, mode)?;
    let (t, p) = data.dim();

    let filter_one = |col: usize| filter.filtfilt(&data.column(col).to_vec());
    let columns: Vec<Vec<f64>> = if p >= PARALLEL_COLUMN_THRESHOLD {
        (0..p)
            .into_par_iter()
            .map(filter_one)
            .collect::<Result<Vec<_>>>()?
    } else {
        (0..p).map(filter_one).collect::<Result<Vec<_>>>()?
    };

    let mut result = Array2::<f64>::zeros((t, p));
    for (col, values) in columns.into_iter().enumerate() {
        for (row, v) in values.into_iter().enumerate() {
            result[[row, col]] = v;
        }
    }
    Ok(result)
}
