use std::str::FromStr;

use ndarray::{s, Array1, Array2, ArrayView2, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::consts::{EPSILON, NMF_INNER_PASSES, PARALLEL_COLUMN_THRESHOLD};
use crate::error::{Result, VoltraceError};
use crate::filters::{blur_frames, BlurKernel};
use crate::linalg::Ridge;

/// How spatial weights are re-estimated from the reconstructed trace.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum WeightUpdateMethod {
    /// Ridge regression with an intercept.
    #[default]
    Ridge,
    /// Two-component non-negative factorisation: the neuron and a constant baseline.
    Nmf,
}

impl FromStr for WeightUpdateMethod {
    type Err = VoltraceError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ridge" => Ok(Self::Ridge),
            "nmf" => Ok(Self::Nmf),
            _ => Err(VoltraceError::UnknownWeightUpdate(s.to_string())),
        }
    }
}

impl TryFrom<String> for WeightUpdateMethod {
    type Error = VoltraceError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<WeightUpdateMethod> for String {
    fn from(m: WeightUpdateMethod) -> Self {
        m.to_string()
    }
}

impl std::fmt::Display for WeightUpdateMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ridge => write!(f, "ridge"),
            Self::Nmf => write!(f, "nmf"),
        }
    }
}

impl WeightUpdateMethod {
    /// Build the update; `alpha` is the ridge strength.
    pub fn policy(&self, alpha: f64) -> Box<dyn WeightUpdate> {
        match self {
            Self::Ridge => Box::new(RidgeUpdate { alpha }),
            Self::Nmf => Box::new(NmfUpdate {
                passes: NMF_INNER_PASSES,
            }),
        }
    }
}

/// Bias column plus one column per context pixel, [time, 1 + pixels].
/// The bias column is implicit.
#[derive(Clone, Debug)]
pub struct DesignMatrix {
    pixels: Array2<f64>,
}

impl DesignMatrix {
    pub fn new(pixels: Array2<f64>) -> Self {
        Self { pixels }
    }

    /// Blur every frame of a [time, pixel] movie and use it as the design.
    pub fn blurred(movie: &Array2<f64>, frame_dim: (usize, usize), kernel: &BlurKernel) -> Self {
        Self::new(blur_frames(movie, frame_dim, kernel))
    }

    pub fn pixels(&self) -> ArrayView2<'_, f64> {
        self.pixels.view()
    }

    pub fn frames(&self) -> usize {
        self.pixels.nrows()
    }

    /// Squared Frobenius norm of the pixel columns.
    pub fn frobenius_sq(&self) -> f64 {
        self.pixels.iter().map(|v| v * v).sum()
    }

    /// `weights[0] + pixels · weights[1..]`.
    pub fn predict(&self, weights: &Array1<f64>) -> Array1<f64> {
        self.pixels.dot(&weights.slice(s![1..])) + weights[0]
    }

    /// Cosine similarity between `y` and every pixel column. Columns (or a
    /// `y`) with zero norm score 0.
    pub fn correlations(&self, y: &[f64]) -> Vec<f64> {
        let y_norm = y.iter().map(|v| v * v).sum::<f64>().sqrt();
        let p = self.pixels.ncols();
        let corr_one = |col: usize| {
            let column = self.pixels.column(col);
            let mut dot = 0.0;
            let mut sq = 0.0;
            for (x, yv) in column.iter().zip(y) {
                dot += x * yv;
                sq += x * x;
            }
            let denom = sq.sqrt() * y_norm;
            if denom > EPSILON {
                dot / denom
            } else {
                0.0
            }
        };
        if p >= PARALLEL_COLUMN_THRESHOLD {
            (0..p).into_par_iter().map(corr_one).collect()
        } else {
            (0..p).map(corr_one).collect()
        }
    }
}

/// A spatial weight re-estimation policy.
pub trait WeightUpdate: Send + Sync {
    /// Weights `[intercept, pixel...]` explaining `target` from `design`.
    fn fit(&self, design: &DesignMatrix, target: &[f64]) -> Result<Array1<f64>>;
}

#[derive(Clone, Copy, Debug)]
pub struct RidgeUpdate {
    pub alpha: f64,
}

impl WeightUpdate for RidgeUpdate {
    fn fit(&self, design: &DesignMatrix, target: &[f64]) -> Result<Array1<f64>> {
        let y = Array1::from(target.to_vec());
        let fit = Ridge::new(self.alpha, true).fit(design.pixels(), y.view())?;
        let mut weights = Array1::<f64>::zeros(fit.coef.len() + 1);
        weights[0] = fit.intercept;
        weights.slice_mut(s![1..]).assign(&fit.coef);
        Ok(weights)
    }
}

/// Factor the design as `[target; 1]ᵀ · A` by block coordinate descent with
/// the neuron's row of `A` kept non-negative. The intercept is always 0.
#[derive(Clone, Copy, Debug)]
pub struct NmfUpdate {
    pub passes: usize,
}

impl WeightUpdate for NmfUpdate {
    fn fit(&self, design: &DesignMatrix, target: &[f64]) -> Result<Array1<f64>> {
        let x = design.pixels();
        let p = x.ncols();
        let tr = Array1::from(target.to_vec());

        let c00 = tr.dot(&tr);
        let c01 = tr.sum();
        let c11 = design.frames() as f64;
        let det = c00 * c11 - c01 * c01;
        let mut weights = Array1::<f64>::zeros(p + 1);
        if det.abs() <= EPSILON * (c00 * c11).abs().max(1.0) {
            warn!("Trace is constant, NMF weight update left at zero");
            return Ok(weights);
        }

        let cy0 = x.t().dot(&tr);
        let cy1 = x.sum_axis(Axis(0));
        let mut a0 = Array1::<f64>::zeros(p);
        let mut a1 = Array1::<f64>::zeros(p);
        for j in 0..p {
            a0[j] = ((c11 * cy0[j] - c01 * cy1[j]) / det).max(0.0);
            a1[j] = ((c00 * cy1[j] - c01 * cy0[j]) / det).max(0.0);
        }

        for _ in 0..self.passes {
            for j in 0..p {
                a0[j] = (a0[j] + (cy0[j] - c00 * a0[j] - c01 * a1[j]) / c00).max(0.0);
            }
            for j in 0..p {
                a1[j] += (cy1[j] - c01 * a0[j] - c11 * a1[j]) / c11;
            }
        }

        weights.slice_mut(s![1..]).assign(&a0);
        Ok(weights)
    }
}
