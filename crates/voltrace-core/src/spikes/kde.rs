use std::f64::consts::PI;

/// One-dimensional Gaussian kernel density estimate with Scott's bandwidth.
#[derive(Clone, Debug)]
pub struct GaussianKde {
    samples: Vec<f64>,
    bandwidth: f64,
}

impl GaussianKde {
    /// Returns `None` for fewer than two samples or zero spread, where the
    /// bandwidth is undefined.
    pub fn new(samples: &[f64]) -> Option<Self> {
        let n = samples.len();
        if n < 2 {
            return None;
        }
        let mean = samples.iter().sum::<f64>() / n as f64;
        let var = samples.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
        let scott = (n as f64).powf(-0.2);
        let bandwidth = var.sqrt() * scott;
        if bandwidth <= 0.0 || !bandwidth.is_finite() {
            return None;
        }
        Some(Self {
            samples: samples.to_vec(),
            bandwidth,
        })
    }

    pub fn bandwidth(&self) -> f64 {
        self.bandwidth
    }

    pub fn evaluate(&self, x: f64) -> f64 {
        let norm = 1.0 / ((2.0 * PI).sqrt() * self.bandwidth * self.samples.len() as f64);
        let inv2 = 1.0 / (2.0 * self.bandwidth * self.bandwidth);
        self.samples
            .iter()
            .map(|s| (-(x - s) * (x - s) * inv2).exp())
            .sum::<f64>()
            * norm
    }

    pub fn evaluate_many(&self, points: &[f64]) -> Vec<f64> {
        points.iter().map(|&x| self.evaluate(x)).collect()
    }
}

/// `n` evenly spaced points from `start` to `end` inclusive.
pub fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (n - 1) as f64;
            (0..n).map(|i| start + step * i as f64).collect()
        }
    }
}
