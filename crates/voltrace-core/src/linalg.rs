use nalgebra::{DMatrix, DVector, SVD};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};

use crate::consts::{CGLS_MAX_ITERATIONS, CGLS_TOLERANCE, SINGULAR_VALUE_CUTOFF};
use crate::error::{Result, VoltraceError};

/// Solve the square system `a * x = b` by LU decomposition.
pub fn solve_dense(a: &Array2<f64>, b: &Array1<f64>) -> Result<Array1<f64>> {
    let n = b.len();
    if a.dim() != (n, n) {
        return Err(VoltraceError::LinearAlgebra(format!(
            "expected a {n}x{n} system, got {:?}",
            a.dim()
        )));
    }
    let lhs = DMatrix::from_fn(n, n, |i, j| a[[i, j]]);
    let rhs = DVector::from_iterator(n, b.iter().copied());
    let x = lhs
        .lu()
        .solve(&rhs)
        .ok_or_else(|| VoltraceError::LinearAlgebra("singular matrix in dense solve".into()))?;
    Ok(Array1::from_iter(x.iter().copied()))
}

/// L2-regularised least squares, solved iteratively (CGLS) so that wide
/// design matrices never need an explicit normal-equation matrix.
#[derive(Clone, Copy, Debug)]
pub struct Ridge {
    pub alpha: f64,
    pub fit_intercept: bool,
}

/// Coefficients of a fitted [`Ridge`] model.
#[derive(Clone, Debug)]
pub struct RidgeFit {
    pub coef: Array1<f64>,
    pub intercept: f64,
}

impl RidgeFit {
    pub fn predict(&self, x: ArrayView2<f64>) -> Array1<f64> {
        x.dot(&self.coef) + self.intercept
    }
}

impl Ridge {
    pub fn new(alpha: f64, fit_intercept: bool) -> Self {
        Self {
            alpha,
            fit_intercept,
        }
    }

    /// Minimise `|y - X w - b|^2 + alpha |w|^2`.
    ///
    /// With `fit_intercept` the columns of `x` and `y` are centred implicitly
    /// and the intercept is recovered from the means afterwards.
    pub fn fit(&self, x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<RidgeFit> {
        let (n, p) = x.dim();
        if y.len() != n {
            return Err(VoltraceError::LinearAlgebra(format!(
                "design has {n} rows but target has {} samples",
                y.len()
            )));
        }
        if n == 0 || p == 0 {
            return Ok(RidgeFit {
                coef: Array1::zeros(p),
                intercept: if self.fit_intercept && n > 0 {
                    y.mean().unwrap_or(0.0)
                } else {
                    0.0
                },
            });
        }

        let (col_means, y_mean) = if self.fit_intercept {
            (
                x.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(p)),
                y.mean().unwrap_or(0.0),
            )
        } else {
            (Array1::zeros(p), 0.0)
        };

        let apply = |v: &Array1<f64>| -> Array1<f64> { x.dot(v) - col_means.dot(v) };
        let apply_t = |r: &Array1<f64>| -> Array1<f64> { x.t().dot(r) - &col_means * r.sum() };

        let mut w = Array1::<f64>::zeros(p);
        let mut r = y.mapv(|v| v - y_mean);
        let mut s = apply_t(&r);
        let mut d = s.clone();
        let mut gamma = s.dot(&s);
        let gamma0 = gamma;

        if gamma0 > 0.0 {
            for _ in 0..CGLS_MAX_ITERATIONS {
                let q = apply(&d);
                let delta = q.dot(&q) + self.alpha * d.dot(&d);
                if delta <= 0.0 {
                    break;
                }
                let step = gamma / delta;
                w.scaled_add(step, &d);
                r.scaled_add(-step, &q);
                s = apply_t(&r);
                s.scaled_add(-self.alpha, &w);
                let gamma_new = s.dot(&s);
                if gamma_new <= CGLS_TOLERANCE * CGLS_TOLERANCE * gamma0 {
                    break;
                }
                let beta = gamma_new / gamma;
                d = &s + &(&d * beta);
                gamma = gamma_new;
            }
        }

        let intercept = if self.fit_intercept {
            y_mean - col_means.dot(&w)
        } else {
            0.0
        };
        Ok(RidgeFit { coef: w, intercept })
    }
}

/// The `k` leading left singular vectors of `x`, as columns.
///
/// Directions whose singular value is negligible next to the largest one are
/// dropped, so the result may have fewer than `k` columns.
pub fn leading_left_singular_vectors(x: ArrayView2<f64>, k: usize) -> Result<Array2<f64>> {
    let (n, p) = x.dim();
    let k = k.min(n).min(p);
    if k == 0 {
        return Ok(Array2::zeros((n, 0)));
    }

    let matrix = DMatrix::from_fn(n, p, |i, j| x[[i, j]]);
    // Singular values come back in descending order.
    let svd = SVD::new(matrix, true, false);
    let u = svd
        .u
        .ok_or_else(|| VoltraceError::LinearAlgebra("SVD did not return U".into()))?;
    let largest = svd.singular_values.iter().copied().fold(0.0, f64::max);
    let kept = svd
        .singular_values
        .iter()
        .take(k)
        .take_while(|&&s| s > SINGULAR_VALUE_CUTOFF * largest)
        .count();

    Ok(Array2::from_shape_fn((n, kept), |(i, j)| u[(i, j)]))
}
