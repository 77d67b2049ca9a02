use approx::assert_abs_diff_eq;
use ndarray::{array, Array1, Array2};

use voltrace_core::extract::{DesignMatrix, NmfUpdate, RidgeUpdate, WeightUpdate};
use voltrace_core::linalg::{leading_left_singular_vectors, solve_dense, Ridge};
use voltrace_core::{VoltraceError, WeightUpdateMethod};

// ---------------------------------------------------------------------------
// Dense solve and SVD
// ---------------------------------------------------------------------------

#[test]
fn test_dense_solve_known_solution() {
    let a = array![[2.0, 1.0, 0.0], [1.0, 3.0, 1.0], [0.0, 1.0, 4.0]];
    let x_true = array![1.0, -2.0, 0.5];
    let b = a.dot(&x_true);
    let x = solve_dense(&a, &b).unwrap();
    for (got, want) in x.iter().zip(x_true.iter()) {
        assert_abs_diff_eq!(*got, *want, epsilon = 1e-12);
    }
}

#[test]
fn test_dense_solve_rejects_singular_and_non_square() {
    let singular = array![[1.0, 2.0], [2.0, 4.0]];
    assert!(matches!(
        solve_dense(&singular, &array![1.0, 2.0]),
        Err(VoltraceError::LinearAlgebra(_))
    ));
    let wide = Array2::<f64>::zeros((2, 3));
    assert!(matches!(
        solve_dense(&wide, &array![1.0, 2.0]),
        Err(VoltraceError::LinearAlgebra(_))
    ));
}

#[test]
fn test_singular_vectors_separate_close_components() {
    // Two orthogonal directions with singular values 1.0 and 0.99.
    let n = 50;
    let norm = (n as f64).sqrt();
    let u1 = Array1::from_elem(n, 1.0 / norm);
    let u2 = Array1::from_shape_fn(n, |i| (if i % 2 == 0 { 1.0 } else { -1.0 }) / norm);
    let x = Array2::from_shape_fn((n, 8), |(i, j)| match j {
        0 => u1[i],
        1 => 0.99 * u2[i],
        _ => 0.0,
    });

    let leading = leading_left_singular_vectors(x.view(), 1).unwrap();
    assert_eq!(leading.dim(), (n, 1));
    let cosine = leading.column(0).dot(&u1).abs();
    assert!(cosine > 0.999_999, "cosine = {cosine}");

    // Rank two: the third direction falls under the cutoff.
    let basis = leading_left_singular_vectors(x.view(), 3).unwrap();
    assert_eq!(basis.ncols(), 2);
    let gram = basis.t().dot(&basis);
    assert_abs_diff_eq!(gram[[0, 0]], 1.0, epsilon = 1e-12);
    assert_abs_diff_eq!(gram[[0, 1]], 0.0, epsilon = 1e-12);
    assert_abs_diff_eq!(gram[[1, 1]], 1.0, epsilon = 1e-12);
}

#[test]
fn test_singular_vectors_of_zero_matrix() {
    let x = Array2::<f64>::zeros((12, 4));
    assert_eq!(leading_left_singular_vectors(x.view(), 2).unwrap().ncols(), 0);
    assert_eq!(leading_left_singular_vectors(x.view(), 0).unwrap().dim(), (12, 0));
}

// ---------------------------------------------------------------------------
// Ridge
// ---------------------------------------------------------------------------

#[test]
fn test_ridge_without_penalty_recovers_line() {
    let x = Array2::from_shape_fn((50, 2), |(i, j)| ((i * (j + 1)) as f64).cos());
    let y = x.dot(&array![1.5, -0.75]) + 2.0;
    let fit = Ridge::new(0.0, true).fit(x.view(), y.view()).unwrap();
    assert_abs_diff_eq!(fit.coef[0], 1.5, epsilon = 1e-6);
    assert_abs_diff_eq!(fit.coef[1], -0.75, epsilon = 1e-6);
    assert_abs_diff_eq!(fit.intercept, 2.0, epsilon = 1e-6);
}

#[test]
fn test_ridge_on_orthonormal_columns_shrinks_projection() {
    let raw = Array2::from_shape_fn((40, 2), |(i, j)| ((i + 2 * j) as f64 * 0.37).sin());
    let q = leading_left_singular_vectors(raw.view(), 2).unwrap();
    assert_eq!(q.ncols(), 2);
    let y = Array1::from_shape_fn(40, |i| (i as f64 * 0.11).cos());
    let alpha = 0.5;
    let fit = Ridge::new(alpha, false).fit(q.view(), y.view()).unwrap();
    let expected = q.t().dot(&y) / (1.0 + alpha);
    for (got, want) in fit.coef.iter().zip(expected.iter()) {
        assert_abs_diff_eq!(*got, *want, epsilon = 1e-8);
    }
    assert_eq!(fit.intercept, 0.0);
}

// ---------------------------------------------------------------------------
// Weight updates
// ---------------------------------------------------------------------------

#[test]
fn test_weight_update_names() {
    assert_eq!("NMF".parse::<WeightUpdateMethod>().unwrap(), WeightUpdateMethod::Nmf);
    assert_eq!("ridge".parse::<WeightUpdateMethod>().unwrap(), WeightUpdateMethod::Ridge);
    assert!(matches!(
        "lasso".parse::<WeightUpdateMethod>(),
        Err(VoltraceError::UnknownWeightUpdate(_))
    ));
}

#[test]
fn test_ridge_prediction_tracks_target() {
    let (design, trace) = toy_design();
    let weights = RidgeUpdate { alpha: 1e-3 }.fit(&design, &trace).unwrap();
    assert_eq!(weights.len(), 4);
    let pred = design.predict(&weights);
    for (p, t) in pred.iter().zip(&trace) {
        assert_abs_diff_eq!(*p, *t, epsilon = 1e-3);
    }
}

#[test]
fn test_nmf_recovers_loadings() {
    let (design, trace) = toy_design();
    let weights = NmfUpdate { passes: 5 }.fit(&design, &trace).unwrap();
    assert_eq!(weights[0], 0.0);
    assert_abs_diff_eq!(weights[1], 2.0, epsilon = 1e-6);
    assert_abs_diff_eq!(weights[2], 0.5, epsilon = 1e-6);
    assert!(weights.iter().all(|&w| w >= 0.0));
}

#[test]
fn test_nmf_constant_trace_gives_zero_weights() {
    let (design, _) = toy_design();
    let flat = vec![1.0; design.frames()];
    let weights = NmfUpdate { passes: 5 }.fit(&design, &flat).unwrap();
    assert!(weights.iter().all(|&w| w == 0.0));
}

#[test]
fn test_correlations_of_scaled_column() {
    let (design, trace) = toy_design();
    let shifted: Vec<f64> = trace.iter().map(|t| 2.0 * t + 1.0).collect();
    let corr = design.correlations(&shifted);
    assert_abs_diff_eq!(corr[0], 1.0, epsilon = 1e-12);
    assert!(corr[2].abs() < 0.5);
    assert_eq!(design.correlations(&vec![0.0; design.frames()]), vec![0.0; 3]);
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Two pixels following the trace with different gains and one unrelated pixel.
fn toy_design() -> (DesignMatrix, Vec<f64>) {
    let t = 200;
    let trace: Vec<f64> = (0..t).map(|i| (i as f64 * 0.3).sin() + 0.1).collect();
    let pixels = Array2::from_shape_fn((t, 3), |(i, j)| match j {
        0 => 2.0 * trace[i] + 1.0,
        1 => 0.5 * trace[i] + 1.0,
        _ => (i as f64 * 1.7).cos(),
    });
    (DesignMatrix::new(pixels), trace)
}
