//! Edge case stability tests
//!
//! Degenerate but valid inputs (constant data, the smallest admissible sample,
//! a single coordinate, zero-variance regressors) must produce finite,
//! neutral estimates rather than errors or NaN.

use assert_approx_eq::assert_approx_eq;
use farm_test::{
    adaptive_bh, eigenvalue_ratios, farm_test, farm_test_known_factors, huber_cov, huber_mean,
    huber_mean_columns, huber_regression, robust_mean_test, robust_mean_test_two,
    select_factor_count, EstimationConfig, TestConfig,
};
use nalgebra::{DMatrix, DVector};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use rand_distr::{Distribution, Normal};

/// Gaussian sample with a common factor and column `zero` held at exactly 0.
fn sample_with_zero_column(n: usize, p: usize, zero: usize, seed: u64) -> DMatrix<f64> {
    let mut rng = ChaCha20Rng::seed_from_u64(seed);
    let normal = Normal::new(0.0, 1.0).unwrap();
    let factor: Vec<f64> = (0..n).map(|_| normal.sample(&mut rng)).collect();
    DMatrix::from_fn(n, p, |i, j| {
        if j == zero {
            0.0
        } else {
            (1.0 + 0.2 * j as f64) * factor[i] + normal.sample(&mut rng)
        }
    })
}

#[test]
fn test_constant_sample_gives_finite_statistics() {
    let x = DMatrix::from_element(12, 3, 2.0);
    let result = robust_mean_test(&x, &DVector::from_element(3, 2.0), &TestConfig::default())
        .unwrap();

    for j in 0..3 {
        assert_approx_eq!(result.means[j], 2.0, 1e-12);
        // HuberMean(x²) − μ² is not positive, so the raw second moment is kept
        assert_approx_eq!(result.std_dev[j], (4.0f64 / 12.0).sqrt(), 1e-9);
        assert_approx_eq!(result.t_stat[j], 0.0, 1e-9);
    }
    assert!(result.significant.iter().all(|&s| !s));
}

#[test]
fn test_two_observations_are_enough() {
    let x = DMatrix::from_row_slice(2, 2, &[0.0, 10.0, 1.0, 12.0]);
    let result = robust_mean_test(&x, &DVector::zeros(2), &TestConfig::default()).unwrap();
    assert_approx_eq!(result.means[0], 0.5, 1e-9);
    assert_approx_eq!(result.means[1], 11.0, 1e-9);
    assert!(result.p_values.iter().all(|p| p.is_finite()));
}

#[test]
fn test_single_coordinate_factor_model() {
    let x = DMatrix::from_column_slice(6, 1, &[0.3, -1.2, 0.8, 2.1, -0.4, 0.0]);
    let result = farm_test(&x, &DVector::zeros(1), None, &TestConfig::default()).unwrap();

    // min(n, p) = 1 leaves no ratio to compare: one factor, one-point curve
    assert_eq!(result.n_factors, 1);
    assert_eq!(result.ratios.as_ref().map(|r| r.len()), Some(1));
    assert_eq!(result.ratios.as_ref().map(|r| r[0]), Some(result.eigenvalues[0]));
    assert!(result.means[0].is_finite());
    assert!(result.std_dev[0].is_finite() && result.std_dev[0] > 0.0);
}

#[test]
fn test_degenerate_ratio_helpers() {
    let ratios = eigenvalue_ratios(&[0.7], 50, 1);
    assert_eq!(ratios, vec![0.7]);
    assert_eq!(select_factor_count(&ratios), 1);
    assert_eq!(select_factor_count(&[f64::NAN, f64::NAN]), 1);

    // a single observation leaves an empty curve for any p
    assert_eq!(eigenvalue_ratios(&[0.5, 2.0, 9.0], 1, 3), vec![9.0]);
}

#[test]
fn test_zero_variance_factor_column() {
    let n = 30;
    let factors = DMatrix::from_fn(n, 2, |i, k| if k == 0 { (i as f64 * 0.37).sin() } else { 1.0 });
    let x = DMatrix::from_fn(n, 2, |i, j| 0.5 * j as f64 + 2.0 * factors[(i, 0)]);
    let result =
        farm_test_known_factors(&x, &factors, &DVector::zeros(2), &TestConfig::default()).unwrap();

    for j in 0..2 {
        assert_eq!(result.loadings[(j, 1)], 0.0, "constant factor must get slope 0");
        assert!((result.loadings[(j, 0)] - 2.0).abs() < 0.05);
    }
    assert!(result.means.iter().all(|m| m.is_finite()));
}

#[test]
fn test_constant_regression_response() {
    let x = DMatrix::from_fn(8, 2, |i, j| (i + j) as f64);
    let fit = huber_regression(&x, &[5.0; 8], &EstimationConfig::default()).unwrap();
    assert_approx_eq!(fit.intercept(), 5.0, 1e-12);
    assert!(fit.slopes().iter().all(|&b| b == 0.0));
}

#[test]
fn test_huber_mean_small_inputs() {
    let config = EstimationConfig::default();
    assert!(huber_mean(&[], &config).is_nan());
    assert_eq!(huber_mean(&[-3.25], &config), -3.25);
    assert_approx_eq!(huber_mean(&[7.0; 9], &config), 7.0, 1e-12);

    let columns = huber_mean_columns(&DMatrix::from_element(4, 2, -1.0), &config);
    assert_eq!(columns.len(), 2);
    assert_approx_eq!(columns[1], -1.0, 1e-12);
}

#[test]
fn test_constant_covariance_is_neutral() {
    let cov = huber_cov(&DMatrix::from_element(5, 3, 1.0), &EstimationConfig::default()).unwrap();
    for i in 0..3 {
        for j in 0..3 {
            assert!(cov.covariance[(i, j)].is_finite());
            if i != j {
                assert_approx_eq!(cov.covariance[(i, j)], 0.0, 1e-12);
            }
        }
    }
}

#[test]
fn test_adaptive_bh_without_discoveries_is_silent() {
    let rejected = adaptive_bh(&[0.4, 0.9, 0.2, 0.7], 0.05);
    assert_eq!(rejected, vec![false; 4]);
}

/// Test scenario: an all-zero coordinate tested against 0 is never a discovery
#[test]
fn test_zero_column_is_neutral_in_mean_test() {
    let x = sample_with_zero_column(20, 3, 1, 61);
    let result = robust_mean_test(&x, &DVector::zeros(3), &TestConfig::default()).unwrap();

    assert_eq!(result.std_dev[1], 0.0);
    assert_eq!(result.t_stat[1], 0.0);
    assert_approx_eq!(result.p_values[1], 1.0, 1e-12);
    assert!(!result.significant[1]);
    assert!(result.t_stat.iter().all(|t| t.is_finite()));
    assert!(result.p_values.iter().all(|p| p.is_finite()));
}

#[test]
fn test_zero_column_away_from_null_is_rejected() {
    let x = sample_with_zero_column(20, 3, 1, 61);
    let h0 = DVector::from_vec(vec![0.0, 1.0, 0.0]);
    let result = robust_mean_test(&x, &h0, &TestConfig::default()).unwrap();

    assert_eq!(result.t_stat[1], f64::NEG_INFINITY);
    assert_eq!(result.p_values[1], 0.0);
    assert!(result.significant[1]);
}

#[test]
fn test_zero_column_is_neutral_after_factor_adjustment() {
    let x = sample_with_zero_column(60, 6, 2, 62);
    let result = farm_test(&x, &DVector::zeros(6), None, &TestConfig::default()).unwrap();

    assert_eq!(result.std_dev[2], 0.0);
    assert!(result.means[2].abs() < 1e-10, "mean {}", result.means[2]);
    assert_eq!(result.t_stat[2], 0.0);
    assert_approx_eq!(result.p_values[2], 1.0, 1e-12);
    assert!(!result.significant[2]);
}

#[test]
fn test_zero_column_is_neutral_in_two_sample_test() {
    let x = sample_with_zero_column(30, 3, 0, 63);
    let y = sample_with_zero_column(25, 3, 0, 64);
    let result = robust_mean_test_two(&x, &y, &DVector::zeros(3), &TestConfig::default()).unwrap();

    assert_eq!(result.std_dev_x[0], 0.0);
    assert_eq!(result.std_dev_y[0], 0.0);
    assert_eq!(result.t_stat[0], 0.0);
    assert_approx_eq!(result.p_values[0], 1.0, 1e-12);
    assert!(!result.significant[0]);
}
