//! Integration tests for error handling and invalid input scenarios
//!
//! Every hard failure is raised at the driver boundary, before any estimator
//! runs. These tests exercise each rejection path through the public API.

use farm_test::{
    errors::FarmTestError, farm_test, farm_test_known_factors, farm_test_two_known_factors,
    huber_cov, huber_regression, robust_mean_test, robust_mean_test_bootstrap,
    robust_mean_test_two, Alternative, EstimationConfig, TestConfig,
};
use nalgebra::{DMatrix, DVector};

fn sample(n: usize, p: usize) -> DMatrix<f64> {
    DMatrix::from_fn(n, p, |i, j| ((i * 7 + j * 3) % 11) as f64 - 5.0)
}

/// Test scenario: a single observation cannot support any estimator
#[test]
fn test_insufficient_samples() {
    let x = sample(1, 3);
    match robust_mean_test(&x, &DVector::zeros(3), &TestConfig::default()) {
        Err(FarmTestError::InsufficientData { required, actual }) => {
            assert!(
                actual < required,
                "Error should identify insufficient data: actual {} < required {}",
                actual,
                required
            );
        }
        other => panic!("Expected InsufficientData error, got {:?}", other),
    }
}

/// Test scenario: NaN and infinite values are rejected, never propagated
#[test]
fn test_non_finite_inputs() {
    let mut x = sample(10, 2);
    x[(4, 1)] = f64::NAN;
    match robust_mean_test(&x, &DVector::zeros(2), &TestConfig::default()) {
        Err(FarmTestError::NumericalError { reason, .. }) => {
            assert!(reason.contains("NaN"), "reason should name the value: {}", reason);
        }
        other => panic!("Expected NumericalError, got {:?}", other),
    }

    let x = sample(10, 2);
    let h0 = DVector::from_vec(vec![0.0, f64::INFINITY]);
    assert!(matches!(
        robust_mean_test(&x, &h0, &TestConfig::default()),
        Err(FarmTestError::NumericalError { .. })
    ));

    let mut factors = DMatrix::from_element(10, 1, 1.0);
    factors[(0, 0)] = f64::NEG_INFINITY;
    assert!(matches!(
        farm_test_known_factors(&x, &factors, &DVector::zeros(2), &TestConfig::default()),
        Err(FarmTestError::NumericalError { .. })
    ));
}

/// Test scenario: alpha must lie strictly inside (0, 1)
#[test]
fn test_invalid_alpha() {
    let x = sample(10, 2);
    for alpha in [0.0, 1.0, -0.1, 2.0, f64::NAN] {
        let config = TestConfig::default().with_alpha(alpha);
        assert!(
            matches!(
                robust_mean_test(&x, &DVector::zeros(2), &config),
                Err(FarmTestError::InvalidParameter { .. })
            ),
            "alpha = {} should be rejected",
            alpha
        );
    }
}

/// Test scenario: non-positive estimator tolerances are configuration errors
#[test]
fn test_invalid_estimation_config() {
    let x = sample(10, 2);
    let estimation = EstimationConfig {
        mean_tolerance: 0.0,
        ..EstimationConfig::default()
    };
    let config = TestConfig::default().with_estimation(estimation);
    match robust_mean_test(&x, &DVector::zeros(2), &config) {
        Err(FarmTestError::InvalidParameter { parameter, .. }) => {
            assert_eq!(parameter, "mean_tolerance");
        }
        other => panic!("Expected InvalidParameter error, got {:?}", other),
    }
}

/// Test scenario: shapes of paired inputs must agree
#[test]
fn test_dimension_mismatches() {
    let x = sample(12, 3);
    let config = TestConfig::default();

    assert!(matches!(
        robust_mean_test(&x, &DVector::zeros(4), &config),
        Err(FarmTestError::DimensionMismatch { expected: 3, actual: 4, .. })
    ));

    let y = sample(12, 2);
    assert!(matches!(
        robust_mean_test_two(&x, &y, &DVector::zeros(3), &config),
        Err(FarmTestError::DimensionMismatch { .. })
    ));

    let factors_x = DMatrix::from_element(12, 2, 0.5);
    let factors_y = DMatrix::from_element(11, 2, 0.5);
    let y = sample(12, 3);
    match farm_test_two_known_factors(&x, &factors_x, &y, &factors_y, &DVector::zeros(3), &config) {
        Err(FarmTestError::DimensionMismatch { context, expected, actual }) => {
            assert!(context.contains("factors of Y"));
            assert_eq!((expected, actual), (12, 11));
        }
        other => panic!("Expected DimensionMismatch error, got {:?}", other),
    }

    assert!(matches!(
        huber_regression(&x, &[1.0, 2.0], &EstimationConfig::default()),
        Err(FarmTestError::DimensionMismatch { .. })
    ));
}

/// Test scenario: a requested factor count must lie in 1..=p
#[test]
fn test_factor_count_out_of_range() {
    let x = sample(15, 3);
    for k in [0usize, 4, 100] {
        match farm_test(&x, &DVector::zeros(3), Some(k), &TestConfig::default()) {
            Err(FarmTestError::InvalidParameter { parameter, value, .. }) => {
                assert_eq!(parameter, "K");
                assert_eq!(value, k as f64);
            }
            other => panic!("Expected InvalidParameter for K = {}, got {:?}", k, other),
        }
    }
}

/// Test scenario: the bootstrap needs at least one replicate
#[test]
fn test_zero_bootstrap_replicates() {
    let x = sample(10, 2);
    let config = TestConfig::default().with_bootstrap_samples(0);
    assert!(matches!(
        robust_mean_test_bootstrap(&x, &DVector::zeros(2), &config),
        Err(FarmTestError::BootstrapError { .. })
    ));
}

/// Test scenario: unknown alternative names are rejected when parsed
#[test]
fn test_unknown_alternative() {
    assert!("two.sided".parse::<Alternative>().is_ok());
    assert!(matches!(
        "both".parse::<Alternative>(),
        Err(FarmTestError::InvalidParameter { .. })
    ));
}

/// Test scenario: the pairwise-difference matrix is size-checked before allocation
#[test]
fn test_covariance_allocation_guard() {
    // 70_000 rows give ~2.4e9 pairs; one column already exceeds the limit
    let x = DMatrix::from_element(70_000, 1, 0.0);
    match huber_cov(&x, &EstimationConfig::default()) {
        Err(FarmTestError::NumericalError { operation, .. }) => {
            assert_eq!(operation.as_deref(), Some("pairwise differences"));
        }
        other => panic!("Expected NumericalError, got {:?}", other.map(|c| c.means.len())),
    }
}

/// Test scenario: error messages are human readable
#[test]
fn test_error_display() {
    let err = robust_mean_test(&sample(1, 1), &DVector::zeros(1), &TestConfig::default())
        .unwrap_err();
    let message = err.to_string();
    assert!(message.contains("Insufficient data"), "message: {}", message);
}
