//! Tuning-free Huber mean estimation.
//!
//! The location is a fixed point of a weighted mean whose Huber threshold τ is
//! re-calibrated from the current residuals at every step by solving the
//! moment equation of [`crate::root_finding`]. Two calibrations exist: the plain
//! one for a single location problem and a dimension-adjusted one used for the
//! entries of a covariance matrix.

use crate::config::EstimationConfig;
use crate::math_utils::{clamped_subtract, column_slice, mean, sample_std_dev};
use crate::root_finding::{residual_bracket, solve_moment_equation, MomentEquation};
use log::debug;
use nalgebra::{DMatrix, DVector};

/// Outcome of one Huber fixed-point run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HuberEstimate {
    /// Robust location estimate
    pub location: f64,
    /// Final Huber threshold τ
    pub tau: f64,
    /// Number of fixed-point updates performed
    pub iterations: usize,
    /// Whether both location and τ moved less than the tolerance
    pub converged: bool,
}

/// Huber mean of a sample with the plain `log(n)/n` calibration.
///
/// # Example
/// ```rust
/// use farm_test::{huber_mean, EstimationConfig};
///
/// let data = [1.0, 2.0, 3.0, 4.0, 50.0];
/// let mu = huber_mean(&data, &EstimationConfig::default());
/// assert!(mu < 12.0);
/// ```
pub fn huber_mean(data: &[f64], config: &EstimationConfig) -> f64 {
    huber_mean_detailed(data, config).location
}

/// Huber mean with convergence diagnostics.
pub fn huber_mean_detailed(data: &[f64], config: &EstimationConfig) -> HuberEstimate {
    let equation = MomentEquation::Plain { n: data.len() };
    huber_fixed_point(data, equation, config)
}

/// Huber mean of pairwise cross-products for covariance entries.
///
/// `data` holds the `N = n(n−1)/2` half cross-products; the calibration uses the
/// original sample size `n` and the dimension `d`.
pub fn huber_mean_pairwise(data: &[f64], n: usize, d: usize, config: &EstimationConfig) -> f64 {
    let equation = MomentEquation::DimensionAdjusted { n, d };
    huber_fixed_point(data, equation, config).location
}

/// Huber mean of every column of a sample matrix.
pub fn huber_mean_columns(matrix: &DMatrix<f64>, config: &EstimationConfig) -> DVector<f64> {
    DVector::from_iterator(
        matrix.ncols(),
        (0..matrix.ncols()).map(|j| huber_mean(column_slice(matrix, j), config)),
    )
}

/// Robust variance of a column given its robust mean.
///
/// `HuberMean(x²) − μ²`, keeping the raw second moment when the correction
/// would overshoot.
pub fn huber_variance(data: &[f64], location: f64, config: &EstimationConfig) -> f64 {
    let squares: Vec<f64> = data.iter().map(|&x| x * x).collect();
    let second_moment = huber_mean(&squares, config);
    clamped_subtract(second_moment, location * location)
}

/// Huber mean and robust variance of every column.
pub fn huber_moments_columns(
    matrix: &DMatrix<f64>,
    config: &EstimationConfig,
) -> (DVector<f64>, DVector<f64>) {
    let p = matrix.ncols();
    let mut means = DVector::zeros(p);
    let mut variances = DVector::zeros(p);
    for j in 0..p {
        let column = column_slice(matrix, j);
        means[j] = huber_mean(column, config);
        variances[j] = huber_variance(column, means[j], config);
    }
    (means, variances)
}

fn huber_fixed_point(
    data: &[f64],
    equation: MomentEquation,
    config: &EstimationConfig,
) -> HuberEstimate {
    let m = data.len();
    match m {
        0 => {
            return HuberEstimate {
                location: f64::NAN,
                tau: 0.0,
                iterations: 0,
                converged: false,
            }
        }
        1 => {
            return HuberEstimate {
                location: data[0],
                tau: 0.0,
                iterations: 0,
                converged: true,
            }
        }
        _ => {}
    }

    let epsilon = config.mean_tolerance;
    let mut mu_old = 0.0;
    let mut mu_new = mean(data);
    let mut tau_old = 0.0;
    let mut tau_new = sample_std_dev(data) / equation.penalty().sqrt();

    let mut res = vec![0.0; m];
    let mut res_sq = vec![0.0; m];
    let mut iterations = 0;

    while ((mu_new - mu_old).abs() > epsilon || (tau_new - tau_old).abs() > epsilon)
        && iterations < config.mean_max_iterations
    {
        mu_old = mu_new;
        tau_old = tau_new;

        for ((r, r2), &x) in res.iter_mut().zip(res_sq.iter_mut()).zip(data) {
            *r = x - mu_old;
            *r2 = *r * *r;
        }

        let (low, high) = residual_bracket(&res_sq);
        tau_new = solve_moment_equation(
            equation,
            &res_sq,
            low,
            high,
            config.root_tolerance,
            config.root_max_iterations,
        )
        .sqrt();

        let mut weighted_sum = 0.0;
        let mut weight_total = 0.0;
        for (&r, &x) in res.iter().zip(data) {
            let abs_r = r.abs();
            // min(τ/|r|, 1), exact 1 for a zero residual
            let w = if abs_r <= tau_new { 1.0 } else { tau_new / abs_r };
            weighted_sum += x * w;
            weight_total += w;
        }
        mu_new = weighted_sum / weight_total;
        iterations += 1;
    }

    let converged = (mu_new - mu_old).abs() <= epsilon && (tau_new - tau_old).abs() <= epsilon;
    if !converged {
        debug!(
            "Huber mean reached the iteration cap ({}) on {} observations",
            config.mean_max_iterations, m
        );
    }

    HuberEstimate {
        location: mu_new,
        tau: tau_new,
        iterations,
        converged,
    }
}
