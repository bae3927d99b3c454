//! Adaptive Huber regression by gradient descent with Barzilai–Borwein steps.
//!
//! Design columns are standardised and an intercept column is prepended. The
//! Huber threshold is `c · MAD(residuals)`, re-estimated at every iteration.
//! After descent the slopes are mapped back to the original scale and the
//! intercept is re-estimated as the Huber mean of `y − Xβ`.

use crate::config::EstimationConfig;
use crate::errors::{validate_all_finite, validate_data_length, validate_same_extent, FarmResult};
use crate::huber::huber_mean;
use crate::math_utils::{column_slice, mean, sample_std_dev, scaled_mad};
use log::{debug, warn};
use nalgebra::{DMatrix, DVector};

/// Coefficients of a robust linear fit, intercept first.
#[derive(Debug, Clone, PartialEq)]
pub struct RegressionFit {
    /// `(k + 1)` coefficients: intercept followed by slopes on the original scale
    pub coefficients: DVector<f64>,
    /// Descent iterations performed
    pub iterations: usize,
    /// Whether the descent stopped on tolerance rather than the cap
    pub converged: bool,
}

impl RegressionFit {
    /// Intercept (Huber mean of the slope-adjusted response).
    pub fn intercept(&self) -> f64 {
        self.coefficients[0]
    }

    /// Slope coefficients.
    pub fn slopes(&self) -> DVector<f64> {
        self.coefficients.rows(1, self.coefficients.len() - 1).into_owned()
    }
}

/// Average Huber loss of a residual vector.
pub fn huber_loss(residuals: &DVector<f64>, tau: f64) -> f64 {
    let n = residuals.len();
    if n == 0 {
        return 0.0;
    }
    let total: f64 = residuals
        .iter()
        .map(|&r| {
            let abs_r = r.abs();
            if abs_r <= tau {
                r * r / 2.0
            } else {
                tau * abs_r - tau * tau / 2.0
            }
        })
        .sum();
    total / n as f64
}

/// Derivative of the Huber loss with respect to the fitted value.
pub fn huber_derivative(residuals: &DVector<f64>, tau: f64) -> DVector<f64> {
    residuals.map(|r| {
        if r.abs() <= tau {
            -r
        } else {
            -tau * sign(r)
        }
    })
}

#[inline]
fn sign(x: f64) -> f64 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Barzilai–Borwein step from consecutive coefficient and gradient differences.
///
/// Both BB candidates are capped at 1; a non-positive curvature estimate falls
/// back to the unit step.
pub fn barzilai_borwein_step(beta_diff: &DVector<f64>, grad_diff: &DVector<f64>) -> f64 {
    let cross = beta_diff.dot(grad_diff);
    if cross > 0.0 {
        let a1 = cross / grad_diff.dot(grad_diff);
        let a2 = beta_diff.dot(beta_diff) / cross;
        a1.min(a2).min(1.0)
    } else {
        1.0
    }
}

/// Robust regression of `y` on the columns of `x` (rows are samples).
///
/// # Example
/// ```rust
/// use farm_test::{huber_regression, EstimationConfig};
/// use nalgebra::DMatrix;
///
/// let x = DMatrix::from_column_slice(6, 1, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
/// let y = [3.0, 5.0, 7.0, 9.0, 11.0, 13.0];
/// let fit = huber_regression(&x, &y, &EstimationConfig::default()).unwrap();
/// assert!((fit.slopes()[0] - 2.0).abs() < 0.1);
/// ```
pub fn huber_regression(
    x: &DMatrix<f64>,
    y: &[f64],
    config: &EstimationConfig,
) -> FarmResult<RegressionFit> {
    validate_same_extent(x.nrows(), y.len(), "response length vs design rows")?;
    validate_data_length(y.len(), 2)?;
    validate_all_finite(x.as_slice(), "design matrix")?;
    validate_all_finite(y, "response")?;
    Ok(huber_regression_unchecked(x, y, config))
}

/// Core of [`huber_regression`] for inputs already validated by the caller.
pub(crate) fn huber_regression_unchecked(
    x: &DMatrix<f64>,
    y: &[f64],
    config: &EstimationConfig,
) -> RegressionFit {
    let (n, k) = x.shape();
    let c = config.huber_constant;
    let tol = config.regression_tolerance;
    let n_f = n as f64;

    let stds: Vec<f64> = (0..k).map(|j| sample_std_dev(column_slice(x, j))).collect();
    let z = standardized_design(x, &stds);
    let y_vec = DVector::from_column_slice(y);

    let mut beta_old = DVector::zeros(k + 1);
    let mut tau = c * scaled_mad(y);
    let mut grad_old = z.tr_mul(&huber_derivative(&y_vec, tau)) / n_f;
    let mut loss_old = huber_loss(&y_vec, tau);
    let mut beta_new = &beta_old - &grad_old;
    let mut res = &y_vec - &z * &beta_new;
    let mut loss_new = huber_loss(&res, tau);

    let mut iteration = 1;
    while ((loss_new - loss_old).abs() > tol || (&beta_new - &beta_old).amax() > tol)
        && iteration <= config.regression_max_iterations
    {
        tau = c * scaled_mad(res.as_slice());
        let grad_new = z.tr_mul(&huber_derivative(&res, tau)) / n_f;
        let step = barzilai_borwein_step(&(&beta_new - &beta_old), &(&grad_new - &grad_old));

        beta_old.copy_from(&beta_new);
        loss_old = loss_new;
        beta_new -= &grad_new * step;
        res += (&z * &grad_new) * step;
        loss_new = huber_loss(&res, tau);
        grad_old = grad_new;
        iteration += 1;
    }

    let converged = iteration <= config.regression_max_iterations;
    if !converged {
        debug!(
            "Huber regression reached the iteration cap ({}) with n = {}, k = {}",
            config.regression_max_iterations, n, k
        );
    }

    // back to the original scale; constant columns carry no slope
    let mut coefficients = beta_new;
    for (j, &sd) in stds.iter().enumerate() {
        coefficients[j + 1] = if sd > 0.0 { coefficients[j + 1] / sd } else { 0.0 };
    }

    let slopes = coefficients.rows(1, k).into_owned();
    let fitted = x * &slopes;
    let adjusted: Vec<f64> = y.iter().zip(fitted.iter()).map(|(&yi, &fi)| yi - fi).collect();
    coefficients[0] = huber_mean(&adjusted, config);

    RegressionFit {
        coefficients,
        iterations: iteration - 1,
        converged,
    }
}

/// `[1 | (X − mean) / sd]`; zero-variance columns become zeros.
fn standardized_design(x: &DMatrix<f64>, stds: &[f64]) -> DMatrix<f64> {
    let (n, k) = x.shape();
    let mut z = DMatrix::from_element(n, k + 1, 1.0);
    for j in 0..k {
        let column = column_slice(x, j);
        let mu = mean(column);
        let sd = stds[j];
        if sd > 0.0 {
            for (i, &v) in column.iter().enumerate() {
                z[(i, j + 1)] = (v - mu) / sd;
            }
        } else {
            warn!("design column {} has zero variance; its slope is fixed at 0", j);
            z.column_mut(j + 1).fill(0.0);
        }
    }
    z
}
