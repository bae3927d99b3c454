//! Bisection solver for the Huber tuning-parameter moment equation.
//!
//! The adaptive Huber estimators pick τ² as the root of a decreasing function
//! of `x` built from the squared residuals:
//!
//! ```text
//! g(x) = Σ min(r_i², x) / (m·x) − penalty
//! ```
//!
//! where `m` is the number of residuals. For a single location problem the
//! penalty is `log(n)/n`; when many pairwise covariance entries are calibrated
//! at once it becomes `(2·log(d) + log(n))/n` so the error is controlled
//! uniformly over the `d²` entries.

use log::debug;

/// Shape of the moment equation to solve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MomentEquation {
    /// `penalty = log(n)/n` for a single estimation problem on `n` samples.
    Plain {
        /// Sample size
        n: usize,
    },
    /// `penalty = (2·log(d) + log(n))/n`, uniform over `d` coordinates.
    DimensionAdjusted {
        /// Original sample size (not the number of pairs)
        n: usize,
        /// Ambient dimension
        d: usize,
    },
}

impl MomentEquation {
    /// Right-hand side the truncated second moment is matched against.
    pub fn penalty(&self) -> f64 {
        match *self {
            MomentEquation::Plain { n } => (n as f64).ln() / n as f64,
            MomentEquation::DimensionAdjusted { n, d } => {
                (2.0 * (d as f64).ln() + (n as f64).ln()) / n as f64
            }
        }
    }

    /// Evaluate `g(x)` over the squared residuals.
    pub fn evaluate(&self, x: f64, res_sq: &[f64]) -> f64 {
        let truncated: f64 = res_sq.iter().map(|&r| r.min(x)).sum();
        truncated / (res_sq.len() as f64 * x) - self.penalty()
    }
}

/// Solve `g(x) = 0` by bisection on `[low, high]`.
///
/// Returns the midpoint of the final bracket, so a value inside `[low, high]`
/// is always produced: the loop stops when the bracket is narrower than
/// `tolerance`, after `max_iterations + 1` halvings, or on an exact zero.
/// A bracket with `high <= low` (all residuals equal) returns `low` untouched.
pub fn solve_moment_equation(
    equation: MomentEquation,
    res_sq: &[f64],
    mut low: f64,
    mut high: f64,
    tolerance: f64,
    max_iterations: usize,
) -> f64 {
    if high <= low {
        return low;
    }

    let mut iteration = 0;
    while iteration <= max_iterations && high - low > tolerance {
        let mid = 0.5 * (low + high);
        let val = equation.evaluate(mid, res_sq);
        if val == 0.0 {
            return mid;
        } else if val < 0.0 {
            high = mid;
        } else {
            low = mid;
        }
        iteration += 1;
    }

    if high - low > tolerance {
        debug!(
            "bisection stopped after {} iterations with bracket width {:e}",
            iteration,
            high - low
        );
    }
    0.5 * (low + high)
}

/// Bracket used by the Huber estimators: `[min(r²), Σ r²]`.
pub fn residual_bracket(res_sq: &[f64]) -> (f64, f64) {
    let low = res_sq.iter().copied().fold(f64::INFINITY, f64::min);
    let high: f64 = res_sq.iter().sum();
    if low.is_finite() {
        (low, high)
    } else {
        (0.0, 0.0)
    }
}
