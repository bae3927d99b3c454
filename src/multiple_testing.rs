//! P-values and simultaneous rejection decisions.
//!
//! Analytic p-values come from the standard normal limit of the robust
//! t-statistics; bootstrap p-values from the empirical tail frequency of the
//! replicate estimates. Rejections are made by the adaptive Benjamini–Hochberg
//! procedure, which plugs in an estimate of the proportion of true nulls.

use crate::errors::{FarmResult, FarmTestError};
use crate::math_utils::float_total_cmp;
use nalgebra::{DMatrix, DVector};
use statrs::distribution::{ContinuousCDF, Normal};
use std::fmt;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Direction of the alternative hypothesis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Alternative {
    /// `μ ≠ h0`
    #[default]
    TwoSided,
    /// `μ < h0`
    Less,
    /// `μ > h0`
    Greater,
}

impl FromStr for Alternative {
    type Err = FarmTestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "two.sided" | "two-sided" | "two_sided" => Ok(Alternative::TwoSided),
            "less" => Ok(Alternative::Less),
            "greater" => Ok(Alternative::Greater),
            other => Err(FarmTestError::InvalidParameter {
                parameter: format!("alternative ({})", other),
                value: f64::NAN,
                constraint: "one of two.sided, less, greater".to_string(),
            }),
        }
    }
}

impl fmt::Display for Alternative {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Alternative::TwoSided => "two.sided",
            Alternative::Less => "less",
            Alternative::Greater => "greater",
        };
        f.write_str(name)
    }
}

/// Normal-limit p-values of a vector of t-statistics.
pub fn normal_p_values(t_stats: &DVector<f64>, alternative: Alternative) -> FarmResult<DVector<f64>> {
    let normal = Normal::new(0.0, 1.0).map_err(|e| FarmTestError::NumericalError {
        reason: format!("Failed to create normal distribution: {}", e),
        operation: Some("normal_p_values".to_string()),
    })?;

    Ok(t_stats.map(|t| match alternative {
        Alternative::TwoSided => 2.0 * normal.cdf(-t.abs()),
        Alternative::Less => normal.cdf(t),
        Alternative::Greater => normal.cdf(-t),
    }))
}

/// Bootstrap p-values from a `p × B` matrix of replicate estimates.
///
/// Two-sided: share of replicates at least as far from the estimate as the
/// estimate is from `h0`. One-sided: share of replicates beyond the reflected
/// point `2·estimate − h0`.
pub fn bootstrap_p_values(
    estimate: &DVector<f64>,
    replicates: &DMatrix<f64>,
    h0: &DVector<f64>,
    alternative: Alternative,
) -> DVector<f64> {
    let b = replicates.ncols() as f64;
    DVector::from_fn(estimate.len(), |j, _| {
        let mu = estimate[j];
        let row = replicates.row(j);
        let count = match alternative {
            Alternative::TwoSided => {
                let distance = (mu - h0[j]).abs();
                row.iter().filter(|&&x| (x - mu).abs() >= distance).count()
            }
            Alternative::Less => {
                let reflected = 2.0 * mu - h0[j];
                row.iter().filter(|&&x| x <= reflected).count()
            }
            Alternative::Greater => {
                let reflected = 2.0 * mu - h0[j];
                row.iter().filter(|&&x| x >= reflected).count()
            }
        };
        count as f64 / b
    })
}

/// Rejection threshold of the adaptive Benjamini–Hochberg procedure.
///
/// Returns `-1.0` when no ordered p-value passes its step-up bound, so that
/// comparing any p-value against the threshold rejects nothing.
pub fn adaptive_bh_threshold(p_values: &[f64], alpha: f64) -> f64 {
    let p = p_values.len();
    if p == 0 {
        return -1.0;
    }
    let p_f = p as f64;
    let above = p_values.iter().filter(|&&v| v > alpha).count() as f64;
    let pi_hat = above / ((1.0 - alpha) * p_f);

    let mut sorted = p_values.to_vec();
    sorted.sort_by(float_total_cmp);

    sorted
        .iter()
        .enumerate()
        .rev()
        .find(|(i, &z)| z * pi_hat * p_f <= alpha * (*i as f64 + 1.0))
        .map(|(_, &z)| z)
        .unwrap_or(-1.0)
}

/// Rejection indicator per coordinate at FDR level `alpha`.
pub fn adaptive_bh(p_values: &[f64], alpha: f64) -> Vec<bool> {
    let threshold = adaptive_bh_threshold(p_values, alpha);
    p_values.iter().map(|&v| v <= threshold).collect()
}
