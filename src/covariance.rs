//! Huber-type covariance estimation.
//!
//! Diagonal entries come from the per-column Huber mean and variance. Each
//! off-diagonal entry `(i, j)` is the Huber mean of `Y_i ⊙ Y_j / 2`, where `Y`
//! stacks all `N = n(n−1)/2` pairwise row differences of the data. Differencing
//! cancels the unknown mean, and an outlying sample only contaminates the pairs
//! it belongs to. `Y` is materialised once and shared by every entry.

use crate::config::EstimationConfig;
use crate::errors::{validate_all_finite, validate_allocation_size, validate_data_length, FarmResult};
use crate::huber::{huber_mean, huber_mean_pairwise, huber_variance};
use crate::math_utils::column_slice;
use log::trace;
use nalgebra::{DMatrix, DVector};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Robust mean vector and covariance matrix of a sample.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RobustCovariance {
    /// Per-column Huber means (length p)
    pub means: DVector<f64>,
    /// Symmetric p × p Huber covariance
    pub covariance: DMatrix<f64>,
}

impl RobustCovariance {
    /// Robust variances (the diagonal of the covariance).
    pub fn variances(&self) -> DVector<f64> {
        self.covariance.diagonal()
    }
}

/// Number of unordered sample pairs, `n(n−1)/2`.
#[inline]
pub fn pair_count(n: usize) -> usize {
    n * n.saturating_sub(1) / 2
}

/// Huber mean vector and covariance of an `n × p` sample (rows are samples).
///
/// Requires at least two samples and finite data.
pub fn huber_cov(x: &DMatrix<f64>, config: &EstimationConfig) -> FarmResult<RobustCovariance> {
    let (n, p) = x.shape();
    validate_data_length(n, 2)?;
    validate_all_finite(x.as_slice(), "sample matrix")?;
    let bytes = pair_count(n)
        .checked_mul(p)
        .and_then(|cells| cells.checked_mul(std::mem::size_of::<f64>()))
        .unwrap_or(usize::MAX);
    validate_allocation_size(bytes, "pairwise differences")?;

    Ok(huber_cov_unchecked(x, config))
}

/// Core of [`huber_cov`] for inputs already validated by the caller.
pub(crate) fn huber_cov_unchecked(x: &DMatrix<f64>, config: &EstimationConfig) -> RobustCovariance {
    let (n, p) = x.shape();
    let mut means = DVector::zeros(p);
    let mut covariance = DMatrix::zeros(p, p);

    for j in 0..p {
        let column = column_slice(x, j);
        means[j] = huber_mean(column, config);
        covariance[(j, j)] = huber_variance(column, means[j], config);
    }

    if p > 1 {
        let diffs = pairwise_differences(x);
        let big_n = diffs.nrows();
        let pairs: Vec<(usize, usize)> = (0..p)
            .flat_map(|i| (i + 1..p).map(move |j| (i, j)))
            .collect();
        trace!(
            "estimating {} off-diagonal entries from {} sample pairs",
            pairs.len(),
            big_n
        );

        #[cfg(feature = "parallel")]
        let values: Vec<f64> = {
            use rayon::prelude::*;
            pairs
                .par_iter()
                .map_init(
                    || vec![0.0; big_n],
                    |buffer, &(i, j)| cross_product_entry(&diffs, i, j, n, p, buffer, config),
                )
                .collect()
        };

        #[cfg(not(feature = "parallel"))]
        let values: Vec<f64> = {
            let mut buffer = vec![0.0; big_n];
            pairs
                .iter()
                .map(|&(i, j)| cross_product_entry(&diffs, i, j, n, p, &mut buffer, config))
                .collect()
        };

        for (&(i, j), &value) in pairs.iter().zip(values.iter()) {
            covariance[(i, j)] = value;
            covariance[(j, i)] = value;
        }
    }

    RobustCovariance { means, covariance }
}

/// All pairwise row differences `x_i − x_k` (`i < k`) as an `N × p` matrix.
pub fn pairwise_differences(x: &DMatrix<f64>) -> DMatrix<f64> {
    let (n, p) = x.shape();
    let big_n = pair_count(n);
    let mut data = Vec::with_capacity(big_n * p);
    for j in 0..p {
        let column = column_slice(x, j);
        for i in 0..n.saturating_sub(1) {
            for k in i + 1..n {
                data.push(column[i] - column[k]);
            }
        }
    }
    DMatrix::from_vec(big_n, p, data)
}

fn cross_product_entry(
    diffs: &DMatrix<f64>,
    i: usize,
    j: usize,
    n: usize,
    p: usize,
    buffer: &mut [f64],
    config: &EstimationConfig,
) -> f64 {
    let yi = column_slice(diffs, i);
    let yj = column_slice(diffs, j);
    for ((z, &a), &b) in buffer.iter_mut().zip(yi).zip(yj) {
        *z = a * b / 2.0;
    }
    huber_mean_pairwise(buffer, n, p, config)
}
