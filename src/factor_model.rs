//! Latent factor structure of a robust covariance matrix.
//!
//! Eigenvalues are kept in ascending order, so the largest sits at index
//! `p − 1`. The number of factors is either supplied or chosen by the
//! eigenvalue-ratio rule: the largest ratio of consecutive leading eigenvalues
//! marks the gap between common factors and idiosyncratic noise.

use crate::config::EstimationConfig;
use crate::errors::{FarmResult, FarmTestError};
use crate::math_utils::{argmax, float_total_cmp};
use crate::regression::huber_regression_unchecked;
use log::{debug, warn};
use nalgebra::{DMatrix, DVector};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Eigen-decomposition of a symmetric matrix with ascending eigenvalues.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectralDecomposition {
    /// Eigenvalues, smallest first
    pub eigenvalues: DVector<f64>,
    /// Unit eigenvectors; column `i` belongs to `eigenvalues[i]`
    pub eigenvectors: DMatrix<f64>,
}

impl SpectralDecomposition {
    /// Decompose a symmetric matrix and sort the spectrum ascending.
    pub fn new(symmetric: &DMatrix<f64>) -> Self {
        let eigen = symmetric.clone().symmetric_eigen();
        let p = eigen.eigenvalues.len();

        let mut order: Vec<usize> = (0..p).collect();
        order.sort_by(|&a, &b| float_total_cmp(&eigen.eigenvalues[a], &eigen.eigenvalues[b]));

        let eigenvalues = DVector::from_iterator(p, order.iter().map(|&i| eigen.eigenvalues[i]));
        let mut eigenvectors = DMatrix::zeros(p, p);
        for (dst, &src) in order.iter().enumerate() {
            eigenvectors.set_column(dst, &eigen.eigenvectors.column(src));
        }

        Self {
            eigenvalues,
            eigenvectors,
        }
    }

    /// Dimension of the decomposed matrix.
    pub fn dim(&self) -> usize {
        self.eigenvalues.len()
    }
}

/// Estimated factor structure of a sample.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FactorModel {
    /// `p × K` loading matrix
    pub loadings: DMatrix<f64>,
    /// Number of factors K
    pub n_factors: usize,
    /// Eigenvalues of the robust covariance, ascending
    pub eigenvalues: DVector<f64>,
    /// Eigenvalue-ratio curve, present only when K was selected automatically
    pub ratios: Option<Vec<f64>>,
}

/// Ratios of consecutive leading eigenvalues.
///
/// `eigenvalues` must be ascending. The curve has `min(n,p) − 1` entries when
/// `min(n,p) < 4` and `min(n,p)/2` otherwise. When that length is zero the
/// curve degenerates to the single largest eigenvalue `eigenvalues[p − 1]`.
/// The drivers reach this case only with `p = 1`, where largest and smallest
/// coincide; a direct call with `n = 1` and `p > 1` still gets the largest.
pub fn eigenvalue_ratios(eigenvalues: &[f64], n: usize, p: usize) -> Vec<f64> {
    let temp = n.min(p);
    let len = if temp < 4 { temp.saturating_sub(1) } else { temp / 2 };
    if len == 0 {
        warn!(
            "eigenvalue ratio curve is empty for n = {}, p = {}; using the largest eigenvalue",
            n, p
        );
        return eigenvalues.last().copied().into_iter().collect();
    }
    (0..len)
        .map(|i| eigenvalues[p - 1 - i] / eigenvalues[p - 2 - i])
        .collect()
}

/// Number of factors at the peak of the ratio curve (one-based).
pub fn select_factor_count(ratios: &[f64]) -> usize {
    match argmax(ratios) {
        Some(i) => i + 1,
        None => {
            warn!("eigenvalue ratio curve has no finite maximum; selecting one factor");
            1
        }
    }
}

/// Leading `k` loadings: column `i` is `sqrt(max(λ, 0)) · v` for the
/// `(i+1)`-th largest eigenpair.
pub fn loading_matrix(decomposition: &SpectralDecomposition, k: usize) -> DMatrix<f64> {
    let p = decomposition.dim();
    let mut loadings = DMatrix::zeros(p, k);
    for i in 0..k {
        let idx = p - 1 - i;
        let scale = decomposition.eigenvalues[idx].max(0.0).sqrt();
        loadings.set_column(i, &(decomposition.eigenvectors.column(idx) * scale));
    }
    loadings
}

/// Fit the factor model to a robust covariance of an `n`-sample dataset.
///
/// `requested` fixes K; `None` selects it from the eigenvalue-ratio curve.
pub fn fit_factor_model(
    covariance: &DMatrix<f64>,
    n: usize,
    requested: Option<usize>,
) -> FarmResult<FactorModel> {
    let p = covariance.nrows();
    if let Some(k) = requested {
        validate_factor_count(k, p)?;
    }

    let decomposition = SpectralDecomposition::new(covariance);
    let (n_factors, ratios) = match requested {
        Some(k) => (k, None),
        None => {
            let ratios = eigenvalue_ratios(decomposition.eigenvalues.as_slice(), n, p);
            let k = select_factor_count(&ratios);
            debug!("selected {} factors from ratio curve {:?}", k, ratios);
            (k, Some(ratios))
        }
    };

    Ok(FactorModel {
        loadings: loading_matrix(&decomposition, n_factors),
        n_factors,
        eigenvalues: decomposition.eigenvalues,
        ratios,
    })
}

/// Reject a requested factor count outside `1..=p`.
pub fn validate_factor_count(k: usize, p: usize) -> FarmResult<()> {
    if k == 0 || k > p {
        return Err(FarmTestError::InvalidParameter {
            parameter: "K".to_string(),
            value: k as f64,
            constraint: format!("between 1 and the number of columns ({})", p),
        });
    }
    Ok(())
}

/// Latent factor realisation behind a vector of sample means.
///
/// Regresses the `p` column means on the `p × K` loadings, treating each
/// coordinate as one observation, and returns the K slopes.
pub fn estimate_factors(
    loadings: &DMatrix<f64>,
    column_means: &[f64],
    config: &EstimationConfig,
) -> DVector<f64> {
    huber_regression_unchecked(loadings, column_means, config).slopes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn spiked_covariance() -> DMatrix<f64> {
        // two strong directions on top of unit noise
        let p = 8;
        let mut u = DMatrix::zeros(p, 2);
        for i in 0..p {
            u[(i, 0)] = 1.0;
            u[(i, 1)] = if i % 2 == 0 { 1.0 } else { -1.0 };
        }
        let spikes = DMatrix::from_diagonal(&DVector::from_vec(vec![5.0, 2.0]));
        &u * spikes * u.transpose() + DMatrix::identity(p, p)
    }

    #[test]
    fn test_spectrum_is_ascending_and_consistent() {
        let cov = spiked_covariance();
        let decomposition = SpectralDecomposition::new(&cov);
        let eig = decomposition.eigenvalues.as_slice();
        assert!(eig.windows(2).all(|w| w[0] <= w[1]));
        // u columns have squared norm 8: spikes 40 + 1 and 16 + 1
        assert_approx_eq!(eig[7], 41.0, 1e-9);
        assert_approx_eq!(eig[6], 17.0, 1e-9);

        for i in 0..8 {
            let v = decomposition.eigenvectors.column(i);
            let residual = &cov * v - v * eig[i];
            assert!(residual.norm() < 1e-9);
        }
    }

    #[test]
    fn test_ratio_curve_lengths() {
        let eig = [1.0, 1.0, 2.0, 4.0, 16.0];
        // min(n,p) = 5 -> 5/2 = 2 ratios
        assert_eq!(eigenvalue_ratios(&eig, 100, 5), vec![4.0, 2.0]);
        // min(n,p) = 3 -> 2 ratios
        assert_eq!(eigenvalue_ratios(&eig, 3, 5), vec![4.0, 2.0]);
        // min(n,p) = 2 -> 1 ratio
        assert_eq!(eigenvalue_ratios(&eig, 2, 5), vec![4.0]);
    }

    #[test]
    fn test_degenerate_ratio_curve() {
        let ratios = eigenvalue_ratios(&[3.5], 10, 1);
        assert_eq!(ratios, vec![3.5]);
        assert_eq!(select_factor_count(&ratios), 1);
    }

    #[test]
    fn test_selects_spike_count() {
        let model = fit_factor_model(&spiked_covariance(), 200, None).unwrap();
        // ratios 41/17, 17/1, 1, 1: the gap sits after the second factor
        assert_eq!(model.n_factors, 2);
        assert_eq!(model.loadings.shape(), (8, 2));
        assert_eq!(model.ratios.as_ref().map(|r| r.len()), Some(4));
        // ‖loading column‖² equals its eigenvalue
        assert_approx_eq!(model.loadings.column(0).norm_squared(), 41.0, 1e-9);
    }

    #[test]
    fn test_explicit_count_matches_automatic_selection() {
        let cov = spiked_covariance();
        let automatic = fit_factor_model(&cov, 200, None).unwrap();
        let explicit = fit_factor_model(&cov, 200, Some(automatic.n_factors)).unwrap();
        assert_eq!(explicit.loadings, automatic.loadings);
        assert_eq!(explicit.eigenvalues, automatic.eigenvalues);
        assert!(explicit.ratios.is_none());
    }

    #[test]
    fn test_negative_eigenvalues_are_clipped() {
        let cov = DMatrix::from_diagonal(&DVector::from_vec(vec![-0.25, 2.0]));
        let decomposition = SpectralDecomposition::new(&cov);
        let loadings = loading_matrix(&decomposition, 2);
        assert_eq!(loadings.column(1).norm(), 0.0);
        assert_approx_eq!(loadings.column(0).norm(), 2f64.sqrt(), 1e-12);
    }

    #[test]
    fn test_rejects_out_of_range_count() {
        let cov = DMatrix::identity(3, 3);
        assert!(matches!(
            fit_factor_model(&cov, 10, Some(4)),
            Err(FarmTestError::InvalidParameter { .. })
        ));
        assert!(fit_factor_model(&cov, 10, Some(0)).is_err());
    }

    #[test]
    fn test_estimate_factors_recovers_shift() {
        // means = B f with f = [0.5]; regression of means on B returns f
        let loadings = DMatrix::from_column_slice(6, 1, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let means: Vec<f64> = loadings.iter().map(|b| 0.5 * b).collect();
        let f = estimate_factors(&loadings, &means, &EstimationConfig::default());
        assert!((f[0] - 0.5).abs() < 0.05, "factor estimate {}", f[0]);
    }
}
