//! # Test Result Structures
//!
//! One strongly typed bundle per driver shape. Bundles are created fresh by
//! every call and share nothing with other calls. [`TestOutcome`] collects
//! them into a single sum type for callers that dispatch through
//! [`crate::farm::run_test`].

use nalgebra::{DMatrix, DVector};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// One-sample robust mean test with analytic p-values.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MeanTestResult {
    /// Huber means per coordinate
    pub means: DVector<f64>,
    /// Standard errors `sqrt(σ²/n)`
    pub std_dev: DVector<f64>,
    /// Test statistics `(μ − h0)/stdDev`
    pub t_stat: DVector<f64>,
    /// P-values under the chosen alternative
    pub p_values: DVector<f64>,
    /// Adaptive BH rejections
    pub significant: Vec<bool>,
}

/// One-sample robust mean test with bootstrap p-values.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BootstrapTestResult {
    /// Huber means per coordinate
    pub means: DVector<f64>,
    /// Bootstrap p-values
    pub p_values: DVector<f64>,
    /// Adaptive BH rejections
    pub significant: Vec<bool>,
}

/// Two-sample robust mean test with analytic p-values.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TwoSampleTestResult {
    /// Huber means of X
    pub means_x: DVector<f64>,
    /// Huber means of Y
    pub means_y: DVector<f64>,
    /// Standard errors of the X means
    pub std_dev_x: DVector<f64>,
    /// Standard errors of the Y means
    pub std_dev_y: DVector<f64>,
    /// `(μX − μY − h0)/sqrt(σ²X/nX + σ²Y/nY)`
    pub t_stat: DVector<f64>,
    /// P-values under the chosen alternative
    pub p_values: DVector<f64>,
    /// Adaptive BH rejections
    pub significant: Vec<bool>,
}

/// Two-sample robust mean test with bootstrap p-values.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TwoSampleBootstrapResult {
    /// Huber means of X
    pub means_x: DVector<f64>,
    /// Huber means of Y
    pub means_y: DVector<f64>,
    /// Bootstrap p-values of the difference
    pub p_values: DVector<f64>,
    /// Adaptive BH rejections
    pub significant: Vec<bool>,
}

/// Factor-adjusted test with factors estimated from the data.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FactorTestResult {
    /// Factor-adjusted means
    pub means: DVector<f64>,
    /// Standard errors after removing the factor variance
    pub std_dev: DVector<f64>,
    /// `p × K` loadings
    pub loadings: DMatrix<f64>,
    /// Number of factors K
    pub n_factors: usize,
    /// Test statistics
    pub t_stat: DVector<f64>,
    /// P-values under the chosen alternative
    pub p_values: DVector<f64>,
    /// Adaptive BH rejections
    pub significant: Vec<bool>,
    /// Eigenvalues of the robust covariance, ascending
    pub eigenvalues: DVector<f64>,
    /// Eigenvalue-ratio curve; `None` when K was supplied
    pub ratios: Option<Vec<f64>>,
}

/// Factor-adjusted test with observed factors.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct KnownFactorTestResult {
    /// Regression intercepts
    pub means: DVector<f64>,
    /// Standard errors after removing the factor variance
    pub std_dev: DVector<f64>,
    /// `p × K` regression slopes
    pub loadings: DMatrix<f64>,
    /// Number of observed factors
    pub n_factors: usize,
    /// Test statistics
    pub t_stat: DVector<f64>,
    /// P-values under the chosen alternative
    pub p_values: DVector<f64>,
    /// Adaptive BH rejections
    pub significant: Vec<bool>,
}

/// Factor-adjusted one-sample test with bootstrap p-values.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FactorBootstrapResult {
    /// Factor-adjusted means
    pub means: DVector<f64>,
    /// Number of factors K
    pub n_factors: usize,
    /// Bootstrap p-values
    pub p_values: DVector<f64>,
    /// Adaptive BH rejections
    pub significant: Vec<bool>,
}

/// Two-sample factor-adjusted test with factors estimated per sample.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TwoSampleFactorTestResult {
    /// Factor-adjusted means of X
    pub means_x: DVector<f64>,
    /// Factor-adjusted means of Y
    pub means_y: DVector<f64>,
    /// Standard errors of the X means
    pub std_dev_x: DVector<f64>,
    /// Standard errors of the Y means
    pub std_dev_y: DVector<f64>,
    /// Loadings of X
    pub loadings_x: DMatrix<f64>,
    /// Loadings of Y
    pub loadings_y: DMatrix<f64>,
    /// Number of factors of X
    pub n_factors_x: usize,
    /// Number of factors of Y
    pub n_factors_y: usize,
    /// Test statistics
    pub t_stat: DVector<f64>,
    /// P-values under the chosen alternative
    pub p_values: DVector<f64>,
    /// Adaptive BH rejections
    pub significant: Vec<bool>,
    /// Eigenvalues of the X covariance, ascending
    pub eigenvalues_x: DVector<f64>,
    /// Eigenvalues of the Y covariance, ascending
    pub eigenvalues_y: DVector<f64>,
    /// Ratio curve of X; `None` when KX was supplied
    pub ratios_x: Option<Vec<f64>>,
    /// Ratio curve of Y; `None` when KY was supplied
    pub ratios_y: Option<Vec<f64>>,
}

/// Two-sample factor-adjusted test with observed factors.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TwoSampleKnownFactorTestResult {
    /// Regression intercepts of X
    pub means_x: DVector<f64>,
    /// Regression intercepts of Y
    pub means_y: DVector<f64>,
    /// Standard errors of the X means
    pub std_dev_x: DVector<f64>,
    /// Standard errors of the Y means
    pub std_dev_y: DVector<f64>,
    /// Slopes of X on its factors
    pub loadings_x: DMatrix<f64>,
    /// Slopes of Y on its factors
    pub loadings_y: DMatrix<f64>,
    /// Number of X factors
    pub n_factors_x: usize,
    /// Number of Y factors
    pub n_factors_y: usize,
    /// Test statistics
    pub t_stat: DVector<f64>,
    /// P-values under the chosen alternative
    pub p_values: DVector<f64>,
    /// Adaptive BH rejections
    pub significant: Vec<bool>,
}

/// Two-sample factor-adjusted test with bootstrap p-values.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TwoSampleFactorBootstrapResult {
    /// Regression intercepts of X
    pub means_x: DVector<f64>,
    /// Regression intercepts of Y
    pub means_y: DVector<f64>,
    /// Number of X factors
    pub n_factors_x: usize,
    /// Number of Y factors
    pub n_factors_y: usize,
    /// Bootstrap p-values of the difference
    pub p_values: DVector<f64>,
    /// Adaptive BH rejections
    pub significant: Vec<bool>,
}

/// Result of any testing procedure.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TestOutcome {
    /// [`crate::farm::robust_mean_test`]
    Mean(MeanTestResult),
    /// [`crate::farm::robust_mean_test_bootstrap`]
    MeanBootstrap(BootstrapTestResult),
    /// [`crate::farm::robust_mean_test_two`]
    TwoSampleMean(TwoSampleTestResult),
    /// [`crate::farm::robust_mean_test_two_bootstrap`]
    TwoSampleMeanBootstrap(TwoSampleBootstrapResult),
    /// [`crate::farm::farm_test`]
    Factor(FactorTestResult),
    /// [`crate::farm::farm_test_bootstrap`] and [`crate::farm::farm_test_known_factors_bootstrap`]
    FactorBootstrap(FactorBootstrapResult),
    /// [`crate::farm::farm_test_known_factors`]
    KnownFactor(KnownFactorTestResult),
    /// [`crate::farm::farm_test_two`]
    TwoSampleFactor(TwoSampleFactorTestResult),
    /// [`crate::farm::farm_test_two_known_factors`]
    TwoSampleKnownFactor(TwoSampleKnownFactorTestResult),
    /// [`crate::farm::farm_test_two_known_factors_bootstrap`]
    TwoSampleFactorBootstrap(TwoSampleFactorBootstrapResult),
}

impl TestOutcome {
    /// P-values of whichever procedure ran.
    pub fn p_values(&self) -> &DVector<f64> {
        match self {
            TestOutcome::Mean(r) => &r.p_values,
            TestOutcome::MeanBootstrap(r) => &r.p_values,
            TestOutcome::TwoSampleMean(r) => &r.p_values,
            TestOutcome::TwoSampleMeanBootstrap(r) => &r.p_values,
            TestOutcome::Factor(r) => &r.p_values,
            TestOutcome::FactorBootstrap(r) => &r.p_values,
            TestOutcome::KnownFactor(r) => &r.p_values,
            TestOutcome::TwoSampleFactor(r) => &r.p_values,
            TestOutcome::TwoSampleKnownFactor(r) => &r.p_values,
            TestOutcome::TwoSampleFactorBootstrap(r) => &r.p_values,
        }
    }

    /// Rejection indicators of whichever procedure ran.
    pub fn significant(&self) -> &[bool] {
        match self {
            TestOutcome::Mean(r) => &r.significant,
            TestOutcome::MeanBootstrap(r) => &r.significant,
            TestOutcome::TwoSampleMean(r) => &r.significant,
            TestOutcome::TwoSampleMeanBootstrap(r) => &r.significant,
            TestOutcome::Factor(r) => &r.significant,
            TestOutcome::FactorBootstrap(r) => &r.significant,
            TestOutcome::KnownFactor(r) => &r.significant,
            TestOutcome::TwoSampleFactor(r) => &r.significant,
            TestOutcome::TwoSampleKnownFactor(r) => &r.significant,
            TestOutcome::TwoSampleFactorBootstrap(r) => &r.significant,
        }
    }

    /// Number of rejected hypotheses.
    pub fn num_rejections(&self) -> usize {
        self.significant().iter().filter(|&&s| s).count()
    }

    /// Number of factors of a one-sample factor-adjusted procedure.
    ///
    /// Two-sample outcomes carry one count per sample; see
    /// [`TestOutcome::n_factors_two_sample`].
    pub fn n_factors(&self) -> Option<usize> {
        match self {
            TestOutcome::Factor(r) => Some(r.n_factors),
            TestOutcome::FactorBootstrap(r) => Some(r.n_factors),
            TestOutcome::KnownFactor(r) => Some(r.n_factors),
            _ => None,
        }
    }

    /// `(KX, KY)` of a two-sample factor-adjusted procedure.
    pub fn n_factors_two_sample(&self) -> Option<(usize, usize)> {
        match self {
            TestOutcome::TwoSampleFactor(r) => Some((r.n_factors_x, r.n_factors_y)),
            TestOutcome::TwoSampleKnownFactor(r) => Some((r.n_factors_x, r.n_factors_y)),
            TestOutcome::TwoSampleFactorBootstrap(r) => Some((r.n_factors_x, r.n_factors_y)),
            _ => None,
        }
    }
}
