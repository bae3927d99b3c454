//! # Factor-Adjusted Robust Multiple Testing
//!
//! Large-scale mean testing for heavy-tailed, cross-sectionally dependent data.
//!
//! Given an `n × p` sample (one observation per row) this crate tests the `p`
//! hypotheses `H0: μ_j = h0_j` simultaneously while controlling the false
//! discovery rate. Means and covariances are estimated with tuning-free Huber
//! estimators, so a handful of extreme observations cannot dominate the
//! statistics, and common latent factors are removed before testing so that
//! strong dependence between coordinates does not inflate false discoveries.
//!
//! ## Key Features
//!
//! - **Huber estimation**: adaptive Huber mean, variance and pairwise-difference
//!   covariance, with the robustification threshold re-calibrated every step
//! - **Robust regression**: Huber regression by Barzilai–Borwein gradient descent
//! - **Factor adjustment**: latent factors from the eigen-structure of the robust
//!   covariance (eigenvalue-ratio selection) or observed factors via regression
//! - **Inference**: normal-limit or multiplier-bootstrap p-values with adaptive
//!   Benjamini–Hochberg rejection
//!
//! ## Quick Start
//!
//! ```rust
//! use farm_test::{farm_test, TestConfig};
//! use nalgebra::{DMatrix, DVector};
//! use rand::SeedableRng;
//! use rand_chacha::ChaCha20Rng;
//! use rand_distr::{Distribution, Normal};
//!
//! let mut rng = ChaCha20Rng::seed_from_u64(1);
//! let normal = Normal::new(0.0, 1.0).unwrap();
//! let (n, p) = (80, 10);
//! let factor: Vec<f64> = (0..n).map(|_| normal.sample(&mut rng)).collect();
//! let x = DMatrix::from_fn(n, p, |i, j| {
//!     let mu = if j < 2 { 2.0 } else { 0.0 };
//!     mu + factor[i] + normal.sample(&mut rng)
//! });
//!
//! let result = farm_test(&x, &DVector::zeros(p), None, &TestConfig::default()).unwrap();
//! println!("{} factors, rejected: {:?}", result.n_factors, result.significant);
//! ```
//!
//! ## Architecture
//!
//! The drivers in [`farm`] compose the estimators bottom-up:
//! [`root_finding`] calibrates τ for [`huber`], which feeds [`covariance`] and
//! [`regression`]; [`factor_model`] extracts loadings; [`multiple_testing`]
//! turns statistics into decisions. Every tunable lives in [`config`].

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![warn(clippy::all)]

// Core modules
pub mod config;
pub mod errors;
pub mod math_utils;
pub mod results;
pub mod secure_rng;

// Estimators
pub mod covariance;
pub mod factor_model;
pub mod huber;
pub mod regression;
pub mod root_finding;

// Testing
pub mod bootstrap_sampling;
pub mod farm;
pub mod multiple_testing;

pub use config::{EstimationConfig, TestConfig};
pub use covariance::{huber_cov, RobustCovariance};
pub use errors::{FarmResult, FarmTestError};
pub use factor_model::{
    eigenvalue_ratios, fit_factor_model, select_factor_count, FactorModel, SpectralDecomposition,
};
pub use farm::{
    farm_test, farm_test_bootstrap, farm_test_known_factors, farm_test_known_factors_bootstrap,
    farm_test_two, farm_test_two_known_factors, farm_test_two_known_factors_bootstrap,
    robust_mean_test, robust_mean_test_bootstrap, robust_mean_test_two,
    robust_mean_test_two_bootstrap, run_test, TestRequest,
};
pub use huber::{huber_mean, huber_mean_columns, HuberEstimate};
pub use multiple_testing::{adaptive_bh, Alternative};
pub use regression::{huber_regression, RegressionFit};
pub use results::{
    BootstrapTestResult, FactorBootstrapResult, FactorTestResult, KnownFactorTestResult,
    MeanTestResult, TestOutcome, TwoSampleBootstrapResult, TwoSampleFactorBootstrapResult,
    TwoSampleFactorTestResult, TwoSampleKnownFactorTestResult, TwoSampleTestResult,
};
pub use secure_rng::SecureRng;
