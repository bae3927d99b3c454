//! # Estimation and Testing Configuration
//!
//! Every tunable of the engine lives in one of two records passed explicitly
//! into each entry point: [`EstimationConfig`] for the iterative estimators and
//! [`TestConfig`] for the testing layer. There are no module-level defaults.

use crate::errors::{validate_open_unit_interval, validate_parameter, FarmResult, FarmTestError};
use crate::math_utils::constants;
use crate::multiple_testing::Alternative;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Tolerances and iteration caps for the iterative estimators.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EstimationConfig {
    /// Convergence tolerance of the Huber fixed point (location and τ)
    pub mean_tolerance: f64,
    /// Iteration cap of the Huber fixed point
    pub mean_max_iterations: usize,
    /// Absolute bracket width at which bisection stops
    pub root_tolerance: f64,
    /// Iteration cap of the bisection root finder
    pub root_max_iterations: usize,
    /// Convergence tolerance of the robust regression descent
    pub regression_tolerance: f64,
    /// Iteration cap of the robust regression descent
    pub regression_max_iterations: usize,
    /// Multiplier applied to the MAD scale to obtain the regression τ
    pub huber_constant: f64,
}

impl Default for EstimationConfig {
    fn default() -> Self {
        Self {
            mean_tolerance: 1e-4,
            mean_max_iterations: 500,
            root_tolerance: 1e-4,
            root_max_iterations: 500,
            regression_tolerance: 1e-5,
            regression_max_iterations: 500,
            huber_constant: constants::HUBER_EFFICIENCY_CONSTANT,
        }
    }
}

impl EstimationConfig {
    /// Check that tolerances and the Huber constant are finite and strictly positive.
    pub fn validate(&self) -> FarmResult<()> {
        validate_parameter(self.mean_tolerance, f64::MIN_POSITIVE, f64::MAX, "mean_tolerance")?;
        validate_parameter(self.root_tolerance, f64::MIN_POSITIVE, f64::MAX, "root_tolerance")?;
        validate_parameter(
            self.regression_tolerance,
            f64::MIN_POSITIVE,
            f64::MAX,
            "regression_tolerance",
        )?;
        validate_parameter(self.huber_constant, f64::MIN_POSITIVE, f64::MAX, "huber_constant")
    }
}

/// Configuration for the testing drivers.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TestConfig {
    /// Settings forwarded to every estimator the driver calls
    pub estimation: EstimationConfig,
    /// FDR level, strictly inside (0, 1)
    pub alpha: f64,
    /// Alternative hypothesis
    pub alternative: Alternative,
    /// Number of multiplier-bootstrap replicates (`B`)
    pub num_bootstrap_samples: usize,
    /// Random seed for reproducible bootstrap masks (None = OS entropy)
    pub seed: Option<u64>,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            estimation: EstimationConfig::default(),
            alpha: 0.05,
            alternative: Alternative::TwoSided,
            num_bootstrap_samples: 500,
            seed: None,
        }
    }
}

impl TestConfig {
    /// Set the FDR level.
    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    /// Set the alternative hypothesis.
    pub fn with_alternative(mut self, alternative: Alternative) -> Self {
        self.alternative = alternative;
        self
    }

    /// Set the number of bootstrap replicates.
    pub fn with_bootstrap_samples(mut self, num_bootstrap_samples: usize) -> Self {
        self.num_bootstrap_samples = num_bootstrap_samples;
        self
    }

    /// Fix the bootstrap seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Replace the estimator settings.
    pub fn with_estimation(mut self, estimation: EstimationConfig) -> Self {
        self.estimation = estimation;
        self
    }

    /// Validate every field; drivers call this before touching data.
    pub fn validate(&self) -> FarmResult<()> {
        validate_open_unit_interval(self.alpha, "alpha")?;
        self.estimation.validate()
    }

    /// Additional checks for the bootstrap drivers.
    pub fn validate_bootstrap(&self) -> FarmResult<()> {
        self.validate()?;
        if self.num_bootstrap_samples == 0 {
            return Err(FarmTestError::BootstrapError {
                reason: "num_bootstrap_samples must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}
