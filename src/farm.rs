//! # Robust Multiple Testing Drivers
//!
//! Each driver validates its inputs, runs the robust estimators and turns the
//! resulting statistics into p-values and adaptive BH decisions:
//!
//! - factor-naive tests on Huber means ([`robust_mean_test`] and variants);
//! - factor-adjusted tests with factors estimated from the robust covariance
//!   ([`farm_test`], [`farm_test_bootstrap`], [`farm_test_two`]);
//! - factor-adjusted tests with observed factors, where a robust regression of
//!   every coordinate on the factors yields the mean as its intercept
//!   ([`farm_test_known_factors`] and variants).
//!
//! Drivers are pure functions of their inputs. [`run_test`] dispatches a
//! [`TestRequest`] to the matching driver.

use crate::bootstrap_sampling::{bootstrap_replicates, multiplier_mask, select_rows};
use crate::config::{EstimationConfig, TestConfig};
use crate::covariance::{huber_cov, huber_cov_unchecked};
use crate::errors::{
    validate_all_finite, validate_matrix, validate_same_extent, FarmResult,
};
use crate::factor_model::{
    estimate_factors, fit_factor_model, loading_matrix, validate_factor_count, FactorModel,
    SpectralDecomposition,
};
use crate::huber::{huber_mean_columns, huber_moments_columns, huber_variance};
use crate::math_utils::{clamped_subtract, column_means, column_slice, sample_covariance};
use crate::multiple_testing::{adaptive_bh, bootstrap_p_values, normal_p_values};
use crate::regression::huber_regression_unchecked;
use crate::results::{
    BootstrapTestResult, FactorBootstrapResult, FactorTestResult, KnownFactorTestResult,
    MeanTestResult, TestOutcome, TwoSampleBootstrapResult, TwoSampleFactorBootstrapResult,
    TwoSampleFactorTestResult, TwoSampleKnownFactorTestResult, TwoSampleTestResult,
};
use log::trace;
use nalgebra::{DMatrix, DVector};

/// A testing procedure together with its inputs.
///
/// Matrices hold one sample per row. `k`, `kx` and `ky` fix the number of
/// latent factors; `None` selects it from the eigenvalue-ratio curve.
#[derive(Debug, Clone, Copy)]
pub enum TestRequest<'a> {
    /// One-sample robust mean test
    Mean {
        /// Sample
        x: &'a DMatrix<f64>,
        /// Null means
        h0: &'a DVector<f64>,
    },
    /// One-sample robust mean test, bootstrap p-values
    MeanBootstrap {
        /// Sample
        x: &'a DMatrix<f64>,
        /// Null means
        h0: &'a DVector<f64>,
    },
    /// Two-sample robust mean test
    TwoSampleMean {
        /// First sample
        x: &'a DMatrix<f64>,
        /// Second sample
        y: &'a DMatrix<f64>,
        /// Null differences `μX − μY`
        h0: &'a DVector<f64>,
    },
    /// Two-sample robust mean test, bootstrap p-values
    TwoSampleMeanBootstrap {
        /// First sample
        x: &'a DMatrix<f64>,
        /// Second sample
        y: &'a DMatrix<f64>,
        /// Null differences `μX − μY`
        h0: &'a DVector<f64>,
    },
    /// Factor-adjusted test, latent factors
    Factor {
        /// Sample
        x: &'a DMatrix<f64>,
        /// Null means
        h0: &'a DVector<f64>,
        /// Number of factors
        k: Option<usize>,
    },
    /// Factor-adjusted test, latent factors, bootstrap p-values
    FactorBootstrap {
        /// Sample
        x: &'a DMatrix<f64>,
        /// Null means
        h0: &'a DVector<f64>,
        /// Number of factors
        k: Option<usize>,
    },
    /// Factor-adjusted test, observed factors
    KnownFactor {
        /// Sample
        x: &'a DMatrix<f64>,
        /// Observed factors, one row per sample
        factors: &'a DMatrix<f64>,
        /// Null means
        h0: &'a DVector<f64>,
    },
    /// Factor-adjusted test, observed factors, bootstrap p-values
    KnownFactorBootstrap {
        /// Sample
        x: &'a DMatrix<f64>,
        /// Observed factors, one row per sample
        factors: &'a DMatrix<f64>,
        /// Null means
        h0: &'a DVector<f64>,
    },
    /// Two-sample factor-adjusted test, latent factors
    TwoSampleFactor {
        /// First sample
        x: &'a DMatrix<f64>,
        /// Second sample
        y: &'a DMatrix<f64>,
        /// Null differences `μX − μY`
        h0: &'a DVector<f64>,
        /// Number of factors of X
        kx: Option<usize>,
        /// Number of factors of Y
        ky: Option<usize>,
    },
    /// Two-sample factor-adjusted test, observed factors
    TwoSampleKnownFactor {
        /// First sample
        x: &'a DMatrix<f64>,
        /// Factors of X
        factors_x: &'a DMatrix<f64>,
        /// Second sample
        y: &'a DMatrix<f64>,
        /// Factors of Y
        factors_y: &'a DMatrix<f64>,
        /// Null differences `μX − μY`
        h0: &'a DVector<f64>,
    },
    /// Two-sample factor-adjusted test, observed factors, bootstrap p-values
    TwoSampleKnownFactorBootstrap {
        /// First sample
        x: &'a DMatrix<f64>,
        /// Factors of X
        factors_x: &'a DMatrix<f64>,
        /// Second sample
        y: &'a DMatrix<f64>,
        /// Factors of Y
        factors_y: &'a DMatrix<f64>,
        /// Null differences `μX − μY`
        h0: &'a DVector<f64>,
    },
}

/// Run the procedure named by `request`.
pub fn run_test(request: TestRequest<'_>, config: &TestConfig) -> FarmResult<TestOutcome> {
    match request {
        TestRequest::Mean { x, h0 } => robust_mean_test(x, h0, config).map(TestOutcome::Mean),
        TestRequest::MeanBootstrap { x, h0 } => {
            robust_mean_test_bootstrap(x, h0, config).map(TestOutcome::MeanBootstrap)
        }
        TestRequest::TwoSampleMean { x, y, h0 } => {
            robust_mean_test_two(x, y, h0, config).map(TestOutcome::TwoSampleMean)
        }
        TestRequest::TwoSampleMeanBootstrap { x, y, h0 } => {
            robust_mean_test_two_bootstrap(x, y, h0, config).map(TestOutcome::TwoSampleMeanBootstrap)
        }
        TestRequest::Factor { x, h0, k } => farm_test(x, h0, k, config).map(TestOutcome::Factor),
        TestRequest::FactorBootstrap { x, h0, k } => {
            farm_test_bootstrap(x, h0, k, config).map(TestOutcome::FactorBootstrap)
        }
        TestRequest::KnownFactor { x, factors, h0 } => {
            farm_test_known_factors(x, factors, h0, config).map(TestOutcome::KnownFactor)
        }
        TestRequest::KnownFactorBootstrap { x, factors, h0 } => {
            farm_test_known_factors_bootstrap(x, factors, h0, config).map(TestOutcome::FactorBootstrap)
        }
        TestRequest::TwoSampleFactor { x, y, h0, kx, ky } => {
            farm_test_two(x, y, h0, kx, ky, config).map(TestOutcome::TwoSampleFactor)
        }
        TestRequest::TwoSampleKnownFactor {
            x,
            factors_x,
            y,
            factors_y,
            h0,
        } => farm_test_two_known_factors(x, factors_x, y, factors_y, h0, config)
            .map(TestOutcome::TwoSampleKnownFactor),
        TestRequest::TwoSampleKnownFactorBootstrap {
            x,
            factors_x,
            y,
            factors_y,
            h0,
        } => farm_test_two_known_factors_bootstrap(x, factors_x, y, factors_y, h0, config)
            .map(TestOutcome::TwoSampleFactorBootstrap),
    }
}

/// One-sample test of `H0: μ_j = h0_j` on Huber means.
///
/// # Example
/// ```rust
/// use farm_test::{robust_mean_test, TestConfig};
/// use nalgebra::{DMatrix, DVector};
///
/// let x = DMatrix::from_fn(40, 3, |i, j| {
///     let shift = if j == 0 { 2.0 } else { 0.0 };
///     (i % 7) as f64 - 3.0 + shift
/// });
/// let result = robust_mean_test(&x, &DVector::zeros(3), &TestConfig::default()).unwrap();
/// assert!(result.significant[0]);
/// ```
pub fn robust_mean_test(
    x: &DMatrix<f64>,
    h0: &DVector<f64>,
    config: &TestConfig,
) -> FarmResult<MeanTestResult> {
    validate_one_sample(x, h0, config)?;
    let n = x.nrows();

    let (means, variances) = huber_moments_columns(x, &config.estimation);
    let std_dev = standard_errors(&variances, n);
    let t_stat = one_sample_statistic(&means, h0, &std_dev, config.estimation.mean_tolerance);
    let (p_values, significant) = analytic_decisions(&t_stat, config)?;

    trace!(
        "robust_mean_test: n = {}, p = {}, {} rejections",
        n,
        x.ncols(),
        count_rejections(&significant)
    );
    Ok(MeanTestResult {
        means,
        std_dev,
        t_stat,
        p_values,
        significant,
    })
}

/// One-sample robust mean test with multiplier-bootstrap p-values.
pub fn robust_mean_test_bootstrap(
    x: &DMatrix<f64>,
    h0: &DVector<f64>,
    config: &TestConfig,
) -> FarmResult<BootstrapTestResult> {
    validate_one_sample(x, h0, config)?;
    config.validate_bootstrap()?;
    let (n, p) = x.shape();
    let estimation = &config.estimation;

    let means = huber_mean_columns(x, estimation);
    let replicates = bootstrap_replicates(p, config.num_bootstrap_samples, config.seed, |rng| {
        let mask = multiplier_mask(n, rng);
        huber_mean_columns(&select_rows(x, &mask), estimation)
    });
    let p_values = bootstrap_p_values(&means, &replicates, h0, config.alternative);
    let significant = adaptive_bh(p_values.as_slice(), config.alpha);

    trace!(
        "robust_mean_test_bootstrap: n = {}, p = {}, B = {}, {} rejections",
        n,
        p,
        config.num_bootstrap_samples,
        count_rejections(&significant)
    );
    Ok(BootstrapTestResult {
        means,
        p_values,
        significant,
    })
}

/// Two-sample test of `H0: μX_j − μY_j = h0_j` on Huber means.
pub fn robust_mean_test_two(
    x: &DMatrix<f64>,
    y: &DMatrix<f64>,
    h0: &DVector<f64>,
    config: &TestConfig,
) -> FarmResult<TwoSampleTestResult> {
    validate_two_sample(x, y, h0, config)?;
    let (nx, ny) = (x.nrows(), y.nrows());

    let (means_x, variances_x) = huber_moments_columns(x, &config.estimation);
    let (means_y, variances_y) = huber_moments_columns(y, &config.estimation);
    let t_stat = two_sample_statistic(
        &means_x,
        &means_y,
        &variances_x,
        &variances_y,
        h0,
        (nx, ny),
        config.estimation.mean_tolerance,
    );
    let (p_values, significant) = analytic_decisions(&t_stat, config)?;

    trace!(
        "robust_mean_test_two: nX = {}, nY = {}, p = {}, {} rejections",
        nx,
        ny,
        x.ncols(),
        count_rejections(&significant)
    );
    Ok(TwoSampleTestResult {
        means_x,
        means_y,
        std_dev_x: standard_errors(&variances_x, nx),
        std_dev_y: standard_errors(&variances_y, ny),
        t_stat,
        p_values,
        significant,
    })
}

/// Two-sample robust mean test with multiplier-bootstrap p-values.
///
/// Each replicate draws independent masks for X and Y and records the
/// difference of the Huber means.
pub fn robust_mean_test_two_bootstrap(
    x: &DMatrix<f64>,
    y: &DMatrix<f64>,
    h0: &DVector<f64>,
    config: &TestConfig,
) -> FarmResult<TwoSampleBootstrapResult> {
    validate_two_sample(x, y, h0, config)?;
    config.validate_bootstrap()?;
    let (nx, ny, p) = (x.nrows(), y.nrows(), x.ncols());
    let estimation = &config.estimation;

    let means_x = huber_mean_columns(x, estimation);
    let means_y = huber_mean_columns(y, estimation);
    let replicates = bootstrap_replicates(p, config.num_bootstrap_samples, config.seed, |rng| {
        let mask_x = multiplier_mask(nx, rng);
        let boot_x = huber_mean_columns(&select_rows(x, &mask_x), estimation);
        let mask_y = multiplier_mask(ny, rng);
        let boot_y = huber_mean_columns(&select_rows(y, &mask_y), estimation);
        boot_x - boot_y
    });
    let p_values = bootstrap_p_values(&(&means_x - &means_y), &replicates, h0, config.alternative);
    let significant = adaptive_bh(p_values.as_slice(), config.alpha);

    trace!(
        "robust_mean_test_two_bootstrap: nX = {}, nY = {}, p = {}, {} rejections",
        nx,
        ny,
        p,
        count_rejections(&significant)
    );
    Ok(TwoSampleBootstrapResult {
        means_x,
        means_y,
        p_values,
        significant,
    })
}

/// Factor-adjusted test with latent factors estimated from the data.
///
/// The robust covariance is decomposed, the leading `K` eigenpairs give the
/// loadings `B`, and the factor realisation `f` is the robust regression of the
/// column means on `B`. Means are corrected by `−B f` and variances by
/// `−‖B_j‖²`.
pub fn farm_test(
    x: &DMatrix<f64>,
    h0: &DVector<f64>,
    k: Option<usize>,
    config: &TestConfig,
) -> FarmResult<FactorTestResult> {
    validate_one_sample(x, h0, config)?;
    let n = x.nrows();

    let fit = latent_factor_fit(x, k, &config.estimation)?;
    let std_dev = standard_errors(&fit.variances, n);
    let t_stat = one_sample_statistic(&fit.means, h0, &std_dev, config.estimation.mean_tolerance);
    let (p_values, significant) = analytic_decisions(&t_stat, config)?;

    trace!(
        "farm_test: n = {}, p = {}, K = {}, {} rejections",
        n,
        x.ncols(),
        fit.model.n_factors,
        count_rejections(&significant)
    );
    Ok(FactorTestResult {
        means: fit.means,
        std_dev,
        loadings: fit.model.loadings,
        n_factors: fit.model.n_factors,
        t_stat,
        p_values,
        significant,
        eigenvalues: fit.model.eigenvalues,
        ratios: fit.model.ratios,
    })
}

/// Factor-adjusted test with latent factors and multiplier-bootstrap p-values.
///
/// K is fixed from the full sample; each replicate re-estimates the covariance,
/// loadings and factor-adjusted means on its retained rows.
pub fn farm_test_bootstrap(
    x: &DMatrix<f64>,
    h0: &DVector<f64>,
    k: Option<usize>,
    config: &TestConfig,
) -> FarmResult<FactorBootstrapResult> {
    validate_one_sample(x, h0, config)?;
    config.validate_bootstrap()?;
    let (n, p) = x.shape();
    let estimation = &config.estimation;

    let fit = latent_factor_fit(x, k, estimation)?;
    let n_factors = fit.model.n_factors;
    let replicates = bootstrap_replicates(p, config.num_bootstrap_samples, config.seed, |rng| {
        let mask = multiplier_mask(n, rng);
        factor_adjusted_means(&select_rows(x, &mask), n_factors, estimation)
    });
    let p_values = bootstrap_p_values(&fit.means, &replicates, h0, config.alternative);
    let significant = adaptive_bh(p_values.as_slice(), config.alpha);

    trace!(
        "farm_test_bootstrap: n = {}, p = {}, K = {}, {} rejections",
        n,
        p,
        n_factors,
        count_rejections(&significant)
    );
    Ok(FactorBootstrapResult {
        means: fit.means,
        n_factors,
        p_values,
        significant,
    })
}

/// Factor-adjusted test with observed factors (one row of `factors` per sample).
pub fn farm_test_known_factors(
    x: &DMatrix<f64>,
    factors: &DMatrix<f64>,
    h0: &DVector<f64>,
    config: &TestConfig,
) -> FarmResult<KnownFactorTestResult> {
    validate_one_sample(x, h0, config)?;
    validate_factors(x, factors, "factors")?;
    let n = x.nrows();

    let fit = known_factor_fit(x, factors, &config.estimation);
    let std_dev = standard_errors(&fit.variances, n);
    let t_stat = one_sample_statistic(&fit.means, h0, &std_dev, config.estimation.mean_tolerance);
    let (p_values, significant) = analytic_decisions(&t_stat, config)?;

    trace!(
        "farm_test_known_factors: n = {}, p = {}, K = {}, {} rejections",
        n,
        x.ncols(),
        factors.ncols(),
        count_rejections(&significant)
    );
    Ok(KnownFactorTestResult {
        means: fit.means,
        std_dev,
        loadings: fit.loadings,
        n_factors: factors.ncols(),
        t_stat,
        p_values,
        significant,
    })
}

/// Factor-adjusted test with observed factors and multiplier-bootstrap p-values.
pub fn farm_test_known_factors_bootstrap(
    x: &DMatrix<f64>,
    factors: &DMatrix<f64>,
    h0: &DVector<f64>,
    config: &TestConfig,
) -> FarmResult<FactorBootstrapResult> {
    validate_one_sample(x, h0, config)?;
    validate_factors(x, factors, "factors")?;
    config.validate_bootstrap()?;
    let (n, p) = x.shape();
    let estimation = &config.estimation;

    let means = regression_intercepts(x, factors, estimation);
    let replicates = bootstrap_replicates(p, config.num_bootstrap_samples, config.seed, |rng| {
        let mask = multiplier_mask(n, rng);
        regression_intercepts(&select_rows(x, &mask), &select_rows(factors, &mask), estimation)
    });
    let p_values = bootstrap_p_values(&means, &replicates, h0, config.alternative);
    let significant = adaptive_bh(p_values.as_slice(), config.alpha);

    trace!(
        "farm_test_known_factors_bootstrap: n = {}, p = {}, K = {}, {} rejections",
        n,
        p,
        factors.ncols(),
        count_rejections(&significant)
    );
    Ok(FactorBootstrapResult {
        means,
        n_factors: factors.ncols(),
        p_values,
        significant,
    })
}

/// Two-sample factor-adjusted test with latent factors estimated per sample.
pub fn farm_test_two(
    x: &DMatrix<f64>,
    y: &DMatrix<f64>,
    h0: &DVector<f64>,
    kx: Option<usize>,
    ky: Option<usize>,
    config: &TestConfig,
) -> FarmResult<TwoSampleFactorTestResult> {
    validate_two_sample(x, y, h0, config)?;
    let (nx, ny) = (x.nrows(), y.nrows());

    let fit_x = latent_factor_fit(x, kx, &config.estimation)?;
    let fit_y = latent_factor_fit(y, ky, &config.estimation)?;
    let t_stat = two_sample_statistic(
        &fit_x.means,
        &fit_y.means,
        &fit_x.variances,
        &fit_y.variances,
        h0,
        (nx, ny),
        config.estimation.mean_tolerance,
    );
    let (p_values, significant) = analytic_decisions(&t_stat, config)?;

    trace!(
        "farm_test_two: nX = {}, nY = {}, KX = {}, KY = {}, {} rejections",
        nx,
        ny,
        fit_x.model.n_factors,
        fit_y.model.n_factors,
        count_rejections(&significant)
    );
    Ok(TwoSampleFactorTestResult {
        std_dev_x: standard_errors(&fit_x.variances, nx),
        std_dev_y: standard_errors(&fit_y.variances, ny),
        means_x: fit_x.means,
        means_y: fit_y.means,
        loadings_x: fit_x.model.loadings,
        loadings_y: fit_y.model.loadings,
        n_factors_x: fit_x.model.n_factors,
        n_factors_y: fit_y.model.n_factors,
        t_stat,
        p_values,
        significant,
        eigenvalues_x: fit_x.model.eigenvalues,
        eigenvalues_y: fit_y.model.eigenvalues,
        ratios_x: fit_x.model.ratios,
        ratios_y: fit_y.model.ratios,
    })
}

/// Two-sample factor-adjusted test with observed factors for each sample.
pub fn farm_test_two_known_factors(
    x: &DMatrix<f64>,
    factors_x: &DMatrix<f64>,
    y: &DMatrix<f64>,
    factors_y: &DMatrix<f64>,
    h0: &DVector<f64>,
    config: &TestConfig,
) -> FarmResult<TwoSampleKnownFactorTestResult> {
    validate_two_sample(x, y, h0, config)?;
    validate_factors(x, factors_x, "factors of X")?;
    validate_factors(y, factors_y, "factors of Y")?;
    let (nx, ny) = (x.nrows(), y.nrows());

    let fit_x = known_factor_fit(x, factors_x, &config.estimation);
    let fit_y = known_factor_fit(y, factors_y, &config.estimation);
    let t_stat = two_sample_statistic(
        &fit_x.means,
        &fit_y.means,
        &fit_x.variances,
        &fit_y.variances,
        h0,
        (nx, ny),
        config.estimation.mean_tolerance,
    );
    let (p_values, significant) = analytic_decisions(&t_stat, config)?;

    trace!(
        "farm_test_two_known_factors: nX = {}, nY = {}, p = {}, {} rejections",
        nx,
        ny,
        x.ncols(),
        count_rejections(&significant)
    );
    Ok(TwoSampleKnownFactorTestResult {
        std_dev_x: standard_errors(&fit_x.variances, nx),
        std_dev_y: standard_errors(&fit_y.variances, ny),
        means_x: fit_x.means,
        means_y: fit_y.means,
        loadings_x: fit_x.loadings,
        loadings_y: fit_y.loadings,
        n_factors_x: factors_x.ncols(),
        n_factors_y: factors_y.ncols(),
        t_stat,
        p_values,
        significant,
    })
}

/// Two-sample factor-adjusted test with observed factors and bootstrap p-values.
pub fn farm_test_two_known_factors_bootstrap(
    x: &DMatrix<f64>,
    factors_x: &DMatrix<f64>,
    y: &DMatrix<f64>,
    factors_y: &DMatrix<f64>,
    h0: &DVector<f64>,
    config: &TestConfig,
) -> FarmResult<TwoSampleFactorBootstrapResult> {
    validate_two_sample(x, y, h0, config)?;
    validate_factors(x, factors_x, "factors of X")?;
    validate_factors(y, factors_y, "factors of Y")?;
    config.validate_bootstrap()?;
    let (nx, ny, p) = (x.nrows(), y.nrows(), x.ncols());
    let estimation = &config.estimation;

    let means_x = regression_intercepts(x, factors_x, estimation);
    let means_y = regression_intercepts(y, factors_y, estimation);
    let replicates = bootstrap_replicates(p, config.num_bootstrap_samples, config.seed, |rng| {
        let mask_x = multiplier_mask(nx, rng);
        let boot_x = regression_intercepts(
            &select_rows(x, &mask_x),
            &select_rows(factors_x, &mask_x),
            estimation,
        );
        let mask_y = multiplier_mask(ny, rng);
        let boot_y = regression_intercepts(
            &select_rows(y, &mask_y),
            &select_rows(factors_y, &mask_y),
            estimation,
        );
        boot_x - boot_y
    });
    let p_values = bootstrap_p_values(&(&means_x - &means_y), &replicates, h0, config.alternative);
    let significant = adaptive_bh(p_values.as_slice(), config.alpha);

    trace!(
        "farm_test_two_known_factors_bootstrap: nX = {}, nY = {}, p = {}, {} rejections",
        nx,
        ny,
        p,
        count_rejections(&significant)
    );
    Ok(TwoSampleFactorBootstrapResult {
        means_x,
        means_y,
        n_factors_x: factors_x.ncols(),
        n_factors_y: factors_y.ncols(),
        p_values,
        significant,
    })
}

struct LatentFactorFit {
    means: DVector<f64>,
    variances: DVector<f64>,
    model: FactorModel,
}

fn latent_factor_fit(
    x: &DMatrix<f64>,
    k: Option<usize>,
    config: &EstimationConfig,
) -> FarmResult<LatentFactorFit> {
    let n = x.nrows();
    if let Some(k) = k {
        validate_factor_count(k, x.ncols())?;
    }
    let cov = huber_cov(x, config)?;
    let model = fit_factor_model(&cov.covariance, n, k)?;
    let f = estimate_factors(&model.loadings, &column_means(x), config);

    let means = &cov.means - &model.loadings * &f;
    let variances = DVector::from_fn(x.ncols(), |j, _| {
        clamped_subtract(cov.covariance[(j, j)], model.loadings.row(j).norm_squared())
    });

    Ok(LatentFactorFit {
        means,
        variances,
        model,
    })
}

/// Factor-adjusted means with a fixed factor count, for bootstrap replicates.
fn factor_adjusted_means(x: &DMatrix<f64>, k: usize, config: &EstimationConfig) -> DVector<f64> {
    let cov = huber_cov_unchecked(x, config);
    let loadings = loading_matrix(&SpectralDecomposition::new(&cov.covariance), k);
    let f = estimate_factors(&loadings, &column_means(x), config);
    cov.means - loadings * f
}

struct KnownFactorFit {
    means: DVector<f64>,
    variances: DVector<f64>,
    loadings: DMatrix<f64>,
}

fn known_factor_fit(
    x: &DMatrix<f64>,
    factors: &DMatrix<f64>,
    config: &EstimationConfig,
) -> KnownFactorFit {
    let p = x.ncols();
    let factor_cov = sample_covariance(factors);

    let fit_column = |j: usize| {
        let column = column_slice(x, j);
        let fit = huber_regression_unchecked(factors, column, config);
        let mu = fit.intercept();
        let beta = fit.slopes();
        let explained = beta.dot(&(&factor_cov * &beta));
        // the explained variance enters squared
        let variance = clamped_subtract(huber_variance(column, mu, config), explained * explained);
        (mu, variance, beta)
    };

    #[cfg(feature = "parallel")]
    let fits: Vec<(f64, f64, DVector<f64>)> = {
        use rayon::prelude::*;
        (0..p).into_par_iter().map(fit_column).collect()
    };

    #[cfg(not(feature = "parallel"))]
    let fits: Vec<(f64, f64, DVector<f64>)> = (0..p).map(fit_column).collect();

    let mut means = DVector::zeros(p);
    let mut variances = DVector::zeros(p);
    let mut loadings = DMatrix::zeros(p, factors.ncols());
    for (j, (mu, variance, beta)) in fits.into_iter().enumerate() {
        means[j] = mu;
        variances[j] = variance;
        loadings.set_row(j, &beta.transpose());
    }

    KnownFactorFit {
        means,
        variances,
        loadings,
    }
}

fn regression_intercepts(
    x: &DMatrix<f64>,
    factors: &DMatrix<f64>,
    config: &EstimationConfig,
) -> DVector<f64> {
    DVector::from_fn(x.ncols(), |j, _| {
        huber_regression_unchecked(factors, column_slice(x, j), config).intercept()
    })
}

fn standard_errors(variances: &DVector<f64>, n: usize) -> DVector<f64> {
    variances.map(|v| (v / n as f64).sqrt())
}

/// `(μ − h0) / stdDev` per coordinate.
fn one_sample_statistic(
    means: &DVector<f64>,
    h0: &DVector<f64>,
    std_dev: &DVector<f64>,
    tolerance: f64,
) -> DVector<f64> {
    DVector::from_fn(means.len(), |j, _| {
        studentize(means[j] - h0[j], std_dev[j], tolerance)
    })
}

fn two_sample_statistic(
    means_x: &DVector<f64>,
    means_y: &DVector<f64>,
    variances_x: &DVector<f64>,
    variances_y: &DVector<f64>,
    h0: &DVector<f64>,
    (nx, ny): (usize, usize),
    tolerance: f64,
) -> DVector<f64> {
    DVector::from_fn(means_x.len(), |j, _| {
        let se = (variances_x[j] / nx as f64 + variances_y[j] / ny as f64).sqrt();
        studentize(means_x[j] - means_y[j] - h0[j], se, tolerance)
    })
}

/// Standardise a mean difference, staying neutral on coordinates without spread.
///
/// With a zero standard error the statistic is 0 when the difference is within
/// `tolerance` of the null (p = 1 two-sided) and a signed infinity otherwise: a
/// constant coordinate that sits away from `h0` is rejected with p = 0.
fn studentize(difference: f64, std_error: f64, tolerance: f64) -> f64 {
    if std_error > 0.0 {
        difference / std_error
    } else if difference.abs() <= tolerance {
        0.0
    } else {
        f64::INFINITY.copysign(difference)
    }
}

fn analytic_decisions(
    t_stat: &DVector<f64>,
    config: &TestConfig,
) -> FarmResult<(DVector<f64>, Vec<bool>)> {
    let p_values = normal_p_values(t_stat, config.alternative)?;
    let significant = adaptive_bh(p_values.as_slice(), config.alpha);
    Ok((p_values, significant))
}

fn count_rejections(significant: &[bool]) -> usize {
    significant.iter().filter(|&&s| s).count()
}

fn validate_one_sample(x: &DMatrix<f64>, h0: &DVector<f64>, config: &TestConfig) -> FarmResult<()> {
    config.validate()?;
    validate_matrix(x, 2, "X")?;
    validate_same_extent(x.ncols(), h0.len(), "length of h0 vs columns of X")?;
    validate_all_finite(h0.as_slice(), "h0")
}

fn validate_two_sample(
    x: &DMatrix<f64>,
    y: &DMatrix<f64>,
    h0: &DVector<f64>,
    config: &TestConfig,
) -> FarmResult<()> {
    validate_one_sample(x, h0, config)?;
    validate_matrix(y, 2, "Y")?;
    validate_same_extent(x.ncols(), y.ncols(), "columns of Y vs columns of X")
}

fn validate_factors(sample: &DMatrix<f64>, factors: &DMatrix<f64>, name: &str) -> FarmResult<()> {
    validate_matrix(factors, 2, name)?;
    validate_same_extent(
        sample.nrows(),
        factors.nrows(),
        &format!("rows of {} vs rows of the sample", name),
    )
}
