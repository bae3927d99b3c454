//! Mathematical utility functions and constants shared by the estimators.
//!
//! Sample moments, order statistics and small matrix helpers. Everything here is
//! total: degenerate input yields a neutral value (zero spread, NaN median of an
//! empty slice) rather than an error.

use nalgebra::DMatrix;

/// Numerical constants used across the engine.
pub mod constants {
    /// 0.75 quantile of the standard normal; rescales MAD to a consistent σ estimate.
    pub const MAD_NORMAL_QUANTILE: f64 = 0.6744898;

    /// Huber constant giving 95% Gaussian efficiency.
    pub const HUBER_EFFICIENCY_CONSTANT: f64 = 1.345;
}

/// Safe comparison for floating point values (NaN sorts last).
pub fn float_total_cmp(a: &f64, b: &f64) -> std::cmp::Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => std::cmp::Ordering::Equal,
        (true, false) => std::cmp::Ordering::Greater,
        (false, true) => std::cmp::Ordering::Less,
        (false, false) => a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal),
    }
}

/// Median of already-sorted data (even length averages the two middle values).
pub fn median_of_sorted(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return f64::NAN;
    }
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        0.5 * (sorted[n / 2 - 1] + sorted[n / 2])
    }
}

/// Median of unsorted data.
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mut v = values.to_vec();
    v.sort_by(float_total_cmp);
    median_of_sorted(&v)
}

/// Median absolute deviation about the median, rescaled to estimate a normal σ.
pub fn scaled_mad(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let med = median(values);
    let mut abs_devs: Vec<f64> = values.iter().map(|&x| (x - med).abs()).collect();
    abs_devs.sort_by(float_total_cmp);
    median_of_sorted(&abs_devs) / constants::MAD_NORMAL_QUANTILE
}

/// Arithmetic mean (NaN for empty input).
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation with the `n − 1` normalisation; zero below two points.
pub fn sample_std_dev(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let mu = mean(values);
    let ss: f64 = values.iter().map(|&x| (x - mu) * (x - mu)).sum();
    (ss / (n - 1) as f64).sqrt()
}

/// Subtract `b` from `a` only when the result stays positive.
///
/// Used for every bias-corrected second moment: when the correction would
/// overshoot, the raw second moment is reported unchanged.
#[inline]
pub fn clamped_subtract(a: f64, b: f64) -> f64 {
    if a > b {
        a - b
    } else {
        a
    }
}

/// Contiguous view of column `j` of a column-major matrix.
#[inline]
pub fn column_slice(matrix: &DMatrix<f64>, j: usize) -> &[f64] {
    let n = matrix.nrows();
    &matrix.as_slice()[j * n..(j + 1) * n]
}

/// Arithmetic mean of every column.
pub fn column_means(matrix: &DMatrix<f64>) -> Vec<f64> {
    (0..matrix.ncols())
        .map(|j| mean(column_slice(matrix, j)))
        .collect()
}

/// Index of the first maximal entry; NaN entries never win.
pub fn argmax(values: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &v) in values.iter().enumerate() {
        if v.is_nan() {
            continue;
        }
        match best {
            Some((_, current)) if v <= current => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

/// Sample covariance matrix of the columns (rows are observations, `n − 1` normalisation).
pub fn sample_covariance(matrix: &DMatrix<f64>) -> DMatrix<f64> {
    let n = matrix.nrows();
    let k = matrix.ncols();
    if n < 2 {
        return DMatrix::zeros(k, k);
    }
    let means = column_means(matrix);
    let mut centered = matrix.clone();
    for (j, mu) in means.iter().enumerate() {
        centered.column_mut(j).add_scalar_mut(-mu);
    }
    (centered.transpose() * &centered) / (n - 1) as f64
}
