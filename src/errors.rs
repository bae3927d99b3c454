//! Error types and boundary validation for robust testing.
//!
//! The numerical core never fails: iterative solvers return their last iterate
//! and degenerate inputs are clipped. Every hard failure is raised here, at the
//! boundary, before any estimator runs.

use nalgebra::DMatrix;
use thiserror::Error;

/// Largest single buffer the engine will allocate (2 GiB).
const MAX_SAFE_ALLOCATION: usize = 1 << 31;

/// Error types for robust estimation and testing entry points.
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum FarmTestError {
    /// Not enough samples for the requested estimator.
    #[error("Insufficient data: need at least {required} samples, got {actual}")]
    InsufficientData {
        /// Minimum number of samples
        required: usize,
        /// Number of samples provided
        actual: usize,
    },

    /// Configuration value outside its admissible range.
    #[error("Invalid parameter: {parameter} = {value}, expected {constraint}")]
    InvalidParameter {
        /// Parameter name
        parameter: String,
        /// Offending value
        value: f64,
        /// Admissible range or constraint description
        constraint: String,
    },

    /// Paired inputs whose shapes do not line up.
    #[error("Dimension mismatch in {context}: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Which pairing failed (e.g. "rows of factors vs rows of X")
        context: String,
        /// Expected extent
        expected: usize,
        /// Extent actually supplied
        actual: usize,
    },

    /// Non-finite input or an allocation that would exceed safe limits.
    #[error("Numerical computation failed: {reason}")]
    NumericalError {
        /// Detailed reason
        reason: String,
        /// Entry point that rejected the input, when known
        operation: Option<String>,
    },

    /// Bootstrap resampling could not be configured.
    #[error("Bootstrap resampling failed: {reason}")]
    BootstrapError {
        /// Reason for the failure
        reason: String,
    },
}

/// Result type for robust estimation and testing operations.
pub type FarmResult<T> = Result<T, FarmTestError>;

/// Validates that at least `min_required` samples are available.
///
/// # Example
/// ```rust
/// use farm_test::errors::validate_data_length;
///
/// assert!(validate_data_length(5, 2).is_ok());
/// assert!(validate_data_length(1, 2).is_err());
/// ```
pub fn validate_data_length(actual: usize, min_required: usize) -> FarmResult<()> {
    if actual < min_required {
        Err(FarmTestError::InsufficientData {
            required: min_required,
            actual,
        })
    } else {
        Ok(())
    }
}

/// Validates that a parameter lies in the closed interval `[min, max]`.
///
/// # Example
/// ```rust
/// use farm_test::errors::validate_parameter;
///
/// assert!(validate_parameter(0.5, 0.0, 1.0, "alpha").is_ok());
/// assert!(validate_parameter(1.5, 0.0, 1.0, "alpha").is_err());
/// ```
pub fn validate_parameter(value: f64, min: f64, max: f64, name: &str) -> FarmResult<()> {
    if value.is_nan() {
        return Err(FarmTestError::InvalidParameter {
            parameter: name.to_string(),
            value,
            constraint: "must not be NaN".to_string(),
        });
    }

    if min.is_nan() || max.is_nan() || min > max {
        return Err(FarmTestError::NumericalError {
            reason: format!(
                "Invalid bounds for parameter {}: min={}, max={}",
                name, min, max
            ),
            operation: None,
        });
    }

    if value < min || value > max {
        Err(FarmTestError::InvalidParameter {
            parameter: name.to_string(),
            value,
            constraint: format!("[{}, {}]", min, max),
        })
    } else {
        Ok(())
    }
}

/// Validates that a level lies strictly inside `(0, 1)`.
pub fn validate_open_unit_interval(value: f64, name: &str) -> FarmResult<()> {
    if value.is_nan() || value <= 0.0 || value >= 1.0 {
        return Err(FarmTestError::InvalidParameter {
            parameter: name.to_string(),
            value,
            constraint: "(0, 1)".to_string(),
        });
    }
    Ok(())
}

/// Validates that all values in a slice are finite.
///
/// Returns on the first NaN or infinite value, naming its index.
///
/// # Example
/// ```rust
/// use farm_test::errors::validate_all_finite;
///
/// assert!(validate_all_finite(&[1.0, 2.0], "x").is_ok());
/// assert!(validate_all_finite(&[1.0, f64::NAN], "x").is_err());
/// ```
pub fn validate_all_finite(data: &[f64], name: &str) -> FarmResult<()> {
    if let Some((i, &value)) = data.iter().enumerate().find(|(_, v)| !v.is_finite()) {
        let value_desc = if value.is_nan() {
            "NaN".to_string()
        } else if value.is_sign_positive() {
            "Infinity".to_string()
        } else {
            "-Infinity".to_string()
        };

        return Err(FarmTestError::NumericalError {
            reason: format!(
                "{} contains non-finite value at index {}: {}",
                name, i, value_desc
            ),
            operation: None,
        });
    }

    Ok(())
}

/// Validates that two extents agree.
pub fn validate_same_extent(
    expected: usize,
    actual: usize,
    context: &str,
) -> FarmResult<()> {
    if expected != actual {
        return Err(FarmTestError::DimensionMismatch {
            context: context.to_string(),
            expected,
            actual,
        });
    }
    Ok(())
}

/// Validates a sample matrix: at least `min_rows` rows, one column, finite entries.
pub fn validate_matrix(matrix: &DMatrix<f64>, min_rows: usize, name: &str) -> FarmResult<()> {
    validate_data_length(matrix.nrows(), min_rows)?;
    if matrix.ncols() == 0 {
        return Err(FarmTestError::DimensionMismatch {
            context: format!("columns of {}", name),
            expected: 1,
            actual: 0,
        });
    }
    validate_all_finite(matrix.as_slice(), name)
}

/// Rejects allocations of `size` bytes above the engine's safety limit.
///
/// The pairwise-difference matrix of the covariance estimator grows as
/// `n²·p/2`; this guards against an accidental request for terabytes.
pub fn validate_allocation_size(size: usize, operation: &str) -> FarmResult<()> {
    if size > MAX_SAFE_ALLOCATION {
        return Err(FarmTestError::NumericalError {
            reason: format!(
                "Attempted allocation of {} bytes ({:.2} GiB) exceeds safety limit of {} bytes",
                size,
                size as f64 / (1024.0 * 1024.0 * 1024.0),
                MAX_SAFE_ALLOCATION
            ),
            operation: Some(operation.to_string()),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_data_length() {
        assert!(validate_data_length(3, 3).is_ok());

        match validate_data_length(1, 2) {
            Err(FarmTestError::InsufficientData { required, actual }) => {
                assert_eq!(required, 2);
                assert_eq!(actual, 1);
            }
            other => panic!("Expected InsufficientData error, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_parameter_bounds() {
        assert!(validate_parameter(0.0, 0.0, 1.0, "level").is_ok());
        assert!(validate_parameter(1.0, 0.0, 1.0, "level").is_ok());

        match validate_parameter(-0.5, 0.0, 1.0, "level") {
            Err(FarmTestError::InvalidParameter {
                parameter,
                value,
                constraint,
            }) => {
                assert_eq!(parameter, "level");
                assert_eq!(value, -0.5);
                assert_eq!(constraint, "[0, 1]");
            }
            other => panic!("Expected InvalidParameter error, got {:?}", other),
        }

        assert!(matches!(
            validate_parameter(f64::NAN, 0.0, 1.0, "level"),
            Err(FarmTestError::InvalidParameter { .. })
        ));
        assert!(matches!(
            validate_parameter(0.5, 1.0, 0.0, "level"),
            Err(FarmTestError::NumericalError { .. })
        ));
    }

    #[test]
    fn test_open_unit_interval_excludes_endpoints() {
        assert!(validate_open_unit_interval(0.05, "alpha").is_ok());
        assert!(validate_open_unit_interval(0.0, "alpha").is_err());
        assert!(validate_open_unit_interval(1.0, "alpha").is_err());
        assert!(validate_open_unit_interval(f64::NAN, "alpha").is_err());
    }

    #[test]
    fn test_validate_all_finite_reports_index() {
        assert!(validate_all_finite(&[], "x").is_ok());

        match validate_all_finite(&[1.0, 2.0, f64::NEG_INFINITY], "returns") {
            Err(FarmTestError::NumericalError { reason, .. }) => {
                assert!(reason.contains("returns"));
                assert!(reason.contains("index 2"));
                assert!(reason.contains("-Infinity"));
            }
            other => panic!("Expected NumericalError, got {:?}", other),
        }
    }

    #[test]
    fn test_dimension_mismatch_message() {
        let err = validate_same_extent(10, 9, "rows of Y vs rows of X").unwrap_err();
        let msg = format!("{}", err);
        assert!(msg.contains("rows of Y vs rows of X"));
        assert!(msg.contains("10"));
        assert!(msg.contains("9"));
    }

    #[test]
    fn test_validate_matrix() {
        assert!(validate_matrix(&DMatrix::from_element(3, 2, 1.0), 2, "X").is_ok());
        assert!(matches!(
            validate_matrix(&DMatrix::from_element(1, 2, 1.0), 2, "X"),
            Err(FarmTestError::InsufficientData { .. })
        ));
        assert!(matches!(
            validate_matrix(&DMatrix::zeros(4, 0), 2, "X"),
            Err(FarmTestError::DimensionMismatch { .. })
        ));
        let mut x = DMatrix::from_element(3, 2, 1.0);
        x[(0, 1)] = f64::INFINITY;
        assert!(validate_matrix(&x, 2, "X").is_err());
    }

    #[test]
    fn test_allocation_guard() {
        assert!(validate_allocation_size(1024, "pairwise differences").is_ok());
        match validate_allocation_size(usize::MAX, "pairwise differences") {
            Err(FarmTestError::NumericalError { operation, .. }) => {
                assert_eq!(operation.as_deref(), Some("pairwise differences"));
            }
            other => panic!("Expected NumericalError, got {:?}", other),
        }
    }
}
