//! Statistical utility functions.

use statrs::distribution::{ChiSquared, ContinuousCDF, StudentsT};

/// Calculate the mean of a slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Calculate the median of a slice.
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let n = sorted.len();
    if n.is_multiple_of(2) {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    } else {
        sorted[n / 2]
    }
}

/// Root mean square of a slice (population denominator).
pub fn root_mean_square(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    (values.iter().map(|v| v * v).sum::<f64>() / values.len() as f64).sqrt()
}

/// Upper quantile of the chi-squared distribution.
///
/// Returns the value `c` with `P(X > c) = alpha` for `X ~ chi2(dof)`,
/// or `None` when the parameters are out of range.
///
/// # Example
/// ```
/// use yatsm::utils::stats::chi_squared_critical;
///
/// // 95% quantile with 1 degree of freedom -> 3.84
/// let c = chi_squared_critical(0.05, 1.0).unwrap();
/// assert!((c - 3.841).abs() < 1e-3);
/// ```
pub fn chi_squared_critical(alpha: f64, dof: f64) -> Option<f64> {
    if !(alpha > 0.0 && alpha < 1.0) {
        return None;
    }
    let dist = ChiSquared::new(dof).ok()?;
    Some(dist.inverse_cdf(1.0 - alpha))
}

/// Two-sided critical value of Student's t distribution.
///
/// Returns `t` with `P(|T| > t) = alpha` for `T ~ t(dof)`.
pub fn student_t_critical(alpha: f64, dof: f64) -> Option<f64> {
    if !(alpha > 0.0 && alpha < 1.0) {
        return None;
    }
    let dist = StudentsT::new(0.0, 1.0, dof).ok()?;
    Some(dist.inverse_cdf(1.0 - alpha / 2.0))
}
