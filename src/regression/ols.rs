//! Ordinary and weighted least squares.
//!
//! Normal equations are solved with a Cholesky decomposition on standardized
//! columns, then mapped back to raw units. Ordinal dates are large numbers
//! (~7e5), so solving on raw columns would square an already poor condition
//! number.

use crate::design::DesignMatrix;
use crate::error::{Result, YatsmError};

/// OLS coefficients with fit diagnostics.
#[derive(Debug, Clone)]
pub struct OLSResult {
    /// Regression coefficients in design column order.
    pub coefficients: Vec<f64>,
    /// Standard error of each coefficient. The intercept entry refers to the
    /// intercept at the column means, not at date zero.
    pub std_errors: Vec<f64>,
    /// Root mean square residual (denominator n).
    pub rmse: f64,
    /// Residual degrees of freedom (n - p).
    pub dof: usize,
}

impl OLSResult {
    /// t-statistic of one coefficient (NaN when its standard error is zero).
    pub fn t_statistic(&self, index: usize) -> f64 {
        let se = self.std_errors[index];
        if se > 0.0 {
            self.coefficients[index] / se
        } else {
            f64::NAN
        }
    }
}

/// Column transform applied before solving.
///
/// Non-constant columns are centered (only when an intercept-like constant
/// column exists) and scaled to unit spread.
#[derive(Debug, Clone)]
pub(crate) struct Standardization {
    pub(crate) centers: Vec<f64>,
    pub(crate) scales: Vec<f64>,
    /// Index and value of the constant column absorbing the centering offset.
    pub(crate) intercept: Option<(usize, f64)>,
}

impl Standardization {
    pub(crate) fn from_design(x: &DesignMatrix) -> Self {
        let n = x.n_rows().max(1) as f64;
        let p = x.n_cols();

        let mut means = vec![0.0; p];
        for row in x.rows() {
            for (m, v) in means.iter_mut().zip(row) {
                *m += v;
            }
        }
        means.iter_mut().for_each(|m| *m /= n);

        let mut spreads = vec![0.0; p];
        for row in x.rows() {
            for j in 0..p {
                spreads[j] += (row[j] - means[j]).powi(2);
            }
        }
        let spreads: Vec<f64> = spreads.iter().map(|s| (s / n).sqrt()).collect();

        let is_constant = |j: usize| spreads[j] <= 1e-12 * means[j].abs().max(1.0);
        let intercept = (0..p)
            .find(|&j| is_constant(j) && means[j] != 0.0)
            .map(|j| (j, means[j]));

        let mut centers = vec![0.0; p];
        let mut scales = vec![1.0; p];
        for j in 0..p {
            if is_constant(j) {
                continue;
            }
            if intercept.is_some() {
                centers[j] = means[j];
                scales[j] = spreads[j];
            } else {
                let rms = (means[j].powi(2) + spreads[j].powi(2)).sqrt();
                scales[j] = if rms > 0.0 { rms } else { 1.0 };
            }
        }

        Self {
            centers,
            scales,
            intercept,
        }
    }

    #[inline]
    pub(crate) fn apply(&self, row: &[f64], j: usize) -> f64 {
        (row[j] - self.centers[j]) / self.scales[j]
    }

    /// Map coefficients of the standardized problem back to raw columns.
    pub(crate) fn unscale(&self, gamma: &[f64]) -> Vec<f64> {
        let mut beta: Vec<f64> = gamma
            .iter()
            .zip(&self.scales)
            .map(|(g, s)| g / s)
            .collect();
        if let Some((k, value)) = self.intercept {
            let offset: f64 = beta
                .iter()
                .zip(&self.centers)
                .enumerate()
                .filter(|&(j, _)| j != k)
                .map(|(_, (b, c))| b * c)
                .sum();
            beta[k] -= offset / value;
        }
        beta
    }
}

/// Fit OLS: `y = X @ beta`.
///
/// # Arguments
/// * `x` - Design matrix (n x p)
/// * `y` - Response values (length n)
///
/// # Returns
/// Coefficients, standard errors and RMSE. Fails with `FitFailure` when
/// `n < p` or the design is singular.
pub fn ols_fit(x: &DesignMatrix, y: &[f64]) -> Result<OLSResult> {
    let solution = solve_least_squares(x, y, None)?;
    let n = x.n_rows();
    let p = x.n_cols();

    let residuals = ols_residuals(x, y, &solution.beta);
    let ssr: f64 = residuals.iter().map(|r| r * r).sum();
    let rmse = (ssr / n as f64).sqrt();

    let dof = n - p;
    let sigma2 = if dof > 0 { ssr / dof as f64 } else { f64::NAN };
    let std_errors = solution
        .inverse_diagonal()
        .iter()
        .zip(&solution.standardization.scales)
        .map(|(d, s)| (sigma2 * d).sqrt() / s)
        .collect();

    Ok(OLSResult {
        coefficients: solution.beta,
        std_errors,
        rmse,
        dof,
    })
}

/// Fit weighted least squares with non-negative observation weights.
pub fn wls_fit(x: &DesignMatrix, y: &[f64], weights: &[f64]) -> Result<Vec<f64>> {
    if weights.len() != y.len() {
        return Err(YatsmError::DimensionMismatch {
            expected: y.len(),
            got: weights.len(),
        });
    }
    Ok(solve_least_squares(x, y, Some(weights))?.beta)
}

/// Compute residuals `y - X @ beta`.
pub fn ols_residuals(x: &DesignMatrix, y: &[f64], beta: &[f64]) -> Vec<f64> {
    x.dot(beta)
        .iter()
        .zip(y)
        .map(|(fitted, yi)| yi - fitted)
        .collect()
}

struct LeastSquaresSolution {
    beta: Vec<f64>,
    chol: Vec<Vec<f64>>,
    standardization: Standardization,
}

impl LeastSquaresSolution {
    /// Diagonal of `(Z'Z)^-1` for the standardized design.
    fn inverse_diagonal(&self) -> Vec<f64> {
        let p = self.chol.len();
        (0..p)
            .map(|j| {
                let mut e = vec![0.0; p];
                e[j] = 1.0;
                cholesky_solve(&self.chol, &e)[j]
            })
            .collect()
    }
}

fn solve_least_squares(
    x: &DesignMatrix,
    y: &[f64],
    weights: Option<&[f64]>,
) -> Result<LeastSquaresSolution> {
    let n = x.n_rows();
    let p = x.n_cols();

    if y.len() != n {
        return Err(YatsmError::DimensionMismatch {
            expected: n,
            got: y.len(),
        });
    }
    if p == 0 {
        return Err(YatsmError::FitFailure("design has no columns".into()));
    }
    if n < p {
        return Err(YatsmError::FitFailure(format!(
            "{n} observations cannot determine {p} coefficients"
        )));
    }

    let standardization = Standardization::from_design(x);

    // Z'WZ and Z'Wy on standardized columns
    let mut xtx = vec![vec![0.0; p]; p];
    let mut xty = vec![0.0; p];
    let mut z = vec![0.0; p];

    for (obs, row) in x.rows().enumerate() {
        let w = weights.map_or(1.0, |w| w[obs]);
        if w == 0.0 {
            continue;
        }
        for j in 0..p {
            z[j] = standardization.apply(row, j);
        }
        for i in 0..p {
            let wzi = w * z[i];
            xty[i] += wzi * y[obs];
            for j in 0..=i {
                xtx[i][j] += wzi * z[j];
            }
        }
    }
    for i in 0..p {
        for j in 0..i {
            xtx[j][i] = xtx[i][j];
        }
    }

    let chol = cholesky(&xtx).ok_or_else(|| {
        YatsmError::FitFailure("design matrix is singular or not positive definite".into())
    })?;
    let gamma = cholesky_solve(&chol, &xty);
    if gamma.iter().any(|g| !g.is_finite()) {
        return Err(YatsmError::FitFailure("non-finite coefficients".into()));
    }

    Ok(LeastSquaresSolution {
        beta: standardization.unscale(&gamma),
        chol,
        standardization,
    })
}

/// Cholesky decomposition `A = L @ L'` of a symmetric positive definite matrix.
///
/// Returns `None` when a pivot is not positive relative to its diagonal entry.
pub(crate) fn cholesky(a: &[Vec<f64>]) -> Option<Vec<Vec<f64>>> {
    let n = a.len();
    let mut l = vec![vec![0.0; n]; n];

    for i in 0..n {
        for j in 0..=i {
            let mut sum = a[i][j];
            for k in 0..j {
                sum -= l[i][k] * l[j][k];
            }

            if i == j {
                if sum <= 1e-10 * a[i][i].abs() || sum <= 0.0 {
                    return None; // Not positive definite
                }
                l[i][j] = sum.sqrt();
            } else {
                l[i][j] = sum / l[j][j];
            }
        }
    }

    Some(l)
}

/// Solve `L @ L' @ x = b` given the Cholesky factor `L`.
pub(crate) fn cholesky_solve(l: &[Vec<f64>], b: &[f64]) -> Vec<f64> {
    let n = b.len();

    // Forward substitution: L @ y = b
    let mut y = vec![0.0; n];
    for i in 0..n {
        let mut sum = b[i];
        for j in 0..i {
            sum -= l[i][j] * y[j];
        }
        y[i] = sum / l[i][i];
    }

    // Backward substitution: L' @ x = y
    let mut x = vec![0.0; n];
    for i in (0..n).rev() {
        let mut sum = y[i];
        for j in (i + 1)..n {
            sum -= l[j][i] * x[j];
        }
        x[i] = sum / l[i][i];
    }

    x
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::design::DesignSpec;
    use approx::assert_relative_eq;

    fn linear_design(dates: &[i64]) -> DesignMatrix {
        DesignSpec::new().intercept().slope().build(dates).unwrap()
    }

    #[test]
    fn ols_fit_simple_linear() {
        // y = 2 + 3*x
        let x = linear_design(&[1, 2, 3, 4, 5]);
        let y = vec![5.0, 8.0, 11.0, 14.0, 17.0];

        let result = ols_fit(&x, &y).unwrap();

        assert_relative_eq!(result.coefficients[0], 2.0, epsilon = 1e-8);
        assert_relative_eq!(result.coefficients[1], 3.0, epsilon = 1e-8);
        assert!(result.rmse < 1e-8);
        assert_eq!(result.dof, 3);
    }

    #[test]
    fn ols_fit_handles_ordinal_dates() {
        // Realistic ordinal dates with a small slope
        let dates: Vec<i64> = (0..40).map(|i| 730_120 + 16 * i).collect();
        let y: Vec<f64> = dates
            .iter()
            .map(|&d| 1500.0 + 0.05 * (d - 730_120) as f64)
            .collect();
        let x = linear_design(&dates);

        let result = ols_fit(&x, &y).unwrap();

        assert_relative_eq!(result.coefficients[1], 0.05, epsilon = 1e-8);
        let fitted = x.dot(&result.coefficients);
        for (f, yi) in fitted.iter().zip(&y) {
            assert_relative_eq!(*f, *yi, epsilon = 1e-5);
        }
    }

    #[test]
    fn ols_fit_with_harmonics() {
        let spec = DesignSpec::default();
        let dates: Vec<i64> = (0..60).map(|i| 730_120 + 8 * i).collect();
        let truth = [500.0, 0.01, 120.0, -80.0];
        let x = spec.build(&dates).unwrap();
        let y = x.dot(&truth);

        let result = ols_fit(&x, &y).unwrap();

        for (c, t) in result.coefficients.iter().zip(truth) {
            assert_relative_eq!(*c, t, epsilon = 1e-4, max_relative = 1e-6);
        }
    }

    #[test]
    fn ols_fit_rejects_underdetermined() {
        let x = DesignSpec::default().build(&[1, 2, 3]).unwrap();
        let err = ols_fit(&x, &[1.0, 2.0, 3.0]).unwrap_err();
        assert!(matches!(err, YatsmError::FitFailure(_)));
    }

    #[test]
    fn ols_fit_rejects_singular_design() {
        // All observations on the same date: slope column is collinear with intercept
        let x = linear_design(&[100, 100, 100, 100]);
        let err = ols_fit(&x, &[1.0, 2.0, 3.0, 4.0]).unwrap_err();
        assert!(matches!(err, YatsmError::FitFailure(_)));
    }

    #[test]
    fn ols_fit_dimension_mismatch() {
        let x = linear_design(&[1, 2, 3]);
        assert!(matches!(
            ols_fit(&x, &[1.0, 2.0]),
            Err(YatsmError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn ols_without_intercept_column() {
        // y = 2 * x through the origin
        let x = DesignSpec::new().slope().build(&[1, 2, 3, 4]).unwrap();
        let result = ols_fit(&x, &[2.0, 4.0, 6.0, 8.0]).unwrap();
        assert_relative_eq!(result.coefficients[0], 2.0, epsilon = 1e-10);
    }

    #[test]
    fn ols_residuals_sum_to_zero() {
        let x = linear_design(&[1, 2, 3, 4, 5]);
        let y = vec![5.1, 7.9, 11.2, 13.8, 17.0];

        let result = ols_fit(&x, &y).unwrap();
        let residuals = ols_residuals(&x, &y, &result.coefficients);

        assert_eq!(residuals.len(), 5);
        let sum: f64 = residuals.iter().sum();
        assert!(sum.abs() < 1e-8);
    }

    #[test]
    fn standard_errors_match_closed_form() {
        // For simple regression: se(slope) = sigma / sqrt(Sxx)
        let dates = [1, 2, 3, 4, 5, 6];
        let y = vec![1.0, 3.2, 4.8, 7.1, 9.0, 10.9];
        let x = linear_design(&dates);
        let result = ols_fit(&x, &y).unwrap();

        let residuals = ols_residuals(&x, &y, &result.coefficients);
        let ssr: f64 = residuals.iter().map(|r| r * r).sum();
        let sigma = (ssr / 4.0).sqrt();
        let sxx: f64 = dates.iter().map(|&d| (d as f64 - 3.5).powi(2)).sum();

        assert_relative_eq!(result.std_errors[1], sigma / sxx.sqrt(), epsilon = 1e-8);
        assert!(result.t_statistic(1) > 10.0);
    }

    #[test]
    fn wls_zero_weight_ignores_observation() {
        let x = linear_design(&[1, 2, 3, 4, 5]);
        let mut y = vec![5.0, 8.0, 11.0, 14.0, 17.0];
        y[2] = 1000.0;
        let weights = vec![1.0, 1.0, 0.0, 1.0, 1.0];

        let beta = wls_fit(&x, &y, &weights).unwrap();

        assert_relative_eq!(beta[0], 2.0, epsilon = 1e-8);
        assert_relative_eq!(beta[1], 3.0, epsilon = 1e-8);
    }

    #[test]
    fn cholesky_solves_spd_system() {
        let a = vec![vec![4.0, 2.0], vec![2.0, 3.0]];
        let l = cholesky(&a).unwrap();
        let x = cholesky_solve(&l, &[2.0, 1.0]);
        assert_relative_eq!(4.0 * x[0] + 2.0 * x[1], 2.0, epsilon = 1e-12);
        assert_relative_eq!(2.0 * x[0] + 3.0 * x[1], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn cholesky_rejects_indefinite() {
        let a = vec![vec![1.0, 2.0], vec![2.0, 1.0]];
        assert!(cholesky(&a).is_none());
    }
}
