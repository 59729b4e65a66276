//! Per-band regression fitting for time segments.
//!
//! A fitter receives the design matrix of a candidate window and one band's
//! responses, and returns the band's coefficients and RMSE. Three strategies
//! are built in, selected through [`Estimator`]:
//!
//! - **OLS**: ordinary least squares (default)
//! - **Robust**: Tukey bisquare IRLS
//! - **Lasso**: L1-penalized coordinate descent, optionally cross-validated
//!
//! Custom strategies implement [`RegressionFitter`].
//!
//! # Example
//!
//! ```
//! use yatsm::design::DesignSpec;
//! use yatsm::regression::{Estimator, RegressionFitter};
//!
//! let x = DesignSpec::new().intercept().slope().build(&[1, 2, 3, 4]).unwrap();
//! let fit = Estimator::Ols.fit(&x, &[3.0, 5.0, 7.0, 9.0]).unwrap();
//! assert!((fit.coefficients[1] - 2.0).abs() < 1e-9);
//! ```

pub mod lasso;
pub mod ols;
pub mod robust;

pub use lasso::{lasso_cv_fit, lasso_fit, LassoConfig, LassoCv, LassoResult};
pub use ols::{ols_fit, ols_residuals, wls_fit, OLSResult};
pub use robust::{mad_scale, robust_fit, RobustConfig, RobustResult};

use crate::design::DesignMatrix;
use crate::error::{Result, YatsmError};

/// Coefficients and residual error of one band's fit.
#[derive(Debug, Clone, PartialEq)]
pub struct BandFit {
    pub coefficients: Vec<f64>,
    pub rmse: f64,
}

impl BandFit {
    /// Predicted value for one design row.
    pub fn predict_row(&self, row: &[f64]) -> f64 {
        row.iter().zip(&self.coefficients).map(|(x, b)| x * b).sum()
    }
}

/// Strategy interface for fitting a single band.
///
/// Implementations must be deterministic for identical inputs.
pub trait RegressionFitter: Send + Sync + std::fmt::Debug {
    /// Fit `y ~ X`. Must fail with `FitFailure` when `X` has fewer rows than columns.
    fn fit(&self, x: &DesignMatrix, y: &[f64]) -> Result<BandFit>;

    /// Name of the strategy.
    fn name(&self) -> &str;
}

/// Built-in regression strategies.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Estimator {
    #[default]
    Ols,
    Robust(RobustConfig),
    Lasso(LassoConfig),
}

impl Estimator {
    /// Lasso with a fixed alpha.
    pub fn lasso(alpha: f64) -> Self {
        Self::Lasso(LassoConfig::new(alpha))
    }

    /// Robust bisquare regression with default tuning.
    pub fn robust() -> Self {
        Self::Robust(RobustConfig::default())
    }

    pub(crate) fn validate(&self) -> Result<()> {
        match self {
            Self::Ols => Ok(()),
            Self::Robust(config) => config.validate(),
            Self::Lasso(config) => config.validate(),
        }
    }
}

impl RegressionFitter for Estimator {
    fn fit(&self, x: &DesignMatrix, y: &[f64]) -> Result<BandFit> {
        let (coefficients, rmse) = match self {
            Self::Ols => {
                let result = ols_fit(x, y)?;
                (result.coefficients, result.rmse)
            }
            Self::Robust(config) => {
                let result = robust_fit(x, y, config)?;
                (result.coefficients, result.rmse)
            }
            Self::Lasso(config) => {
                let result = match &config.cv {
                    Some(cv) => lasso_cv_fit(x, y, config, cv)?,
                    None => lasso_fit(x, y, config.alpha, config)?,
                };
                (result.coefficients, result.rmse)
            }
        };
        Ok(BandFit { coefficients, rmse })
    }

    fn name(&self) -> &str {
        match self {
            Self::Ols => "OLS",
            Self::Robust(_) => "RLM",
            Self::Lasso(config) if config.cv.is_some() => "LassoCV",
            Self::Lasso(_) => "Lasso",
        }
    }
}

/// Fit every band of a window with the same strategy.
///
/// `bands[b][i]` is the response of band `b` at window row `i`.
pub fn fit_bands(
    fitter: &dyn RegressionFitter,
    x: &DesignMatrix,
    bands: &[Vec<f64>],
) -> Result<Vec<BandFit>> {
    bands
        .iter()
        .map(|y| {
            if y.len() != x.n_rows() {
                return Err(YatsmError::DimensionMismatch {
                    expected: x.n_rows(),
                    got: y.len(),
                });
            }
            fitter.fit(x, y)
        })
        .collect()
}
