//! Statistical pre-screening of a training window.
//!
//! Both screens fit bisquare regressions over the window and flag observations
//! whose residuals are implausible under the robust fit. Flagged observations
//! are removed from the window before the main model is trained.

use crate::design::{DesignMatrix, DAYS_PER_YEAR};
use crate::error::{Result, YatsmError};
use crate::regression::{robust_fit, RobustConfig};
use crate::utils::stats::chi_squared_critical;
use std::f64::consts::PI;

/// Critical value for RLM screening: the 99.9% chi-squared quantile with 4 degrees of freedom.
pub const DEFAULT_RLM_CRIT: f64 = 18.467;

/// Tmask residual cutoff in reflectance units (scaled by 10000).
pub const DEFAULT_TMASK_CRIT: f64 = 400.0;

/// Pre-screening applied to a window before training.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Screening {
    /// No statistical screening.
    #[default]
    None,
    /// Sum of squared normalized bisquare residuals over the test bands,
    /// compared against `crit`.
    Rlm { crit: f64 },
    /// Multitemporal cloud and shadow screen on a green and a SWIR1 band.
    Tmask {
        green_band: usize,
        swir1_band: usize,
        crit: f64,
    },
}

impl Screening {
    /// RLM screening with [`DEFAULT_RLM_CRIT`].
    pub fn rlm() -> Self {
        Self::Rlm {
            crit: DEFAULT_RLM_CRIT,
        }
    }

    /// RLM screening whose critical value is the upper `alpha` quantile of a
    /// chi-squared distribution with one degree of freedom per test band.
    pub fn rlm_chi_squared(alpha: f64, n_test_bands: usize) -> Result<Self> {
        let crit = chi_squared_critical(alpha, n_test_bands as f64).ok_or_else(|| {
            YatsmError::Configuration(format!(
                "no chi-squared quantile for alpha {alpha} and {n_test_bands} bands"
            ))
        })?;
        Ok(Self::Rlm { crit })
    }

    /// Tmask screening with [`DEFAULT_TMASK_CRIT`].
    pub fn tmask(green_band: usize, swir1_band: usize) -> Self {
        Self::Tmask {
            green_band,
            swir1_band,
            crit: DEFAULT_TMASK_CRIT,
        }
    }

    pub fn is_enabled(&self) -> bool {
        !matches!(self, Self::None)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        let crit = match self {
            Self::None => return Ok(()),
            Self::Rlm { crit } => *crit,
            Self::Tmask {
                green_band,
                swir1_band,
                crit,
            } => {
                if green_band == swir1_band {
                    return Err(YatsmError::Configuration(
                        "tmask green and swir1 bands must differ".into(),
                    ));
                }
                *crit
            }
        };
        if !(crit > 0.0) {
            return Err(YatsmError::Configuration(
                "screening critical value must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Highest band index the screen reads, if any.
    pub(crate) fn max_band(&self) -> Option<usize> {
        match self {
            Self::Tmask {
                green_band,
                swir1_band,
                ..
            } => Some(*green_band.max(swir1_band)),
            _ => None,
        }
    }

    /// Positions within the window that the screen flags for removal.
    ///
    /// `x` is the window design, `dates` the window dates and `bands[b][i]` the
    /// value of band `b` at window position `i`.
    pub fn flag(
        &self,
        x: &DesignMatrix,
        dates: &[i64],
        bands: &[Vec<f64>],
        test_indices: &[usize],
    ) -> Result<Vec<usize>> {
        match *self {
            Self::None => Ok(Vec::new()),
            Self::Rlm { crit } => rlm_flags(x, bands, test_indices, crit),
            Self::Tmask {
                green_band,
                swir1_band,
                crit,
            } => tmask_flags(dates, &bands[green_band], &bands[swir1_band], crit),
        }
    }
}

fn rlm_flags(
    x: &DesignMatrix,
    bands: &[Vec<f64>],
    test_indices: &[usize],
    crit: f64,
) -> Result<Vec<usize>> {
    let config = RobustConfig::default();
    let mut statistic = vec![0.0; x.n_rows()];
    for &b in test_indices {
        let fit = robust_fit(x, &bands[b], &config)?;
        for (s, z) in statistic
            .iter_mut()
            .zip(fit.normalized_residuals(x, &bands[b]))
        {
            *s += z * z;
        }
    }
    Ok(statistic
        .iter()
        .enumerate()
        .filter(|(_, &s)| s > crit)
        .map(|(i, _)| i)
        .collect())
}

/// Annual harmonic design without a trend, as used by Tmask.
fn tmask_design(dates: &[i64]) -> Result<DesignMatrix> {
    let rows: Vec<Vec<f64>> = dates
        .iter()
        .map(|&d| {
            let w = 2.0 * PI * d as f64 / DAYS_PER_YEAR;
            vec![1.0, w.cos(), w.sin()]
        })
        .collect();
    DesignMatrix::from_rows(&rows)
}

fn tmask_flags(dates: &[i64], green: &[f64], swir1: &[f64], crit: f64) -> Result<Vec<usize>> {
    let x = tmask_design(dates)?;
    let config = RobustConfig::default();
    let green_fit = robust_fit(&x, green, &config)?;
    let swir1_fit = robust_fit(&x, swir1, &config)?;
    let green_pred = x.dot(&green_fit.coefficients);
    let swir1_pred = x.dot(&swir1_fit.coefficients);

    Ok((0..dates.len())
        .filter(|&i| green[i] - green_pred[i] > crit || swir1[i] - swir1_pred[i] < -crit)
        .collect())
}
