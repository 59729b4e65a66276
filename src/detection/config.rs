//! Change detector configuration.

use crate::design::DesignSpec;
use crate::error::{Result, YatsmError};
use crate::regression::Estimator;
use crate::screening::{MaskConfig, Screening};

/// Minimum number of observations in a training window.
pub const DEFAULT_MIN_OBS: usize = 24;
/// Test statistic value above which an observation is an exceedance.
pub const DEFAULT_THRESHOLD: f64 = 4.0;
/// Consecutive exceedances needed to confirm a break.
pub const DEFAULT_CONSECUTIVE: usize = 5;
/// Floor on the RMSE used to normalize residuals.
pub const DEFAULT_MIN_RMSE: f64 = 100.0;
/// Days between refits while monitoring.
pub const DEFAULT_RETRAIN_TIME: f64 = 365.25;
/// Minimum time span of a training window, in days.
pub const DEFAULT_MIN_SPAN_DAYS: f64 = 365.25;
/// Number of recent window observations used by dynamic RMSE.
pub const DEFAULT_DYNAMIC_RMSE_WINDOW: usize = 24;
/// Significance level of the slope test.
pub const DEFAULT_SLOPE_TEST_ALPHA: f64 = 0.05;
/// Fit failures tolerated before a pixel is abandoned.
pub const DEFAULT_MAX_FIT_RETRIES: usize = 5;

/// How per-band normalized residuals combine into one test statistic.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TestStatistic {
    /// Mean absolute normalized residual across test bands.
    #[default]
    MeanAbsolute,
    /// Sum of squared normalized residuals across test bands.
    ChiSquared,
}

impl TestStatistic {
    /// Combine normalized residuals.
    pub fn combine(self, z: &[f64]) -> f64 {
        if z.is_empty() {
            return 0.0;
        }
        match self {
            Self::MeanAbsolute => z.iter().map(|v| v.abs()).sum::<f64>() / z.len() as f64,
            Self::ChiSquared => z.iter().map(|v| v * v).sum(),
        }
    }
}

/// Configuration for [`ChangeDetector`](super::ChangeDetector).
///
/// # Example
///
/// ```
/// use yatsm::detection::DetectorConfig;
/// use yatsm::screening::Screening;
///
/// let config = DetectorConfig::default()
///     .min_obs(12)
///     .threshold(3.0)
///     .screening(Screening::rlm())
///     .remove_noise(true);
/// assert!(config.validate().is_ok());
/// ```
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorConfig {
    pub min_obs: usize,
    pub threshold: f64,
    pub consecutive: usize,
    pub min_rmse: f64,
    pub retrain_time: f64,
    pub min_span_days: f64,
    pub screening: Screening,
    /// Bands used for change testing; empty means every band.
    pub test_indices: Vec<usize>,
    pub remove_noise: bool,
    pub dynamic_rmse: bool,
    pub dynamic_rmse_window: usize,
    pub slope_test: bool,
    /// Band refit by the slope test; defaults to the first test band.
    pub slope_test_band: Option<usize>,
    pub slope_test_alpha: f64,
    pub statistic: TestStatistic,
    pub estimator: Estimator,
    pub max_fit_retries: usize,
    pub design: DesignSpec,
    pub mask: MaskConfig,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            min_obs: DEFAULT_MIN_OBS,
            threshold: DEFAULT_THRESHOLD,
            consecutive: DEFAULT_CONSECUTIVE,
            min_rmse: DEFAULT_MIN_RMSE,
            retrain_time: DEFAULT_RETRAIN_TIME,
            min_span_days: DEFAULT_MIN_SPAN_DAYS,
            screening: Screening::None,
            test_indices: Vec::new(),
            remove_noise: false,
            dynamic_rmse: false,
            dynamic_rmse_window: DEFAULT_DYNAMIC_RMSE_WINDOW,
            slope_test: false,
            slope_test_band: None,
            slope_test_alpha: DEFAULT_SLOPE_TEST_ALPHA,
            statistic: TestStatistic::MeanAbsolute,
            estimator: Estimator::Ols,
            max_fit_retries: DEFAULT_MAX_FIT_RETRIES,
            design: DesignSpec::default(),
            mask: MaskConfig::default(),
        }
    }
}

impl DetectorConfig {
    pub fn min_obs(mut self, min_obs: usize) -> Self {
        self.min_obs = min_obs;
        self
    }

    pub fn threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn consecutive(mut self, consecutive: usize) -> Self {
        self.consecutive = consecutive;
        self
    }

    pub fn min_rmse(mut self, min_rmse: f64) -> Self {
        self.min_rmse = min_rmse;
        self
    }

    pub fn retrain_time(mut self, days: f64) -> Self {
        self.retrain_time = days;
        self
    }

    pub fn min_span_days(mut self, days: f64) -> Self {
        self.min_span_days = days;
        self
    }

    pub fn screening(mut self, screening: Screening) -> Self {
        self.screening = screening;
        self
    }

    pub fn test_indices(mut self, indices: Vec<usize>) -> Self {
        self.test_indices = indices;
        self
    }

    pub fn remove_noise(mut self, enabled: bool) -> Self {
        self.remove_noise = enabled;
        self
    }

    /// Enable dynamic RMSE over the `window` most recent observations.
    pub fn dynamic_rmse(mut self, window: usize) -> Self {
        self.dynamic_rmse = true;
        self.dynamic_rmse_window = window;
        self
    }

    /// Enable the slope test on `band` (or the first test band when `None`).
    pub fn slope_test(mut self, band: Option<usize>) -> Self {
        self.slope_test = true;
        self.slope_test_band = band;
        self
    }

    pub fn slope_test_alpha(mut self, alpha: f64) -> Self {
        self.slope_test_alpha = alpha;
        self
    }

    pub fn statistic(mut self, statistic: TestStatistic) -> Self {
        self.statistic = statistic;
        self
    }

    pub fn estimator(mut self, estimator: Estimator) -> Self {
        self.estimator = estimator;
        self
    }

    pub fn max_fit_retries(mut self, retries: usize) -> Self {
        self.max_fit_retries = retries;
        self
    }

    pub fn design(mut self, design: DesignSpec) -> Self {
        self.design = design;
        self
    }

    pub fn mask(mut self, mask: MaskConfig) -> Self {
        self.mask = mask;
        self
    }

    /// Check every parameter that does not depend on the input series.
    pub fn validate(&self) -> Result<()> {
        self.design.validate()?;
        let n_features = self.design.n_features();

        if self.min_obs < n_features {
            return Err(YatsmError::Configuration(format!(
                "min_obs ({}) must be at least the number of design features ({n_features})",
                self.min_obs
            )));
        }
        if !(self.threshold > 0.0 && self.threshold.is_finite()) {
            return Err(YatsmError::Configuration(
                "threshold must be positive and finite".into(),
            ));
        }
        if self.consecutive == 0 {
            return Err(YatsmError::Configuration(
                "consecutive must be at least 1".into(),
            ));
        }
        if !(self.min_rmse >= 0.0 && self.min_rmse.is_finite()) {
            return Err(YatsmError::Configuration(
                "min_rmse must be non-negative and finite".into(),
            ));
        }
        if !(self.retrain_time >= 0.0) || !(self.min_span_days >= 0.0) {
            return Err(YatsmError::Configuration(
                "retrain_time and min_span_days must be non-negative".into(),
            ));
        }
        if self.dynamic_rmse && self.dynamic_rmse_window == 0 {
            return Err(YatsmError::Configuration(
                "dynamic_rmse_window must be at least 1".into(),
            ));
        }
        if self.slope_test && !(self.slope_test_alpha > 0.0 && self.slope_test_alpha < 1.0) {
            return Err(YatsmError::Configuration(
                "slope_test_alpha must be in (0, 1)".into(),
            ));
        }
        for (i, idx) in self.test_indices.iter().enumerate() {
            if self.test_indices[..i].contains(idx) {
                return Err(YatsmError::Configuration(format!(
                    "test band {idx} listed twice"
                )));
            }
        }
        self.screening.validate()?;
        self.estimator.validate()?;
        self.mask.validate()?;
        Ok(())
    }

    /// Test bands resolved against the number of bands in a series.
    pub(crate) fn resolve_test_indices(&self, n_bands: usize) -> Result<Vec<usize>> {
        if self.test_indices.is_empty() {
            return Ok((0..n_bands).collect());
        }
        if let Some(&bad) = self.test_indices.iter().find(|&&b| b >= n_bands) {
            return Err(YatsmError::InvalidParameter(format!(
                "test band {bad} out of range for {n_bands} bands"
            )));
        }
        Ok(self.test_indices.clone())
    }
}
