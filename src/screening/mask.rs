//! Physical validity filters applied before any fitting.

use crate::core::{Observation, PixelSeries};
use crate::error::{Result, YatsmError};

/// Fmask codes for cloud shadow, snow, cloud and fill.
pub const DEFAULT_MASK_VALUES: [i32; 4] = [2, 3, 4, 255];

/// Range mask plus mask-band code filter.
///
/// Empty `min_values`/`max_values` disable the range check. Non-finite band
/// values are always invalid.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct MaskConfig {
    pub min_values: Vec<f64>,
    pub max_values: Vec<f64>,
    /// Mask-band codes marking an observation as unusable.
    pub mask_values: Vec<i32>,
}

impl Default for MaskConfig {
    fn default() -> Self {
        Self {
            min_values: Vec::new(),
            max_values: Vec::new(),
            mask_values: DEFAULT_MASK_VALUES.to_vec(),
        }
    }
}

impl MaskConfig {
    /// Set per-band inclusive valid ranges.
    pub fn valid_range(mut self, min_values: Vec<f64>, max_values: Vec<f64>) -> Self {
        self.min_values = min_values;
        self.max_values = max_values;
        self
    }

    /// Apply the same valid range to `n_bands` bands.
    pub fn uniform_range(self, n_bands: usize, min: f64, max: f64) -> Self {
        self.valid_range(vec![min; n_bands], vec![max; n_bands])
    }

    /// Set the invalid mask codes.
    pub fn mask_values(mut self, codes: Vec<i32>) -> Self {
        self.mask_values = codes;
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.min_values.len() != self.max_values.len() {
            return Err(YatsmError::Configuration(format!(
                "{} minimum values but {} maximum values",
                self.min_values.len(),
                self.max_values.len()
            )));
        }
        if let Some(b) = self
            .min_values
            .iter()
            .zip(&self.max_values)
            .position(|(lo, hi)| !(lo <= hi))
        {
            return Err(YatsmError::Configuration(format!(
                "invalid valid range for band {b}"
            )));
        }
        Ok(())
    }

    fn has_range(&self) -> bool {
        !self.min_values.is_empty()
    }

    /// Whether a single observation passes both filters.
    pub fn is_valid(&self, obs: &Observation) -> bool {
        if self.mask_values.contains(&obs.mask) {
            return false;
        }
        if !obs.bands.iter().all(|v| v.is_finite()) {
            return false;
        }
        if self.has_range() {
            return obs
                .bands
                .iter()
                .zip(self.min_values.iter().zip(&self.max_values))
                .all(|(v, (lo, hi))| *lo <= *v && *v <= *hi);
        }
        true
    }

    /// Indices of the observations in `series` that pass both filters.
    pub fn valid_indices(&self, series: &PixelSeries) -> Result<Vec<usize>> {
        if self.has_range() && self.min_values.len() != series.n_bands() {
            return Err(YatsmError::DimensionMismatch {
                expected: series.n_bands(),
                got: self.min_values.len(),
            });
        }
        Ok(series
            .observations()
            .iter()
            .enumerate()
            .filter(|(_, obs)| self.is_valid(obs))
            .map(|(i, _)| i)
            .collect())
    }
}
