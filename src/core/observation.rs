//! Per-pixel observation series.

use crate::error::{Result, YatsmError};

/// One multi-band sample of a pixel.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    /// Ordinal date (0001-01-01 = 1).
    pub date: i64,
    /// Reflectance values, one per spectral band.
    pub bands: Vec<f64>,
    /// Value of the cloud/shadow/fill mask band.
    pub mask: i32,
}

impl Observation {
    pub fn new(date: i64, bands: Vec<f64>, mask: i32) -> Self {
        Self { date, bands, mask }
    }

    /// Create an observation flagged as clear (mask code 0).
    pub fn clear(date: i64, bands: Vec<f64>) -> Self {
        Self::new(date, bands, 0)
    }

    pub fn n_bands(&self) -> usize {
        self.bands.len()
    }
}

/// Time-ordered observations for a single pixel.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct PixelSeries {
    px: u32,
    py: u32,
    n_bands: usize,
    observations: Vec<Observation>,
}

impl PixelSeries {
    /// Build a series, checking that dates never decrease and all band vectors agree in length.
    pub fn new(px: u32, py: u32, observations: Vec<Observation>) -> Result<Self> {
        let n_bands = observations.first().map_or(0, Observation::n_bands);

        for (i, obs) in observations.iter().enumerate() {
            if obs.n_bands() != n_bands {
                return Err(YatsmError::DimensionMismatch {
                    expected: n_bands,
                    got: obs.n_bands(),
                });
            }
            if i > 0 && obs.date < observations[i - 1].date {
                return Err(YatsmError::InvalidParameter(format!(
                    "observations must be time ordered: date {} follows {}",
                    obs.date,
                    observations[i - 1].date
                )));
            }
        }

        Ok(Self {
            px,
            py,
            n_bands,
            observations,
        })
    }

    /// Build a clear-sky series from parallel date and band-major value arrays.
    ///
    /// `values[band][observation]`, matching the column layout used elsewhere in the crate.
    pub fn from_columns(px: u32, py: u32, dates: &[i64], values: &[Vec<f64>]) -> Result<Self> {
        for band in values {
            if band.len() != dates.len() {
                return Err(YatsmError::DimensionMismatch {
                    expected: dates.len(),
                    got: band.len(),
                });
            }
        }

        let observations = dates
            .iter()
            .enumerate()
            .map(|(i, &date)| Observation::clear(date, values.iter().map(|b| b[i]).collect()))
            .collect();

        Self::new(px, py, observations)
    }

    pub fn px(&self) -> u32 {
        self.px
    }

    pub fn py(&self) -> u32 {
        self.py
    }

    pub fn n_bands(&self) -> usize {
        self.n_bands
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    pub fn dates(&self) -> Vec<i64> {
        self.observations.iter().map(|o| o.date).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_columns_transposes_band_major_values() {
        let dates = vec![10, 20, 30];
        let values = vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]];
        let series = PixelSeries::from_columns(3, 4, &dates, &values).unwrap();

        assert_eq!(series.len(), 3);
        assert_eq!(series.n_bands(), 2);
        assert_eq!(series.observations()[1].bands, vec![2.0, 5.0]);
        assert_eq!(series.observations()[1].mask, 0);
        assert_eq!((series.px(), series.py()), (3, 4));
        assert_eq!(series.dates(), dates);
    }

    #[test]
    fn rejects_unordered_dates() {
        let obs = vec![
            Observation::clear(20, vec![1.0]),
            Observation::clear(10, vec![1.0]),
        ];
        assert!(matches!(
            PixelSeries::new(0, 0, obs),
            Err(YatsmError::InvalidParameter(_))
        ));
    }

    #[test]
    fn accepts_repeated_dates() {
        let obs = vec![
            Observation::clear(10, vec![1.0]),
            Observation::clear(10, vec![2.0]),
        ];
        assert!(PixelSeries::new(0, 0, obs).is_ok());
    }

    #[test]
    fn rejects_ragged_bands() {
        let obs = vec![
            Observation::clear(10, vec![1.0, 2.0]),
            Observation::clear(20, vec![1.0]),
        ];
        assert_eq!(
            PixelSeries::new(0, 0, obs),
            Err(YatsmError::DimensionMismatch {
                expected: 2,
                got: 1
            })
        );
    }

    #[test]
    fn empty_series_is_valid() {
        let series = PixelSeries::new(0, 0, Vec::new()).unwrap();
        assert!(series.is_empty());
        assert_eq!(series.n_bands(), 0);
    }
}
