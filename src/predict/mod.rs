//! Reconstruction of band values from segment records.
//!
//! - [`Predictor`]: evaluate a record's models at arbitrary dates
//! - [`lookup`]: choose the record answering a query date
//! - [`export`]: midpoint-normalized coefficient export
//!
//! # Example
//!
//! ```
//! use yatsm::core::{CoefficientMatrix, SegmentRecord};
//! use yatsm::design::DesignSpec;
//! use yatsm::predict::Predictor;
//!
//! let record = SegmentRecord {
//!     start: 100,
//!     end: 200,
//!     break_date: 0,
//!     coef: CoefficientMatrix::from_bands(&[vec![5.0, 2.0]]).unwrap(),
//!     rmse: vec![0.0],
//!     magnitude: vec![0.0],
//!     nobs: 12,
//!     px: 0,
//!     py: 0,
//! };
//! let predictor = Predictor::new(DesignSpec::new().intercept().slope()).unwrap();
//! assert_eq!(predictor.predict(&record, &[150]).unwrap(), vec![vec![305.0]]);
//! ```

pub mod export;
pub mod lookup;

pub use export::{export_coefficients, export_names, midpoint_normalized, CoefficientSelection};
pub use lookup::{find_segment, LookupPolicy, TieBreak};

use crate::core::SegmentRecord;
use crate::design::DesignSpec;
use crate::error::{Result, YatsmError};

/// Evaluates stored segment models.
#[derive(Debug, Clone)]
pub struct Predictor {
    design: DesignSpec,
}

impl Predictor {
    /// Create a predictor for records fitted with `design`.
    pub fn new(design: DesignSpec) -> Result<Self> {
        design.validate()?;
        Ok(Self { design })
    }

    pub fn design(&self) -> &DesignSpec {
        &self.design
    }

    /// Predicted values, `result[date][band]`.
    ///
    /// Dates outside `[start, end]` are extrapolated.
    pub fn predict(&self, record: &SegmentRecord, dates: &[i64]) -> Result<Vec<Vec<f64>>> {
        if record.coef.n_features() != self.design.n_features() {
            return Err(YatsmError::DimensionMismatch {
                expected: self.design.n_features(),
                got: record.coef.n_features(),
            });
        }
        Ok(dates
            .iter()
            .map(|&date| {
                let row = self.design.row(date);
                (0..record.n_bands())
                    .map(|b| record.coef.predict_band(b, &row))
                    .collect()
            })
            .collect())
    }

    /// Predict one date from whichever record the lookup policy selects.
    ///
    /// Returns `Ok(None)` when no record is eligible.
    pub fn predict_at(
        &self,
        records: &[SegmentRecord],
        date: i64,
        policy: &LookupPolicy,
    ) -> Result<Option<Vec<f64>>> {
        let Some(record) = find_segment(records, date, policy)? else {
            return Ok(None);
        };
        let mut values = self.predict(record, &[date])?;
        Ok(values.pop())
    }
}
