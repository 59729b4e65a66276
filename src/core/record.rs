//! Segment records and the per-pixel record store.

use crate::error::{Result, YatsmError};

/// Coefficients of one segment, shaped `n_features x n_bands`.
///
/// Column `b` holds the regression coefficients of band `b`.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct CoefficientMatrix {
    n_features: usize,
    n_bands: usize,
    /// Row-major storage: data[feature * n_bands + band]
    data: Vec<f64>,
}

impl CoefficientMatrix {
    /// Create a zero matrix.
    pub fn zeros(n_features: usize, n_bands: usize) -> Self {
        Self {
            n_features,
            n_bands,
            data: vec![0.0; n_features * n_bands],
        }
    }

    /// Assemble from per-band coefficient vectors (all of length `n_features`).
    pub fn from_bands(bands: &[Vec<f64>]) -> Result<Self> {
        let n_bands = bands.len();
        let n_features = bands.first().map_or(0, Vec::len);
        let mut matrix = Self::zeros(n_features, n_bands);

        for (b, coefs) in bands.iter().enumerate() {
            if coefs.len() != n_features {
                return Err(YatsmError::DimensionMismatch {
                    expected: n_features,
                    got: coefs.len(),
                });
            }
            for (f, &c) in coefs.iter().enumerate() {
                matrix.data[f * n_bands + b] = c;
            }
        }

        Ok(matrix)
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_bands(&self) -> usize {
        self.n_bands
    }

    pub fn get(&self, feature: usize, band: usize) -> f64 {
        self.data[feature * self.n_bands + band]
    }

    /// Coefficient vector of a single band.
    pub fn band(&self, band: usize) -> Vec<f64> {
        (0..self.n_features).map(|f| self.get(f, band)).collect()
    }

    /// Coefficients of a single feature across bands.
    pub fn feature(&self, feature: usize) -> &[f64] {
        let start = feature * self.n_bands;
        &self.data[start..start + self.n_bands]
    }

    /// Dot product of one band's coefficients with a design row.
    pub fn predict_band(&self, band: usize, row: &[f64]) -> f64 {
        row.iter()
            .enumerate()
            .map(|(f, x)| self.get(f, band) * x)
            .sum()
    }
}

/// A closed time segment of one pixel.
///
/// Records are created once by the change detector and never mutated.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentRecord {
    /// Ordinal date of the first observation in the segment.
    pub start: i64,
    /// Ordinal date of the last observation in the segment.
    pub end: i64,
    /// Date of the detected break, or 0 when the series ended without one.
    #[cfg_attr(feature = "serde", serde(rename = "break"))]
    pub break_date: i64,
    pub coef: CoefficientMatrix,
    pub rmse: Vec<f64>,
    /// Median residual of the observations confirming the break, per band.
    pub magnitude: Vec<f64>,
    /// Number of observations the segment was fitted on.
    pub nobs: usize,
    pub px: u32,
    pub py: u32,
}

impl SegmentRecord {
    /// Whether the segment ended in a detected disturbance.
    pub fn has_break(&self) -> bool {
        self.break_date != 0
    }

    /// Whether `date` falls within `[start, end]`.
    pub fn contains(&self, date: i64) -> bool {
        self.start <= date && date <= self.end
    }

    pub fn span_days(&self) -> i64 {
        self.end - self.start
    }

    pub fn n_bands(&self) -> usize {
        self.coef.n_bands()
    }
}

/// Append-only, temporally ordered sequence of segment records for one pixel.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordStore {
    records: Vec<SegmentRecord>,
}

impl RecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record.
    ///
    /// Fails if the record is malformed (`start > end`) or starts before the previous one ends.
    pub fn append(&mut self, record: SegmentRecord) -> Result<()> {
        if record.start > record.end {
            return Err(YatsmError::InvalidParameter(format!(
                "segment start {} is after end {}",
                record.start, record.end
            )));
        }
        if let Some(last) = self.records.last() {
            if record.start < last.end {
                return Err(YatsmError::InvalidParameter(format!(
                    "segment starting {} overlaps previous segment ending {}",
                    record.start, last.end
                )));
            }
        }
        self.records.push(record);
        Ok(())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SegmentRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn last(&self) -> Option<&SegmentRecord> {
        self.records.last()
    }

    pub fn as_slice(&self) -> &[SegmentRecord] {
        &self.records
    }

    pub fn into_vec(self) -> Vec<SegmentRecord> {
        self.records
    }
}

impl<'a> IntoIterator for &'a RecordStore {
    type Item = &'a SegmentRecord;
    type IntoIter = std::slice::Iter<'a, SegmentRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

impl IntoIterator for RecordStore {
    type Item = SegmentRecord;
    type IntoIter = std::vec::IntoIter<SegmentRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}
