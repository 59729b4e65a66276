//! Design matrix construction from ordinal dates.
//!
//! A [`DesignSpec`] lists the regression terms in column order. Every design
//! must include a slope term: the date itself, used to normalize intercepts to
//! the temporal midpoint of a segment at export time.
//!
//! # Example
//!
//! ```
//! use yatsm::design::DesignSpec;
//!
//! let spec = DesignSpec::new().intercept().slope().harmonics(&[1, 2]);
//! assert_eq!(spec.column_names(), vec!["intercept", "slope", "sin1", "cos1", "sin2", "cos2"]);
//! assert_eq!(spec.slope_index().unwrap(), 1);
//!
//! let x = spec.build(&[730_120, 730_150]).unwrap();
//! assert_eq!(x.n_rows(), 2);
//! assert_eq!(x.row(0)[1], 730_120.0);
//! ```

use crate::error::{Result, YatsmError};
use std::f64::consts::PI;

/// Length of the seasonal cycle in days.
pub const DAYS_PER_YEAR: f64 = 365.25;

/// A single regression term.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DesignTerm {
    /// Constant column of ones.
    Intercept,
    /// The ordinal date.
    Slope,
    /// Sine and cosine pair with `k` cycles per year.
    Harmonic(u32),
}

impl DesignTerm {
    fn n_columns(self) -> usize {
        match self {
            Self::Intercept | Self::Slope => 1,
            Self::Harmonic(_) => 2,
        }
    }
}

/// Ordered list of regression terms.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesignSpec {
    terms: Vec<DesignTerm>,
}

impl Default for DesignSpec {
    /// Intercept, slope and one annual harmonic.
    fn default() -> Self {
        Self::new().intercept().slope().harmonics(&[1])
    }
}

impl DesignSpec {
    /// Create an empty specification.
    pub fn new() -> Self {
        Self { terms: Vec::new() }
    }

    /// Create a specification from an explicit term list.
    pub fn from_terms(terms: Vec<DesignTerm>) -> Self {
        Self { terms }
    }

    /// Append an intercept term.
    pub fn intercept(mut self) -> Self {
        self.terms.push(DesignTerm::Intercept);
        self
    }

    /// Append a slope term.
    pub fn slope(mut self) -> Self {
        self.terms.push(DesignTerm::Slope);
        self
    }

    /// Append one harmonic pair per frequency.
    pub fn harmonics(mut self, frequencies: &[u32]) -> Self {
        self.terms
            .extend(frequencies.iter().map(|&k| DesignTerm::Harmonic(k)));
        self
    }

    pub fn terms(&self) -> &[DesignTerm] {
        &self.terms
    }

    /// Check the term list: exactly one slope, no duplicates, positive frequencies.
    pub fn validate(&self) -> Result<()> {
        if !self.terms.contains(&DesignTerm::Slope) {
            return Err(YatsmError::Configuration(
                "design must specify a slope term".into(),
            ));
        }
        for (i, term) in self.terms.iter().enumerate() {
            if self.terms[..i].contains(term) {
                return Err(YatsmError::Configuration(format!(
                    "duplicate design term {term:?}"
                )));
            }
            if *term == DesignTerm::Harmonic(0) {
                return Err(YatsmError::Configuration(
                    "harmonic frequency must be positive".into(),
                ));
            }
        }
        Ok(())
    }

    /// Total number of columns.
    pub fn n_features(&self) -> usize {
        self.terms.iter().map(|t| t.n_columns()).sum()
    }

    /// Column names in order.
    pub fn column_names(&self) -> Vec<String> {
        let mut names = Vec::with_capacity(self.n_features());
        for term in &self.terms {
            match term {
                DesignTerm::Intercept => names.push("intercept".to_string()),
                DesignTerm::Slope => names.push("slope".to_string()),
                DesignTerm::Harmonic(k) => {
                    names.push(format!("sin{k}"));
                    names.push(format!("cos{k}"));
                }
            }
        }
        names
    }

    fn column_of(&self, wanted: DesignTerm) -> Option<usize> {
        let mut col = 0;
        for &term in &self.terms {
            if term == wanted {
                return Some(col);
            }
            col += term.n_columns();
        }
        None
    }

    /// Column index of the slope term.
    pub fn slope_index(&self) -> Result<usize> {
        self.column_of(DesignTerm::Slope).ok_or_else(|| {
            YatsmError::Configuration("design must specify a slope term".into())
        })
    }

    /// Column index of the intercept term, if any.
    pub fn intercept_index(&self) -> Option<usize> {
        self.column_of(DesignTerm::Intercept)
    }

    /// Column indices of all harmonic terms.
    pub fn seasonality_indices(&self) -> Vec<usize> {
        let mut indices = Vec::new();
        let mut col = 0;
        for &term in &self.terms {
            if let DesignTerm::Harmonic(_) = term {
                indices.extend([col, col + 1]);
            }
            col += term.n_columns();
        }
        indices
    }

    /// Feature row for a single date.
    pub fn row(&self, date: i64) -> Vec<f64> {
        let t = date as f64;
        let mut row = Vec::with_capacity(self.n_features());
        for term in &self.terms {
            match *term {
                DesignTerm::Intercept => row.push(1.0),
                DesignTerm::Slope => row.push(t),
                DesignTerm::Harmonic(k) => {
                    let w = 2.0 * PI * f64::from(k) * t / DAYS_PER_YEAR;
                    row.push(w.sin());
                    row.push(w.cos());
                }
            }
        }
        row
    }

    /// Build the design matrix for a sequence of dates.
    pub fn build(&self, dates: &[i64]) -> Result<DesignMatrix> {
        self.validate()?;
        let n_cols = self.n_features();
        let mut data = Vec::with_capacity(dates.len() * n_cols);
        for &date in dates {
            data.extend(self.row(date));
        }
        Ok(DesignMatrix {
            n_rows: dates.len(),
            n_cols,
            data,
        })
    }
}

/// Dense row-major feature matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct DesignMatrix {
    n_rows: usize,
    n_cols: usize,
    data: Vec<f64>,
}

impl DesignMatrix {
    /// Create a matrix from row vectors of equal length.
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self> {
        let n_cols = rows.first().map_or(0, Vec::len);
        let mut data = Vec::with_capacity(rows.len() * n_cols);
        for row in rows {
            if row.len() != n_cols {
                return Err(YatsmError::DimensionMismatch {
                    expected: n_cols,
                    got: row.len(),
                });
            }
            data.extend_from_slice(row);
        }
        Ok(Self {
            n_rows: rows.len(),
            n_cols,
            data,
        })
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.n_cols..(i + 1) * self.n_cols]
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.data[i * self.n_cols + j]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f64]> {
        self.data.chunks_exact(self.n_cols.max(1)).take(self.n_rows)
    }

    /// Copy of the column `j`.
    pub fn column(&self, j: usize) -> Vec<f64> {
        (0..self.n_rows).map(|i| self.get(i, j)).collect()
    }

    /// New matrix holding the given rows, in the given order.
    pub fn select(&self, indices: &[usize]) -> Self {
        let mut data = Vec::with_capacity(indices.len() * self.n_cols);
        for &i in indices {
            data.extend_from_slice(self.row(i));
        }
        Self {
            n_rows: indices.len(),
            n_cols: self.n_cols,
            data,
        }
    }

    /// Matrix-vector product `X @ beta`.
    pub fn dot(&self, beta: &[f64]) -> Vec<f64> {
        self.rows()
            .map(|row| row.iter().zip(beta).map(|(x, b)| x * b).sum())
            .collect()
    }
}
