//! Coefficient export for mapping collaborators.
//!
//! Stored intercepts refer to date zero, which makes them meaningless on their
//! own for ordinal dates. Exported intercepts are moved to the temporal
//! midpoint of the segment.

use crate::core::{CoefficientMatrix, SegmentRecord};
use crate::design::DesignSpec;
use crate::error::{Result, YatsmError};

/// Which coefficient groups to export.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoefficientSelection {
    pub intercept: bool,
    pub slope: bool,
    pub seasonality: bool,
    pub rmse: bool,
}

impl Default for CoefficientSelection {
    fn default() -> Self {
        Self::all()
    }
}

impl CoefficientSelection {
    /// Every coefficient plus RMSE.
    pub fn all() -> Self {
        Self {
            intercept: true,
            slope: true,
            seasonality: true,
            rmse: true,
        }
    }

    /// Nothing selected.
    pub fn none() -> Self {
        Self {
            intercept: false,
            slope: false,
            seasonality: false,
            rmse: false,
        }
    }

    pub fn intercept(mut self, enabled: bool) -> Self {
        self.intercept = enabled;
        self
    }

    pub fn slope(mut self, enabled: bool) -> Self {
        self.slope = enabled;
        self
    }

    pub fn seasonality(mut self, enabled: bool) -> Self {
        self.seasonality = enabled;
        self
    }

    pub fn rmse(mut self, enabled: bool) -> Self {
        self.rmse = enabled;
        self
    }

    /// Selected design columns, in design order.
    pub fn feature_indices(&self, design: &DesignSpec) -> Result<Vec<usize>> {
        let slope = design.slope_index()?;
        let intercept = design.intercept_index();
        let seasonal = design.seasonality_indices();

        Ok((0..design.n_features())
            .filter(|&j| {
                (self.intercept && Some(j) == intercept)
                    || (self.slope && j == slope)
                    || (self.seasonality && seasonal.contains(&j))
            })
            .collect())
    }
}

fn check_features(record: &SegmentRecord, design: &DesignSpec) -> Result<()> {
    if record.coef.n_features() != design.n_features() {
        return Err(YatsmError::DimensionMismatch {
            expected: design.n_features(),
            got: record.coef.n_features(),
        });
    }
    Ok(())
}

/// Copy of the record's coefficients with the intercept moved to the segment midpoint:
/// `intercept += slope * (start + end) / 2`.
pub fn midpoint_normalized(record: &SegmentRecord, design: &DesignSpec) -> Result<CoefficientMatrix> {
    check_features(record, design)?;
    let slope = design.slope_index()?;
    let n_bands = record.coef.n_bands();

    let mut bands: Vec<Vec<f64>> = (0..n_bands).map(|b| record.coef.band(b)).collect();
    if let Some(intercept) = design.intercept_index() {
        let midpoint = (record.start + record.end) as f64 / 2.0;
        for coefs in &mut bands {
            coefs[intercept] += coefs[slope] * midpoint;
        }
    }
    CoefficientMatrix::from_bands(&bands)
}

/// Flatten the selected coefficients of the selected bands.
///
/// Layout: for each selected coefficient, one value per band; then, if
/// requested, one RMSE per band.
pub fn export_coefficients(
    record: &SegmentRecord,
    design: &DesignSpec,
    selection: &CoefficientSelection,
    bands: &[usize],
) -> Result<Vec<f64>> {
    let coef = midpoint_normalized(record, design)?;
    if let Some(&bad) = bands.iter().find(|&&b| b >= coef.n_bands()) {
        return Err(YatsmError::InvalidParameter(format!(
            "band {bad} out of range for {} bands",
            coef.n_bands()
        )));
    }

    let features = selection.feature_indices(design)?;
    let mut out = Vec::with_capacity(features.len() * bands.len() + bands.len());
    for &f in &features {
        out.extend(bands.iter().map(|&b| coef.get(f, b)));
    }
    if selection.rmse {
        out.extend(bands.iter().map(|&b| record.rmse[b]));
    }
    Ok(out)
}

/// Output names matching [`export_coefficients`]: `B{band}_beta{feature}` and
/// `B{band}_RMSE`, with 1-based band numbers.
pub fn export_names(
    design: &DesignSpec,
    selection: &CoefficientSelection,
    bands: &[usize],
) -> Result<Vec<String>> {
    let features = selection.feature_indices(design)?;
    let mut names = Vec::with_capacity(features.len() * bands.len() + bands.len());
    for f in &features {
        names.extend(bands.iter().map(|b| format!("B{}_beta{f}", b + 1)));
    }
    if selection.rmse {
        names.extend(bands.iter().map(|b| format!("B{}_RMSE", b + 1)));
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn record() -> SegmentRecord {
        // Two bands, design [intercept, slope, sin1, cos1]
        let coef = CoefficientMatrix::from_bands(&[
            vec![10.0, 0.5, 3.0, 4.0],
            vec![-20.0, 0.25, 1.0, 2.0],
        ])
        .unwrap();
        SegmentRecord {
            start: 100,
            end: 300,
            break_date: 0,
            coef,
            rmse: vec![7.0, 9.0],
            magnitude: vec![0.0, 0.0],
            nobs: 30,
            px: 1,
            py: 2,
        }
    }

    #[test]
    fn midpoint_normalization_leaves_record_untouched() {
        let rec = record();
        let before = rec.clone();
        let coef = midpoint_normalized(&rec, &DesignSpec::default()).unwrap();

        assert_relative_eq!(coef.get(0, 0), 10.0 + 0.5 * 200.0);
        assert_relative_eq!(coef.get(0, 1), -20.0 + 0.25 * 200.0);
        assert_eq!(coef.get(1, 0), 0.5);
        assert_eq!(rec, before);
    }

    #[test]
    fn export_layout_is_coefficient_major() {
        let values = export_coefficients(
            &record(),
            &DesignSpec::default(),
            &CoefficientSelection::none().intercept(true).slope(true).rmse(true),
            &[1, 0],
        )
        .unwrap();
        assert_eq!(values, vec![30.0, 110.0, 0.25, 0.5, 9.0, 7.0]);
    }

    #[test]
    fn seasonality_only() {
        let values = export_coefficients(
            &record(),
            &DesignSpec::default(),
            &CoefficientSelection::none().seasonality(true),
            &[0],
        )
        .unwrap();
        assert_eq!(values, vec![3.0, 4.0]);
    }

    #[test]
    fn names_match_layout() {
        let names = export_names(
            &DesignSpec::default(),
            &CoefficientSelection::none().slope(true).rmse(true),
            &[0, 2],
        )
        .unwrap();
        assert_eq!(names, vec!["B1_beta1", "B3_beta1", "B1_RMSE", "B3_RMSE"]);
    }

    #[test]
    fn mismatched_design_is_rejected() {
        let design = DesignSpec::new().intercept().slope();
        assert!(matches!(
            midpoint_normalized(&record(), &design),
            Err(YatsmError::DimensionMismatch { expected: 2, got: 4 })
        ));
    }

    #[test]
    fn out_of_range_band_is_rejected() {
        let result = export_coefficients(
            &record(),
            &DesignSpec::default(),
            &CoefficientSelection::all(),
            &[2],
        );
        assert!(result.is_err());
    }
}
