//! # yatsm
//!
//! Per-pixel change detection and time segmentation for multi-band
//! satellite reflectance time series.
//!
//! The [`ChangeDetector`](detection::ChangeDetector) fits per-band harmonic
//! regressions to a growing window of observations, screens noise, tests new
//! observations against the fitted models and closes a segment once a break
//! is confirmed. Each segment is emitted as an immutable
//! [`SegmentRecord`](core::SegmentRecord) that the [`predict`] module can
//! evaluate, look up by date, or export.
//!
//! # Example
//!
//! ```
//! use yatsm::prelude::*;
//!
//! let dates: Vec<i64> = (0..48).map(|i| 730_120 + 30 * i).collect();
//! let band: Vec<f64> = (0..48)
//!     .map(|i| (if i < 30 { 1000.0 } else { 4000.0 }) + (i % 5) as f64)
//!     .collect();
//! let series = PixelSeries::from_columns(0, 0, &dates, &[band]).unwrap();
//!
//! let config = DetectorConfig::default().min_obs(12).threshold(3.0);
//! let result = ChangeDetector::new(config).unwrap().detect(&series).unwrap();
//!
//! let records = result.records.as_slice();
//! assert_eq!(records.len(), 2);
//! assert_eq!(records[0].break_date, dates[30]);
//! ```

// Allow some clippy warnings for cleaner code in specific cases
#![allow(clippy::upper_case_acronyms)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::needless_range_loop)]

pub mod core;
pub mod design;
pub mod detection;
pub mod error;
pub mod predict;
pub mod regression;
pub mod screening;
pub mod utils;

pub use error::{Result, YatsmError};

pub mod prelude {
    pub use crate::core::{Observation, PixelSeries, RecordStore, SegmentRecord};
    pub use crate::design::DesignSpec;
    pub use crate::detection::{
        detect_batch, ChangeDetector, DetectionResult, DetectionStatus, DetectorConfig,
        TestStatistic,
    };
    pub use crate::error::{Result, YatsmError};
    pub use crate::predict::{LookupPolicy, Predictor, TieBreak};
    pub use crate::regression::{Estimator, RegressionFitter};
    pub use crate::screening::{MaskConfig, Screening};
    pub use crate::utils::CancelToken;
}
