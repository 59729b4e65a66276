//! Change detection and time segmentation.
//!
//! [`ChangeDetector`] segments a single pixel's observations into stable
//! regimes, each summarized by a [`SegmentRecord`](crate::core::SegmentRecord).
//! [`detect_batch`] runs many pixels.
//!
//! # Example
//!
//! ```
//! use yatsm::core::PixelSeries;
//! use yatsm::detection::{ChangeDetector, DetectorConfig};
//!
//! let dates: Vec<i64> = (0..40).map(|i| 730_120 + 30 * i).collect();
//! let band: Vec<f64> = dates.iter().map(|&d| 1000.0 + (d % 7) as f64).collect();
//! let series = PixelSeries::from_columns(0, 0, &dates, &[band]).unwrap();
//!
//! let detector = ChangeDetector::new(DetectorConfig::default().min_obs(12)).unwrap();
//! let result = detector.detect(&series).unwrap();
//! assert_eq!(result.records.len(), 1);
//! assert!(!result.records.as_slice()[0].has_break());
//! ```

mod batch;
mod ccdc;
mod config;

pub use batch::{detect_batch, detect_batch_with_cancel, PixelOutcome};
pub use ccdc::{ChangeDetector, DetectionResult, DetectionStatus, DetectorState};
pub use config::{
    DetectorConfig, TestStatistic, DEFAULT_CONSECUTIVE, DEFAULT_DYNAMIC_RMSE_WINDOW,
    DEFAULT_MAX_FIT_RETRIES, DEFAULT_MIN_OBS, DEFAULT_MIN_RMSE, DEFAULT_MIN_SPAN_DAYS,
    DEFAULT_RETRAIN_TIME, DEFAULT_SLOPE_TEST_ALPHA, DEFAULT_THRESHOLD,
};
