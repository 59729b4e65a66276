//! Multi-pixel driver.
//!
//! Pixels are independent, so they are processed with `rayon` when the
//! `parallel` feature is enabled and sequentially otherwise. A failing pixel
//! never aborts the batch: its error is logged and returned in its slot.

use super::ccdc::{ChangeDetector, DetectionResult};
use crate::core::PixelSeries;
use crate::error::{Result, YatsmError};
use crate::utils::CancelToken;
use tracing::warn;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Outcome of one pixel in a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelOutcome {
    pub px: u32,
    pub py: u32,
    pub result: Result<DetectionResult>,
}

fn detect_one(
    detector: &ChangeDetector,
    series: &PixelSeries,
    cancel: Option<&CancelToken>,
) -> PixelOutcome {
    let result = match cancel {
        Some(token) => detector.detect_with_cancel(series, token),
        None => detector.detect(series),
    };
    if let Err(error) = &result {
        if *error != YatsmError::Cancelled {
            warn!(px = series.px(), py = series.py(), error = %error, "pixel skipped");
        }
    }
    PixelOutcome {
        px: series.px(),
        py: series.py(),
        result,
    }
}

/// Run the detector over many pixels, preserving input order.
pub fn detect_batch(detector: &ChangeDetector, pixels: &[PixelSeries]) -> Vec<PixelOutcome> {
    run_batch(detector, pixels, None)
}

/// Like [`detect_batch`], stopping early once `cancel` is set.
///
/// Returns `Cancelled` instead of partial per-pixel results.
pub fn detect_batch_with_cancel(
    detector: &ChangeDetector,
    pixels: &[PixelSeries],
    cancel: &CancelToken,
) -> Result<Vec<PixelOutcome>> {
    let outcomes = run_batch(detector, pixels, Some(cancel));
    cancel.check()?;
    Ok(outcomes)
}

fn run_batch(
    detector: &ChangeDetector,
    pixels: &[PixelSeries],
    cancel: Option<&CancelToken>,
) -> Vec<PixelOutcome> {
    #[cfg(feature = "parallel")]
    {
        pixels
            .par_iter()
            .map(|series| detect_one(detector, series, cancel))
            .collect()
    }
    #[cfg(not(feature = "parallel"))]
    {
        pixels
            .iter()
            .map(|series| detect_one(detector, series, cancel))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::DetectorConfig;

    fn pixel(px: u32, n: usize) -> PixelSeries {
        let dates: Vec<i64> = (0..n as i64).map(|i| 730_120 + 30 * i).collect();
        let values = vec![dates.iter().map(|&d| 1000.0 + ((d * 13) % 17) as f64).collect()];
        PixelSeries::from_columns(px, 0, &dates, &values).unwrap()
    }

    #[test]
    fn outcomes_follow_input_order() {
        let detector = ChangeDetector::new(DetectorConfig::default().min_obs(12)).unwrap();
        let pixels: Vec<PixelSeries> = (0..6).map(|px| pixel(px, 30)).collect();
        let outcomes = detect_batch(&detector, &pixels);
        let order: Vec<u32> = outcomes.iter().map(|o| o.px).collect();
        assert_eq!(order, vec![0, 1, 2, 3, 4, 5]);
        assert!(outcomes.iter().all(|o| o.result.is_ok()));
    }

    #[test]
    fn bad_pixel_does_not_abort_batch() {
        let detector = ChangeDetector::new(
            DetectorConfig::default().min_obs(12).test_indices(vec![1]),
        )
        .unwrap();
        let pixels = vec![pixel(0, 30), pixel(1, 30)];
        let outcomes = detect_batch(&detector, &pixels);
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(|o| o.result.is_err()));
    }

    #[test]
    fn cancelled_batch_reports_cancellation() {
        let detector = ChangeDetector::new(DetectorConfig::default().min_obs(12)).unwrap();
        let token = CancelToken::new();
        token.cancel();
        let pixels = vec![pixel(0, 30)];
        assert_eq!(
            detect_batch_with_cancel(&detector, &pixels, &token).unwrap_err(),
            YatsmError::Cancelled
        );
    }
}
