//! Per-pixel change detection and segmentation.
//!
//! The detector walks a pixel's usable observations once, driving an explicit
//! state machine:
//!
//! ```text
//! Accumulating --trained--> Monitoring --break / series end--> Closing
//!      ^                                                          |
//!      +------------------- break confirmed ----------------------+
//!                                 series end --> Done
//! ```
//!
//! Each `Closing` step appends one immutable [`SegmentRecord`].

use super::config::DetectorConfig;
use crate::core::{CoefficientMatrix, PixelSeries, RecordStore, SegmentRecord};
use crate::design::DesignMatrix;
use crate::error::{Result, YatsmError};
use crate::regression::{fit_bands, ols_fit, BandFit, RegressionFitter};
use crate::utils::stats::{median, root_mean_square, student_t_critical};
use crate::utils::CancelToken;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Phase of the per-pixel state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorState {
    /// Building a training window.
    Accumulating,
    /// Testing new observations against a trained model.
    Monitoring,
    /// Emitting the record of the current segment.
    Closing,
    /// Observations exhausted.
    Done,
}

/// How detection of one pixel ended.
#[derive(Debug, Clone, PartialEq)]
pub enum DetectionStatus {
    /// The whole series was processed.
    Completed,
    /// Fewer usable observations than `min_obs`; no records were produced.
    InsufficientData { needed: usize, got: usize },
    /// Repeated fit failures stopped processing at `date`. Records emitted
    /// before that point are kept.
    Abandoned { date: i64, error: YatsmError },
}

/// Records and completion status of one pixel.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionResult {
    pub records: RecordStore,
    pub status: DetectionStatus,
}

impl DetectionResult {
    pub fn is_completed(&self) -> bool {
        self.status == DetectionStatus::Completed
    }
}

/// Change detector shared across pixels.
///
/// `detect` has no side effects, so one detector can serve many threads.
#[derive(Debug, Clone)]
pub struct ChangeDetector {
    config: DetectorConfig,
    fitter: Arc<dyn RegressionFitter>,
}

impl ChangeDetector {
    /// Create a detector, validating the configuration.
    pub fn new(config: DetectorConfig) -> Result<Self> {
        config.validate()?;
        let fitter: Arc<dyn RegressionFitter> = Arc::new(config.estimator.clone());
        Ok(Self { config, fitter })
    }

    /// Replace the configured estimator with a custom fitting strategy.
    pub fn with_fitter(mut self, fitter: impl RegressionFitter + 'static) -> Self {
        self.fitter = Arc::new(fitter);
        self
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Name of the fitting strategy in use.
    pub fn fitter_name(&self) -> &str {
        self.fitter.name()
    }

    /// Segment one pixel.
    ///
    /// Too few usable observations and repeated fit failures are reported in
    /// [`DetectionResult::status`]; errors are returned only for inputs that
    /// do not match the configuration.
    pub fn detect(&self, series: &PixelSeries) -> Result<DetectionResult> {
        self.run(series, None)
    }

    /// Like [`detect`](Self::detect), polling `cancel` before every step.
    pub fn detect_with_cancel(
        &self,
        series: &PixelSeries,
        cancel: &CancelToken,
    ) -> Result<DetectionResult> {
        self.run(series, Some(cancel))
    }

    fn run(&self, series: &PixelSeries, cancel: Option<&CancelToken>) -> Result<DetectionResult> {
        let _span = tracing::debug_span!("detect", px = series.px(), py = series.py()).entered();

        let usable = self.config.mask.valid_indices(series)?;
        if usable.len() < self.config.min_obs {
            debug!(
                usable = usable.len(),
                min_obs = self.config.min_obs,
                "not enough usable observations"
            );
            return Ok(DetectionResult {
                records: RecordStore::new(),
                status: DetectionStatus::InsufficientData {
                    needed: self.config.min_obs,
                    got: usable.len(),
                },
            });
        }

        let pixel = PixelContext::new(&self.config, self.fitter.as_ref(), series, &usable)?;
        let mut state = ModelState::new();
        let mut records = RecordStore::new();

        while state.phase != DetectorState::Done {
            if let Some(token) = cancel {
                token.check()?;
            }
            let step = match state.phase {
                DetectorState::Accumulating => pixel.accumulate(&mut state),
                DetectorState::Monitoring => pixel.monitor(&mut state),
                DetectorState::Closing => pixel.close(&mut state, &mut records),
                DetectorState::Done => Ok(()),
            };

            match step {
                Ok(()) => {}
                Err(error @ YatsmError::FitFailure(_)) => {
                    let date = pixel.dates[state.next.saturating_sub(1)];
                    warn!(
                        date,
                        retries = state.retries,
                        error = %error,
                        records = records.len(),
                        "abandoning pixel after repeated fit failures"
                    );
                    return Ok(DetectionResult {
                        records,
                        status: DetectionStatus::Abandoned { date, error },
                    });
                }
                Err(error) => return Err(error),
            }
        }

        debug!(records = records.len(), "pixel complete");
        Ok(DetectionResult {
            records,
            status: DetectionStatus::Completed,
        })
    }
}

/// Mutable state of one pixel.
#[derive(Debug)]
struct ModelState {
    phase: DetectorState,
    /// Positions (into the usable observations) the model is fitted on.
    window: Vec<usize>,
    /// Next position to consume.
    next: usize,
    /// Current fit of every band.
    fits: Vec<BandFit>,
    /// Unconfirmed run of exceedances.
    pending: Vec<usize>,
    /// Position of the confirmed break, `None` when closing at series end.
    break_at: Option<usize>,
    retries: usize,
    last_train: i64,
}

impl ModelState {
    fn new() -> Self {
        Self {
            phase: DetectorState::Accumulating,
            window: Vec::new(),
            next: 0,
            fits: Vec::new(),
            pending: Vec::new(),
            break_at: None,
            retries: 0,
            last_train: 0,
        }
    }
}

/// Read-only inputs of one pixel, restricted to usable observations.
struct PixelContext<'a> {
    config: &'a DetectorConfig,
    fitter: &'a dyn RegressionFitter,
    px: u32,
    py: u32,
    dates: Vec<i64>,
    /// values[band][position]
    values: Vec<Vec<f64>>,
    x: DesignMatrix,
    test_indices: Vec<usize>,
    slope_band: usize,
    slope_index: usize,
}

impl<'a> PixelContext<'a> {
    fn new(
        config: &'a DetectorConfig,
        fitter: &'a dyn RegressionFitter,
        series: &PixelSeries,
        usable: &[usize],
    ) -> Result<Self> {
        let n_bands = series.n_bands();
        let test_indices = config.resolve_test_indices(n_bands)?;

        if let Some(band) = config.screening.max_band() {
            if band >= n_bands {
                return Err(YatsmError::InvalidParameter(format!(
                    "screening band {band} out of range for {n_bands} bands"
                )));
            }
        }

        let slope_band = config
            .slope_test_band
            .or_else(|| test_indices.first().copied())
            .unwrap_or(0);
        if config.slope_test && slope_band >= n_bands {
            return Err(YatsmError::InvalidParameter(format!(
                "slope test band {slope_band} out of range for {n_bands} bands"
            )));
        }

        let observations = series.observations();
        let dates: Vec<i64> = usable.iter().map(|&i| observations[i].date).collect();
        let values = (0..n_bands)
            .map(|b| usable.iter().map(|&i| observations[i].bands[b]).collect())
            .collect();
        let x = config.design.build(&dates)?;

        Ok(Self {
            config,
            fitter,
            px: series.px(),
            py: series.py(),
            dates,
            values,
            x,
            test_indices,
            slope_band,
            slope_index: config.design.slope_index()?,
        })
    }

    fn len(&self) -> usize {
        self.dates.len()
    }

    fn n_bands(&self) -> usize {
        self.values.len()
    }

    fn window_ready(&self, window: &[usize]) -> bool {
        match (window.first(), window.last()) {
            (Some(&first), Some(&last)) => {
                window.len() >= self.config.min_obs
                    && (self.dates[last] - self.dates[first]) as f64 >= self.config.min_span_days
            }
            _ => false,
        }
    }

    fn fit_window(&self, window: &[usize]) -> Result<Vec<BandFit>> {
        let x = self.x.select(window);
        let bands: Vec<Vec<f64>> = self
            .values
            .iter()
            .map(|band| window.iter().map(|&p| band[p]).collect())
            .collect();
        fit_bands(self.fitter, &x, &bands)
    }

    fn residual(&self, fits: &[BandFit], band: usize, pos: usize) -> f64 {
        self.values[band][pos] - fits[band].predict_row(self.x.row(pos))
    }

    fn floor_rmse(&self, rmse: f64) -> f64 {
        rmse.max(self.config.min_rmse).max(f64::MIN_POSITIVE)
    }

    /// RMSE of each test band used to normalize residuals.
    fn test_rmse(&self, state: &ModelState) -> Vec<f64> {
        self.test_indices
            .iter()
            .map(|&b| {
                let rmse = if self.config.dynamic_rmse {
                    let skip = state
                        .window
                        .len()
                        .saturating_sub(self.config.dynamic_rmse_window);
                    let recent: Vec<f64> = state.window[skip..]
                        .iter()
                        .map(|&p| self.residual(&state.fits, b, p))
                        .collect();
                    root_mean_square(&recent)
                } else {
                    state.fits[b].rmse
                };
                self.floor_rmse(rmse)
            })
            .collect()
    }

    /// Combined test statistic of one observation.
    fn statistic(&self, fits: &[BandFit], rmse: &[f64], pos: usize) -> f64 {
        let z: Vec<f64> = self
            .test_indices
            .iter()
            .zip(rmse)
            .map(|(&b, r)| self.residual(fits, b, pos) / r)
            .collect();
        self.config.statistic.combine(&z)
    }

    /// A training window is stable when, in RMSE units, the fitted trend
    /// across it plus the residuals of its first and last observations stays
    /// within `threshold`. A step inside the window shows up in the trend.
    fn is_stable(&self, window: &[usize], fits: &[BandFit]) -> bool {
        let (first, last) = (window[0], window[window.len() - 1]);
        let span = (self.dates[last] - self.dates[first]) as f64;
        let z: Vec<f64> = self
            .test_indices
            .iter()
            .map(|&b| {
                let trend = (fits[b].coefficients[self.slope_index] * span).abs();
                let ends = self.residual(fits, b, first).abs() + self.residual(fits, b, last).abs();
                (trend + ends) / self.floor_rmse(fits[b].rmse)
            })
            .collect();
        self.config.statistic.combine(&z) <= self.config.threshold
    }

    /// Count a fit failure; the error is returned once retries are exhausted.
    fn fit_failed(&self, state: &mut ModelState, error: YatsmError) -> Result<()> {
        state.retries += 1;
        if state.retries > self.config.max_fit_retries {
            return Err(error);
        }
        debug!(retries = state.retries, error = %error, "fit failed, waiting for more observations");
        Ok(())
    }

    fn screen(&self, window: &mut Vec<usize>) {
        let x = self.x.select(window);
        let dates: Vec<i64> = window.iter().map(|&p| self.dates[p]).collect();
        let bands: Vec<Vec<f64>> = self
            .values
            .iter()
            .map(|band| window.iter().map(|&p| band[p]).collect())
            .collect();

        match self
            .config
            .screening
            .flag(&x, &dates, &bands, &self.test_indices)
        {
            Ok(flagged) if !flagged.is_empty() => {
                trace!(flagged = flagged.len(), "screening removed observations");
                let mut keep = vec![true; window.len()];
                for i in flagged {
                    keep[i] = false;
                }
                let mut i = 0;
                window.retain(|_| {
                    i += 1;
                    keep[i - 1]
                });
            }
            Ok(_) => {}
            Err(error) => debug!(error = %error, "screening fit failed, window left unscreened"),
        }
    }

    fn accumulate(&self, state: &mut ModelState) -> Result<()> {
        if state.next >= self.len() {
            if !state.window.is_empty() {
                debug!(nobs = state.window.len(), "discarding incomplete training window");
            }
            state.phase = DetectorState::Done;
            return Ok(());
        }

        state.window.push(state.next);
        state.next += 1;
        if !self.window_ready(&state.window) {
            return Ok(());
        }

        if self.config.screening.is_enabled() {
            self.screen(&mut state.window);
            if !self.window_ready(&state.window) {
                return Ok(());
            }
        }

        let fits = match self.fit_window(&state.window) {
            Ok(fits) => fits,
            Err(error @ YatsmError::FitFailure(_)) => return self.fit_failed(state, error),
            Err(error) => return Err(error),
        };

        if !self.is_stable(&state.window, &fits) {
            let dropped = state.window.remove(0);
            trace!(date = self.dates[dropped], "unstable training window, dropping first observation");
            return Ok(());
        }

        let start = self.dates[state.window[0]];
        let end = self.dates[state.window[state.window.len() - 1]];
        debug!(start, end, nobs = state.window.len(), "model trained");

        state.fits = fits;
        state.retries = 0;
        state.last_train = end;
        state.phase = DetectorState::Monitoring;
        Ok(())
    }

    /// Resolve an unconfirmed exceedance run that did not become a break.
    fn settle_pending(&self, state: &mut ModelState) {
        if state.pending.is_empty() {
            return;
        }
        if self.config.remove_noise {
            trace!(count = state.pending.len(), "dropping noise observations");
            state.pending.clear();
        } else {
            state.window.append(&mut state.pending);
        }
    }

    /// Add one observation to the window, refitting when the model is due.
    fn incorporate(&self, state: &mut ModelState, pos: usize) -> Result<()> {
        state.window.push(pos);
        let date = self.dates[pos];
        if ((date - state.last_train) as f64) < self.config.retrain_time {
            return Ok(());
        }

        match self.fit_window(&state.window) {
            Ok(fits) => {
                trace!(date, nobs = state.window.len(), "model refit");
                state.fits = fits;
                state.last_train = date;
                state.retries = 0;
                Ok(())
            }
            Err(error @ YatsmError::FitFailure(_)) => self.fit_failed(state, error),
            Err(error) => Err(error),
        }
    }

    /// Whether the pending run is explained by a significant trend in the slope-test band.
    fn is_drift(&self, state: &ModelState) -> bool {
        let band = self.slope_band;
        let positions: Vec<usize> = state.window.iter().chain(&state.pending).copied().collect();
        let x = self.x.select(&positions);
        let y: Vec<f64> = positions.iter().map(|&p| self.values[band][p]).collect();

        let fit = match ols_fit(&x, &y) {
            Ok(fit) => fit,
            Err(error) => {
                trace!(error = %error, "slope test fit failed");
                return false;
            }
        };
        let Some(critical) = student_t_critical(self.config.slope_test_alpha, fit.dof as f64)
        else {
            return false;
        };
        if !(fit.t_statistic(self.slope_index).abs() > critical) {
            return false;
        }

        let rmse = self.floor_rmse(fit.rmse);
        state.pending.iter().all(|&p| {
            let predicted: f64 = self
                .x
                .row(p)
                .iter()
                .zip(&fit.coefficients)
                .map(|(x, b)| x * b)
                .sum();
            ((self.values[band][p] - predicted) / rmse).abs() <= self.config.threshold
        })
    }

    fn monitor(&self, state: &mut ModelState) -> Result<()> {
        if state.next >= self.len() {
            state.break_at = None;
            state.phase = DetectorState::Closing;
            return Ok(());
        }

        let pos = state.next;
        state.next += 1;

        let rmse = self.test_rmse(state);
        let statistic = self.statistic(&state.fits, &rmse, pos);
        if statistic <= self.config.threshold {
            self.settle_pending(state);
            return self.incorporate(state, pos);
        }

        trace!(date = self.dates[pos], statistic, "exceedance");
        state.pending.push(pos);
        if state.pending.len() < self.config.consecutive {
            return Ok(());
        }

        if self.config.slope_test && self.is_drift(state) {
            let first = state.pending.remove(0);
            debug!(date = self.dates[first], "exceedances explained by gradual drift");
            return self.incorporate(state, first);
        }

        state.break_at = Some(state.pending[0]);
        state.phase = DetectorState::Closing;
        Ok(())
    }

    fn close(&self, state: &mut ModelState, records: &mut RecordStore) -> Result<()> {
        let break_at = state.break_at.take();
        if break_at.is_none() {
            self.settle_pending(state);
        }

        match self.fit_window(&state.window) {
            Ok(fits) => state.fits = fits,
            Err(error @ YatsmError::FitFailure(_)) => {
                self.fit_failed(state, error)?;
                debug!("closing refit failed, keeping monitoring model");
            }
            Err(error) => return Err(error),
        }

        let magnitude = match break_at {
            Some(_) => (0..self.n_bands())
                .map(|b| {
                    let residuals: Vec<f64> = state
                        .pending
                        .iter()
                        .map(|&p| self.residual(&state.fits, b, p))
                        .collect();
                    median(&residuals)
                })
                .collect(),
            None => vec![0.0; self.n_bands()],
        };

        let coefficients: Vec<Vec<f64>> =
            state.fits.iter().map(|f| f.coefficients.clone()).collect();
        let record = SegmentRecord {
            start: self.dates[state.window[0]],
            end: self.dates[state.window[state.window.len() - 1]],
            break_date: break_at.map_or(0, |p| self.dates[p]),
            coef: CoefficientMatrix::from_bands(&coefficients)?,
            rmse: state.fits.iter().map(|f| f.rmse).collect(),
            magnitude,
            nobs: state.window.len(),
            px: self.px,
            py: self.py,
        };

        match break_at {
            Some(pos) => {
                debug!(
                    start = record.start,
                    end = record.end,
                    break_date = record.break_date,
                    nobs = record.nobs,
                    "break confirmed"
                );
                state.window.clear();
                state.pending.clear();
                state.next = pos;
                state.retries = 0;
                state.phase = DetectorState::Accumulating;
            }
            None => {
                debug!(start = record.start, end = record.end, nobs = record.nobs, "final segment");
                state.phase = DetectorState::Done;
            }
        }
        records.append(record)
    }
}
