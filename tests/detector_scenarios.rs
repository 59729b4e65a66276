//! End-to-end detection scenarios on synthetic monthly series.

use approx::assert_relative_eq;
use rand::prelude::*;
use std::f64::consts::PI;
use yatsm::core::{ordinal_from_ymd, Observation, PixelSeries};
use yatsm::design::{DesignSpec, DAYS_PER_YEAR};
use yatsm::detection::{detect_batch, ChangeDetector, DetectionStatus, DetectorConfig};
use yatsm::predict::{export_coefficients, CoefficientSelection, LookupPolicy, Predictor, TieBreak};
use yatsm::regression::{Estimator, LassoConfig, LassoCv};
use yatsm::screening::Screening;
use yatsm::utils::CancelToken;
use yatsm::YatsmError;

const N_BANDS: usize = 4;
const NOISE: f64 = 30.0;

fn monthly_dates(n: usize) -> Vec<i64> {
    (0..n)
        .map(|m| ordinal_from_ymd(2000 + (m / 12) as i32, (m % 12) as u32 + 1, 15).unwrap())
        .collect()
}

/// Seasonal reflectance with uniform noise; `values[band][obs]`.
fn seasonal_values(dates: &[i64], seed: u64) -> Vec<Vec<f64>> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..N_BANDS)
        .map(|b| {
            dates
                .iter()
                .map(|&d| {
                    let w = 2.0 * PI * d as f64 / DAYS_PER_YEAR;
                    800.0 * (b + 1) as f64 + 300.0 * w.cos() - 120.0 * w.sin()
                        + rng.gen_range(-NOISE..NOISE)
                })
                .collect()
        })
        .collect()
}

/// Route detector logs to the test harness; set `RUST_LOG=yatsm=trace` to see them.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn scenario_config() -> DetectorConfig {
    DetectorConfig::default()
        .min_obs(12)
        .threshold(3.0)
        .consecutive(5)
        .min_rmse(50.0)
}

fn step_series(seed: u64) -> (Vec<i64>, PixelSeries) {
    let dates = monthly_dates(48);
    let mut values = seasonal_values(&dates, seed);
    for band in &mut values {
        for v in &mut band[30..] {
            *v += 3000.0;
        }
    }
    let series = PixelSeries::from_columns(10, 20, &dates, &values).unwrap();
    (dates, series)
}

#[test]
fn abrupt_step_yields_two_segments() {
    init_tracing();
    let (dates, series) = step_series(1);
    let detector = ChangeDetector::new(scenario_config()).unwrap();
    let result = detector.detect(&series).unwrap();

    assert!(result.is_completed());
    let records = result.records.as_slice();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].start, dates[0]);
    assert_eq!(records[0].break_date, dates[30]);
    assert_eq!(records[0].end, dates[29]);
    assert_eq!(records[1].break_date, 0);
    assert_eq!(records[1].end, dates[47]);
    assert!(records[0].end <= records[1].start);
    for b in 0..N_BANDS {
        assert_relative_eq!(records[0].magnitude[b], 3000.0, epsilon = 150.0);
    }
}

#[test]
fn early_step_is_not_absorbed_by_training() {
    let dates: Vec<i64> = (0..48).map(|i| 730_120 + 30 * i).collect();
    let band: Vec<f64> = (0..48)
        .map(|i| if i < 8 { 1000.0 } else { 4000.0 })
        .collect();
    let series = PixelSeries::from_columns(0, 0, &dates, &[band]).unwrap();

    let config = DetectorConfig::default().min_obs(12).threshold(3.0);
    let result = ChangeDetector::new(config).unwrap().detect(&series).unwrap();

    let records = result.records.as_slice();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].start, dates[8]);
    assert_eq!(records[0].end, dates[47]);
    assert_eq!(records[0].break_date, 0);
}

#[test]
fn too_short_series_gives_no_records() {
    let dates = monthly_dates(10);
    let values = seasonal_values(&dates, 2);
    let series = PixelSeries::from_columns(0, 0, &dates, &values).unwrap();

    let detector = ChangeDetector::new(DetectorConfig::default().min_obs(24)).unwrap();
    let result = detector.detect(&series).unwrap();

    assert!(result.records.is_empty());
    assert_eq!(
        result.status,
        DetectionStatus::InsufficientData { needed: 24, got: 10 }
    );
}

#[test]
fn remove_noise_excludes_isolated_outliers() {
    init_tracing();
    let dates = monthly_dates(48);
    let clean = seasonal_values(&dates, 3);

    let mut rng = StdRng::seed_from_u64(99);
    let mut positions: Vec<usize> = (14..47).collect();
    positions.shuffle(&mut rng);
    positions.truncate(3);

    let mut noisy = clean.clone();
    for &p in &positions {
        for band in &mut noisy {
            band[p] += 10.0 * NOISE;
        }
    }

    let clean_series = PixelSeries::from_columns(0, 0, &dates, &clean).unwrap();
    let noisy_series = PixelSeries::from_columns(0, 0, &dates, &noisy).unwrap();

    let baseline = ChangeDetector::new(scenario_config())
        .unwrap()
        .detect(&clean_series)
        .unwrap();
    let kept = ChangeDetector::new(scenario_config())
        .unwrap()
        .detect(&noisy_series)
        .unwrap();
    let removed = ChangeDetector::new(scenario_config().remove_noise(true))
        .unwrap()
        .detect(&noisy_series)
        .unwrap();

    assert_eq!(removed.records.len(), 1);
    let record = &removed.records.as_slice()[0];
    assert_eq!(record.nobs, 45);
    assert_eq!(record.break_date, 0);

    let baseline_rmse = &baseline.records.as_slice()[0].rmse;
    let kept_rmse = &kept.records.as_slice()[kept.records.len() - 1].rmse;
    for b in 0..N_BANDS {
        assert!(record.rmse[b] < 1.5 * baseline_rmse[b]);
        assert!(kept_rmse[b] > record.rmse[b]);
    }
}

#[test]
fn rlm_screening_drops_outlier_in_training_window() {
    let dates = monthly_dates(48);
    let mut values = seasonal_values(&dates, 4);
    for band in &mut values {
        band[5] += 1500.0;
    }
    let series = PixelSeries::from_columns(0, 0, &dates, &values).unwrap();

    let config = scenario_config()
        .test_indices(vec![1, 2])
        .screening(Screening::rlm());
    let result = ChangeDetector::new(config).unwrap().detect(&series).unwrap();

    assert_eq!(result.records.len(), 1);
    let record = &result.records.as_slice()[0];
    assert_eq!(record.nobs, 47);
    assert_eq!(record.start, dates[0]);
}

#[test]
fn detection_is_idempotent() {
    let (_, series) = step_series(5);
    let cv = LassoCv {
        seed: 42,
        ..Default::default()
    };
    let configs = [
        scenario_config(),
        scenario_config().estimator(Estimator::robust()),
        scenario_config().estimator(Estimator::Lasso(LassoConfig::new(5.0).with_cv(cv))),
    ];

    for config in configs {
        let detector = ChangeDetector::new(config).unwrap();
        let first = detector.detect(&series).unwrap();
        let second = detector.detect(&series).unwrap();
        assert_eq!(first, second);
    }
}

#[test]
fn predictions_reproduce_fitted_rmse() {
    let dates = monthly_dates(48);
    let values = seasonal_values(&dates, 6);
    let series = PixelSeries::from_columns(0, 0, &dates, &values).unwrap();

    let config = scenario_config();
    let detector = ChangeDetector::new(config.clone()).unwrap();
    let result = detector.detect(&series).unwrap();
    let record = &result.records.as_slice()[0];
    assert_eq!(record.nobs, dates.len());

    let predictor = Predictor::new(config.design).unwrap();
    let predicted = predictor.predict(record, &dates).unwrap();
    for b in 0..N_BANDS {
        let ssr: f64 = predicted
            .iter()
            .zip(&values[b])
            .map(|(p, y)| (y - p[b]).powi(2))
            .sum();
        let rmse = (ssr / dates.len() as f64).sqrt();
        assert_relative_eq!(rmse, record.rmse[b], epsilon = 1e-6, max_relative = 1e-6);
    }
}

#[test]
fn exported_intercept_is_midpoint_prediction() {
    let design = DesignSpec::new().intercept().slope();
    let dates = monthly_dates(36);
    let values: Vec<Vec<f64>> = vec![dates
        .iter()
        .enumerate()
        .map(|(i, _)| 1000.0 + 4.0 * i as f64 + ((i * 13) % 7) as f64)
        .collect()];
    let series = PixelSeries::from_columns(0, 0, &dates, &values).unwrap();

    let detector = ChangeDetector::new(scenario_config().design(design.clone())).unwrap();
    let result = detector.detect(&series).unwrap();
    let record = &result.records.as_slice()[0];

    let exported = export_coefficients(
        record,
        &design,
        &CoefficientSelection::none().intercept(true),
        &[0],
    )
    .unwrap();
    let midpoint = (record.start + record.end) / 2;
    let predicted = Predictor::new(design)
        .unwrap()
        .predict(record, &[midpoint])
        .unwrap();

    // Integer midpoint is at most half a day from the exact one
    let slope = record.coef.get(1, 0);
    assert_relative_eq!(exported[0], predicted[0][0], epsilon = slope.abs() * 0.5 + 1e-6);
}

#[test]
fn lookup_bridges_the_break_gap() {
    let (dates, series) = step_series(7);
    let detector = ChangeDetector::new(scenario_config()).unwrap();
    let result = detector.detect(&series).unwrap();
    let records = result.records.as_slice();
    assert_eq!(records.len(), 2);

    let predictor = Predictor::new(DesignSpec::default()).unwrap();
    let gap = (dates[29] + dates[30]) / 2;

    assert!(predictor
        .predict_at(records, gap, &LookupPolicy::default())
        .unwrap()
        .is_none());

    let after = LookupPolicy::default().after(true).tie_break(TieBreak::Nearest);
    let values = predictor.predict_at(records, gap, &after).unwrap().unwrap();
    assert!(values[0] > 2500.0);
}

#[test]
fn cancellation_returns_error() {
    let (_, series) = step_series(8);
    let detector = ChangeDetector::new(scenario_config()).unwrap();
    let token = CancelToken::new();
    assert!(detector.detect_with_cancel(&series, &token).is_ok());

    token.cancel();
    assert_eq!(
        detector.detect_with_cancel(&series, &token).unwrap_err(),
        YatsmError::Cancelled
    );
}

#[test]
fn batch_matches_sequential_runs() {
    let pixels: Vec<PixelSeries> = (0..8u64)
        .map(|seed| {
            let (dates, series) = step_series(seed);
            if seed % 2 == 0 {
                series
            } else {
                let values = seasonal_values(&dates, seed);
                PixelSeries::from_columns(seed as u32, 0, &dates, &values).unwrap()
            }
        })
        .collect();

    let detector = ChangeDetector::new(scenario_config()).unwrap();
    let batch = detect_batch(&detector, &pixels);

    assert_eq!(batch.len(), pixels.len());
    for (outcome, series) in batch.iter().zip(&pixels) {
        let sequential = detector.detect(series).unwrap();
        assert_eq!(outcome.result.as_ref().unwrap(), &sequential);
        assert_eq!((outcome.px, outcome.py), (series.px(), series.py()));
    }
}

#[test]
fn fill_values_are_masked_out() {
    let dates = monthly_dates(48);
    let values = seasonal_values(&dates, 9);
    let observations: Vec<Observation> = dates
        .iter()
        .enumerate()
        .map(|(i, &d)| {
            let bands = values.iter().map(|b| b[i]).collect();
            // Every fourth acquisition is cloudy and full of garbage
            if i % 4 == 3 {
                Observation::new(d, vec![-9999.0; N_BANDS], 4)
            } else {
                Observation::clear(d, bands)
            }
        })
        .collect();
    let series = PixelSeries::new(0, 0, observations).unwrap();

    let result = ChangeDetector::new(scenario_config())
        .unwrap()
        .detect(&series)
        .unwrap();
    assert_eq!(result.records.len(), 1);
    assert_eq!(result.records.as_slice()[0].nobs, 36);
}
