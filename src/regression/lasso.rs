//! Lasso regression by cyclic coordinate descent, with optional k-fold
//! cross-validation over the regularization strength.
//!
//! Minimizes `1/(2n) ||y - b0 - X b||^2 + alpha ||b||_1`. The intercept is
//! never penalized and coefficients are penalized in raw column units.

use crate::design::DesignMatrix;
use crate::error::{Result, YatsmError};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::debug;

/// Cross-validation settings for choosing `alpha`.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct LassoCv {
    /// Number of folds.
    pub n_folds: usize,
    /// Number of candidate alphas on a geometric grid.
    pub n_alphas: usize,
    /// Ratio of the smallest to the largest candidate alpha.
    pub eps: f64,
    /// Seed for fold assignment.
    pub seed: u64,
}

impl Default for LassoCv {
    fn default() -> Self {
        Self {
            n_folds: 3,
            n_alphas: 20,
            eps: 1e-3,
            seed: 0,
        }
    }
}

/// Configuration for the Lasso estimator.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct LassoConfig {
    /// Regularization strength, used directly when `cv` is `None`.
    pub alpha: f64,
    pub max_iter: usize,
    /// Convergence tolerance on the largest fitted-value update, relative to the response spread.
    pub tol: f64,
    pub cv: Option<LassoCv>,
}

impl Default for LassoConfig {
    fn default() -> Self {
        Self {
            alpha: 20.0,
            max_iter: 1000,
            tol: 1e-6,
            cv: None,
        }
    }
}

impl LassoConfig {
    /// Lasso with a fixed regularization strength.
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha,
            ..Default::default()
        }
    }

    /// Enable cross-validated selection of alpha.
    pub fn with_cv(mut self, cv: LassoCv) -> Self {
        self.cv = Some(cv);
        self
    }

    /// Set the maximum number of coordinate descent sweeps.
    pub fn max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter.max(1);
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if !(self.alpha >= 0.0) {
            return Err(YatsmError::Configuration(
                "lasso alpha must be non-negative".into(),
            ));
        }
        if !(self.tol > 0.0) {
            return Err(YatsmError::Configuration(
                "lasso tolerance must be positive".into(),
            ));
        }
        if let Some(cv) = &self.cv {
            if cv.n_folds < 2 {
                return Err(YatsmError::Configuration(
                    "lasso cross-validation needs at least 2 folds".into(),
                ));
            }
            if cv.n_alphas == 0 || !(cv.eps > 0.0 && cv.eps < 1.0) {
                return Err(YatsmError::Configuration(
                    "lasso alpha grid needs n_alphas > 0 and 0 < eps < 1".into(),
                ));
            }
        }
        Ok(())
    }
}

/// Result of a Lasso fit.
#[derive(Debug, Clone)]
pub struct LassoResult {
    pub coefficients: Vec<f64>,
    /// Alpha the coefficients were fitted with.
    pub alpha: f64,
    pub rmse: f64,
    pub iterations: usize,
}

/// Centered copy of the design, with the intercept column (if any) split off.
struct CenteredProblem {
    /// Column-major centered predictors; the intercept column is left empty.
    columns: Vec<Vec<f64>>,
    centers: Vec<f64>,
    intercept: Option<(usize, f64)>,
}

impl CenteredProblem {
    fn new(x: &DesignMatrix) -> Self {
        let n = x.n_rows().max(1) as f64;
        let p = x.n_cols();
        let mut columns: Vec<Vec<f64>> = (0..p).map(|j| x.column(j)).collect();

        let intercept = columns.iter().enumerate().find_map(|(j, col)| {
            let first = *col.first()?;
            (first != 0.0 && col.iter().all(|v| *v == first)).then_some((j, first))
        });

        let mut centers = vec![0.0; p];
        if let Some((k, _)) = intercept {
            for (j, col) in columns.iter_mut().enumerate() {
                if j == k {
                    col.clear();
                    continue;
                }
                let mean = col.iter().sum::<f64>() / n;
                centers[j] = mean;
                col.iter_mut().for_each(|v| *v -= mean);
            }
        }

        Self {
            columns,
            centers,
            intercept,
        }
    }
}

fn soft_threshold(value: f64, penalty: f64) -> f64 {
    if value > penalty {
        value - penalty
    } else if value < -penalty {
        value + penalty
    } else {
        0.0
    }
}

/// Fit a Lasso regression with a fixed alpha.
pub fn lasso_fit(x: &DesignMatrix, y: &[f64], alpha: f64, config: &LassoConfig) -> Result<LassoResult> {
    let n = x.n_rows();
    let p = x.n_cols();
    if y.len() != n {
        return Err(YatsmError::DimensionMismatch {
            expected: n,
            got: y.len(),
        });
    }
    if n < p || n == 0 {
        return Err(YatsmError::FitFailure(format!(
            "{n} observations cannot determine {p} coefficients"
        )));
    }

    let problem = CenteredProblem::new(x);
    let y_mean = if problem.intercept.is_some() {
        y.iter().sum::<f64>() / n as f64
    } else {
        0.0
    };

    let mut residual: Vec<f64> = y.iter().map(|v| v - y_mean).collect();
    let norms: Vec<f64> = problem
        .columns
        .iter()
        .map(|c| c.iter().map(|v| v * v).sum())
        .collect();
    let penalty = n as f64 * alpha;
    let y_scale = (residual.iter().map(|r| r * r).sum::<f64>() / n as f64)
        .sqrt()
        .max(1e-12);
    let mut beta = vec![0.0; p];
    let mut iterations = 0;

    for iter in 0..config.max_iter {
        iterations = iter + 1;
        let mut max_change: f64 = 0.0;

        for j in 0..p {
            if norms[j] == 0.0 {
                continue;
            }
            let col = &problem.columns[j];
            let old = beta[j];
            let rho: f64 = col.iter().zip(&residual).map(|(c, r)| c * r).sum::<f64>()
                + norms[j] * old;
            let new = soft_threshold(rho, penalty) / norms[j];

            if new != old {
                let delta = new - old;
                for (r, c) in residual.iter_mut().zip(col) {
                    *r -= c * delta;
                }
                beta[j] = new;
                // Change measured in fitted-value units
                max_change = max_change.max(delta.abs() * (norms[j] / n as f64).sqrt());
            }
        }

        if max_change <= config.tol * y_scale {
            break;
        }
        if iterations == config.max_iter {
            debug!(alpha, iterations, "lasso coordinate descent hit max_iter");
        }
    }

    if let Some((k, value)) = problem.intercept {
        let offset: f64 = beta
            .iter()
            .zip(&problem.centers)
            .map(|(b, c)| b * c)
            .sum();
        beta[k] = (y_mean - offset) / value;
    }

    if beta.iter().any(|b| !b.is_finite()) {
        return Err(YatsmError::FitFailure("non-finite lasso coefficients".into()));
    }

    let fitted = x.dot(&beta);
    let rmse = (fitted
        .iter()
        .zip(y)
        .map(|(f, yi)| (yi - f).powi(2))
        .sum::<f64>()
        / n as f64)
        .sqrt();

    Ok(LassoResult {
        coefficients: beta,
        alpha,
        rmse,
        iterations,
    })
}

/// Smallest alpha for which all penalized coefficients are zero.
pub fn alpha_max(x: &DesignMatrix, y: &[f64]) -> f64 {
    let n = x.n_rows().max(1) as f64;
    let problem = CenteredProblem::new(x);
    let y_mean = if problem.intercept.is_some() {
        y.iter().sum::<f64>() / n
    } else {
        0.0
    };
    problem
        .columns
        .iter()
        .map(|col| {
            col.iter()
                .zip(y)
                .map(|(c, yi)| c * (yi - y_mean))
                .sum::<f64>()
                .abs()
                / n
        })
        .fold(0.0, f64::max)
}

/// Geometric alpha grid from `alpha_max` down to `alpha_max * eps`.
pub fn alpha_grid(alpha_max: f64, n_alphas: usize, eps: f64) -> Vec<f64> {
    if n_alphas <= 1 || alpha_max <= 0.0 {
        return vec![alpha_max.max(0.0)];
    }
    let log_max = alpha_max.ln();
    let log_min = (alpha_max * eps).ln();
    (0..n_alphas)
        .map(|i| {
            let t = i as f64 / (n_alphas - 1) as f64;
            (log_max + t * (log_min - log_max)).exp()
        })
        .collect()
}

/// Assign each observation to a fold after a seeded shuffle.
pub fn fold_assignment(n: usize, n_folds: usize, seed: u64) -> Vec<usize> {
    let mut order: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    order.shuffle(&mut rng);

    let mut folds = vec![0; n];
    for (position, &obs) in order.iter().enumerate() {
        folds[obs] = position % n_folds;
    }
    folds
}

/// Choose alpha by k-fold cross-validation and refit on all observations.
pub fn lasso_cv_fit(x: &DesignMatrix, y: &[f64], config: &LassoConfig, cv: &LassoCv) -> Result<LassoResult> {
    let n = x.n_rows();
    let p = x.n_cols();
    let n_folds = cv.n_folds.max(2);

    // Each training split must still determine every coefficient
    let smallest_train = n - n.div_ceil(n_folds);
    if smallest_train < p {
        debug!(n, n_folds, "too few observations for lasso cross-validation");
        return lasso_fit(x, y, config.alpha, config);
    }

    let folds = fold_assignment(n, n_folds, cv.seed);
    let alphas = alpha_grid(alpha_max(x, y), cv.n_alphas, cv.eps);
    let mut best: Option<(f64, f64)> = None;

    for &alpha in &alphas {
        let mut sq_error = 0.0;
        for fold in 0..n_folds {
            let train: Vec<usize> = (0..n).filter(|&i| folds[i] != fold).collect();
            let test: Vec<usize> = (0..n).filter(|&i| folds[i] == fold).collect();
            if test.is_empty() {
                continue;
            }
            let x_train = x.select(&train);
            let y_train: Vec<f64> = train.iter().map(|&i| y[i]).collect();
            let fit = lasso_fit(&x_train, &y_train, alpha, config)?;

            let x_test = x.select(&test);
            sq_error += x_test
                .dot(&fit.coefficients)
                .iter()
                .zip(&test)
                .map(|(f, &i)| (y[i] - f).powi(2))
                .sum::<f64>();
        }
        let mse = sq_error / n as f64;
        if best.map_or(true, |(_, best_mse)| mse < best_mse) {
            best = Some((alpha, mse));
        }
    }

    let alpha = best.map_or(config.alpha, |(alpha, _)| alpha);
    debug!(alpha, "lasso cross-validation selected alpha");
    lasso_fit(x, y, alpha, config)
}
