//! Offline per-pollutant training.
//!
//! Each target is trained independently: features are built over the
//! cleaned table, split chronologically, scaled with statistics from the
//! training partition only, fitted with least squares and evaluated on
//! both partitions plus expanding-window cross-validation.

use chrono::Utc;
use ndarray::{s, Array1, Array2};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::artifact::ModelArtifact;
use super::error::{ModelError, Result};
use super::features::{FeatureBuilder, SERVING_WINDOW};
use super::linear::LinearRegression;
use super::metrics::{self, RegressionMetrics};
use super::scaler::StandardScaler;
use super::split::{chronological_split, time_series_folds};
use crate::{Pollutant, Reading};

/// Rows required after feature construction to train a target.
pub const MIN_TRAINING_ROWS: usize = 5;

pub const DEFAULT_CV_FOLDS: usize = 5;

/// Columns missing from more than this share of readings are dropped
/// before gap filling.
pub const MAX_MISSING_FRACTION: f64 = 0.5;

// ---

/// Cleaned, time-ordered readings and the pollutants observed in them.
#[derive(Debug, Clone)]
pub struct TrainingTable {
    pub readings: Vec<Reading>,
    pub columns: Vec<Pollutant>,
}

impl TrainingTable {
    /// Sort, drop empty readings, keep the columns present in at least
    /// half of the remaining readings and fill their gaps (forward fill,
    /// then back fill for leading gaps).
    pub fn prepare(readings: &[Reading]) -> Self {
        // ---
        let mut rows: Vec<Reading> = readings
            .iter()
            .filter(|r| r.has_any_value())
            .cloned()
            .collect();
        rows.sort_by_key(|r| r.timestamp);

        let mut columns = Vec::new();
        for p in Pollutant::ALL {
            let present = rows.iter().filter(|r| r.get(p).is_some()).count();
            if present == 0 {
                continue;
            }
            let missing = 1.0 - present as f64 / rows.len() as f64;
            if missing > MAX_MISSING_FRACTION {
                debug!(column = %p, present, rows = rows.len(), "dropping sparse column");
                continue;
            }
            columns.push(p);
        }

        for row in rows.iter_mut() {
            row.values.retain(|p, _| columns.contains(p));
        }
        rows.retain(Reading::has_any_value);

        for &column in &columns {
            let mut last = None;
            for row in rows.iter_mut() {
                match row.get(column) {
                    Some(v) => last = Some(v),
                    None => {
                        if let Some(v) = last {
                            row.set(column, v);
                        }
                    }
                }
            }

            if let Some(first) = rows.iter().find_map(|r| r.get(column)) {
                for row in rows.iter_mut().take_while(|r| r.get(column).is_none()) {
                    row.set(column, first);
                }
            }
        }

        Self {
            readings: rows,
            columns,
        }
    }
}

/// Mean and spread of fold RMSE from cross-validation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CvSummary {
    pub folds: usize,
    pub rmse_mean: f64,
    pub rmse_std: f64,
}

/// Evaluation results stored alongside each artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub rows: usize,
    pub train_rows: usize,
    pub test_rows: usize,
    pub train: RegressionMetrics,
    pub test: RegressionMetrics,
    pub cv: Option<CvSummary>,
}

/// Outcome of training every target in a table.
#[derive(Debug, Default)]
pub struct TrainingRun {
    pub artifacts: Vec<ModelArtifact>,
    pub skipped: Vec<(Pollutant, String)>,
}

/// One line of the performance summary written after a training run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetSummary {
    pub target: Pollutant,
    pub rows: usize,
    pub train_rmse: f64,
    pub test_rmse: f64,
    pub test_mae: f64,
    pub test_r2: f64,
    pub cv_rmse_mean: Option<f64>,
    pub cv_rmse_std: Option<f64>,
}

impl TrainingRun {
    /// Summaries ordered by test RMSE, best first.
    pub fn summary(&self) -> Vec<TargetSummary> {
        // ---
        let mut lines: Vec<_> = self
            .artifacts
            .iter()
            .map(|a| TargetSummary {
                target: a.target,
                rows: a.report.rows,
                train_rmse: a.report.train.rmse,
                test_rmse: a.report.test.rmse,
                test_mae: a.report.test.mae,
                test_r2: a.report.test.r2,
                cv_rmse_mean: a.report.cv.map(|cv| cv.rmse_mean),
                cv_rmse_std: a.report.cv.map(|cv| cv.rmse_std),
            })
            .collect();
        lines.sort_by(|a, b| a.test_rmse.total_cmp(&b.test_rmse));
        lines
    }
}

#[derive(Debug, Clone)]
pub struct ModelTrainer {
    window: usize,
    cv_folds: usize,
}

impl Default for ModelTrainer {
    fn default() -> Self {
        Self::new(SERVING_WINDOW)
    }
}

impl ModelTrainer {
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
            cv_folds: DEFAULT_CV_FOLDS,
        }
    }

    /// Number of cross-validation folds; 0 disables cross-validation.
    pub fn with_cv_folds(mut self, folds: usize) -> Self {
        self.cv_folds = folds;
        self
    }

    /// Train one artifact for `target`.
    pub fn train(&self, table: &TrainingTable, target: Pollutant) -> Result<ModelArtifact> {
        // ---
        let builder = FeatureBuilder::new(self.window).with_columns(&table.columns);
        let features = builder.build_table(&table.readings, target);
        let n = features.len();

        if n < MIN_TRAINING_ROWS {
            return Err(ModelError::InsufficientRows {
                target,
                rows: n,
                required: MIN_TRAINING_ROWS,
            });
        }

        let split = chronological_split(n);
        let x_train = features.rows.slice(s![..split, ..]).to_owned();
        let x_test = features.rows.slice(s![split.., ..]).to_owned();
        let y_train = features.labels.slice(s![..split]).to_owned();
        let y_test = features.labels.slice(s![split..]).to_owned();

        info!(
            %target,
            rows = n,
            features = features.feature_names.len(),
            train_rows = split,
            test_rows = n - split,
            "training linear regression"
        );

        let scaler = StandardScaler::fit(&x_train)?;
        let xs_train = scaler.transform(&x_train)?;
        let xs_test = scaler.transform(&x_test)?;

        let regressor = LinearRegression::fit(&xs_train, &y_train)?;

        let train = RegressionMetrics::compute(&y_train, &regressor.predict(&xs_train)?);
        let test = RegressionMetrics::compute(&y_test, &regressor.predict(&xs_test)?);
        let cv = self.cross_validate(&x_train, &y_train);

        if let Some(cv) = cv {
            info!(%target, folds = cv.folds, "CV RMSE: {:.4} +/- {:.4}", cv.rmse_mean, cv.rmse_std);
        } else {
            debug!(%target, "cross-validation skipped, training partition too small");
        }
        info!(
            %target,
            "Train - RMSE: {:.4}, MAE: {:.4}, R2: {:.4}",
            train.rmse,
            train.mae,
            train.r2
        );
        info!(
            %target,
            "Test  - RMSE: {:.4}, MAE: {:.4}, R2: {:.4}",
            test.rmse,
            test.mae,
            test.r2
        );

        Ok(ModelArtifact {
            target,
            window: self.window,
            feature_names: features.feature_names,
            scaler,
            regressor,
            report: TrainingReport {
                rows: n,
                train_rows: split,
                test_rows: n - split,
                train,
                test,
                cv,
            },
            trained_at: Utc::now(),
        })
    }

    /// Expanding-window CV on the (unscaled) training partition. The
    /// scaler is refitted inside every fold.
    fn cross_validate(&self, x: &Array2<f64>, y: &Array1<f64>) -> Option<CvSummary> {
        // ---
        let scores: Vec<f64> = time_series_folds(x.nrows(), self.cv_folds)
            .into_iter()
            .filter_map(|fold| {
                let x_fit = x.slice(s![fold.train.clone(), ..]).to_owned();
                let y_fit = y.slice(s![fold.train.clone()]).to_owned();
                let x_val = x.slice(s![fold.validation.clone(), ..]).to_owned();
                let y_val = y.slice(s![fold.validation.clone()]).to_owned();

                let scored = (|| -> Result<f64> {
                    let scaler = StandardScaler::fit(&x_fit)?;
                    let model = LinearRegression::fit(&scaler.transform(&x_fit)?, &y_fit)?;
                    let pred = model.predict(&scaler.transform(&x_val)?)?;
                    Ok(metrics::rmse(&y_val, &pred))
                })();

                match scored {
                    Ok(rmse) => Some(rmse),
                    Err(e) => {
                        debug!(error = %e, "skipping CV fold");
                        None
                    }
                }
            })
            .collect();

        if scores.is_empty() {
            return None;
        }
        let (rmse_mean, rmse_std) = metrics::mean_std(&scores);
        Some(CvSummary {
            folds: scores.len(),
            rmse_mean,
            rmse_std,
        })
    }

    /// Train every observed pollutant. Targets that cannot be trained are
    /// skipped with a warning; the run never fails as a whole.
    pub fn train_all(&self, readings: &[Reading]) -> TrainingRun {
        // ---
        let table = TrainingTable::prepare(readings);
        info!(
            rows = table.readings.len(),
            columns = ?table.columns,
            "prepared training table"
        );
        if table.readings.len() < 10 {
            warn!(
                rows = table.readings.len(),
                "very few data points available, model accuracy may be limited"
            );
        }

        let mut run = TrainingRun::default();
        for &target in &table.columns {
            match self.train(&table, target) {
                Ok(artifact) => run.artifacts.push(artifact),
                Err(e) => {
                    warn!(%target, error = %e, "skipping target");
                    run.skipped.push((target, e.to_string()));
                }
            }
        }
        run
    }
}

#[cfg(test)]
pub(crate) mod tests {
    // ---
    use super::*;
    use chrono::{DateTime, Duration, TimeZone};

    fn at(hour: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap() + Duration::hours(hour)
    }

    /// Smooth, non-collinear synthetic sensor series.
    pub(crate) fn synthetic_history(hours: i64) -> Vec<Reading> {
        // ---
        (0..hours)
            .map(|h| {
                let t = h as f64;
                Reading::new(at(h))
                    .with(Pollutant::Pm2_5, 20.0 + 5.0 * (t / 6.0).sin() + 0.05 * t)
                    .with(Pollutant::Pm10, 35.0 + 8.0 * (t / 5.0).cos())
                    .with(Pollutant::Co2, 420.0 + 30.0 * (t / 9.0).sin() + ((h * 7) % 5) as f64)
                    .with(Pollutant::Temperature, 22.0 + 3.0 * (t / 12.0).sin())
                    .with(Pollutant::Humidity, 55.0 + 10.0 * (t / 8.0).cos() + ((h * 3) % 4) as f64)
            })
            .collect()
    }

    #[test]
    fn test_prepare_fills_gaps_and_drops_empty_rows() {
        // ---
        let readings = vec![
            Reading::new(at(2)).with(Pollutant::Pm10, 3.0),
            Reading::new(at(0)).with(Pollutant::Co2, 400.0),
            Reading::new(at(1)),
            Reading::new(at(3))
                .with(Pollutant::Co2, 410.0)
                .with(Pollutant::Pm10, 5.0),
        ];
        let table = TrainingTable::prepare(&readings);

        assert_eq!(table.readings.len(), 3);
        assert_eq!(table.columns, vec![Pollutant::Pm10, Pollutant::Co2]);

        let pm10: Vec<_> = table.readings.iter().map(|r| r.get(Pollutant::Pm10)).collect();
        let co2: Vec<_> = table.readings.iter().map(|r| r.get(Pollutant::Co2)).collect();
        assert_eq!(pm10, vec![Some(3.0), Some(3.0), Some(5.0)]);
        assert_eq!(co2, vec![Some(400.0), Some(400.0), Some(410.0)]);
    }

    #[test]
    fn test_sparse_column_is_neither_target_nor_feature() {
        // ---
        let mut readings = synthetic_history(60);
        readings[30].set(Pollutant::Pressure, 1013.0);

        let table = TrainingTable::prepare(&readings);
        assert!(!table.columns.contains(&Pollutant::Pressure));
        assert!(table.readings.iter().all(|r| r.get(Pollutant::Pressure).is_none()));

        let run = ModelTrainer::default().train_all(&readings);
        let targets: Vec<_> = run.artifacts.iter().map(|a| a.target).collect();
        assert_eq!(targets.len(), 5);
        assert!(!targets.contains(&Pollutant::Pressure));
        for artifact in &run.artifacts {
            assert!(
                artifact.feature_names.iter().all(|n| !n.starts_with("pressure")),
                "{}: {:?}",
                artifact.target,
                artifact.feature_names
            );
        }
    }

    #[test]
    fn test_half_present_column_is_kept() {
        // ---
        let mut readings = synthetic_history(10);
        for r in readings.iter_mut().step_by(2) {
            r.set(Pollutant::Tvoc, 120.0);
        }
        let table = TrainingTable::prepare(&readings);
        assert!(table.columns.contains(&Pollutant::Tvoc));
    }

    #[test]
    fn test_trains_every_observed_target() {
        // ---
        let run = ModelTrainer::default().train_all(&synthetic_history(120));
        assert!(run.skipped.is_empty(), "skipped: {:?}", run.skipped);
        assert_eq!(run.artifacts.len(), 5);

        for artifact in &run.artifacts {
            assert_eq!(artifact.feature_names.len(), artifact.scaler.n_features());
            assert_eq!(artifact.feature_names.len(), artifact.regressor.n_features());
            assert_eq!(artifact.report.rows, 118);
            assert_eq!(artifact.report.train_rows, 94);
            assert!(artifact.report.cv.is_some());
            assert!(artifact.report.train.rmse.is_finite());
        }
    }

    #[test]
    fn test_fits_a_lag_driven_series() {
        // ---
        // Next pm2_5 is an exact linear function of the current pm2_5 and
        // humidity, so the model should reproduce it.
        let mut readings = Vec::new();
        let mut value = 10.0;
        for h in 0..80 {
            let t = h as f64;
            let humidity = 50.0 + 5.0 * (t / 4.0).sin() + ((h * 7) % 5) as f64;
            readings.push(
                Reading::new(at(h))
                    .with(Pollutant::Pm2_5, value)
                    .with(Pollutant::Humidity, humidity),
            );
            value = 0.5 * value + 0.1 * humidity + 3.0;
        }

        let table = TrainingTable::prepare(&readings);
        let artifact = ModelTrainer::default().train(&table, Pollutant::Pm2_5).unwrap();
        assert!(artifact.report.test.rmse < 1e-4, "{:?}", artifact.report);
        assert!(artifact.report.test.r2 > 0.999);
    }

    #[test]
    fn test_summary_is_sorted_by_test_rmse() {
        // ---
        let run = ModelTrainer::default().train_all(&synthetic_history(120));
        let summary = run.summary();

        assert_eq!(summary.len(), run.artifacts.len());
        assert!(summary.windows(2).all(|w| w[0].test_rmse <= w[1].test_rmse));
        assert!(summary.iter().all(|line| line.cv_rmse_mean.is_some()));
    }

    #[test]
    fn test_small_table_is_skipped() {
        // ---
        let run = ModelTrainer::default().train_all(&synthetic_history(6));
        assert!(run.artifacts.is_empty());
        assert_eq!(run.skipped.len(), 5);

        let table = TrainingTable::prepare(&synthetic_history(6));
        assert!(matches!(
            ModelTrainer::default().train(&table, Pollutant::Co2),
            Err(ModelError::InsufficientRows { rows: 4, .. })
        ));
    }

    #[test]
    fn test_training_is_deterministic() {
        // ---
        let table = TrainingTable::prepare(&synthetic_history(60));
        let trainer = ModelTrainer::new(5);
        let a = trainer.train(&table, Pollutant::Pm10).unwrap();
        let b = trainer.train(&table, Pollutant::Pm10).unwrap();

        assert_eq!(a.scaler, b.scaler);
        assert_eq!(a.regressor, b.regressor);
        assert_eq!(a.report, b.report);
        assert!(a.feature_names.iter().any(|n| n == "co2_rolling_mean_5"));
    }

    #[test]
    fn test_scaler_sees_training_rows_only() {
        // ---
        let table = TrainingTable::prepare(&synthetic_history(40));
        let artifact = ModelTrainer::default().train(&table, Pollutant::Co2).unwrap();

        let features = FeatureBuilder::new(3)
            .with_columns(&table.columns)
            .build_table(&table.readings, Pollutant::Co2);
        let split = artifact.report.train_rows;
        let expected = StandardScaler::fit(&features.rows.slice(s![..split, ..]).to_owned()).unwrap();
        assert_eq!(artifact.scaler, expected);
    }

    #[test]
    fn test_cv_skipped_for_tiny_partition() {
        // ---
        let table = TrainingTable::prepare(&synthetic_history(9));
        let artifact = ModelTrainer::default().train(&table, Pollutant::Pm2_5).unwrap();
        assert_eq!(artifact.report.rows, 7);
        assert_eq!(artifact.report.test_rows, 2);
        assert!(artifact.report.cv.is_none());
    }
}
