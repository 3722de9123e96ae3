//! Lag and rolling-window feature construction.
//!
//! A feature row always describes the time step that *follows* the newest
//! observation it was built from:
//!
//! - `<other>`: the newest observation's value of every other pollutant
//! - `<target>_lag1`, `<target>_lag2`: the target at the newest and the
//!   second-newest observation
//! - `<other>_rolling_mean_<window>`: mean of every other pollutant over
//!   the trailing `window` observations
//!
//! Training rows are produced by the exact same construction over each
//! prefix of the table, so training and serving features agree by
//! construction.

use chrono::{DateTime, Utc};
use ndarray::{Array1, Array2};

use crate::{Pollutant, Reading};

/// Number of target lags in every row.
pub const LAG_DEPTH: usize = 2;

/// Observations carrying the target required for single-row features.
pub const MIN_HISTORY: usize = 3;

/// Rolling window used by the live service.
pub const SERVING_WINDOW: usize = 3;

// ---

/// A read-only view of the observation sequence `prior ++ [latest]`.
#[derive(Debug, Clone, Copy)]
pub struct Observations<'a> {
    prior: &'a [Reading],
    latest: Option<&'a Reading>,
}

impl<'a> Observations<'a> {
    pub fn new(prior: &'a [Reading], latest: &'a Reading) -> Self {
        Self {
            prior,
            latest: Some(latest),
        }
    }

    pub fn from_slice(readings: &'a [Reading]) -> Self {
        Self {
            prior: readings,
            latest: None,
        }
    }

    pub fn len(&self) -> usize {
        self.prior.len() + usize::from(self.latest.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Observations from newest to oldest.
    pub fn newest_first(&self) -> impl Iterator<Item = &'a Reading> + 'a {
        self.latest.into_iter().chain(self.prior.iter().rev())
    }
}

/// Named feature values for one target and one time step.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub target: Pollutant,
    /// Deterministically ordered `(name, value)` pairs; `None` is missing.
    pub features: Vec<(String, Option<f64>)>,
}

impl FeatureRow {
    pub fn get(&self, name: &str) -> Option<f64> {
        self.features
            .iter()
            .find(|(n, _)| n == name)
            .and_then(|(_, v)| *v)
    }

    /// Dense vector in the order of `names`.
    ///
    /// Missing values and names this row does not carry are filled with 0.
    pub fn align(&self, names: &[String]) -> Array1<f64> {
        // ---
        let mut unmatched = Vec::new();
        let values: Vec<f64> = names
            .iter()
            .map(|name| match self.features.iter().find(|(n, _)| n == name) {
                Some((_, value)) => value.unwrap_or(0.0),
                None => {
                    unmatched.push(name.as_str());
                    0.0
                }
            })
            .collect();

        if !unmatched.is_empty() {
            tracing::debug!(
                target_pollutant = %self.target,
                ?unmatched,
                "feature names not derivable from inputs, zero-filled"
            );
        }
        Array1::from(values)
    }
}

/// Feature matrix and labels for one target, in chronological order.
#[derive(Debug, Clone)]
pub struct FeatureTable {
    pub target: Pollutant,
    pub feature_names: Vec<String>,
    pub rows: Array2<f64>,
    pub labels: Array1<f64>,
    pub timestamps: Vec<DateTime<Utc>>,
}

impl FeatureTable {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Derives lag and rolling-window features over a fixed column set.
#[derive(Debug, Clone)]
pub struct FeatureBuilder {
    window: usize,
    columns: Vec<Pollutant>,
}

impl FeatureBuilder {
    /// Builder over every known pollutant with the given rolling window.
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
            columns: Pollutant::ALL.to_vec(),
        }
    }

    /// Restrict covariates to `columns` (kept in canonical order).
    pub fn with_columns(mut self, columns: &[Pollutant]) -> Self {
        // ---
        let mut columns = columns.to_vec();
        columns.sort();
        columns.dedup();
        self.columns = columns;
        self
    }

    fn covariates(&self, target: Pollutant) -> impl Iterator<Item = Pollutant> + '_ {
        self.columns.iter().copied().filter(move |c| *c != target)
    }

    /// Ordered feature names for `target`.
    pub fn feature_names(&self, target: Pollutant) -> Vec<String> {
        // ---
        let mut names: Vec<String> = self.covariates(target).map(|c| c.to_string()).collect();
        names.push(format!("{target}_lag1"));
        names.push(format!("{target}_lag2"));
        names.extend(
            self.covariates(target)
                .map(|c| format!("{c}_rolling_mean_{}", self.window)),
        );
        names
    }

    /// Single-row features for the step after the newest observation.
    ///
    /// Returns `None` when fewer than [`MIN_HISTORY`] observations carry
    /// a value for `target`.
    pub fn build(&self, observations: Observations<'_>, target: Pollutant) -> Option<FeatureRow> {
        // ---
        let carrying = observations
            .newest_first()
            .filter(|r| r.get(target).is_some())
            .take(MIN_HISTORY)
            .count();
        if carrying < MIN_HISTORY {
            return None;
        }
        self.row(observations, target)
    }

    /// Row construction without the history requirement; only needs
    /// [`LAG_DEPTH`] observations.
    fn row(&self, observations: Observations<'_>, target: Pollutant) -> Option<FeatureRow> {
        // ---
        if observations.len() < LAG_DEPTH {
            return None;
        }

        let recent: Vec<&Reading> = observations
            .newest_first()
            .take(self.window.max(LAG_DEPTH))
            .collect();
        let newest = recent[0];
        let rolling = &recent[..self.window.min(recent.len())];

        let mut features = Vec::with_capacity(self.columns.len() * 2 + LAG_DEPTH);

        for c in self.covariates(target) {
            features.push((c.to_string(), newest.get(c)));
        }

        // Missing values inside existing observations count as zero.
        features.push((format!("{target}_lag1"), Some(recent[0].get(target).unwrap_or(0.0))));
        features.push((format!("{target}_lag2"), Some(recent[1].get(target).unwrap_or(0.0))));

        for c in self.covariates(target) {
            let values: Vec<f64> = rolling.iter().filter_map(|r| r.get(c)).collect();
            let mean = if values.is_empty() {
                None
            } else {
                Some(values.iter().sum::<f64>() / values.len() as f64)
            };
            features.push((format!("{c}_rolling_mean_{}", self.window), mean));
        }

        Some(FeatureRow { target, features })
    }

    /// Bulk features over a chronologically sorted table.
    ///
    /// Row `i` is built from `table[..i]` and labelled with
    /// `table[i][target]`. The first [`LAG_DEPTH`] rows and rows without
    /// a label are dropped.
    pub fn build_table(&self, table: &[Reading], target: Pollutant) -> FeatureTable {
        // ---
        let feature_names = self.feature_names(target);
        let width = feature_names.len();

        let mut flat = Vec::new();
        let mut labels = Vec::new();
        let mut timestamps = Vec::new();

        for i in LAG_DEPTH..table.len() {
            let Some(label) = table[i].get(target) else {
                continue;
            };
            let Some(row) = self.row(Observations::from_slice(&table[..i]), target) else {
                continue;
            };
            flat.extend(row.align(&feature_names));
            labels.push(label);
            timestamps.push(table[i].timestamp);
        }

        let rows = Array2::from_shape_vec((labels.len(), width), flat)
            .unwrap_or_else(|_| Array2::zeros((0, width)));

        FeatureTable {
            target,
            feature_names,
            rows,
            labels: Array1::from(labels),
            timestamps,
        }
    }
}
