//! Multi-step forecasting by feeding predictions back as observations.
//!
//! Errors compound with the horizon: nothing here models the growth of
//! uncertainty, and no bounds are produced.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};

use super::artifact::ModelSet;
use super::predict::predict;
use crate::{ForecastPoint, Pollutant, Reading};

pub const HOURS_PER_DAY: usize = 24;

/// How hourly steps are reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregation {
    /// One point per hourly step.
    Hourly,
    /// One point per whole day, holding the mean of its 24 hourly values.
    DailyMean,
}

/// Working state of the recurrence.
struct Recurrence<'m> {
    models: &'m ModelSet,
    observations: Vec<Reading>,
    current: Reading,
}

impl Recurrence<'_> {
    /// Predict the targets in canonical order, writing each prediction
    /// into the working state before the next target is predicted. An
    /// unavailable prediction carries the working value forward. The
    /// step-start state then becomes an observation and the working state
    /// the new current state.
    fn step(&mut self) -> BTreeMap<Pollutant, f64> {
        // ---
        let mut working = self.current.clone();
        working.aqi = None;

        let mut values = BTreeMap::new();
        for (&target, artifact) in self.models {
            let value = predict(Some(artifact.as_ref()), &working, &self.observations, target)
                .or_else(|| working.get(target));
            if let Some(v) = value {
                working.set(target, v);
                values.insert(target, v);
            }
        }
        working.timestamp = self.current.timestamp + Duration::hours(1);

        let observed = std::mem::replace(&mut self.current, working);
        self.observations.push(observed);
        values
    }
}

/// Forecast `steps` hourly steps ahead of `seed`.
///
/// `history` holds the observations preceding `seed` and is copied once
/// up front. Hourly mode yields exactly `steps` points at `now + 1h ..`;
/// daily-mean mode yields `steps / 24` points at `now + 1d ..` (a trailing
/// partial day is not computed). Targets with neither a prediction nor a
/// carried value are absent from a point.
pub fn forecast(
    models: &ModelSet,
    seed: &Reading,
    history: &[Reading],
    steps: usize,
    aggregate: Aggregation,
    now: DateTime<Utc>,
) -> Vec<ForecastPoint> {
    // ---
    let mut recurrence = Recurrence {
        models,
        observations: history.to_vec(),
        current: seed.clone(),
    };

    match aggregate {
        Aggregation::Hourly => (1..=steps)
            .map(|hour| ForecastPoint {
                offset: hour as u32,
                timestamp: now + Duration::hours(hour as i64),
                values: recurrence.step(),
            })
            .collect(),

        Aggregation::DailyMean => (1..=steps / HOURS_PER_DAY)
            .map(|day| {
                let mut sums: BTreeMap<Pollutant, (f64, usize)> = BTreeMap::new();
                for _ in 0..HOURS_PER_DAY {
                    for (target, v) in recurrence.step() {
                        let entry = sums.entry(target).or_insert((0.0, 0));
                        entry.0 += v;
                        entry.1 += 1;
                    }
                }
                ForecastPoint {
                    offset: day as u32,
                    timestamp: now + Duration::days(day as i64),
                    values: sums
                        .into_iter()
                        .map(|(target, (sum, count))| (target, sum / count as f64))
                        .collect(),
                }
            })
            .collect(),
    }
}
