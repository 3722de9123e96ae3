//! Single-step prediction from a trained artifact.

use std::collections::BTreeMap;

use tracing::debug;

use super::artifact::{ModelArtifact, ModelSet};
use super::features::{FeatureBuilder, Observations};
use crate::{Pollutant, Reading};

/// Predict `target` for the step after `latest`.
///
/// `history` holds the observations preceding `latest`. Returns `None`
/// when the artifact is missing, the history is insufficient, or the
/// transform/predict step fails or produces a non-finite value.
pub fn predict(
    artifact: Option<&ModelArtifact>,
    latest: &Reading,
    history: &[Reading],
    target: Pollutant,
) -> Option<f64> {
    // ---
    let artifact = artifact?;
    let row = FeatureBuilder::new(artifact.window)
        .build(Observations::new(history, latest), target)?;
    let vector = row.align(&artifact.feature_names);

    let value = artifact
        .scaler
        .transform_row(vector.view())
        .and_then(|scaled| artifact.regressor.predict_row(scaled.view()));

    match value {
        Ok(v) if v.is_finite() => Some(v),
        Ok(v) => {
            debug!(%target, value = v, "non-finite prediction discarded");
            None
        }
        Err(e) => {
            debug!(%target, error = %e, "prediction failed");
            None
        }
    }
}

/// Predict every target in `models`. Each target succeeds or fails on
/// its own.
pub fn predict_all(
    models: &ModelSet,
    latest: &Reading,
    history: &[Reading],
) -> BTreeMap<Pollutant, Option<f64>> {
    // ---
    models
        .iter()
        .map(|(&target, artifact)| (target, predict(Some(artifact.as_ref()), latest, history, target)))
        .collect()
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::ml::trainer::tests::synthetic_history;
    use crate::ml::trainer::ModelTrainer;
    use std::sync::Arc;

    fn models() -> ModelSet {
        ModelTrainer::default()
            .train_all(&synthetic_history(80))
            .artifacts
            .into_iter()
            .map(|a| (a.target, Arc::new(a)))
            .collect()
    }

    #[test]
    fn test_missing_artifact_is_none() {
        // ---
        let history = synthetic_history(10);
        let (latest, prior) = history.split_last().unwrap();
        assert_eq!(predict(None, latest, prior, Pollutant::Pm10), None);
    }

    #[test]
    fn test_predicts_close_to_recent_values() {
        // ---
        let models = models();
        let history = synthetic_history(100);
        let (latest, prior) = history.split_last().unwrap();

        let pred = predict(
            models.get(&Pollutant::Temperature).map(Arc::as_ref),
            latest,
            prior,
            Pollutant::Temperature,
        )
        .unwrap();
        assert!((pred - latest.get(Pollutant::Temperature).unwrap()).abs() < 2.0);
    }

    #[test]
    fn test_data_poor_target_is_none_others_valid() {
        // ---
        let models = models();
        let mut history = synthetic_history(10);
        for r in history.iter_mut().skip(2) {
            r.values.remove(&Pollutant::Co2);
        }
        let (latest, prior) = history.split_last().unwrap();

        let predictions = predict_all(&models, latest, prior);
        assert_eq!(predictions[&Pollutant::Co2], None);
        assert!(predictions[&Pollutant::Pm2_5].is_some());
        assert!(predictions[&Pollutant::Humidity].is_some());
    }

    #[test]
    fn test_short_history_is_none() {
        // ---
        let models = models();
        let history = synthetic_history(2);
        let (latest, prior) = history.split_last().unwrap();
        assert!(predict_all(&models, latest, prior).values().all(Option::is_none));
    }

    #[test]
    fn test_mismatched_scaler_width_is_none() {
        // ---
        let models = models();
        let mut broken = models[&Pollutant::Pm10].as_ref().clone();
        broken.feature_names.pop();

        let history = synthetic_history(10);
        let (latest, prior) = history.split_last().unwrap();
        assert_eq!(predict(Some(&broken), latest, prior, Pollutant::Pm10), None);
    }
}
