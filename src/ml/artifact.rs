//! Trained model artifacts and their on-disk store.
//!
//! Every target is persisted as its own JSON document so that targets
//! load independently: a missing or corrupt file only removes that
//! target from the loaded [`ModelSet`].

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::error::Result;
use super::linear::LinearRegression;
use super::scaler::StandardScaler;
use super::trainer::TrainingReport;
use crate::Pollutant;

/// Fitted regressor, fitted scaler and ordered feature names for one
/// target. Never mutated after training.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub target: Pollutant,
    /// Rolling window the features were built with.
    pub window: usize,
    pub feature_names: Vec<String>,
    pub scaler: StandardScaler,
    pub regressor: LinearRegression,
    pub report: TrainingReport,
    pub trained_at: DateTime<Utc>,
}

/// Loaded artifacts keyed by target.
pub type ModelSet = BTreeMap<Pollutant, Arc<ModelArtifact>>;

/// Directory of per-target artifact files.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, target: Pollutant) -> PathBuf {
        self.dir.join(format!("{target}_model.json"))
    }

    /// Persist one artifact, replacing any previous artifact for the
    /// same target. Writes to a temporary file first so readers never see
    /// a partial document.
    pub fn save(&self, artifact: &ModelArtifact) -> Result<PathBuf> {
        // ---
        fs::create_dir_all(&self.dir)?;

        let path = self.path_for(artifact.target);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(artifact)?)?;
        fs::rename(&tmp, &path)?;

        Ok(path)
    }

    pub fn load(&self, target: Pollutant) -> Result<ModelArtifact> {
        let bytes = fs::read(self.path_for(target))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Load every target that has an artifact. Failures are logged and
    /// leave that target out; they never abort the load.
    pub fn load_all(&self) -> ModelSet {
        // ---
        if !self.dir.is_dir() {
            warn!(
                dir = %self.dir.display(),
                "models directory not found, predictions will be unavailable"
            );
            return ModelSet::new();
        }

        let mut models = ModelSet::new();
        for target in Pollutant::ALL {
            let path = self.path_for(target);
            if !path.exists() {
                continue;
            }
            match self.load(target) {
                Ok(artifact) if artifact.target != target => {
                    warn!(%target, found = %artifact.target, "artifact target mismatch, ignoring");
                }
                Ok(artifact) => {
                    info!(%target, features = artifact.feature_names.len(), "loaded model");
                    models.insert(target, Arc::new(artifact));
                }
                Err(e) => {
                    warn!(%target, path = %path.display(), error = %e, "failed to load model");
                }
            }
        }

        if models.is_empty() {
            warn!("no models found, run airsense-train first");
        } else {
            info!("loaded {} models for predictions", models.len());
        }
        models
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::ml::predict::predict;
    use crate::ml::trainer::tests::synthetic_history;
    use crate::ml::trainer::ModelTrainer;

    #[test]
    fn test_round_trip_predicts_identically() {
        // ---
        let history = synthetic_history(80);
        let run = ModelTrainer::default().train_all(&history);
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());

        for artifact in &run.artifacts {
            store.save(artifact).unwrap();
        }
        let loaded = store.load_all();
        assert_eq!(loaded.len(), run.artifacts.len());

        let (prior, latest) = history.split_at(history.len() - 1);
        for artifact in &run.artifacts {
            let reloaded = &loaded[&artifact.target];
            assert_eq!(reloaded.as_ref(), artifact);

            let before = predict(Some(artifact), &latest[0], prior, artifact.target).unwrap();
            let after = predict(Some(reloaded.as_ref()), &latest[0], prior, artifact.target).unwrap();
            assert_eq!(before.to_bits(), after.to_bits());
        }
    }

    #[test]
    fn test_corrupt_artifact_only_drops_its_target() {
        // ---
        let run = ModelTrainer::default().train_all(&synthetic_history(40));
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        for artifact in &run.artifacts {
            store.save(artifact).unwrap();
        }
        fs::write(store.path_for(Pollutant::Co2), b"{ not json").unwrap();

        let loaded = store.load_all();
        assert_eq!(loaded.len(), run.artifacts.len() - 1);
        assert!(!loaded.contains_key(&Pollutant::Co2));
        assert!(loaded.contains_key(&Pollutant::Pm2_5));
    }

    #[test]
    fn test_missing_directory_loads_nothing() {
        // ---
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().join("absent"));
        assert!(store.load_all().is_empty());
        assert!(store.load(Pollutant::Pm10).is_err());
    }
}
