//! Shared application state handed to the HTTP handlers and the MQTT
//! listener.

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::ml::{ArtifactStore, ModelSet};
use crate::{Reading, ReadingHistory};

/// Live history plus the currently loaded model set.
///
/// The model set is swapped as a whole on reload, so a request that cloned
/// the `Arc` keeps a consistent set for its whole computation.
#[derive(Debug)]
pub struct AppState {
    // ---
    pub history: RwLock<ReadingHistory>,
    pub models: RwLock<Arc<ModelSet>>,
    pub store: ArtifactStore,
    /// Readings handed to predictions and forecasts as context.
    pub forecast_context_rows: usize,
}

impl AppState {
    // ---
    pub fn new(history: ReadingHistory, store: ArtifactStore, forecast_context_rows: usize) -> Self {
        let models = store.load_all();
        Self::with_models(history, store, models, forecast_context_rows)
    }

    pub fn with_models(
        history: ReadingHistory,
        store: ArtifactStore,
        models: ModelSet,
        forecast_context_rows: usize,
    ) -> Self {
        Self {
            history: RwLock::new(history),
            models: RwLock::new(Arc::new(models)),
            store,
            forecast_context_rows: forecast_context_rows.max(1),
        }
    }

    pub async fn models(&self) -> Arc<ModelSet> {
        self.models.read().await.clone()
    }

    /// Snapshot of the newest reading carrying a value and the readings
    /// before it, bounded to the newest `forecast_context_rows` readings.
    /// The read lock is released before returning.
    pub async fn context(&self) -> Option<(Reading, Vec<Reading>)> {
        // ---
        let history = self.history.read().await;
        let tail = history.tail(self.forecast_context_rows);
        let idx = tail.iter().rposition(Reading::has_any_value)?;
        Some((tail[idx].clone(), tail[..idx].to_vec()))
    }

    /// Reload every artifact from disk and swap the set in. Returns the
    /// number of targets now loaded.
    pub async fn reload_models(&self) -> usize {
        // ---
        let store = self.store.clone();
        let loaded = match tokio::task::spawn_blocking(move || store.load_all()).await {
            Ok(models) => models,
            Err(e) => {
                tracing::error!("Model reload task failed: {}", e);
                return self.models().await.len();
            }
        };

        let count = loaded.len();
        *self.models.write().await = Arc::new(loaded);
        tracing::info!("Reloaded {} models from {}", count, self.store.dir().display());
        count
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::Pollutant;
    use chrono::{Duration, TimeZone, Utc};

    fn history(hours: i64) -> ReadingHistory {
        let start = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
        ReadingHistory::from_readings(
            (0..hours)
                .map(|h| Reading::new(start + Duration::hours(h)).with(Pollutant::Co2, h as f64))
                .collect(),
        )
    }

    #[tokio::test]
    async fn test_context_is_bounded() {
        // ---
        let state = AppState::with_models(history(500), ArtifactStore::new("unused"), ModelSet::new(), 48);
        let (latest, prior) = state.context().await.unwrap();

        assert_eq!(latest.get(Pollutant::Co2), Some(499.0));
        assert_eq!(prior.len(), 47);
        assert_eq!(prior[0].get(Pollutant::Co2), Some(452.0));
    }

    #[tokio::test]
    async fn test_context_skips_trailing_empty_readings() {
        // ---
        let mut readings = history(5);
        readings.push(Reading::new(Utc.with_ymd_and_hms(2025, 3, 2, 0, 0, 0).unwrap()));
        let state = AppState::with_models(readings, ArtifactStore::new("unused"), ModelSet::new(), 48);

        let (latest, prior) = state.context().await.unwrap();
        assert_eq!(latest.get(Pollutant::Co2), Some(4.0));
        assert_eq!(prior.len(), 4);

        let empty = AppState::with_models(ReadingHistory::new(), ArtifactStore::new("unused"), ModelSet::new(), 48);
        assert!(empty.context().await.is_none());
    }
}
