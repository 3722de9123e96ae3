// src/routes/models.rs
//! Model inspection and hot reload.

use std::sync::Arc;

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::ml::trainer::CvSummary;
use crate::ml::ModelArtifact;
use crate::state::AppState;
use crate::Pollutant;

// ---

#[derive(Debug, Serialize)]
struct ModelSummary {
    target: Pollutant,
    window: usize,
    features: usize,
    trained_at: DateTime<Utc>,
    training_rows: usize,
    test_rmse: f64,
    test_mae: f64,
    test_r2: f64,
    cv: Option<CvSummary>,
}

impl From<&ModelArtifact> for ModelSummary {
    fn from(artifact: &ModelArtifact) -> Self {
        // ---
        Self {
            target: artifact.target,
            window: artifact.window,
            features: artifact.feature_names.len(),
            trained_at: artifact.trained_at,
            training_rows: artifact.report.rows,
            test_rmse: artifact.report.test.rmse,
            test_mae: artifact.report.test.mae,
            test_r2: artifact.report.test.r2,
            cv: artifact.report.cv,
        }
    }
}

#[derive(Debug, Serialize)]
struct ModelsResponse {
    directory: String,
    models: Vec<ModelSummary>,
}

#[derive(Debug, Serialize)]
struct ReloadResponse {
    loaded: usize,
}

pub fn router() -> Router<Arc<AppState>> {
    // ---
    Router::new()
        .route("/api/models", get(list))
        .route("/api/models/reload", post(reload))
}

/// Handle `GET /api/models`.
async fn list(State(state): State<Arc<AppState>>) -> Json<ModelsResponse> {
    // ---
    let models = state.models().await;
    Json(ModelsResponse {
        directory: state.store.dir().display().to_string(),
        models: models.values().map(|a| ModelSummary::from(a.as_ref())).collect(),
    })
}

/// Handle `POST /api/models/reload`.
async fn reload(State(state): State<Arc<AppState>>) -> Json<ReloadResponse> {
    // ---
    let loaded = state.reload_models().await;
    Json(ReloadResponse { loaded })
}
