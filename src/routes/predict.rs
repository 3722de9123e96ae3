// src/routes/predict.rs
//! Next-step prediction endpoint.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use super::error::{ApiError, ApiResult};
use super::round2;
use crate::ml::predict_all;
use crate::state::AppState;
use crate::Pollutant;

// ---

#[derive(Debug, Serialize)]
struct PredictResponse {
    /// One entry per loaded target; `null` when that target could not be
    /// predicted.
    predictions: BTreeMap<Pollutant, Option<f64>>,
    timestamp: String,
}

pub fn router() -> Router<Arc<AppState>> {
    // ---
    Router::new().route("/api/predict", get(predict_next))
}

/// Handle `GET /api/predict`.
async fn predict_next(State(state): State<Arc<AppState>>) -> ApiResult<Json<PredictResponse>> {
    // ---
    let models = state.models().await;
    if models.is_empty() {
        return Err(ApiError::Unavailable("Models not loaded".to_string()));
    }

    let (latest, prior) = state
        .context()
        .await
        .ok_or_else(|| ApiError::NotFound("No data available".to_string()))?;

    let predictions = predict_all(&models, &latest, &prior)
        .into_iter()
        .map(|(target, value)| (target, value.map(round2)))
        .collect();

    Ok(Json(PredictResponse {
        predictions,
        timestamp: Utc::now().to_rfc3339(),
    }))
}
