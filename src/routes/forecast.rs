// src/routes/forecast.rs
//! Hourly (next 24 hours) and daily (next 7 days) forecast endpoints.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use super::error::{ApiError, ApiResult};
use super::round2;
use crate::ml::{forecast, Aggregation, HOURS_PER_DAY};
use crate::ml::features::MIN_HISTORY;
use crate::state::AppState;
use crate::{ForecastPoint, Pollutant};

const HOURLY_STEPS: usize = 24;
const DAILY_STEPS: usize = 7 * HOURS_PER_DAY;

// ---

#[derive(Debug, Serialize)]
struct ForecastResponse<P> {
    forecast: Vec<P>,
}

#[derive(Debug, Serialize)]
struct HourlyPoint {
    hour: u32,
    timestamp: String,
    values: BTreeMap<Pollutant, f64>,
}

#[derive(Debug, Serialize)]
struct DailyPoint {
    day: u32,
    date: String,
    values: BTreeMap<Pollutant, f64>,
}

pub fn router() -> Router<Arc<AppState>> {
    // ---
    Router::new()
        .route("/api/forecast/24h", get(forecast_24h))
        .route("/api/forecast/week", get(forecast_week))
}

/// Handle `GET /api/forecast/24h`.
async fn forecast_24h(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<ForecastResponse<HourlyPoint>>> {
    // ---
    let points = run(&state, HOURLY_STEPS, Aggregation::Hourly).await?;
    let forecast = points
        .into_iter()
        .map(|p| HourlyPoint {
            hour: p.offset,
            timestamp: p.timestamp.to_rfc3339(),
            values: rounded(p.values),
        })
        .collect();

    Ok(Json(ForecastResponse { forecast }))
}

/// Handle `GET /api/forecast/week`.
async fn forecast_week(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<ForecastResponse<DailyPoint>>> {
    // ---
    let points = run(&state, DAILY_STEPS, Aggregation::DailyMean).await?;
    let forecast = points
        .into_iter()
        .map(|p| DailyPoint {
            day: p.offset,
            date: p.timestamp.format("%Y-%m-%d").to_string(),
            values: rounded(p.values),
        })
        .collect();

    Ok(Json(ForecastResponse { forecast }))
}

/// Run the recurrence over a bounded context snapshot, without holding
/// the history lock.
async fn run(
    state: &AppState,
    steps: usize,
    aggregate: Aggregation,
) -> ApiResult<Vec<ForecastPoint>> {
    // ---
    let models = state.models().await;
    if models.is_empty() {
        return Err(ApiError::Unavailable("Models not loaded".to_string()));
    }

    if state.history.read().await.len() < MIN_HISTORY {
        return Err(ApiError::NotFound("Insufficient data for forecast".to_string()));
    }
    let (seed, prior) = state
        .context()
        .await
        .ok_or_else(|| ApiError::NotFound("No data available".to_string()))?;

    tracing::debug!(steps, context = prior.len(), "Running {:?} forecast", aggregate);
    Ok(forecast(&models, &seed, &prior, steps, aggregate, Utc::now()))
}

fn rounded(values: BTreeMap<Pollutant, f64>) -> BTreeMap<Pollutant, f64> {
    values.into_iter().map(|(k, v)| (k, round2(v))).collect()
}
