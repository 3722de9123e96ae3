// src/routes/data.rs
//! Latest-reading endpoint.

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use serde_json::{json, Map, Value};

use super::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::{aqi, Pollutant, Reading};

// ---

pub fn router() -> Router<Arc<AppState>> {
    // ---
    Router::new().route("/api/data", get(latest))
}

/// Handle `GET /api/data`: the newest reading that carries a value.
async fn latest(State(state): State<Arc<AppState>>) -> ApiResult<Json<Value>> {
    // ---
    let history = state.history.read().await;
    let (reading, _) = history
        .split_latest()
        .ok_or_else(|| ApiError::NotFound("No data available".to_string()))?;

    Ok(Json(flatten(reading)))
}

/// One key per pollutant (`null` when missing) plus `timestamp` and `aqi`.
fn flatten(reading: &Reading) -> Value {
    // ---
    let mut body = Map::new();
    body.insert("timestamp".to_string(), json!(reading.timestamp.to_rfc3339()));
    for pollutant in Pollutant::ALL {
        body.insert(pollutant.as_str().to_string(), json!(reading.get(pollutant)));
    }
    body.insert("aqi".to_string(), json!(aqi::for_reading(reading)));
    Value::Object(body)
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_flatten_reports_missing_as_null() {
        // ---
        let reading = Reading::new(Utc.with_ymd_and_hms(2025, 3, 26, 8, 0, 0).unwrap())
            .with(Pollutant::Pm2_5, 12.0)
            .with(Pollutant::Co2, 430.0);

        let body = flatten(&reading);
        assert_eq!(body["pm2_5"], json!(12.0));
        assert_eq!(body["co2"], json!(430.0));
        assert!(body["pm10"].is_null());
        assert_eq!(body["aqi"], json!(50.0));
        assert_eq!(body["timestamp"], json!("2025-03-26T08:00:00+00:00"));
    }
}
