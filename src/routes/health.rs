// src/routes/health.rs
//! Liveness endpoint.
//!
//! Used by container orchestrators and CI to verify that the service
//! answers HTTP requests. Exports a subrouter to the gateway (`mod.rs`) and
//! keeps its handler private.

use axum::{routing::get, Json, Router};
use serde::Serialize;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

/// Handle `GET /health`. Touches neither the database nor the models.
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// Subrouter with the `/health` route, generic over the gateway state.
pub fn router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new().route("/health", get(health))
}
