//! HTTP API gateway.
//!
//! Each sibling module exports a `router()`; this module merges them, binds
//! the shared state and adds the CORS and request-tracing layers so that
//! `main.rs` never needs to know about individual endpoints.

use std::sync::Arc;

use axum::http::HeaderValue;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

mod data;
mod error;
mod forecast;
mod health;
mod models;
mod predict;

// ---

pub fn router(state: Arc<AppState>, cors_origin: Option<&str>) -> Router {
    // ---
    Router::new()
        .merge(data::router())
        .merge(predict::router())
        .merge(forecast::router())
        .merge(models::router())
        .merge(health::router())
        .with_state(state)
        .layer(cors_layer(cors_origin))
        .layer(TraceLayer::new_for_http())
}

/// Allow the configured origin, or any origin when none is configured or
/// the configured one is not a valid header value.
fn cors_layer(origin: Option<&str>) -> CorsLayer {
    // ---
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    match origin.map(str::parse::<HeaderValue>) {
        Some(Ok(origin)) => layer.allow_origin(origin),
        Some(Err(e)) => {
            tracing::warn!("Invalid CORS_ORIGIN ({}), allowing any origin", e);
            layer.allow_origin(Any)
        }
        None => layer.allow_origin(Any),
    }
}

/// Round to two decimals for presentation.
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
