//! `airsense`: air-quality telemetry ingestion, per-pollutant regression
//! training and multi-step forecasting.
//!
//! Module layout follows the Explicit Module Boundary Pattern (EMBP): each
//! module exposes a small surface and the shared types are re-exported
//! here so that siblings import them from the crate root.

pub mod aqi;
pub mod config;
pub mod ingest;
pub mod ml;
pub mod models;
pub mod routes;
pub mod schema;
pub mod state;
pub mod store;
pub mod telemetry;

pub use config::{Config, TrainConfig};
pub use models::{ForecastPoint, Pollutant, Reading, ReadingHistory};
