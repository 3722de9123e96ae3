//! Application entry point for the `airsense` service.
//!
//! Startup sequence:
//! - Loading configuration from environment variables or `.env`
//! - Initializing structured logging/tracing
//! - Establishing a PostgreSQL connection pool and creating the schema
//! - Restoring the reading history and loading model artifacts
//! - Spawning the MQTT listener
//! - Binding the Axum HTTP server and serving requests
//!
//! See [`airsense::config::load_from_env`] for the environment variables.
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::Router;
use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;

use airsense::ml::ArtifactStore;
use airsense::state::AppState;
use airsense::{config, ingest, routes, schema, store, telemetry, ReadingHistory};

// ---

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    telemetry::init_tracing();
    dotenv().ok();

    let cfg = config::load_from_env()?;
    cfg.log_config();

    tracing::info!(
        "Attempting to connect to database: {}",
        config::mask_db_url(&cfg.db_url)
    );

    let pool = PgPoolOptions::new()
        .max_connections(cfg.db_pool_max)
        .connect(&cfg.db_url)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to connect to database: {}", e))?;

    tracing::info!("Successfully connected to database");

    schema::create_schema(&pool).await?;

    let mut history = ReadingHistory::from_readings(store::load_history(&pool).await?);
    if let Some(max) = cfg.history_max_rows {
        history = history.with_max_len(max);
    }
    match history.split_latest() {
        Some((latest, _)) => tracing::info!(
            "Restored {} readings, latest at {}",
            history.len(),
            latest.timestamp
        ),
        None => tracing::info!("No stored readings yet"),
    }

    let state = Arc::new(AppState::new(
        history,
        ArtifactStore::new(cfg.models_dir.clone()),
        cfg.forecast_context_rows,
    ));

    tokio::spawn(ingest::run_listener(cfg.clone(), state.clone(), pool.clone()));

    // Build app from routes gateway (EMBP)
    let app: Router = routes::router(state, cfg.cors_origin.as_deref());

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.http_port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
