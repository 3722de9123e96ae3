//! Configuration loader for the `airsense` service and trainer.
//!
//! This module centralizes all runtime configuration values and their defaults,
//! loading from environment variables (with optional `.env` file support
//! provided by the caller). By consolidating configuration logic here, we
//! avoid scattering `env::var` calls throughout the codebase.
//!
use std::env;
use std::path::PathBuf;

use anyhow::{anyhow, Result};

/// Parse an optional numeric environment variable with a default value.
macro_rules! parse_env {
    ($var_name:expr, $ty:ty, $default:expr) => {
        env::var($var_name)
            .ok()
            .map(|v| v.parse::<$ty>())
            .transpose()
            .map_err(|e| anyhow!("Invalid {}: {}", $var_name, e))?
            .unwrap_or($default)
    };
}

/// Parse a required string environment variable.
macro_rules! require_env {
    ($var_name:expr) => {
        env::var($var_name)
            .map_err(|_| anyhow!("{} must be set in .env or environment", $var_name))?
    };
}

/// Read an optional string environment variable, treating empty as unset.
fn optional_env(var_name: &str) -> Option<String> {
    env::var(var_name).ok().filter(|v| !v.trim().is_empty())
}

/// Strongly typed service configuration.
///
/// All fields are immutable after loading, ensuring a consistent configuration
/// snapshot for the lifetime of the application.
#[derive(Debug, Clone)]
pub struct Config {
    // ---
    /// PostgreSQL connection string.
    pub db_url: String,

    /// Maximum number of database connections in the pool.
    pub db_pool_max: u32,

    /// MQTT broker host name.
    pub mqtt_broker: String,

    pub mqtt_port: u16,

    /// Topic (filter) carrying sensor uplinks.
    pub mqtt_topic: String,

    pub mqtt_username: String,

    pub mqtt_password: String,

    /// Port the HTTP API listens on.
    pub http_port: u16,

    /// Directory holding per-target model artifacts.
    pub models_dir: PathBuf,

    /// Readings handed to the forecaster as context.
    pub forecast_context_rows: usize,

    /// Upper bound on in-memory history; `None` keeps everything.
    pub history_max_rows: Option<usize>,

    /// Allowed CORS origin; `None` allows any.
    pub cors_origin: Option<String>,
}

/// Load service configuration from environment variables with defaults.
///
/// Required:
/// - `DATABASE_URL` – PostgreSQL connection string
/// - `MQTT_BROKER`, `MQTT_TOPIC`, `MQTT_USERNAME`, `MQTT_PASSWORD`
///
/// Optional:
/// - `DB_POOL_MAX` – max DB connections (default: 5)
/// - `MQTT_PORT` – broker port (default: 1883)
/// - `HTTP_PORT` – API port (default: 5000)
/// - `MODELS_DIR` – artifact directory (default: `models_lr`)
/// - `FORECAST_CONTEXT_ROWS` – history rows used by forecasts (default: 48)
/// - `HISTORY_MAX_ROWS` – in-memory history bound, 0 = unbounded (default: 0)
/// - `CORS_ORIGIN` – allowed origin (default: any)
///
/// Returns an error if any required variable is missing or invalid.
pub fn load_from_env() -> Result<Config> {
    // ---
    let db_url = require_env!("DATABASE_URL");
    let mqtt_broker = require_env!("MQTT_BROKER");
    let mqtt_topic = require_env!("MQTT_TOPIC");
    let mqtt_username = require_env!("MQTT_USERNAME");
    let mqtt_password = require_env!("MQTT_PASSWORD");

    let db_pool_max = parse_env!("DB_POOL_MAX", u32, 5);
    let mqtt_port = parse_env!("MQTT_PORT", u16, 1883);
    let http_port = parse_env!("HTTP_PORT", u16, 5000);
    let forecast_context_rows = parse_env!("FORECAST_CONTEXT_ROWS", usize, 48);
    let history_max_rows = parse_env!("HISTORY_MAX_ROWS", usize, 0);
    let models_dir = optional_env("MODELS_DIR").unwrap_or_else(|| "models_lr".to_string());

    Ok(Config {
        db_url,
        db_pool_max,
        mqtt_broker,
        mqtt_port,
        mqtt_topic,
        mqtt_username,
        mqtt_password,
        http_port,
        models_dir: PathBuf::from(models_dir),
        forecast_context_rows: forecast_context_rows.max(1),
        history_max_rows: (history_max_rows > 0).then_some(history_max_rows),
        cors_origin: optional_env("CORS_ORIGIN").filter(|o| o != "*"),
    })
}

/// Configuration for the offline trainer.
#[derive(Debug, Clone)]
pub struct TrainConfig {
    // ---
    pub db_url: String,
    pub db_pool_max: u32,
    pub models_dir: PathBuf,

    /// Rolling-mean window for feature construction.
    pub rolling_window: usize,

    /// Cross-validation folds; 0 disables cross-validation.
    pub cv_folds: usize,
}

/// Load trainer configuration.
///
/// Required: `DATABASE_URL`. Optional: `DB_POOL_MAX` (5), `MODELS_DIR`
/// (`models_lr`), `TRAIN_ROLLING_WINDOW` (3), `TRAIN_CV_FOLDS` (5).
pub fn load_train_from_env() -> Result<TrainConfig> {
    // ---
    let db_url = require_env!("DATABASE_URL");
    let db_pool_max = parse_env!("DB_POOL_MAX", u32, 5);
    let rolling_window = parse_env!("TRAIN_ROLLING_WINDOW", usize, 3);
    let cv_folds = parse_env!("TRAIN_CV_FOLDS", usize, 5);
    let models_dir = optional_env("MODELS_DIR").unwrap_or_else(|| "models_lr".to_string());

    if rolling_window == 0 {
        return Err(anyhow!("Invalid TRAIN_ROLLING_WINDOW: must be at least 1"));
    }

    Ok(TrainConfig {
        db_url,
        db_pool_max,
        models_dir: PathBuf::from(models_dir),
        rolling_window,
        cv_folds,
    })
}

/// Mask the password component of a connection URL.
pub fn mask_db_url(db_url: &str) -> String {
    // ---
    if let Some(at_pos) = db_url.rfind('@') {
        if let Some(colon_pos) = db_url[..at_pos].rfind(':') {
            // A colon belonging to the scheme ("postgres://") is not a password separator.
            if !db_url[colon_pos..].starts_with("://") {
                return format!("{}:****{}", &db_url[..colon_pos], &db_url[at_pos..]);
            }
        }
    }
    db_url.to_string()
}

impl Config {
    /// Log the loaded configuration for debugging purposes.
    ///
    /// Masks sensitive information like passwords while showing all
    /// configuration values that were loaded.
    pub fn log_config(&self) {
        // ---
        tracing::info!("Configuration loaded:");
        tracing::info!("  DATABASE_URL          : {}", mask_db_url(&self.db_url));
        tracing::info!("  DB_POOL_MAX           : {}", self.db_pool_max);
        tracing::info!("  MQTT_BROKER           : {}:{}", self.mqtt_broker, self.mqtt_port);
        tracing::info!("  MQTT_TOPIC            : {}", self.mqtt_topic);
        tracing::info!("  MQTT_USERNAME         : {}", self.mqtt_username);
        tracing::info!("  MQTT_PASSWORD         : ****");
        tracing::info!("  HTTP_PORT             : {}", self.http_port);
        tracing::info!("  MODELS_DIR            : {}", self.models_dir.display());
        tracing::info!("  FORECAST_CONTEXT_ROWS : {}", self.forecast_context_rows);
        tracing::info!("  HISTORY_MAX_ROWS      : {:?}", self.history_max_rows);
        tracing::info!("  CORS_ORIGIN           : {:?}", self.cors_origin);
    }
}

impl TrainConfig {
    pub fn log_config(&self) {
        // ---
        tracing::info!("Training configuration loaded:");
        tracing::info!("  DATABASE_URL         : {}", mask_db_url(&self.db_url));
        tracing::info!("  MODELS_DIR           : {}", self.models_dir.display());
        tracing::info!("  TRAIN_ROLLING_WINDOW : {}", self.rolling_window);
        tracing::info!("  TRAIN_CV_FOLDS       : {}", self.cv_folds);
    }
}
