//! Offline trainer for `airsense`.
//!
//! Loads the stored reading history, trains one regression model per
//! observed pollutant, writes each artifact to the models directory and
//! finishes with `model_performance_summary.json`. Targets that cannot be
//! trained are reported and skipped; only database or filesystem failures
//! make the process exit with an error.
use std::fs;

use anyhow::{Context, Result};
use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;

use airsense::ml::{ArtifactStore, ModelTrainer, TargetSummary};
use airsense::{config, schema, store, telemetry};

const SUMMARY_FILE: &str = "model_performance_summary.json";

// ---

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    telemetry::init_tracing();
    dotenv().ok();

    let cfg = config::load_train_from_env()?;
    cfg.log_config();

    let pool = PgPoolOptions::new()
        .max_connections(cfg.db_pool_max)
        .connect(&cfg.db_url)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to connect to database: {}", e))?;

    schema::create_schema(&pool).await?;
    let readings = store::load_history(&pool).await?;
    tracing::info!("Loaded {} readings for training", readings.len());

    let trainer = ModelTrainer::new(cfg.rolling_window).with_cv_folds(cfg.cv_folds);
    let run = tokio::task::spawn_blocking(move || trainer.train_all(&readings)).await?;

    let artifacts = ArtifactStore::new(cfg.models_dir.clone());
    for artifact in &run.artifacts {
        let path = artifacts
            .save(artifact)
            .with_context(|| format!("Failed to save model for {}", artifact.target))?;
        tracing::info!("Saved {} model to {}", artifact.target, path.display());
    }

    let summary = run.summary();
    let summary_path = cfg.models_dir.join(SUMMARY_FILE);
    fs::create_dir_all(&cfg.models_dir)?;
    fs::write(&summary_path, serde_json::to_vec_pretty(&summary)?)
        .with_context(|| format!("Failed to write {}", summary_path.display()))?;

    log_summary(&summary);
    for (target, reason) in &run.skipped {
        tracing::warn!("Skipped {}: {}", target, reason);
    }
    tracing::info!(
        "Training complete: {} trained, {} skipped, summary at {}",
        run.artifacts.len(),
        run.skipped.len(),
        summary_path.display()
    );

    Ok(())
}

fn log_summary(summary: &[TargetSummary]) {
    // ---
    tracing::info!(
        "{:<12} {:>6} {:>10} {:>10} {:>10} {:>8} {:>10}",
        "target", "rows", "train_rmse", "test_rmse", "test_mae", "test_r2", "cv_rmse"
    );
    for line in summary {
        let cv = line
            .cv_rmse_mean
            .zip(line.cv_rmse_std)
            .map(|(mean, std)| format!("{mean:.4}±{std:.4}"))
            .unwrap_or_else(|| "-".to_string());
        tracing::info!(
            "{:<12} {:>6} {:>10.4} {:>10.4} {:>10.4} {:>8.4} {:>10}",
            line.target.as_str(),
            line.rows,
            line.train_rmse,
            line.test_rmse,
            line.test_mae,
            line.test_r2,
            cv
        );
    }
}
