//! Database schema management for `airsense`.
//!
//! Ensures required tables and indexes exist before ingesting or training.
//! Applied once on startup from each binary.

use anyhow::Result;
use sqlx::PgPool;

// ---

/// Create or update the database schema (idempotent).
///
/// Creates the `air_readings` table holding one row per ingested reading,
/// with one nullable column per pollutant. Safe to call on every startup;
/// no-op if objects already exist.
///
/// Errors are propagated if any SQL execution fails.
pub async fn create_schema(pool: &PgPool) -> Result<()> {
    // ---
    let mut tx = pool.begin().await?;

    // Missing measurements are stored as NULL
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS air_readings (
            id           BIGSERIAL PRIMARY KEY,
            recorded_at  TIMESTAMPTZ      NOT NULL,
            pm2_5        DOUBLE PRECISION,
            pm10         DOUBLE PRECISION,
            co2          DOUBLE PRECISION,
            tvoc         DOUBLE PRECISION,
            temperature  DOUBLE PRECISION,
            humidity     DOUBLE PRECISION,
            pressure     DOUBLE PRECISION,
            aqi          DOUBLE PRECISION
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // History is always loaded in time order
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_air_readings_recorded_at
            ON air_readings (recorded_at);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}
