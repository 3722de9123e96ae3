//! Reading persistence in PostgreSQL.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::{Pollutant, Reading};

// ---

/// One row of `air_readings`.
#[derive(Debug, sqlx::FromRow)]
struct ReadingRow {
    // ---
    recorded_at: DateTime<Utc>,
    pm2_5: Option<f64>,
    pm10: Option<f64>,
    co2: Option<f64>,
    tvoc: Option<f64>,
    temperature: Option<f64>,
    humidity: Option<f64>,
    pressure: Option<f64>,
    aqi: Option<f64>,
}

impl From<ReadingRow> for Reading {
    fn from(row: ReadingRow) -> Self {
        // ---
        let columns = [
            (Pollutant::Pm2_5, row.pm2_5),
            (Pollutant::Pm10, row.pm10),
            (Pollutant::Co2, row.co2),
            (Pollutant::Tvoc, row.tvoc),
            (Pollutant::Temperature, row.temperature),
            (Pollutant::Humidity, row.humidity),
            (Pollutant::Pressure, row.pressure),
        ];

        let mut reading = Reading::new(row.recorded_at);
        for (pollutant, value) in columns {
            if let Some(v) = value {
                reading.set(pollutant, v);
            }
        }
        reading.aqi = row.aqi;
        reading
    }
}

/// Store a reading in the `air_readings` table.
pub async fn insert_reading(pool: &PgPool, reading: &Reading) -> Result<(), sqlx::Error> {
    // ---
    sqlx::query(
        r#"
        INSERT INTO air_readings (
            recorded_at, pm2_5, pm10, co2, tvoc,
            temperature, humidity, pressure, aqi
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        "#,
    )
    .bind(reading.timestamp)
    .bind(reading.get(Pollutant::Pm2_5))
    .bind(reading.get(Pollutant::Pm10))
    .bind(reading.get(Pollutant::Co2))
    .bind(reading.get(Pollutant::Tvoc))
    .bind(reading.get(Pollutant::Temperature))
    .bind(reading.get(Pollutant::Humidity))
    .bind(reading.get(Pollutant::Pressure))
    .bind(reading.aqi)
    .execute(pool)
    .await?;

    Ok(())
}

/// Load every stored reading, oldest first.
pub async fn load_history(pool: &PgPool) -> Result<Vec<Reading>, sqlx::Error> {
    // ---
    let rows: Vec<ReadingRow> = sqlx::query_as(
        r#"
        SELECT recorded_at, pm2_5, pm10, co2, tvoc,
               temperature, humidity, pressure, aqi
        FROM air_readings
        ORDER BY recorded_at ASC, id ASC
        "#,
    )
    .fetch_all(pool)
    .await?;

    tracing::debug!("Loaded {} stored readings", rows.len());
    Ok(rows.into_iter().map(Reading::from).collect())
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_row_nulls_become_missing_values() {
        // ---
        let row = ReadingRow {
            recorded_at: Utc.with_ymd_and_hms(2025, 3, 26, 18, 45, 0).unwrap(),
            pm2_5: Some(12.5),
            pm10: None,
            co2: Some(415.0),
            tvoc: None,
            temperature: Some(21.0),
            humidity: None,
            pressure: None,
            aqi: Some(52.0),
        };

        let reading = Reading::from(row);
        assert_eq!(reading.get(Pollutant::Pm2_5), Some(12.5));
        assert_eq!(reading.get(Pollutant::Pm10), None);
        assert_eq!(reading.values.len(), 3);
        assert_eq!(reading.aqi, Some(52.0));
    }
}
