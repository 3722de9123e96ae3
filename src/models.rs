//! Data models shared by ingestion, training and serving.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---

/// One measured quantity reported by an air-quality sensor.
///
/// The declaration order is the canonical feature order used when
/// building feature rows, so reordering variants changes every trained
/// artifact's feature layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Pollutant {
    #[serde(rename = "pm2_5")]
    Pm2_5,
    #[serde(rename = "pm10")]
    Pm10,
    #[serde(rename = "co2")]
    Co2,
    #[serde(rename = "tvoc")]
    Tvoc,
    #[serde(rename = "temperature")]
    Temperature,
    #[serde(rename = "humidity")]
    Humidity,
    #[serde(rename = "pressure")]
    Pressure,
}

impl Pollutant {
    pub const ALL: [Pollutant; 7] = [
        Pollutant::Pm2_5,
        Pollutant::Pm10,
        Pollutant::Co2,
        Pollutant::Tvoc,
        Pollutant::Temperature,
        Pollutant::Humidity,
        Pollutant::Pressure,
    ];

    /// Wire name, also used as the column name in storage and feature names.
    pub fn as_str(&self) -> &'static str {
        // ---
        match self {
            Pollutant::Pm2_5 => "pm2_5",
            Pollutant::Pm10 => "pm10",
            Pollutant::Co2 => "co2",
            Pollutant::Tvoc => "tvoc",
            Pollutant::Temperature => "temperature",
            Pollutant::Humidity => "humidity",
            Pollutant::Pressure => "pressure",
        }
    }

    /// Resolve a payload field name, accepting the spellings devices use.
    pub fn from_field(name: &str) -> Option<Pollutant> {
        // ---
        match name.to_ascii_lowercase().as_str() {
            "pm2_5" | "pm25" | "pm2.5" => Some(Pollutant::Pm2_5),
            "pm10" => Some(Pollutant::Pm10),
            "co2" => Some(Pollutant::Co2),
            "tvoc" => Some(Pollutant::Tvoc),
            "temperature" => Some(Pollutant::Temperature),
            "humidity" => Some(Pollutant::Humidity),
            "pressure" => Some(Pollutant::Pressure),
            _ => None,
        }
    }
}

impl fmt::Display for Pollutant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A timestamped set of sensor values. Absent keys are missing values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    // ---
    pub timestamp: DateTime<Utc>,
    pub values: BTreeMap<Pollutant, f64>,
    /// Air-quality index as reported by the device, if any.
    #[serde(default)]
    pub aqi: Option<f64>,
}

impl Reading {
    // ---
    pub fn new(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            values: BTreeMap::new(),
            aqi: None,
        }
    }

    pub fn with(mut self, pollutant: Pollutant, value: f64) -> Self {
        self.set(pollutant, value);
        self
    }

    pub fn get(&self, pollutant: Pollutant) -> Option<f64> {
        self.values.get(&pollutant).copied()
    }

    /// Store a value; non-finite values are treated as missing.
    pub fn set(&mut self, pollutant: Pollutant, value: f64) {
        // ---
        if value.is_finite() {
            self.values.insert(pollutant, value);
        } else {
            self.values.remove(&pollutant);
        }
    }

    pub fn has_any_value(&self) -> bool {
        !self.values.is_empty()
    }
}

/// Chronologically ordered readings held by the serving process.
#[derive(Debug, Clone, Default)]
pub struct ReadingHistory {
    // ---
    readings: Vec<Reading>,
    max_len: Option<usize>,
}

impl ReadingHistory {
    // ---
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from readings in any order. Equal timestamps keep their
    /// original relative order.
    pub fn from_readings(mut readings: Vec<Reading>) -> Self {
        // ---
        readings.sort_by_key(|r| r.timestamp);
        Self {
            readings,
            max_len: None,
        }
    }

    /// Bound the history to the newest `max_len` readings.
    pub fn with_max_len(mut self, max_len: usize) -> Self {
        // ---
        self.max_len = Some(max_len.max(1));
        self.evict();
        self
    }

    /// Append a live reading. A reading older than the newest one is
    /// inserted at its sorted position.
    pub fn push(&mut self, reading: Reading) {
        // ---
        let in_order = self
            .readings
            .last()
            .map_or(true, |last| last.timestamp <= reading.timestamp);

        if in_order {
            self.readings.push(reading);
        } else {
            let idx = self
                .readings
                .partition_point(|r| r.timestamp <= reading.timestamp);
            self.readings.insert(idx, reading);
        }
        self.evict();
    }

    fn evict(&mut self) {
        if let Some(max) = self.max_len {
            if self.readings.len() > max {
                let excess = self.readings.len() - max;
                self.readings.drain(..excess);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    pub fn as_slice(&self) -> &[Reading] {
        &self.readings
    }

    /// The newest `n` readings, oldest first.
    pub fn tail(&self, n: usize) -> &[Reading] {
        &self.readings[self.readings.len().saturating_sub(n)..]
    }

    /// Split into the newest reading that carries at least one value and
    /// the readings that precede it.
    pub fn split_latest(&self) -> Option<(&Reading, &[Reading])> {
        // ---
        let idx = self.readings.iter().rposition(Reading::has_any_value)?;
        Some((&self.readings[idx], &self.readings[..idx]))
    }
}

/// One point of a multi-step forecast.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastPoint {
    // ---
    /// Hour or day index, starting at 1.
    pub offset: u32,
    pub timestamp: DateTime<Utc>,
    pub values: BTreeMap<Pollutant, f64>,
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(hour: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 26, 0, 0, 0).unwrap() + Duration::hours(hour)
    }

    #[test]
    fn test_pollutant_field_aliases() {
        // ---
        assert_eq!(Pollutant::from_field("PM2.5"), Some(Pollutant::Pm2_5));
        assert_eq!(Pollutant::from_field("pm25"), Some(Pollutant::Pm2_5));
        assert_eq!(Pollutant::from_field("co2"), Some(Pollutant::Co2));
        assert_eq!(Pollutant::from_field("battery"), None);
    }

    #[test]
    fn test_pollutant_wire_names_match_serde() {
        // ---
        for p in Pollutant::ALL {
            let json = serde_json::to_string(&p).unwrap();
            assert_eq!(json, format!("\"{}\"", p.as_str()));
        }
    }

    #[test]
    fn test_non_finite_values_are_missing() {
        // ---
        let r = Reading::new(at(0))
            .with(Pollutant::Co2, f64::NAN)
            .with(Pollutant::Pm10, 4.0);
        assert_eq!(r.get(Pollutant::Co2), None);
        assert_eq!(r.get(Pollutant::Pm10), Some(4.0));
    }

    #[test]
    fn test_history_sorts_on_load() {
        // ---
        let history = ReadingHistory::from_readings(vec![
            Reading::new(at(2)).with(Pollutant::Co2, 2.0),
            Reading::new(at(0)).with(Pollutant::Co2, 0.0),
            Reading::new(at(1)).with(Pollutant::Co2, 1.0),
        ]);
        let values: Vec<_> = history
            .as_slice()
            .iter()
            .map(|r| r.get(Pollutant::Co2).unwrap())
            .collect();
        assert_eq!(values, vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_history_push_keeps_order_and_bound() {
        // ---
        let mut history = ReadingHistory::new().with_max_len(3);
        for h in [0, 1, 3] {
            history.push(Reading::new(at(h)));
        }
        history.push(Reading::new(at(2)));

        let hours: Vec<_> = history.as_slice().iter().map(|r| r.timestamp).collect();
        assert_eq!(hours, vec![at(1), at(2), at(3)]);
    }

    #[test]
    fn test_split_latest_skips_empty_readings() {
        // ---
        let history = ReadingHistory::from_readings(vec![
            Reading::new(at(0)).with(Pollutant::Pm10, 1.0),
            Reading::new(at(1)).with(Pollutant::Pm10, 2.0),
            Reading::new(at(2)),
        ]);
        let (latest, prior) = history.split_latest().unwrap();
        assert_eq!(latest.timestamp, at(1));
        assert_eq!(prior.len(), 1);

        assert!(ReadingHistory::new().split_latest().is_none());
    }
}
