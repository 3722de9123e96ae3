//! US-EPA style air-quality index approximation.
//!
//! Used only when a device did not report an index of its own. Each
//! pollutant is mapped piecewise-linearly onto its index band and the worse
//! of the two sub-indices wins. Concentrations above the last band are
//! capped at 300 rather than extrapolated.

use crate::{Pollutant, Reading};

/// (concentration low, concentration high, index low, index high)
type Band = (f64, f64, f64, f64);

const PM2_5_BANDS: [Band; 4] = [
    (0.0, 12.0, 0.0, 50.0),
    (12.1, 35.4, 51.0, 100.0),
    (35.5, 55.4, 101.0, 150.0),
    (55.5, 150.4, 151.0, 200.0),
];

const PM10_BANDS: [Band; 3] = [
    (0.0, 54.0, 0.0, 50.0),
    (55.0, 154.0, 51.0, 100.0),
    (155.0, 254.0, 101.0, 150.0),
];

const INDEX_CAP: f64 = 300.0;

fn sub_index(concentration: f64, bands: &[Band]) -> f64 {
    // ---
    for &(c_lo, c_hi, i_lo, i_hi) in bands {
        if concentration <= c_hi {
            return (i_hi - i_lo) / (c_hi - c_lo) * (concentration - c_lo) + i_lo;
        }
    }
    INDEX_CAP
}

/// Index for the given particulate concentrations (µg/m³), truncated to an
/// integer.
pub fn compute(pm2_5: f64, pm10: f64) -> i64 {
    // ---
    let index = sub_index(pm2_5, &PM2_5_BANDS).max(sub_index(pm10, &PM10_BANDS));
    index as i64
}

/// The reading's own index when it is present and non-zero, otherwise one
/// computed from its particulates (missing particulates count as zero).
pub fn for_reading(reading: &Reading) -> f64 {
    // ---
    match reading.aqi {
        Some(aqi) if aqi != 0.0 && aqi.is_finite() => aqi,
        _ => compute(
            reading.get(Pollutant::Pm2_5).unwrap_or(0.0),
            reading.get(Pollutant::Pm10).unwrap_or(0.0),
        ) as f64,
    }
}
