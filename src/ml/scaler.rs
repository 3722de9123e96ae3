//! Zero-mean, unit-variance feature standardization.

use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};

use super::error::{ModelError, Result};

/// Per-column standard scaler: `(x - mean) / std`.
///
/// Uses the population standard deviation. Columns with zero variance get
/// a scale of 1 so they transform to zero instead of dividing by zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Array1<f64>,
    pub scale: Array1<f64>,
}

impl StandardScaler {
    /// Fit column statistics on `x`. Requires at least one row.
    pub fn fit(x: &Array2<f64>) -> Result<Self> {
        // ---
        if x.nrows() == 0 {
            return Err(ModelError::ShapeError {
                expected: "at least 1 row".to_string(),
                actual: "0 rows".to_string(),
            });
        }

        let mean = x
            .mean_axis(Axis(0))
            .ok_or_else(|| ModelError::ComputationError("empty column mean".to_string()))?;
        let scale = x
            .std_axis(Axis(0), 0.0)
            .mapv(|s| if s == 0.0 || !s.is_finite() { 1.0 } else { s });

        Ok(Self { mean, scale })
    }

    pub fn n_features(&self) -> usize {
        self.mean.len()
    }

    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        // ---
        self.check_width(x.ncols())?;
        Ok((x - &self.mean) / &self.scale)
    }

    pub fn transform_row(&self, row: ArrayView1<f64>) -> Result<Array1<f64>> {
        // ---
        self.check_width(row.len())?;
        Ok((&row - &self.mean) / &self.scale)
    }

    fn check_width(&self, width: usize) -> Result<()> {
        if width != self.n_features() {
            return Err(ModelError::ShapeError {
                expected: format!("{} features", self.n_features()),
                actual: format!("{} features", width),
            });
        }
        Ok(())
    }
}
