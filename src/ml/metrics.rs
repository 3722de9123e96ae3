//! Regression error metrics.

use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// RMSE, MAE and R² for one partition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    pub rmse: f64,
    pub mae: f64,
    pub r2: f64,
}

impl RegressionMetrics {
    pub fn compute(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Self {
        Self {
            rmse: rmse(y_true, y_pred),
            mae: mae(y_true, y_pred),
            r2: r2(y_true, y_pred),
        }
    }
}

pub fn rmse(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    // ---
    if y_true.is_empty() {
        return 0.0;
    }
    let mse = (y_true - y_pred).mapv(|e| e * e).sum() / y_true.len() as f64;
    mse.sqrt()
}

pub fn mae(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    // ---
    if y_true.is_empty() {
        return 0.0;
    }
    (y_true - y_pred).mapv(f64::abs).sum() / y_true.len() as f64
}

/// Coefficient of determination. A constant target scores 1.0 when
/// predicted exactly and 0.0 otherwise.
pub fn r2(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    // ---
    let Some(mean) = y_true.mean() else {
        return 0.0;
    };
    let ss_res = (y_true - y_pred).mapv(|e| e * e).sum();
    let ss_tot = y_true.mapv(|v| (v - mean) * (v - mean)).sum();

    if ss_tot == 0.0 {
        return if ss_res == 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}

/// Mean and population standard deviation of a set of scores.
pub fn mean_std(values: &[f64]) -> (f64, f64) {
    // ---
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
    (mean, var.sqrt())
}
