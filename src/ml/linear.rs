//! Ordinary least squares regression with intercept.

use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};

use super::error::{ModelError, Result};

/// Relative pivot size below which the normal equations are treated as
/// singular.
const PIVOT_TOLERANCE: f64 = 1e-10;

/// Ridge strength, relative to the mean diagonal of `XᵀX`, used when the
/// plain system is singular (collinear or constant features).
const FALLBACK_RIDGE: f64 = 1e-6;

/// Solve the symmetric system `A x = b` by Cholesky decomposition.
/// Returns `None` when `A` is not numerically positive definite.
fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    if n != a.ncols() || n != b.len() {
        return None;
    }

    let max_diag = a.diag().iter().fold(0.0f64, |m, v| m.max(v.abs()));
    let tolerance = PIVOT_TOLERANCE * max_diag.max(f64::MIN_POSITIVE);

    // A = L * Lᵀ
    let mut l = Array2::<f64>::zeros((n, n));
    for i in 0..n {
        for j in 0..=i {
            let mut sum = 0.0;
            for k in 0..j {
                sum += l[[i, k]] * l[[j, k]];
            }

            if i == j {
                let diag = a[[i, i]] - sum;
                if diag <= tolerance || !diag.is_finite() {
                    return None;
                }
                l[[i, j]] = diag.sqrt();
            } else {
                l[[i, j]] = (a[[i, j]] - sum) / l[[j, j]];
            }
        }
    }

    // L * y = b
    let mut y = Array1::<f64>::zeros(n);
    for i in 0..n {
        let mut sum = 0.0;
        for j in 0..i {
            sum += l[[i, j]] * y[j];
        }
        y[i] = (b[i] - sum) / l[[i, i]];
    }

    // Lᵀ * x = y
    let mut x = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let mut sum = 0.0;
        for j in (i + 1)..n {
            sum += l[[j, i]] * x[j];
        }
        x[i] = (y[i] - sum) / l[[i, i]];
    }

    Some(x)
}

/// Solve `(XᵀX) w = Xᵀy`, retrying with a small ridge term when the
/// system is singular.
fn solve_least_squares(x: &Array2<f64>, y: &Array1<f64>) -> Option<Array1<f64>> {
    let xtx = x.t().dot(x);
    let xty = x.t().dot(y);

    if let Some(w) = cholesky_solve(&xtx, &xty) {
        return Some(w);
    }

    let n = xtx.nrows();
    if n == 0 {
        return Some(Array1::zeros(0));
    }
    let mean_diag = xtx.diag().sum() / n as f64;
    let ridge = (FALLBACK_RIDGE * mean_diag).max(FALLBACK_RIDGE);

    tracing::debug!(ridge, "normal equations singular, retrying with ridge term");

    let mut regularized = xtx;
    for i in 0..n {
        regularized[[i, i]] += ridge;
    }
    cholesky_solve(&regularized, &xty)
}

/// Linear regression model: `y = X·w + b`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearRegression {
    pub coefficients: Array1<f64>,
    pub intercept: f64,
}

impl LinearRegression {
    /// Fit on `x` (rows = samples) and `y`, always with an intercept.
    pub fn fit(x: &Array2<f64>, y: &Array1<f64>) -> Result<Self> {
        // ---
        let n_samples = x.nrows();
        if n_samples != y.len() {
            return Err(ModelError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 {
            return Err(ModelError::ShapeError {
                expected: "at least 1 sample".to_string(),
                actual: "0 samples".to_string(),
            });
        }

        let x_mean = x
            .mean_axis(Axis(0))
            .ok_or_else(|| ModelError::ComputationError("empty feature mean".to_string()))?;
        let y_mean = y.mean().unwrap_or(0.0);

        let x_centered = x - &x_mean;
        let y_centered = y - y_mean;

        let coefficients = solve_least_squares(&x_centered, &y_centered).ok_or_else(|| {
            ModelError::ComputationError("Matrix is singular, cannot solve least squares".to_string())
        })?;

        if coefficients.iter().any(|c| !c.is_finite()) {
            return Err(ModelError::ComputationError(
                "least squares produced non-finite coefficients".to_string(),
            ));
        }

        let intercept = y_mean - coefficients.dot(&x_mean);
        Ok(Self {
            coefficients,
            intercept,
        })
    }

    pub fn n_features(&self) -> usize {
        self.coefficients.len()
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        // ---
        if x.ncols() != self.n_features() {
            return Err(ModelError::ShapeError {
                expected: format!("{} features", self.n_features()),
                actual: format!("{} features", x.ncols()),
            });
        }
        Ok(x.dot(&self.coefficients) + self.intercept)
    }

    pub fn predict_row(&self, row: ArrayView1<f64>) -> Result<f64> {
        // ---
        if row.len() != self.n_features() {
            return Err(ModelError::ShapeError {
                expected: format!("{} features", self.n_features()),
                actual: format!("{} features", row.len()),
            });
        }
        Ok(row.dot(&self.coefficients) + self.intercept)
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use ndarray::array;

    #[test]
    fn test_recovers_exact_linear_relation() {
        // ---
        // y = 2*x1 - 3*x2 + 5
        let x = array![
            [1.0, 0.0],
            [2.0, 1.0],
            [3.0, 5.0],
            [4.0, 2.0],
            [5.0, 7.0],
            [6.0, 3.0]
        ];
        let y = x.map_axis(Axis(1), |r| 2.0 * r[0] - 3.0 * r[1] + 5.0);

        let model = LinearRegression::fit(&x, &y).unwrap();
        assert!((model.coefficients[0] - 2.0).abs() < 1e-9);
        assert!((model.coefficients[1] + 3.0).abs() < 1e-9);
        assert!((model.intercept - 5.0).abs() < 1e-9);

        let pred = model.predict_row(array![10.0, 1.0].view()).unwrap();
        assert!((pred - 22.0).abs() < 1e-9);
    }

    #[test]
    fn test_collinear_features_fall_back_to_ridge() {
        // ---
        // Second column duplicates the first; plain OLS is singular.
        let x = array![[1.0, 1.0], [2.0, 2.0], [3.0, 3.0], [4.0, 4.0]];
        let y = array![2.0, 4.0, 6.0, 8.0];

        let model = LinearRegression::fit(&x, &y).unwrap();
        let pred = model.predict(&x).unwrap();
        for (p, t) in pred.iter().zip(y.iter()) {
            assert!((p - t).abs() < 1e-3);
        }
    }

    #[test]
    fn test_constant_feature_is_tolerated() {
        // ---
        let x = array![[1.0, 0.0], [2.0, 0.0], [3.0, 0.0]];
        let y = array![1.0, 2.0, 3.0];
        let model = LinearRegression::fit(&x, &y).unwrap();
        assert!((model.predict_row(array![4.0, 0.0].view()).unwrap() - 4.0).abs() < 1e-3);
    }

    #[test]
    fn test_shape_errors() {
        // ---
        let x = array![[1.0], [2.0]];
        assert!(LinearRegression::fit(&x, &array![1.0]).is_err());

        let model = LinearRegression::fit(&x, &array![1.0, 2.0]).unwrap();
        assert!(model.predict_row(array![1.0, 2.0].view()).is_err());
    }
}
