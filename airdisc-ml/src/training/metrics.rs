//! Regression metrics.

use crate::error::MlError;
use serde::{Deserialize, Serialize};

/// Regression metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    pub mse: f64,
    pub rmse: f64,
    pub mae: f64,
    pub r_squared: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explained_variance: Option<f64>,
}

impl RegressionMetrics {
    /// Compare predictions against ground truth, position by position.
    ///
    /// A constant target has no variance to explain: R² is 1.0 when the
    /// predictions are exact and 0.0 otherwise, and `explained_variance`
    /// is left unset.
    pub fn compute(y_true: &[f64], y_pred: &[f64]) -> Result<Self, MlError> {
        if y_true.is_empty() {
            return Err(MlError::validation("cannot score an empty target"));
        }
        if y_true.len() != y_pred.len() {
            return Err(MlError::validation(format!(
                "{} targets but {} predictions",
                y_true.len(),
                y_pred.len()
            )));
        }

        let n = y_true.len() as f64;
        let residuals: Vec<f64> = y_true.iter().zip(y_pred).map(|(t, p)| t - p).collect();
        let ss_res: f64 = residuals.iter().map(|r| r * r).sum();
        let mae = residuals.iter().map(|r| r.abs()).sum::<f64>() / n;
        let mse = ss_res / n;

        let mean = y_true.iter().sum::<f64>() / n;
        let ss_tot: f64 = y_true.iter().map(|t| (t - mean).powi(2)).sum();

        let (r_squared, explained_variance) = if ss_tot > 0.0 {
            let res_mean = residuals.iter().sum::<f64>() / n;
            let res_var = residuals.iter().map(|r| (r - res_mean).powi(2)).sum::<f64>();
            (1.0 - ss_res / ss_tot, Some(1.0 - res_var / ss_tot))
        } else if ss_res == 0.0 {
            (1.0, None)
        } else {
            (0.0, None)
        };

        Ok(Self {
            mse,
            rmse: mse.sqrt(),
            mae,
            r_squared,
            explained_variance,
        })
    }
}
