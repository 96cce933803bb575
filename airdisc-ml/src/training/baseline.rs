//! Reference baselines: the training mean and the hand-written loyalty rule.

use crate::data::table::{Series, Table};
use crate::error::MlError;
use crate::model::predictor::TARGET_NAME;
use serde::{Deserialize, Serialize};

/// Predicts the training mean for every row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeanBaseline {
    pub mean: f64,
}

impl MeanBaseline {
    pub fn fit(y: &Series) -> Result<Self, MlError> {
        let mean = y
            .mean()
            .ok_or_else(|| MlError::validation("y must be a non-empty series"))?;
        Ok(Self { mean })
    }

    pub fn predict(&self, x: &Table) -> Result<Series, MlError> {
        Series::new(TARGET_NAME, vec![self.mean; x.n_rows()]).with_index(x.index().to_vec())
    }
}

/// Fixed loyalty rule: 10 points for more than 5 prior trips, 5 more for
/// routes longer than 1000 km. Missing values count as zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RuleBaseline {
    pub trips_threshold: f64,
    pub trips_bonus: f64,
    pub distance_threshold_km: f64,
    pub distance_bonus: f64,
}

impl Default for RuleBaseline {
    fn default() -> Self {
        Self {
            trips_threshold: 5.0,
            trips_bonus: 10.0,
            distance_threshold_km: 1000.0,
            distance_bonus: 5.0,
        }
    }
}

impl RuleBaseline {
    /// Discount for one passenger/route pair.
    pub fn discount(&self, history_trips: f64, distance_km: f64) -> f64 {
        let mut discount = 0.0;
        if history_trips > self.trips_threshold {
            discount += self.trips_bonus;
        }
        if distance_km > self.distance_threshold_km {
            discount += self.distance_bonus;
        }
        discount
    }

    /// Score every row of a feature frame. Absent columns read as zero.
    pub fn predict(&self, x: &Table) -> Result<Series, MlError> {
        let trips = numeric_or_zero(x, "history_trips")?;
        let distance = numeric_or_zero(x, "distance_km")?;
        let values = trips
            .iter()
            .zip(&distance)
            .map(|(t, d)| self.discount(*t, *d))
            .collect();
        Series::new(TARGET_NAME, values).with_index(x.index().to_vec())
    }
}

fn numeric_or_zero(x: &Table, name: &str) -> Result<Vec<f64>, MlError> {
    match x.column(name) {
        None => Ok(vec![0.0; x.n_rows()]),
        Some(col) => col
            .data
            .as_f64()
            .map(|v| v.into_iter().map(|c| c.unwrap_or(0.0)).collect())
            .ok_or_else(|| MlError::validation(format!("column '{name}' must be numeric"))),
    }
}
