//! Regression estimator selection.

use crate::error::MlError;
use crate::model::forest::{ForestModel, TreeParams};
use crate::model::linear::LinearModel;
use ndarray::{Array1, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

/// Which regressor to fit. Chosen explicitly through configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Estimator {
    #[default]
    LinearRegression,
    RandomForest {
        #[serde(default = "default_n_estimators")]
        n_estimators: usize,
        #[serde(default)]
        max_depth: Option<usize>,
        #[serde(default = "default_min_samples_split")]
        min_samples_split: usize,
        #[serde(default = "default_min_samples_leaf")]
        min_samples_leaf: usize,
    },
}

fn default_n_estimators() -> usize {
    100
}

fn default_min_samples_split() -> usize {
    2
}

fn default_min_samples_leaf() -> usize {
    1
}

impl Estimator {
    /// Random forest with the usual defaults (100 fully grown trees).
    pub fn random_forest() -> Self {
        Self::RandomForest {
            n_estimators: default_n_estimators(),
            max_depth: None,
            min_samples_split: default_min_samples_split(),
            min_samples_leaf: default_min_samples_leaf(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::LinearRegression => "linear_regression",
            Self::RandomForest { .. } => "random_forest",
        }
    }

    /// Fit on an encoded design matrix. `seed` drives every stochastic step.
    pub fn fit(
        &self,
        x: ArrayView2<'_, f64>,
        y: ArrayView1<'_, f64>,
        seed: u64,
    ) -> Result<FittedEstimator, MlError> {
        match self {
            Self::LinearRegression => LinearModel::fit(x, y).map(FittedEstimator::Linear),
            Self::RandomForest {
                n_estimators,
                max_depth,
                min_samples_split,
                min_samples_leaf,
            } => {
                let params = TreeParams {
                    max_depth: *max_depth,
                    min_samples_split: *min_samples_split,
                    min_samples_leaf: *min_samples_leaf,
                };
                ForestModel::fit(x, y, *n_estimators, params, seed).map(FittedEstimator::Forest)
            }
        }
    }
}

/// A fitted regressor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "params", rename_all = "snake_case")]
pub enum FittedEstimator {
    Linear(LinearModel),
    Forest(ForestModel),
}

impl FittedEstimator {
    pub fn predict(&self, x: ArrayView2<'_, f64>) -> Array1<f64> {
        match self {
            Self::Linear(m) => m.predict(x),
            Self::Forest(m) => m.predict(x),
        }
    }

    pub(crate) fn check(&self, n_features: usize) -> Result<(), String> {
        match self {
            Self::Linear(m) => m.check(n_features),
            Self::Forest(m) => m.check(n_features),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_linear() {
        assert_eq!(Estimator::default(), Estimator::LinearRegression);
        assert_eq!(Estimator::default().name(), "linear_regression");
    }

    #[test]
    fn test_forest_config_defaults_from_partial_json() {
        let est: Estimator = serde_json::from_str(r#"{"kind": "random_forest", "n_estimators": 10}"#).unwrap();
        assert_eq!(
            est,
            Estimator::RandomForest {
                n_estimators: 10,
                max_depth: None,
                min_samples_split: 2,
                min_samples_leaf: 1,
            }
        );
    }

    #[test]
    fn test_linear_serializes_as_kind_tag() {
        let json = serde_json::to_value(Estimator::LinearRegression).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "linear_regression"}));
    }
}
