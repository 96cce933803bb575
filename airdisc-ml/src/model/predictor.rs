//! The discount predictor: validated fit / predict / save / load.
//!
//! A predictor starts unfitted. `fit` (or `load`) moves it to fitted;
//! fitting again replaces the pipeline. `predict` and `save` require a
//! fitted predictor.
//!
//! Instances are not internally synchronized. `fit` takes `&mut self`, so
//! sharing one predictor across threads requires the caller's own lock.

use crate::data::table::{Series, Table};
use crate::error::MlError;
use crate::model::artifact::ModelArtifact;
use crate::model::estimator::Estimator;
use crate::model::pipeline::FittedPipeline;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Seed used for every stochastic step unless configured otherwise.
pub const DEFAULT_SEED: u64 = 42;

/// Name of the prediction series.
pub const TARGET_NAME: &str = "discount_value";

/// Estimator choice and seed, fixed at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictorConfig {
    #[serde(default)]
    pub estimator: Estimator,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            estimator: Estimator::default(),
            seed: DEFAULT_SEED,
        }
    }
}

fn default_seed() -> u64 {
    DEFAULT_SEED
}

/// Regression over the canonical feature frame.
#[derive(Debug, Clone, Default)]
pub struct DiscountPredictor {
    config: PredictorConfig,
    pipeline: Option<FittedPipeline>,
}

impl DiscountPredictor {
    /// Unfitted linear-regression predictor with seed 42.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: PredictorConfig) -> Self {
        Self {
            config,
            pipeline: None,
        }
    }

    pub fn config(&self) -> &PredictorConfig {
        &self.config
    }

    pub fn is_fitted(&self) -> bool {
        self.pipeline.is_some()
    }

    /// Encoded feature names of the fitted pipeline.
    pub fn feature_names(&self) -> Option<Vec<String>> {
        self.pipeline
            .as_ref()
            .map(|p| p.preprocessor.output_names())
    }

    /// Fit on `x` with targets `y`, aligned by position.
    ///
    /// All validation happens before any training; a failed fit leaves the
    /// previous state untouched.
    pub fn fit(&mut self, x: &Table, y: &Series) -> Result<&mut Self, MlError> {
        validate_x(x)?;
        if y.is_empty() {
            return Err(MlError::validation("y must be a non-empty series"));
        }
        if x.n_rows() != y.len() {
            return Err(MlError::validation(format!(
                "X has {} rows but y has {} values",
                x.n_rows(),
                y.len()
            )));
        }
        if let Some(pos) = y.values().iter().position(|v| !v.is_finite()) {
            return Err(MlError::validation(format!(
                "y holds a non-finite value at position {pos}"
            )));
        }

        let pipeline = FittedPipeline::fit(x, y.values(), &self.config.estimator, self.config.seed)?;
        tracing::debug!(
            rows = x.n_rows(),
            features = pipeline.n_features(),
            estimator = self.config.estimator.name(),
            refit = self.pipeline.is_some(),
            "Fitted discount predictor"
        );
        self.pipeline = Some(pipeline);
        Ok(self)
    }

    /// Predict one value per row of `x`, labelled with `x`'s index in order.
    pub fn predict(&self, x: &Table) -> Result<Series, MlError> {
        let pipeline = self
            .pipeline
            .as_ref()
            .ok_or_else(|| MlError::not_fitted("call fit before predict"))?;
        validate_x(x)?;
        let values = pipeline.predict(x)?;
        Series::new(TARGET_NAME, values.to_vec()).with_index(x.index().to_vec())
    }

    /// Write the fitted pipeline to `path`, replacing any existing artifact.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), MlError> {
        let path = path.as_ref();
        let pipeline = self
            .pipeline
            .as_ref()
            .ok_or_else(|| MlError::not_fitted("call fit before save"))?;
        ModelArtifact::new(self.config.clone(), pipeline.clone())?.write(path)?;
        tracing::debug!(path = %path.display(), "Saved discount model artifact");
        Ok(())
    }

    /// Restore a fitted predictor from an artifact written by [`save`](Self::save).
    pub fn load(path: impl AsRef<Path>) -> Result<Self, MlError> {
        let path = path.as_ref();
        let artifact = ModelArtifact::read(path)?;
        tracing::debug!(
            path = %path.display(),
            created_at = %artifact.created_at,
            estimator = artifact.config.estimator.name(),
            "Loaded discount model artifact"
        );
        Ok(Self {
            config: artifact.config,
            pipeline: Some(artifact.pipeline),
        })
    }
}

fn validate_x(x: &Table) -> Result<(), MlError> {
    if x.is_empty() {
        return Err(MlError::validation("X must be a non-empty table"));
    }
    Ok(())
}
