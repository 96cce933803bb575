//! Preprocessing + regressor, fitted together.

use crate::data::table::Table;
use crate::error::MlError;
use crate::model::estimator::{Estimator, FittedEstimator};
use crate::model::preprocess::Preprocessor;
use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedPipeline {
    pub preprocessor: Preprocessor,
    pub estimator: FittedEstimator,
}

impl FittedPipeline {
    pub fn fit(x: &Table, y: &[f64], estimator: &Estimator, seed: u64) -> Result<Self, MlError> {
        let preprocessor = Preprocessor::fit(x)?;
        let design = preprocessor.transform(x)?;
        let estimator = estimator.fit(design.view(), ArrayView1::from(y), seed)?;
        Ok(Self {
            preprocessor,
            estimator,
        })
    }

    pub fn predict(&self, x: &Table) -> Result<Array1<f64>, MlError> {
        let design = self.preprocessor.transform(x)?;
        Ok(self.estimator.predict(design.view()))
    }

    pub fn n_features(&self) -> usize {
        self.preprocessor.n_outputs()
    }

    /// Structural consistency of a pipeline restored from bytes.
    pub(crate) fn check(&self) -> Result<(), String> {
        self.preprocessor.check()?;
        self.estimator.check(self.preprocessor.n_outputs())
    }
}
