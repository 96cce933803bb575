//! Training and evaluation workflows over the discount database.

use crate::config::{EvaluationConfig, ModelConfig};
use crate::data::database::DiscountDatabase;
use crate::data::table::{Series, Table};
use crate::error::MlError;
use crate::features::FeatureFrame;
use crate::model::predictor::{DiscountPredictor, PredictorConfig};
use crate::training::baseline::{MeanBaseline, RuleBaseline};
use crate::training::metrics::RegressionMetrics;
use crate::training::split::train_test_split;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Outcome of a training run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainReport {
    pub rows: usize,
    pub features: Vec<String>,
    pub estimator: String,
    pub seed: u64,
    pub artifact_path: PathBuf,
    /// In-sample metrics on the training rows.
    pub metrics: RegressionMetrics,
    pub trained_at: DateTime<Utc>,
}

/// Predictions and metrics for one labelled table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub rows: usize,
    pub predictions: Series,
    pub metrics: RegressionMetrics,
}

/// Held-out comparison of a freshly fitted model against [`MeanBaseline`]
/// and [`RuleBaseline`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaselineComparison {
    pub train_rows: usize,
    pub test_rows: usize,
    pub model: RegressionMetrics,
    pub baseline: RegressionMetrics,
    pub rule_baseline: RegressionMetrics,
}

impl BaselineComparison {
    pub fn beats_baseline(&self) -> bool {
        self.model.mae < self.baseline.mae
    }
}

/// Fit a predictor on every training row in `db` and save it to
/// `config.artifact_path`.
pub fn train(db: &DiscountDatabase, config: &ModelConfig) -> Result<TrainReport, MlError> {
    let (features, target) = db.training_frame()?;
    tracing::info!(
        rows = features.n_rows(),
        estimator = config.estimator.name(),
        "Training discount predictor"
    );

    let mut model = DiscountPredictor::with_config(config.predictor_config());
    model.fit(&features, &target)?;
    let in_sample = evaluate(&model, &features, &target)?;
    model.save(&config.artifact_path)?;

    tracing::info!(
        path = %config.artifact_path.display(),
        mae = in_sample.metrics.mae,
        r_squared = in_sample.metrics.r_squared,
        "Saved trained model"
    );
    Ok(TrainReport {
        rows: features.n_rows(),
        features: model.feature_names().unwrap_or_default(),
        estimator: config.estimator.name().to_string(),
        seed: config.seed,
        artifact_path: config.artifact_path.clone(),
        metrics: in_sample.metrics,
        trained_at: Utc::now(),
    })
}

/// Predict on `x` and score against `y`, aligned by position.
pub fn evaluate(model: &DiscountPredictor, x: &Table, y: &Series) -> Result<EvaluationReport, MlError> {
    let predictions = model.predict(x)?;
    let metrics = RegressionMetrics::compute(y.values(), predictions.values())?;
    tracing::debug!(rows = x.n_rows(), mae = metrics.mae, "Evaluated predictor");
    Ok(EvaluationReport {
        rows: x.n_rows(),
        predictions,
        metrics,
    })
}

/// Split, fit on the training part, and score the model and both baselines
/// on the held-out part.
pub fn evaluate_against_baseline(
    features: &FeatureFrame,
    target: &Series,
    predictor: &PredictorConfig,
    evaluation: &EvaluationConfig,
) -> Result<BaselineComparison, MlError> {
    if features.n_rows() != target.len() {
        return Err(MlError::validation(format!(
            "X has {} rows but y has {} values",
            features.n_rows(),
            target.len()
        )));
    }
    let (train_pos, test_pos) =
        train_test_split(features.n_rows(), evaluation.test_fraction, evaluation.split_seed)?;
    let (x_train, y_train) = (features.take(&train_pos), target.take(&train_pos));
    let (x_test, y_test) = (features.take(&test_pos), target.take(&test_pos));

    let mut model = DiscountPredictor::with_config(predictor.clone());
    model.fit(&x_train, &y_train)?;
    let model_report = evaluate(&model, &x_test, &y_test)?;

    let baseline = MeanBaseline::fit(&y_train)?;
    let baseline_preds = baseline.predict(&x_test)?;
    let baseline_metrics = RegressionMetrics::compute(y_test.values(), baseline_preds.values())?;
    let rule_preds = RuleBaseline::default().predict(&x_test)?;
    let rule_metrics = RegressionMetrics::compute(y_test.values(), rule_preds.values())?;

    tracing::info!(
        train_rows = train_pos.len(),
        test_rows = test_pos.len(),
        model_mae = model_report.metrics.mae,
        baseline_mae = baseline_metrics.mae,
        rule_mae = rule_metrics.mae,
        "Compared model against baselines"
    );
    Ok(BaselineComparison {
        train_rows: train_pos.len(),
        test_rows: test_pos.len(),
        model: model_report.metrics,
        baseline: baseline_metrics,
        rule_baseline: rule_metrics,
    })
}
