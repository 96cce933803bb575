//! Training and evaluation: metrics, splits, baseline, and the workflows
//! that tie them to the database.

pub mod baseline;
pub mod metrics;
pub mod runner;
pub mod split;

pub use baseline::{MeanBaseline, RuleBaseline};
pub use metrics::RegressionMetrics;
pub use runner::{
    BaselineComparison, EvaluationReport, TrainReport, evaluate, evaluate_against_baseline, train,
};
pub use split::train_test_split;
