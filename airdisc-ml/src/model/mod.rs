//! Discount regression: preprocessing, estimators, and the fitted predictor.

pub mod artifact;
pub mod estimator;
pub mod forest;
pub mod linear;
pub mod pipeline;
pub mod predictor;
pub mod preprocess;

pub use artifact::{ARTIFACT_FORMAT_VERSION, ModelArtifact};
pub use estimator::{Estimator, FittedEstimator};
pub use pipeline::FittedPipeline;
pub use predictor::{DEFAULT_SEED, DiscountPredictor, PredictorConfig, TARGET_NAME};
pub use preprocess::Preprocessor;
