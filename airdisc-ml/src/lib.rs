//! # airdisc-ml: airline discount modeling
//!
//! Turns raw passenger/route records into a canonical feature frame and
//! fits a regression model that predicts the discount for each row.
//!
//! - [`features::build_features`] maps raw records to the six canonical
//!   columns (`distance_km`, `history_trips`, `avg_spend`, `route_id`,
//!   `origin`, `destination`).
//! - [`DiscountPredictor`] fits a preprocessing + regression pipeline,
//!   predicts per row, and saves/loads itself as a checksummed JSON artifact.
//! - [`data::DiscountDatabase`] and [`training`] provide the SQLite-backed
//!   training and evaluation workflows.

pub mod config;
pub mod data;
pub mod error;
pub mod features;
pub mod model;
pub mod persistence;
pub mod synthetic;
pub mod training;

pub use config::{AirdiscConfig, load_config};
pub use data::{DiscountDatabase, Series, Table};
pub use error::MlError;
pub use features::{FEATURE_COLUMNS, FeatureFrame, build_features};
pub use model::{DiscountPredictor, Estimator, PredictorConfig};
pub use training::RegressionMetrics;
