//! Error types for the airdisc-ml crate.

use thiserror::Error;

/// Top-level error type for feature building, modeling and persistence.
#[derive(Debug, Error)]
pub enum MlError {
    /// Malformed or empty input table given to the feature builder.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Schema or shape mismatch given to `fit` / `predict`.
    #[error("Validation error: {0}")]
    Validation(String),

    /// `predict` or `save` on a predictor that was never fitted.
    #[error("Not fitted: {0}")]
    NotFitted(String),

    /// Missing, corrupt, or incompatible model artifact.
    #[error("Artifact error: {0}")]
    Artifact(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl MlError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_fitted(msg: impl Into<String>) -> Self {
        Self::NotFitted(msg.into())
    }

    pub fn artifact(msg: impl Into<String>) -> Self {
        Self::Artifact(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

impl From<Box<figment::Error>> for MlError {
    fn from(err: Box<figment::Error>) -> Self {
        Self::Config(err.to_string())
    }
}
