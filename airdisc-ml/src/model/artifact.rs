//! On-disk model artifact: a versioned, checksummed JSON envelope around a
//! fitted pipeline.

use crate::error::MlError;
use crate::model::pipeline::FittedPipeline;
use crate::model::predictor::PredictorConfig;
use crate::persistence::{atomic_write_json, hash_bytes};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Bumped whenever the serialized pipeline layout changes.
pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub format_version: u32,
    pub created_at: DateTime<Utc>,
    pub producer: String,
    pub config: PredictorConfig,
    /// SHA-256 of the compact JSON encoding of `pipeline`.
    pub checksum: String,
    pub pipeline: FittedPipeline,
}

impl ModelArtifact {
    pub fn new(config: PredictorConfig, pipeline: FittedPipeline) -> Result<Self, MlError> {
        let checksum = pipeline_checksum(&pipeline)?;
        Ok(Self {
            format_version: ARTIFACT_FORMAT_VERSION,
            created_at: Utc::now(),
            producer: format!("airdisc-ml {}", env!("CARGO_PKG_VERSION")),
            config,
            checksum,
            pipeline,
        })
    }

    pub fn write(&self, path: &Path) -> Result<(), MlError> {
        atomic_write_json(path, self)?;
        Ok(())
    }

    /// Read and verify an artifact. Every failure is an [`MlError::Artifact`].
    pub fn read(path: &Path) -> Result<Self, MlError> {
        let bytes = std::fs::read(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                MlError::artifact(format!("no model artifact at {}", path.display()))
            }
            _ => MlError::artifact(format!("cannot read {}: {e}", path.display())),
        })?;

        let value: serde_json::Value = serde_json::from_slice(&bytes).map_err(|e| {
            MlError::artifact(format!("{} is not valid JSON: {e}", path.display()))
        })?;
        let version = value
            .get("format_version")
            .and_then(serde_json::Value::as_u64)
            .ok_or_else(|| MlError::artifact("artifact has no format_version"))?;
        if version != u64::from(ARTIFACT_FORMAT_VERSION) {
            return Err(MlError::artifact(format!(
                "unsupported artifact format version {version} (expected {ARTIFACT_FORMAT_VERSION})"
            )));
        }

        let artifact: Self = serde_json::from_value(value)
            .map_err(|e| MlError::artifact(format!("malformed artifact: {e}")))?;
        let actual = pipeline_checksum(&artifact.pipeline)?;
        if actual != artifact.checksum {
            return Err(MlError::artifact(format!(
                "checksum mismatch: recorded {}, computed {actual}",
                artifact.checksum
            )));
        }
        artifact
            .pipeline
            .check()
            .map_err(|e| MlError::artifact(format!("pipeline has the wrong shape: {e}")))?;
        Ok(artifact)
    }
}

fn pipeline_checksum(pipeline: &FittedPipeline) -> Result<String, MlError> {
    let bytes = serde_json::to_vec(pipeline)?;
    Ok(hash_bytes(&bytes))
}
