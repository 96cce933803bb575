//! Configuration for the airdisc workflows.
//!
//! Layered with figment:
//! 1. Built-in defaults
//! 2. User config (`~/.config/airdisc/config.toml`)
//! 3. Workspace-local config (`.airdisc/config.toml`)
//! 4. An explicit config file, if given
//! 5. Environment variables (prefixed with `AIRDISC_`, sections split on `__`)
//! 6. Explicit overrides

use crate::model::estimator::Estimator;
use crate::model::predictor::{DEFAULT_SEED, PredictorConfig};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AirdiscConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub evaluation: EvaluationConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite file; relative paths resolve against the workspace.
    #[serde(default = "default_database_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

fn default_database_path() -> PathBuf {
    PathBuf::from("data").join("airline_discount.db")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Where `train` writes the artifact; relative paths resolve against the workspace.
    #[serde(default = "default_artifact_path")]
    pub artifact_path: PathBuf,
    #[serde(default)]
    pub estimator: Estimator,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            artifact_path: default_artifact_path(),
            estimator: Estimator::default(),
            seed: DEFAULT_SEED,
        }
    }
}

impl ModelConfig {
    pub fn predictor_config(&self) -> PredictorConfig {
        PredictorConfig {
            estimator: self.estimator.clone(),
            seed: self.seed,
        }
    }
}

fn default_artifact_path() -> PathBuf {
    PathBuf::from("models").join("discount_predictor.json")
}

fn default_seed() -> u64 {
    DEFAULT_SEED
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationConfig {
    /// Share of rows held out for testing, in (0, 1).
    #[serde(default = "default_test_fraction")]
    pub test_fraction: f64,
    #[serde(default = "default_seed")]
    pub split_seed: u64,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            test_fraction: default_test_fraction(),
            split_seed: DEFAULT_SEED,
        }
    }
}

fn default_test_fraction() -> f64 {
    0.25
}

impl AirdiscConfig {
    /// Database path, resolved against `workspace` when relative.
    pub fn database_path(&self, workspace: &Path) -> PathBuf {
        resolve(workspace, &self.database.path)
    }

    /// Artifact path, resolved against `workspace` when relative.
    pub fn artifact_path(&self, workspace: &Path) -> PathBuf {
        resolve(workspace, &self.model.artifact_path)
    }
}

fn resolve(workspace: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        workspace.join(path)
    }
}

/// User-level config file, if the platform has a config directory.
pub fn user_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("dev", "airdisc", "airdisc")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Load configuration from all layers.
pub fn load_config(
    workspace: Option<&Path>,
    config_file: Option<&Path>,
    overrides: Option<&AirdiscConfig>,
) -> Result<AirdiscConfig, Box<figment::Error>> {
    let mut figment = Figment::from(Serialized::defaults(AirdiscConfig::default()));

    if let Some(user_config) = user_config_path() {
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    if let Some(ws) = workspace {
        let ws_config = ws.join(".airdisc").join("config.toml");
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    // An explicit file must exist; figment ignores missing files otherwise.
    if let Some(path) = config_file {
        figment = figment.merge(Toml::file_exact(path));
    }

    // AIRDISC_MODEL__SEED, AIRDISC_EVALUATION__TEST_FRACTION, ...
    figment = figment.merge(Env::prefixed("AIRDISC_").split("__"));

    if let Some(overrides) = overrides {
        figment = figment.merge(Serialized::defaults(overrides));
    }

    let config: AirdiscConfig = figment.extract().map_err(Box::new)?;
    let fraction = config.evaluation.test_fraction;
    if !(fraction > 0.0 && fraction < 1.0) {
        return Err(Box::new(figment::Error::from(format!(
            "evaluation.test_fraction must be between 0 and 1, got {fraction}"
        ))));
    }
    Ok(config)
}
