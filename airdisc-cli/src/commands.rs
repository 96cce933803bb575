//! CLI subcommand handlers.

use crate::Commands;
use crate::ConfigAction;
use airdisc_ml::config::{AirdiscConfig, EvaluationConfig, ModelConfig, load_config};
use airdisc_ml::data::{DiscountDatabase, Label, Table, source_for_path};
use airdisc_ml::features::build_features;
use airdisc_ml::model::DiscountPredictor;
use airdisc_ml::persistence::atomic_write_json;
use airdisc_ml::synthetic;
use airdisc_ml::training::{self, BaselineComparison, EvaluationReport};
use anyhow::Context;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Handle a CLI subcommand.
pub async fn handle_command(
    command: Commands,
    workspace: &Path,
    config_file: Option<&Path>,
) -> anyhow::Result<()> {
    if let Commands::Config { action } = command {
        return handle_config(action, workspace, config_file);
    }

    let config = load_config(Some(workspace), config_file, None)
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;

    match command {
        Commands::InitDb {
            sample,
            synthetic,
            seed,
        } => {
            let seed = seed.unwrap_or(config.model.seed);
            handle_init_db(&config, workspace, sample, synthetic, seed).await
        }
        Commands::Train => handle_train(&config, workspace).await,
        Commands::Evaluate { model } => handle_evaluate(&config, workspace, model).await,
        Commands::Predict {
            input,
            output,
            model,
            query,
            limit,
        } => {
            let model = model.unwrap_or_else(|| config.artifact_path(workspace));
            handle_predict(input, output, model, query, limit).await
        }
        Commands::Features {
            input,
            query,
            limit,
        } => handle_features(input, query, limit).await,
        Commands::Config { .. } => Ok(()),
    }
}

fn handle_config(
    action: ConfigAction,
    workspace: &Path,
    config_file: Option<&Path>,
) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init => {
            let config_dir = workspace.join(".airdisc");
            std::fs::create_dir_all(&config_dir)?;

            let config_path = config_dir.join("config.toml");
            if config_path.exists() {
                println!(
                    "Configuration file already exists at: {}",
                    config_path.display()
                );
                return Ok(());
            }

            let toml_str = toml::to_string_pretty(&AirdiscConfig::default())?;
            std::fs::write(&config_path, &toml_str)?;
            println!(
                "Created default configuration at: {}",
                config_path.display()
            );
            Ok(())
        }
        ConfigAction::Show => {
            let config = load_config(Some(workspace), config_file, None)
                .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;
            println!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

async fn handle_init_db(
    config: &AirdiscConfig,
    workspace: &Path,
    sample: bool,
    synthetic_rows: Option<usize>,
    seed: u64,
) -> anyhow::Result<()> {
    let db_path = config.database_path(workspace);
    let counts = tokio::task::spawn_blocking(move || -> anyhow::Result<_> {
        let db = DiscountDatabase::open(&db_path)
            .with_context(|| format!("Failed to open database at {}", db_path.display()))?;
        if sample {
            db.load_sample_data().context("Failed to load sample data")?;
        }
        if let Some(n) = synthetic_rows {
            synthetic::populate_database(&db, n, seed)
                .context("Failed to insert synthetic data")?;
        }
        Ok((db_path, db.counts()?))
    })
    .await??;

    let (db_path, counts) = counts;
    println!("Database ready at {}", db_path.display());
    println!(
        "  passengers: {}  routes: {}  discounts: {}",
        counts.passengers, counts.routes, counts.discounts
    );
    Ok(())
}

async fn handle_train(config: &AirdiscConfig, workspace: &Path) -> anyhow::Result<()> {
    let db_path = config.database_path(workspace);
    let model_config = ModelConfig {
        artifact_path: config.artifact_path(workspace),
        ..config.model.clone()
    };

    let report = tokio::task::spawn_blocking(move || -> anyhow::Result<_> {
        let db = open_existing(&db_path)?;
        training::train(&db, &model_config).context("Training failed")
    })
    .await??;

    println!("Trained {} on {} rows", report.estimator, report.rows);
    println!("  MAE:  {:.4}", report.metrics.mae);
    println!("  RMSE: {:.4}", report.metrics.rmse);
    println!("  R²:   {:.4}", report.metrics.r_squared);
    println!("Model saved to {}", report.artifact_path.display());
    Ok(())
}

async fn handle_evaluate(
    config: &AirdiscConfig,
    workspace: &Path,
    model: Option<PathBuf>,
) -> anyhow::Result<()> {
    let db_path = config.database_path(workspace);
    let artifact = model.unwrap_or_else(|| config.artifact_path(workspace));
    let evaluation = config.evaluation.clone();

    let (report, comparison) = tokio::task::spawn_blocking(move || {
        evaluate_saved(&artifact, &db_path, &evaluation)
    })
    .await??;

    println!("Evaluated saved model on {} rows", report.rows);
    println!("  MAE:  {:.4}", report.metrics.mae);
    println!("  RMSE: {:.4}", report.metrics.rmse);
    println!("  R²:   {:.4}", report.metrics.r_squared);

    if let Some(cmp) = comparison {
        println!(
            "Held-out split ({} train / {} test):",
            cmp.train_rows, cmp.test_rows
        );
        println!(
            "  model MAE {:.4} vs mean baseline MAE {:.4} ({})",
            cmp.model.mae,
            cmp.baseline.mae,
            if cmp.beats_baseline() {
                "beats baseline"
            } else {
                "does not beat baseline"
            }
        );
        println!("  rule baseline MAE {:.4}", cmp.rule_baseline.mae);
    }

    println!("Sample predictions (first 5):");
    for (label, predicted) in report.predictions.iter().take(5) {
        println!("  {label}: {predicted:.2}");
    }
    Ok(())
}

/// Score the saved artifact on every database row, then refit its own
/// estimator settings on a held-out split for the baseline comparison.
fn evaluate_saved(
    artifact: &Path,
    db_path: &Path,
    evaluation: &EvaluationConfig,
) -> anyhow::Result<(EvaluationReport, Option<BaselineComparison>)> {
    let predictor = DiscountPredictor::load(artifact).with_context(|| {
        format!(
            "Failed to load model from {}. Run `airdisc train` first.",
            artifact.display()
        )
    })?;
    let db = open_existing(db_path)?;
    let (features, target) = db.training_frame()?;
    let report = training::evaluate(&predictor, &features, &target)?;
    // A held-out comparison needs at least one row on each side.
    let comparison = if features.n_rows() >= 2 {
        Some(training::evaluate_against_baseline(
            &features,
            &target,
            predictor.config(),
            evaluation,
        )?)
    } else {
        None
    };
    Ok((report, comparison))
}

/// One output row of `airdisc predict`.
#[derive(Debug, Serialize)]
struct PredictionRecord {
    index: Label,
    discount_value: f64,
}

async fn handle_predict(
    input: PathBuf,
    output: Option<PathBuf>,
    model: PathBuf,
    query: Option<String>,
    limit: Option<usize>,
) -> anyhow::Result<()> {
    let records = load_records(input, query, limit).await?;
    let predictor = DiscountPredictor::load(&model)
        .with_context(|| format!("Failed to load model from {}", model.display()))?;
    let features = build_features(&records).context("Failed to build features")?;
    let predictions = predictor.predict(&features)?;

    let rows: Vec<PredictionRecord> = predictions
        .iter()
        .map(|(label, value)| PredictionRecord {
            index: label.clone(),
            discount_value: value,
        })
        .collect();

    match output {
        Some(path) => {
            atomic_write_json(&path, &rows)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            tracing::info!(rows = rows.len(), path = %path.display(), "Wrote predictions");
        }
        None => println!("{}", serde_json::to_string_pretty(&rows)?),
    }
    Ok(())
}

async fn handle_features(
    input: PathBuf,
    query: Option<String>,
    limit: Option<usize>,
) -> anyhow::Result<()> {
    let records = load_records(input, query, limit).await?;
    let features = build_features(&records).context("Failed to build features")?;
    println!("{}", serde_json::to_string_pretty(&features.to_records())?);
    Ok(())
}

async fn load_records(
    input: PathBuf,
    query: Option<String>,
    limit: Option<usize>,
) -> anyhow::Result<Table> {
    let source = source_for_path(input, query)?;
    let info = source.source_info();
    let table = source
        .load(limit)
        .await
        .with_context(|| format!("Failed to read records from {}", info.location))?;
    tracing::debug!(
        source = %info.source_type,
        rows = table.n_rows(),
        "Loaded raw records"
    );
    Ok(table)
}

fn open_existing(db_path: &Path) -> anyhow::Result<DiscountDatabase> {
    if !db_path.exists() {
        anyhow::bail!(
            "No database at {}. Run `airdisc init-db --sample` first.",
            db_path.display()
        );
    }
    DiscountDatabase::open(db_path)
        .with_context(|| format!("Failed to open database at {}", db_path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use airdisc_ml::model::{Estimator, PredictorConfig};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn config() -> AirdiscConfig {
        AirdiscConfig::default()
    }

    #[tokio::test]
    async fn test_init_train_evaluate_predict() {
        let dir = TempDir::new().unwrap();
        let ws = dir.path();
        let config = config();

        handle_init_db(&config, ws, false, Some(60), 42).await.unwrap();
        assert!(config.database_path(ws).exists());

        handle_train(&config, ws).await.unwrap();
        assert!(config.artifact_path(ws).exists());

        handle_evaluate(&config, ws, None).await.unwrap();

        let input = ws.join("records.json");
        std::fs::write(
            &input,
            r#"[
                {"distance": 3459, "trip_count": 10, "total_spend": 5000,
                 "route_id": "R1", "origin": "New York", "destination": "London"},
                {"distance_km": 8000, "history_trips": 3, "avg_spend": 900,
                 "route_id": "R2", "origin": "Los Angeles", "destination": "Tokyo"}
            ]"#,
        )
        .unwrap();
        let output = ws.join("out").join("predictions.json");
        handle_predict(
            input,
            Some(output.clone()),
            config.artifact_path(ws),
            None,
            None,
        )
        .await
        .unwrap();

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
        let rows = written.as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1]["index"], serde_json::json!(1));
        assert!(rows[0]["discount_value"].is_f64());
    }

    #[tokio::test]
    async fn test_train_without_database_fails() {
        let dir = TempDir::new().unwrap();
        let err = handle_train(&config(), dir.path()).await.unwrap_err();
        assert!(err.to_string().contains("init-db"));
    }

    #[tokio::test]
    async fn test_predict_with_missing_model_fails() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("records.json");
        std::fs::write(&input, r#"[{"distance": 100}]"#).unwrap();
        let err = handle_predict(input, None, dir.path().join("none.json"), None, None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Failed to load model"));
    }

    #[tokio::test]
    async fn test_features_rejects_empty_input() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("empty.json");
        std::fs::write(&input, "[]").unwrap();
        assert!(handle_features(input, None, None).await.is_err());
    }

    #[test]
    fn test_config_init_writes_loadable_file() {
        let dir = TempDir::new().unwrap();
        handle_config(ConfigAction::Init, dir.path(), None).unwrap();
        let path = dir.path().join(".airdisc").join("config.toml");
        assert!(path.exists());
        let loaded = load_config(Some(dir.path()), None, None).unwrap();
        assert_eq!(loaded.model.seed, 42);
    }

    #[tokio::test]
    async fn test_evaluate_uses_saved_estimator_settings() {
        let dir = TempDir::new().unwrap();
        let ws = dir.path();
        let trained_with = config();
        handle_init_db(&trained_with, ws, false, Some(40), 7)
            .await
            .unwrap();
        handle_train(&trained_with, ws).await.unwrap();

        // Settings that cannot be fitted; only the saved ones may be used.
        let mut edited = config();
        edited.model.estimator = Estimator::RandomForest {
            n_estimators: 0,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
        };
        handle_evaluate(&edited, ws, None).await.unwrap();

        let (_, comparison) = evaluate_saved(
            &trained_with.artifact_path(ws),
            &trained_with.database_path(ws),
            &edited.evaluation,
        )
        .unwrap();
        let db = DiscountDatabase::open(&trained_with.database_path(ws)).unwrap();
        let (features, target) = db.training_frame().unwrap();
        let expected = training::evaluate_against_baseline(
            &features,
            &target,
            &PredictorConfig::default(),
            &edited.evaluation,
        )
        .unwrap();
        assert_eq!(comparison.unwrap().model, expected.model);
    }

    #[tokio::test]
    async fn test_sqlite_input_without_query_fails() {
        let dir = TempDir::new().unwrap();
        let ws = dir.path();
        handle_init_db(&config(), ws, true, None, 42).await.unwrap();
        let err = handle_features(config().database_path(ws), None, None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("requires --query"));
    }
}
