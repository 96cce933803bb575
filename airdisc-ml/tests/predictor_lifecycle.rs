//! End-to-end tests: features → fit → save → load → predict, and the
//! database-backed training workflow.

use airdisc_ml::config::{EvaluationConfig, ModelConfig};
use airdisc_ml::data::{ColumnData, DiscountDatabase, Label, Series, Table};
use airdisc_ml::features::{FEATURE_COLUMNS, build_features};
use airdisc_ml::model::{DiscountPredictor, Estimator, PredictorConfig};
use airdisc_ml::training::{evaluate, evaluate_against_baseline, train};
use airdisc_ml::{MlError, synthetic};
use pretty_assertions::assert_eq;
use serde_json::json;
use tempfile::TempDir;

fn raw(values: serde_json::Value) -> Table {
    Table::from_json(&values).unwrap()
}

#[test]
fn miles_are_converted_to_kilometres() {
    let frame = build_features(&raw(json!([{"distance": 100}]))).unwrap();
    let ColumnData::Float(km) = &frame.column("distance_km").unwrap().data else {
        panic!("distance_km must be float");
    };
    assert!((km[0].unwrap() - 160.934).abs() < 1e-9);
}

#[test]
fn average_spend_is_derived_from_totals() {
    let frame = build_features(&raw(json!([{"total_spend": 5000, "trip_count": 10}]))).unwrap();
    assert_eq!(
        frame.column("avg_spend").unwrap().data,
        ColumnData::Float(vec![Some(500.0)])
    );
}

#[test]
fn empty_inputs_are_rejected_everywhere() {
    assert!(matches!(
        build_features(&Table::empty()),
        Err(MlError::InvalidInput(_))
    ));
    assert!(matches!(
        build_features(&raw(json!([]))),
        Err(MlError::InvalidInput(_))
    ));

    let (frame, y) = synthetic::discount_dataset(10, 3).unwrap();
    let mut model = DiscountPredictor::new();
    assert!(matches!(
        model.fit(&Table::empty(), &y),
        Err(MlError::Validation(_))
    ));
    assert!(matches!(
        model.fit(&frame, &Series::new("y", vec![])),
        Err(MlError::Validation(_))
    ));
}

#[test]
fn predict_and_save_before_fit_fail() {
    let dir = TempDir::new().unwrap();
    let (frame, _) = synthetic::discount_dataset(5, 3).unwrap();
    let model = DiscountPredictor::new();
    assert!(matches!(model.predict(&frame), Err(MlError::NotFitted(_))));
    assert!(matches!(
        model.save(dir.path().join("m.json")),
        Err(MlError::NotFitted(_))
    ));
}

#[test]
fn fit_requires_every_canonical_column() {
    let (frame, y) = synthetic::discount_dataset(10, 3).unwrap();
    let partial = Table::new(
        frame
            .columns()
            .iter()
            .filter(|c| c.name != "origin")
            .cloned()
            .collect(),
    )
    .unwrap();
    let err = DiscountPredictor::new().fit(&partial, &y).unwrap_err();
    assert!(matches!(err, MlError::Validation(_)));
    assert!(err.to_string().contains("origin"));
}

#[test]
fn saved_models_reload_bit_identically() {
    let dir = TempDir::new().unwrap();
    let (frame, y) = synthetic::discount_dataset(60, 11).unwrap();

    for (i, estimator) in [
        Estimator::LinearRegression,
        Estimator::RandomForest {
            n_estimators: 15,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
        },
    ]
    .into_iter()
    .enumerate()
    {
        let path = dir.path().join(format!("model_{i}.json"));
        let mut model = DiscountPredictor::with_config(PredictorConfig {
            estimator,
            seed: 42,
        });
        model.fit(&frame, &y).unwrap();
        model.save(&path).unwrap();

        let loaded = DiscountPredictor::load(&path).unwrap();
        let before = model.predict(&frame).unwrap();
        let after = loaded.predict(&frame).unwrap();
        assert_eq!(before.index(), after.index());
        let same_bits = before
            .values()
            .iter()
            .zip(after.values())
            .all(|(a, b)| a.to_bits() == b.to_bits());
        assert!(same_bits, "reloaded predictions differ for model {i}");
    }
}

#[test]
fn save_overwrites_previous_artifact() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("model.json");
    let (frame, y) = synthetic::discount_dataset(30, 5).unwrap();

    let mut first = DiscountPredictor::new();
    first.fit(&frame, &y).unwrap();
    first.save(&path).unwrap();

    let shifted = Series::new(
        "discount_value",
        y.values().iter().map(|v| v + 100.0).collect(),
    )
    .with_index(y.index().to_vec())
    .unwrap();
    let mut second = DiscountPredictor::new();
    second.fit(&frame, &shifted).unwrap();
    second.save(&path).unwrap();

    let loaded = DiscountPredictor::load(&path).unwrap();
    assert_eq!(
        loaded.predict(&frame).unwrap(),
        second.predict(&frame).unwrap()
    );
}

#[test]
fn truncated_artifact_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("model.json");
    let (frame, y) = synthetic::discount_dataset(20, 9).unwrap();
    let mut model = DiscountPredictor::new();
    model.fit(&frame, &y).unwrap();
    model.save(&path).unwrap();

    let bytes = std::fs::read(&path).unwrap();
    std::fs::write(&path, &bytes[..bytes.len() / 2]).unwrap();
    assert!(matches!(
        DiscountPredictor::load(&path),
        Err(MlError::Artifact(_))
    ));
}

#[test]
fn unseen_categories_still_predict() {
    let (frame, y) = synthetic::discount_dataset(40, 2).unwrap();
    let mut model = DiscountPredictor::new();
    model.fit(&frame, &y).unwrap();

    let novel = build_features(&raw(json!([{
        "distance_km": 4000.0, "history_trips": 12, "avg_spend": 700.0,
        "route_id": "R99", "origin": "Lisbon", "destination": "Reykjavik"
    }])))
    .unwrap();
    let preds = model.predict(&novel).unwrap();
    assert_eq!(preds.index(), &[Label::Int(0)]);
    assert!(preds.values()[0].is_finite());
}

#[test]
fn model_beats_mean_baseline_on_held_out_rows() {
    let (frame, y) = synthetic::discount_dataset(100, 42).unwrap();
    let comparison = evaluate_against_baseline(
        &frame,
        &y,
        &PredictorConfig::default(),
        &EvaluationConfig {
            test_fraction: 0.25,
            split_seed: 42,
        },
    )
    .unwrap();
    assert_eq!(comparison.test_rows, 25);
    assert!(
        comparison.model.mae < comparison.baseline.mae,
        "model MAE {} vs baseline MAE {}",
        comparison.model.mae,
        comparison.baseline.mae
    );
}

#[test]
fn sqlite_training_workflow_end_to_end() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("data").join("airline_discount.db");
    let db = DiscountDatabase::open(&db_path).unwrap();
    synthetic::populate_database(&db, 80, 42).unwrap();

    let config = ModelConfig {
        artifact_path: dir.path().join("models").join("discount_predictor.json"),
        ..ModelConfig::default()
    };
    let report = train(&db, &config).unwrap();
    assert_eq!(report.rows, 80);
    assert!(report.features.iter().any(|f| f == "distance_km"));

    let reopened = DiscountDatabase::open(&db_path).unwrap();
    let (frame, y) = reopened.training_frame().unwrap();
    assert_eq!(frame.column_names(), FEATURE_COLUMNS.to_vec());

    let model = DiscountPredictor::load(&config.artifact_path).unwrap();
    let scored = evaluate(&model, &frame, &y).unwrap();
    assert_eq!(scored.predictions.index(), frame.index());
    assert!(scored.metrics.r_squared > 0.5);
}
