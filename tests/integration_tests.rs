/// Integration tests for the two-stage predictor
///
/// Run with: cargo test --test integration_tests -- --nocapture
mod common;

use common::{fixture_paths, passthrough, stub_models};
use serde_json::json;
use spoilage_predictor::{
    model::{ArtifactPaths, ModelSet, Transform},
    predict_with, FeatureVector, FreshnessLabel, PredictError, PredictionPolicy, RawFeatures,
    SpoilageClass, SpoilagePredictor,
};
use std::fs;

fn raw(v: serde_json::Value) -> RawFeatures {
    serde_json::from_value(v).unwrap()
}

#[test]
fn test_fresh_scenario() {
    println!("\n=== Test: Fresh Scenario ===");
    let stubs = stub_models(false, 5.3, passthrough());
    let p = SpoilagePredictor::new(stubs.models, PredictionPolicy::default());

    let out = p
        .predict(&raw(json!({"food_type": "Apple", "temperature": 4.0, "moisture": 85.0, "gas": 120.0})))
        .unwrap();

    assert_eq!(out.prediction, SpoilageClass::NotSpoiled);
    assert_eq!(out.status, FreshnessLabel::Fresh);
    assert_eq!(out.days_remaining, 5.3);
    assert_eq!(out.food_type, "Apple");
    // both stages saw the same preprocessed vector
    assert_eq!(*stubs.classifier_calls.lock(), vec![vec![4.0, 85.0, 120.0]]);
    assert_eq!(*stubs.regressor_calls.lock(), vec![vec![4.0, 85.0, 120.0]]);
    println!("✓ {out:?}");
}

#[test]
fn test_spoiled_scenario_never_calls_regressor() {
    println!("\n=== Test: Spoiled Scenario ===");
    let stubs = stub_models(true, 7.0, passthrough());
    let p = SpoilagePredictor::new(stubs.models, PredictionPolicy::default());

    let out = p
        .predict(&raw(json!({"food_type": "Milk", "temperature": 25.0, "moisture": 95.0, "gas": 900.0})))
        .unwrap();

    assert_eq!(out.prediction, SpoilageClass::Spoiled);
    assert_eq!(out.status, FreshnessLabel::Spoiled);
    assert_eq!(out.days_remaining, 0.0);
    assert_eq!(out.food_type, "Milk");
    assert_eq!(stubs.classifier_calls.lock().len(), 1);
    assert!(stubs.regressor_calls.lock().is_empty(), "regressor must not run for spoiled items");
    println!("✓ short-circuit held");
}

#[test]
fn test_missing_temperature_never_reaches_models() {
    let stubs = stub_models(false, 3.0, passthrough());
    let p = SpoilagePredictor::new(stubs.models, PredictionPolicy::default());

    let err = p
        .predict(&raw(json!({"food_type": "Milk", "moisture": 95.0, "gas": 900.0})))
        .unwrap_err();

    assert_eq!(err, PredictError::invalid("temperature is required"));
    assert!(stubs.classifier_calls.lock().is_empty());
    assert!(stubs.regressor_calls.lock().is_empty());
}

#[test]
fn test_reading_beyond_f32_range_is_rejected() {
    println!("\n=== Test: Out-of-range Reading ===");
    let stubs = stub_models(false, 3.0, passthrough());
    let p = SpoilagePredictor::new(stubs.models, PredictionPolicy::default());

    let err = p
        .predict(&raw(json!({"food_type": "Apples", "temperature": 1e300, "moisture": 85.0, "gas": 120.0})))
        .unwrap_err();

    assert!(matches!(&err, PredictError::InvalidInput(d) if d.contains("temperature")), "{err:?}");
    assert!(stubs.classifier_calls.lock().is_empty());
    assert!(stubs.regressor_calls.lock().is_empty());
    println!("✓ {err}");
}

#[test]
fn test_huge_estimate_serializes_as_a_number() {
    let stubs = stub_models(false, 1e307, passthrough());
    let p = SpoilagePredictor::new(stubs.models, PredictionPolicy::default());

    let out = p
        .predict(&raw(json!({"food_type": "Apples", "temperature": 4.0, "moisture": 85.0, "gas": 120.0})))
        .unwrap();

    assert!(out.days_remaining.is_finite());
    let body = serde_json::to_value(&out).unwrap();
    assert!(body["days_remaining"].is_f64(), "{body}");
}

#[test]
fn test_threshold_boundaries() {
    let cases = [
        (2.0, FreshnessLabel::UseSoon),
        (2.01, FreshnessLabel::Fresh),
        (0.0, FreshnessLabel::Spoiled),
        (0.5, FreshnessLabel::UseSoon),
    ];
    for (days, expected) in cases {
        let stubs = stub_models(false, days, passthrough());
        let fv = FeatureVector {
            food_type: "Paneer".into(),
            temperature: 6.0,
            moisture: 60.0,
            gas: 200.0,
        };
        let out = predict_with(&stubs.models, &PredictionPolicy::default(), &fv).unwrap();
        assert_eq!(out.days_remaining, days);
        assert_eq!(out.status, expected, "days_remaining {days}");
        assert_eq!(out.prediction, SpoilageClass::NotSpoiled);
    }
}

#[test]
fn test_negative_estimates_never_leak() {
    for raw_days in [-0.01, -4.0, -1e9] {
        let stubs = stub_models(false, raw_days, passthrough());
        let fv = FeatureVector {
            food_type: "Tomatoes".into(),
            temperature: 28.0,
            moisture: 93.0,
            gas: 1400.0,
        };
        let out = predict_with(&stubs.models, &PredictionPolicy::default(), &fv).unwrap();
        assert!(out.days_remaining >= 0.0);
        assert_eq!(out.days_remaining, 0.0);
        assert_eq!(out.status, FreshnessLabel::Spoiled);
    }
}

#[test]
fn test_precision_policy() {
    let stubs = stub_models(false, 3.14159, passthrough());
    let policy = PredictionPolicy {
        days_precision: 1,
        default_food_type: Some("Unknown Food".into()),
    };
    let p = SpoilagePredictor::new(stubs.models, policy);
    let out = p
        .predict(&raw(json!({"temperature": "4", "moisture": "85", "gas": "120"})))
        .unwrap();
    assert_eq!(out.days_remaining, 3.1);
    assert_eq!(out.food_type, "Unknown Food");
}

#[test]
fn test_preprocessing_reaches_the_models() {
    let transform = Transform::from_json(
        r#"{
            "feature_order": ["temperature", "moisture", "gas"],
            "scaler": {"mean": [10.0, 80.0, 400.0], "scale": [5.0, 10.0, 200.0]},
            "food_types": ["Apples", "Milk"]
        }"#,
    )
    .unwrap();
    let stubs = stub_models(false, 4.0, transform);
    let p = SpoilagePredictor::new(stubs.models, PredictionPolicy::default());
    p.predict(&raw(json!({"food_type": "Milk", "temperature": 15, "moisture": 90, "gas": 600})))
        .unwrap();
    assert_eq!(*stubs.classifier_calls.lock(), vec![vec![1.0, 1.0, 1.0, 0.0, 1.0]]);
}

// ---------- On-disk artifacts ----------

#[test]
fn test_forest_artifacts_end_to_end() {
    println!("\n=== Test: Forest Artifacts ===");
    let p = SpoilagePredictor::load(&fixture_paths(), PredictionPolicy::default()).unwrap();
    assert!(p.is_ready());

    let fresh = p
        .predict(&raw(json!({"food_type": "Apples", "temperature": 4.0, "moisture": 85.0, "gas": 120.0})))
        .unwrap();
    assert_eq!(fresh.prediction, SpoilageClass::NotSpoiled);
    assert_eq!(fresh.days_remaining, 4.0);
    assert_eq!(fresh.status, FreshnessLabel::Fresh);

    let soon = p
        .predict(&raw(json!({"food_type": "Apples", "temperature": 25.0, "moisture": 95.0, "gas": 900.0})))
        .unwrap();
    assert_eq!(soon.prediction, SpoilageClass::NotSpoiled);
    assert_eq!(soon.days_remaining, 1.5);
    assert_eq!(soon.status, FreshnessLabel::UseSoon);

    // same readings, but the one-hot Milk column flips the classifier
    let spoiled = p
        .predict(&raw(json!({"food_type": "Milk", "temperature": 25.0, "moisture": 95.0, "gas": 900.0})))
        .unwrap();
    assert_eq!(spoiled.prediction, SpoilageClass::Spoiled);
    assert_eq!(spoiled.days_remaining, 0.0);
    println!("✓ fresh={fresh:?}\n  soon={soon:?}\n  spoiled={spoiled:?}");
}

#[test]
fn test_repeated_predictions_are_identical() {
    let p = SpoilagePredictor::load(&fixture_paths(), PredictionPolicy::default()).unwrap();
    let input = raw(json!({"food_type": "Apples", "temperature": 9.5, "moisture": 81.0, "gas": 580.0}));
    let first = serde_json::to_string(&p.predict(&input).unwrap()).unwrap();
    for _ in 0..50 {
        assert_eq!(serde_json::to_string(&p.predict(&input).unwrap()).unwrap(), first);
    }
}

#[test]
fn test_concurrent_predictions_share_one_model_set() {
    let p = std::sync::Arc::new(
        SpoilagePredictor::load(&fixture_paths(), PredictionPolicy::default()).unwrap(),
    );
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let p = p.clone();
            std::thread::spawn(move || {
                let gas = if i % 2 == 0 { 120.0 } else { 900.0 };
                p.predict(&raw(json!({"food_type": "Milk", "temperature": 4.0, "moisture": 88.0, "gas": gas})))
                    .unwrap()
            })
        })
        .collect();
    for (i, h) in handles.into_iter().enumerate() {
        let out = h.join().unwrap();
        assert_eq!(out.prediction.is_spoiled(), i % 2 == 1);
    }
}

#[test]
fn test_missing_artifact_is_model_unavailable() {
    println!("\n=== Test: Startup Failure ===");
    let dir = tempfile::tempdir().unwrap();
    for f in ["regressor.json", "transform.json"] {
        fs::copy(common::fixtures().join(f), dir.path().join(f)).unwrap();
    }
    let paths = ArtifactPaths::discover(dir.path());

    let err = SpoilagePredictor::load(&paths, PredictionPolicy::default()).err().unwrap();
    match &err {
        PredictError::ModelUnavailable(msg) => {
            assert!(msg.contains("classifier.json"), "{msg}");
            assert!(msg.contains("not found"), "{msg}");
        }
        other => panic!("expected ModelUnavailable, got {other:?}"),
    }

    // a degraded predictor built from that error serves nothing
    let p = SpoilagePredictor::unavailable(err.to_string(), PredictionPolicy::default());
    let refused = p
        .predict(&raw(json!({"food_type": "Milk", "temperature": 4.0, "moisture": 88.0, "gas": 120.0})))
        .unwrap_err();
    assert!(matches!(refused, PredictError::ModelUnavailable(_)));
    println!("✓ {err}");
}

#[test]
fn test_missing_regressor_alone_blocks_all_service() {
    let dir = tempfile::tempdir().unwrap();
    for f in ["classifier.json", "transform.json"] {
        fs::copy(common::fixtures().join(f), dir.path().join(f)).unwrap();
    }
    let err = SpoilagePredictor::load(&ArtifactPaths::discover(dir.path()), PredictionPolicy::default())
        .err()
        .unwrap();
    assert!(matches!(err, PredictError::ModelUnavailable(ref m) if m.contains("regressor")));
}

#[test]
fn test_width_mismatch_between_transform_and_models() {
    let dir = tempfile::tempdir().unwrap();
    for f in ["classifier.json", "regressor.json"] {
        fs::copy(common::fixtures().join(f), dir.path().join(f)).unwrap();
    }
    // no one-hot block: 3 columns instead of the 5 the forests expect
    fs::write(
        dir.path().join("transform.json"),
        r#"{"feature_order": ["temperature", "moisture", "gas"]}"#,
    )
    .unwrap();
    let err = ModelSet::load(&ArtifactPaths::discover(dir.path())).err().unwrap();
    assert!(err.to_string().contains("expects 5 features but the transform produces 3"), "{err}");
}

#[test]
fn test_corrupt_artifact_is_model_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    for f in ["regressor.json", "transform.json"] {
        fs::copy(common::fixtures().join(f), dir.path().join(f)).unwrap();
    }
    fs::write(dir.path().join("classifier.json"), "{ not json").unwrap();
    let err = SpoilagePredictor::load(&ArtifactPaths::discover(dir.path()), PredictionPolicy::default())
        .err()
        .unwrap();
    assert!(matches!(err, PredictError::ModelUnavailable(ref m) if m.contains("failed to parse forest json")));
}
