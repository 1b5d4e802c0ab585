#![allow(dead_code)]

use parking_lot::Mutex;
use std::{path::PathBuf, sync::Arc};

use spoilage_predictor::model::{ArtifactPaths, Classifier, ModelSet, Regressor, Transform};

pub fn fixtures() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

pub fn fixture_paths() -> ArtifactPaths {
    ArtifactPaths::discover(&fixtures())
}

/// Classifier with a fixed answer that records every input it sees.
pub struct StubClassifier {
    pub spoiled: bool,
    pub seen: Arc<Mutex<Vec<Vec<f32>>>>,
}

impl Classifier for StubClassifier {
    fn n_features(&self) -> Option<usize> {
        None
    }

    fn classify(&self, x: &[f32]) -> anyhow::Result<bool> {
        self.seen.lock().push(x.to_vec());
        Ok(self.spoiled)
    }
}

pub struct StubRegressor {
    pub days: f64,
    pub seen: Arc<Mutex<Vec<Vec<f32>>>>,
}

impl Regressor for StubRegressor {
    fn n_features(&self) -> Option<usize> {
        None
    }

    fn estimate(&self, x: &[f32]) -> anyhow::Result<f64> {
        self.seen.lock().push(x.to_vec());
        Ok(self.days)
    }
}

pub struct Stubs {
    pub models: ModelSet,
    pub classifier_calls: Arc<Mutex<Vec<Vec<f32>>>>,
    pub regressor_calls: Arc<Mutex<Vec<Vec<f32>>>>,
}

pub fn passthrough() -> Transform {
    Transform::from_json(r#"{"feature_order": ["temperature", "moisture", "gas"]}"#).unwrap()
}

pub fn stub_models(spoiled: bool, days: f64, transform: Transform) -> Stubs {
    let classifier_calls = Arc::new(Mutex::new(Vec::new()));
    let regressor_calls = Arc::new(Mutex::new(Vec::new()));
    let models = ModelSet::new(
        Box::new(StubClassifier {
            spoiled,
            seen: classifier_calls.clone(),
        }),
        Box::new(StubRegressor {
            days,
            seen: regressor_calls.clone(),
        }),
        transform,
    )
    .unwrap();
    Stubs {
        models,
        classifier_calls,
        regressor_calls,
    }
}
