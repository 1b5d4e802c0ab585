//! Food spoilage prediction service.
//!
//! A classifier decides spoiled / not spoiled from sensor readings; for
//! fresh items a regressor estimates the days left, which is then bucketed
//! into a freshness label. Both models and their preprocessing transform
//! are loaded once at startup into an immutable [`model::ModelSet`].

pub mod api;
pub mod config;
pub mod error;
pub mod model;
pub mod predictor;
pub mod profiles;
pub mod services;
pub mod types;

pub use error::{ConfigError, PredictError, ServiceError};
pub use predictor::{predict_with, PredictionPolicy, SpoilagePredictor};
pub use types::{FeatureVector, FreshnessLabel, PredictionResponse, RawFeatures, SpoilageClass};
