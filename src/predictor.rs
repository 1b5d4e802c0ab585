use crate::{
    error::PredictError,
    model::{ArtifactPaths, ModelSet},
    types::{FeatureVector, FreshnessLabel, PredictionResponse, RawFeatures, SpoilageClass},
};

/// Knobs that shape the response but not the models.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionPolicy {
    /// Decimal digits kept in `days_remaining`.
    pub days_precision: u32,
    /// Used when a request omits `food_type`; `None` makes the field required.
    pub default_food_type: Option<String>,
}

impl Default for PredictionPolicy {
    fn default() -> Self {
        Self {
            days_precision: 2,
            default_food_type: None,
        }
    }
}

/// Round to `precision` decimals. Values too large to scale are already
/// whole at that precision and come back unchanged.
pub fn round_days(days: f64, precision: u32) -> f64 {
    let f = 10f64.powi(precision as i32);
    let rounded = (days * f).round() / f;
    if rounded.is_finite() {
        rounded
    } else {
        days
    }
}

/// Two-stage prediction against a frozen model set.
///
/// The regressor only runs when the classifier says "not spoiled"; it was
/// fitted on fresh samples only and its output means nothing otherwise.
pub fn predict_with(
    models: &ModelSet,
    policy: &PredictionPolicy,
    fv: &FeatureVector,
) -> Result<PredictionResponse, PredictError> {
    let x = models.transform().apply(fv);
    if let Some(feature) = models.transform().non_finite_input(&x) {
        return Err(PredictError::invalid(format!(
            "{} is outside the range the model accepts",
            feature.name()
        )));
    }

    let spoiled = models
        .classifier()
        .classify(&x)
        .map_err(|e| PredictError::unavailable(format!("classifier failed: {e:#}")))?;
    let prediction = SpoilageClass::from(spoiled);

    let days_remaining = if spoiled {
        0.0
    } else {
        let raw = models
            .regressor()
            .estimate(&x)
            .map_err(|e| PredictError::unavailable(format!("regressor failed: {e:#}")))?;
        if raw.is_nan() || raw == f64::INFINITY {
            return Err(PredictError::unavailable(format!(
                "regressor produced a non-finite estimate ({raw})"
            )));
        }
        if raw <= 0.0 {
            0.0
        } else {
            round_days(raw, policy.days_precision)
        }
    };

    let status = FreshnessLabel::from_days(days_remaining);
    tracing::debug!(
        food_type = %fv.food_type,
        spoiled,
        days_remaining,
        status = %status,
        "prediction"
    );

    Ok(PredictionResponse {
        prediction,
        status,
        days_remaining,
        food_type: fv.food_type.clone(),
    })
}

enum ModelState {
    Ready(ModelSet),
    Unavailable(String),
}

/// Entry point used by the HTTP layer. Holds either a loaded model set or
/// the reason it could not be loaded; in the latter case every prediction
/// is refused.
pub struct SpoilagePredictor {
    state: ModelState,
    policy: PredictionPolicy,
}

impl SpoilagePredictor {
    pub fn new(models: ModelSet, policy: PredictionPolicy) -> Self {
        Self {
            state: ModelState::Ready(models),
            policy,
        }
    }

    pub fn unavailable(reason: impl Into<String>, policy: PredictionPolicy) -> Self {
        Self {
            state: ModelState::Unavailable(reason.into()),
            policy,
        }
    }

    pub fn load(paths: &ArtifactPaths, policy: PredictionPolicy) -> Result<Self, PredictError> {
        ModelSet::load(paths)
            .map(|models| Self::new(models, policy))
            .map_err(|e| PredictError::from_load(&e))
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, ModelState::Ready(_))
    }

    pub fn unavailable_reason(&self) -> Option<&str> {
        match &self.state {
            ModelState::Ready(_) => None,
            ModelState::Unavailable(r) => Some(r),
        }
    }

    pub fn policy(&self) -> &PredictionPolicy {
        &self.policy
    }

    fn models(&self) -> Result<&ModelSet, PredictError> {
        match &self.state {
            ModelState::Ready(m) => Ok(m),
            ModelState::Unavailable(r) => Err(PredictError::unavailable(r.clone())),
        }
    }

    /// Check that predictions can be served at all, then validate `raw`.
    pub fn validate(&self, raw: &RawFeatures) -> Result<FeatureVector, PredictError> {
        self.models()?;
        FeatureVector::from_raw(raw, self.policy.default_food_type.as_deref())
    }

    pub fn predict(&self, raw: &RawFeatures) -> Result<PredictionResponse, PredictError> {
        let fv = self.validate(raw)?;
        self.predict_features(&fv)
    }

    pub fn predict_features(&self, fv: &FeatureVector) -> Result<PredictionResponse, PredictError> {
        predict_with(self.models()?, &self.policy, fv)
    }
}
