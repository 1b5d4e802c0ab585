use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::error::PredictError;

// ---------- Request side ----------

/// Prediction request exactly as it arrives on the wire. Numeric fields are
/// kept as raw JSON so both `4.5` and `"4.5"` are accepted, the way the
/// frontend form sends them.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct RawFeatures {
    pub food_type: Option<String>,
    pub temperature: Option<Value>,
    pub moisture: Option<Value>,
    pub gas: Option<Value>,
}

/// Validated model input.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    pub food_type: String,
    pub temperature: f64,
    pub moisture: f64,
    pub gas: f64,
}

/// The three sensor channels, in the names the training data uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NumericFeature {
    Temperature,
    Moisture,
    Gas,
}

impl NumericFeature {
    pub const ALL: [NumericFeature; 3] = [Self::Temperature, Self::Moisture, Self::Gas];

    pub fn name(self) -> &'static str {
        match self {
            Self::Temperature => "temperature",
            Self::Moisture => "moisture",
            Self::Gas => "gas",
        }
    }
}

impl FeatureVector {
    /// Validate a raw request. `default_food_type` is the configured policy
    /// for requests that leave `food_type` out; without one the field is
    /// required.
    pub fn from_raw(raw: &RawFeatures, default_food_type: Option<&str>) -> Result<Self, PredictError> {
        let temperature = coerce_numeric(NumericFeature::Temperature, raw.temperature.as_ref())?;
        let moisture = coerce_numeric(NumericFeature::Moisture, raw.moisture.as_ref())?;
        let gas = coerce_numeric(NumericFeature::Gas, raw.gas.as_ref())?;

        let food_type = match raw.food_type.as_deref() {
            Some(s) if !s.trim().is_empty() => s.to_string(),
            _ => default_food_type
                .map(str::to_string)
                .ok_or_else(|| PredictError::invalid("food_type is required"))?,
        };

        Ok(Self {
            food_type,
            temperature,
            moisture,
            gas,
        })
    }

    pub fn get(&self, feature: NumericFeature) -> f64 {
        match feature {
            NumericFeature::Temperature => self.temperature,
            NumericFeature::Moisture => self.moisture,
            NumericFeature::Gas => self.gas,
        }
    }
}

fn coerce_numeric(feature: NumericFeature, value: Option<&Value>) -> Result<f64, PredictError> {
    let name = feature.name();
    let value = value.ok_or_else(|| PredictError::invalid(format!("{name} is required")))?;
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match parsed {
        Some(x) if x.is_finite() => Ok(x),
        Some(_) => Err(PredictError::invalid(format!("{name} must be a finite number"))),
        None => Err(PredictError::invalid(format!("{name} must be numeric, got {value}"))),
    }
}

// ---------- Response side ----------

/// Stage-one outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpoilageClass {
    #[serde(rename = "Not Spoiled")]
    NotSpoiled,
    Spoiled,
}

impl SpoilageClass {
    pub fn is_spoiled(self) -> bool {
        matches!(self, Self::Spoiled)
    }
}

impl From<bool> for SpoilageClass {
    fn from(spoiled: bool) -> Self {
        if spoiled {
            Self::Spoiled
        } else {
            Self::NotSpoiled
        }
    }
}

/// Human-facing status derived from `days_remaining` alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FreshnessLabel {
    Fresh,
    #[serde(rename = "Use Soon")]
    UseSoon,
    Spoiled,
}

impl FreshnessLabel {
    pub const USE_SOON_DAYS: f64 = 2.0;

    pub fn from_days(days_remaining: f64) -> Self {
        if days_remaining > Self::USE_SOON_DAYS {
            Self::Fresh
        } else if days_remaining > 0.0 {
            Self::UseSoon
        } else {
            Self::Spoiled
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fresh => "Fresh",
            Self::UseSoon => "Use Soon",
            Self::Spoiled => "Spoiled",
        }
    }
}

impl fmt::Display for FreshnessLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub prediction: SpoilageClass,
    pub status: FreshnessLabel,
    pub days_remaining: f64,
    pub food_type: String,
}
