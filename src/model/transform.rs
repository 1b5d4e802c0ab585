use anyhow::{bail, ensure, Context, Result};
use serde::Deserialize;
use std::{collections::HashSet, path::Path};

use crate::types::{FeatureVector, NumericFeature};

/// Fitted standard scaler: `(x - mean) / scale` per numeric column.
#[derive(Debug, Clone, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

/// Preprocessing produced at training time. The model input is the numeric
/// columns in `feature_order` (optionally scaled) followed by a one-hot
/// block over `food_types`.
#[derive(Debug, Clone, Deserialize)]
pub struct Transform {
    pub feature_order: Vec<NumericFeature>,
    #[serde(default)]
    pub scaler: Option<StandardScaler>,
    #[serde(default)]
    pub food_types: Option<Vec<String>>,
}

impl Transform {
    pub fn load(path: &Path) -> Result<Self> {
        let txt = super::read_artifact(path)?;
        Self::from_json(&txt).with_context(|| format!("invalid transform {}", path.display()))
    }

    pub fn from_json(txt: &str) -> Result<Self> {
        let t: Transform = serde_json::from_str(txt).context("failed to parse transform json")?;
        t.validate()?;
        Ok(t)
    }

    pub fn validate(&self) -> Result<()> {
        let unique: HashSet<_> = self.feature_order.iter().collect();
        if self.feature_order.len() != NumericFeature::ALL.len() || unique.len() != NumericFeature::ALL.len() {
            bail!(
                "feature_order must list temperature, moisture and gas exactly once, got {:?}",
                self.feature_order
            );
        }

        if let Some(s) = &self.scaler {
            let n = self.feature_order.len();
            ensure!(
                s.mean.len() == n && s.scale.len() == n,
                "scaler has {} means and {} scales for {} features",
                s.mean.len(),
                s.scale.len(),
                n
            );
            ensure!(s.mean.iter().all(|m| m.is_finite()), "scaler mean must be finite");
            ensure!(
                s.scale.iter().all(|v| v.is_finite() && *v > 0.0),
                "scaler scale must be finite and positive"
            );
        }

        if let Some(cats) = &self.food_types {
            let unique: HashSet<_> = cats.iter().collect();
            ensure!(unique.len() == cats.len(), "food_types contains duplicates");
        }
        Ok(())
    }

    pub fn output_dim(&self) -> usize {
        self.feature_order.len() + self.food_types.as_ref().map_or(0, Vec::len)
    }

    /// Whether `food_type` is a model input (one-hot) or only a label.
    pub fn encodes_food_type(&self) -> bool {
        self.food_types.is_some()
    }

    pub fn apply(&self, fv: &FeatureVector) -> Vec<f32> {
        let mut v = Vec::with_capacity(self.output_dim());
        for (i, feat) in self.feature_order.iter().enumerate() {
            let x = fv.get(*feat);
            let x = match &self.scaler {
                Some(s) => (x - s.mean[i]) / s.scale[i],
                None => x,
            };
            v.push(x as f32);
        }
        // unknown categories stay all-zero
        if let Some(cats) = &self.food_types {
            v.extend(cats.iter().map(|c| if *c == fv.food_type { 1.0 } else { 0.0 }));
        }
        v
    }

    /// First numeric column of `x` that narrowed to a non-finite value.
    pub fn non_finite_input(&self, x: &[f32]) -> Option<NumericFeature> {
        self.feature_order
            .iter()
            .zip(x)
            .find(|(_, v)| !v.is_finite())
            .map(|(f, _)| *f)
    }

    /// Input used for the startup warmup pass.
    pub fn probe(&self) -> FeatureVector {
        let (temperature, moisture, gas) = match &self.scaler {
            Some(s) => {
                let pick = |f: NumericFeature| {
                    self.feature_order
                        .iter()
                        .position(|x| *x == f)
                        .map_or(0.0, |i| s.mean[i])
                };
                (
                    pick(NumericFeature::Temperature),
                    pick(NumericFeature::Moisture),
                    pick(NumericFeature::Gas),
                )
            }
            None => (0.0, 0.0, 0.0),
        };
        let food_type = self
            .food_types
            .as_ref()
            .and_then(|c| c.first().cloned())
            .unwrap_or_default();
        FeatureVector {
            food_type,
            temperature,
            moisture,
            gas,
        }
    }
}
