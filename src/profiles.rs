use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

use crate::types::{FeatureVector, NumericFeature};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Range {
    pub min: f64,
    pub max: f64,
}

impl Range {
    const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, x: f64) -> bool {
        x >= self.min && x <= self.max
    }
}

/// Sensor ranges a food type was trained on. Advisory only: readings
/// outside them are still predicted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoodProfile {
    pub name: String,
    /// °C
    pub temperature: Range,
    /// relative humidity, %
    pub moisture: Range,
    /// ppm
    pub gas: Range,
}

impl FoodProfile {
    fn builtin(name: &str, temperature: Range, moisture: Range, gas: Range) -> Self {
        Self {
            name: name.to_string(),
            temperature,
            moisture,
            gas,
        }
    }

    pub fn range(&self, feature: NumericFeature) -> Range {
        match feature {
            NumericFeature::Temperature => self.temperature,
            NumericFeature::Moisture => self.moisture,
            NumericFeature::Gas => self.gas,
        }
    }

    /// Names of the readings that fall outside this profile.
    pub fn out_of_range(&self, fv: &FeatureVector) -> Vec<&'static str> {
        NumericFeature::ALL
            .into_iter()
            .filter(|f| !self.range(*f).contains(fv.get(*f)))
            .map(NumericFeature::name)
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FoodProfiles(Vec<FoodProfile>);

impl FoodProfiles {
    pub fn builtin() -> Self {
        let r = Range::new;
        Self(vec![
            FoodProfile::builtin("Cooked Rice", r(1.0, 40.0), r(65.0, 80.0), r(50.0, 1000.0)),
            FoodProfile::builtin("Milk", r(1.0, 30.0), r(85.0, 95.0), r(50.0, 1200.0)),
            FoodProfile::builtin("Sliced Bread", r(18.0, 30.0), r(35.0, 60.0), r(20.0, 800.0)),
            FoodProfile::builtin("Tomatoes", r(10.0, 30.0), r(90.0, 95.0), r(100.0, 1500.0)),
            FoodProfile::builtin("Leafy Greens", r(1.0, 25.0), r(85.0, 96.0), r(80.0, 1300.0)),
            FoodProfile::builtin("Chicken (Cooked)", r(1.0, 40.0), r(60.0, 75.0), r(100.0, 2000.0)),
            FoodProfile::builtin("Lentils (Cooked)", r(1.0, 40.0), r(68.0, 80.0), r(50.0, 1100.0)),
            FoodProfile::builtin("Paneer", r(2.0, 30.0), r(55.0, 70.0), r(70.0, 1400.0)),
            FoodProfile::builtin("Apples", r(0.0, 25.0), r(80.0, 90.0), r(150.0, 1800.0)),
            FoodProfile::builtin("Potatoes", r(7.0, 25.0), r(75.0, 90.0), r(40.0, 900.0)),
        ])
    }

    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed to read food profiles at {}", path.display()))?;
        let list: Vec<FoodProfile> = serde_json::from_str(&data)
            .with_context(|| format!("invalid food profiles json {}", path.display()))?;
        for p in &list {
            for f in NumericFeature::ALL {
                let r = p.range(f);
                ensure!(r.min <= r.max, "{}: {} range is inverted", p.name, f.name());
            }
        }
        Ok(Self(list))
    }

    pub fn get(&self, food_type: &str) -> Option<&FoodProfile> {
        self.0.iter().find(|p| p.name == food_type)
    }

    pub fn all(&self) -> &[FoodProfile] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_covers_the_form_foods() {
        let p = FoodProfiles::builtin();
        assert_eq!(p.all().len(), 10);
        let milk = p.get("Milk").unwrap();
        assert_eq!(milk.moisture, Range::new(85.0, 95.0));
        assert!(p.get("milk").is_none());
    }

    #[test]
    fn reports_out_of_range_readings() {
        let apples = FoodProfiles::builtin().get("Apples").cloned().unwrap();
        let fv = FeatureVector {
            food_type: "Apples".into(),
            temperature: 30.0,
            moisture: 85.0,
            gas: 100.0,
        };
        assert_eq!(apples.out_of_range(&fv), vec!["temperature", "gas"]);
    }

    #[test]
    fn shipped_profile_file_matches_builtin() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("profiles/foods.json");
        assert_eq!(FoodProfiles::load(&path).unwrap(), FoodProfiles::builtin());
    }

    #[test]
    fn loads_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("foods.json");
        fs::write(
            &path,
            r#"[{"name": "Mango", "temperature": {"min": 10, "max": 30},
                 "moisture": {"min": 80, "max": 92}, "gas": {"min": 100, "max": 1600}}]"#,
        )
        .unwrap();
        let p = FoodProfiles::load(&path).unwrap();
        assert_eq!(p.all().len(), 1);
        assert!(p.get("Mango").unwrap().gas.contains(1600.0));

        fs::write(
            &path,
            r#"[{"name": "Bad", "temperature": {"min": 30, "max": 10},
                 "moisture": {"min": 0, "max": 1}, "gas": {"min": 0, "max": 1}}]"#,
        )
        .unwrap();
        assert!(FoodProfiles::load(&path).is_err());
    }
}
