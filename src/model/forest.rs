//! Random-forest evaluator for trees exported as flat node arrays.
//!
//! Each tree is the usual parallel-array layout (`children_left`,
//! `children_right`, `feature`, `threshold`, `value`); a node with
//! `children_left == -1` is a leaf. Traversal goes left on
//! `x[feature] <= threshold`.

use anyhow::{bail, ensure, Context, Result};
use serde::Deserialize;
use std::path::Path;

use super::{Classifier, Regressor};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForestKind {
    Classifier,
    Regressor,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Tree {
    children_left: Vec<i64>,
    children_right: Vec<i64>,
    feature: Vec<i64>,
    threshold: Vec<f64>,
    value: Vec<Vec<f64>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Forest {
    pub kind: ForestKind,
    pub n_features: usize,
    trees: Vec<Tree>,
}

impl Tree {
    fn validate(&self, kind: ForestKind, n_features: usize) -> Result<()> {
        let n = self.children_left.len();
        ensure!(n > 0, "tree has no nodes");
        ensure!(
            self.children_right.len() == n
                && self.feature.len() == n
                && self.threshold.len() == n
                && self.value.len() == n,
            "node arrays have different lengths"
        );

        for i in 0..n {
            let (l, r) = (self.children_left[i], self.children_right[i]);
            if l < 0 {
                ensure!(r < 0, "node {i}: leaf with a right child");
                let v = &self.value[i];
                match kind {
                    ForestKind::Classifier => {
                        ensure!(v.len() == 2, "node {i}: expected 2 class weights, got {}", v.len());
                        ensure!(
                            v.iter().all(|w| w.is_finite() && *w >= 0.0) && v.iter().sum::<f64>() > 0.0,
                            "node {i}: class weights must be non-negative with a positive sum"
                        );
                    }
                    ForestKind::Regressor => {
                        ensure!(!v.is_empty() && v[0].is_finite(), "node {i}: leaf value missing");
                    }
                }
                continue;
            }
            // children always sit after their parent, which also rules out cycles
            let in_range = |c: i64| c > i as i64 && (c as usize) < n;
            ensure!(in_range(l) && in_range(r), "node {i}: child index out of range");
            let f = self.feature[i];
            ensure!(
                f >= 0 && (f as usize) < n_features,
                "node {i}: feature {f} outside 0..{n_features}"
            );
            ensure!(self.threshold[i].is_finite(), "node {i}: non-finite threshold");
        }
        Ok(())
    }

    fn leaf(&self, x: &[f32]) -> &[f64] {
        let mut i = 0usize;
        loop {
            let l = self.children_left[i];
            if l < 0 {
                return &self.value[i];
            }
            let f = self.feature[i] as usize;
            i = if f64::from(x[f]) <= self.threshold[i] {
                l as usize
            } else {
                self.children_right[i] as usize
            };
        }
    }
}

impl Forest {
    pub fn load(path: &Path, expected: ForestKind) -> Result<Self> {
        let txt = super::read_artifact(path)?;
        let forest =
            Self::from_json(&txt).with_context(|| format!("invalid forest {}", path.display()))?;
        if forest.kind != expected {
            bail!(
                "{} holds a {:?} but a {:?} was expected",
                path.display(),
                forest.kind,
                expected
            );
        }
        Ok(forest)
    }

    pub fn from_json(txt: &str) -> Result<Self> {
        let forest: Forest = serde_json::from_str(txt).context("failed to parse forest json")?;
        ensure!(!forest.trees.is_empty(), "forest has no trees");
        ensure!(forest.n_features > 0, "n_features must be positive");
        for (t, tree) in forest.trees.iter().enumerate() {
            tree.validate(forest.kind, forest.n_features)
                .with_context(|| format!("tree {t}"))?;
        }
        Ok(forest)
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    fn check_input(&self, x: &[f32]) -> Result<()> {
        if x.len() != self.n_features {
            bail!(
                "feature length mismatch: got {}, expected {}",
                x.len(),
                self.n_features
            );
        }
        Ok(())
    }

    /// Mean probability of class 1 across trees.
    pub fn spoiled_probability(&self, x: &[f32]) -> Result<f64> {
        self.check_input(x)?;
        let total: f64 = self
            .trees
            .iter()
            .map(|t| {
                let w = t.leaf(x);
                w[1] / (w[0] + w[1])
            })
            .sum();
        Ok(total / self.trees.len() as f64)
    }

    pub fn mean_value(&self, x: &[f32]) -> Result<f64> {
        self.check_input(x)?;
        let total: f64 = self.trees.iter().map(|t| t.leaf(x)[0]).sum();
        Ok(total / self.trees.len() as f64)
    }
}

impl Classifier for Forest {
    fn n_features(&self) -> Option<usize> {
        Some(self.n_features)
    }

    fn classify(&self, x: &[f32]) -> Result<bool> {
        ensure!(self.kind == ForestKind::Classifier, "forest is not a classifier");
        // argmax over two classes; a tie goes to class 0
        Ok(self.spoiled_probability(x)? > 0.5)
    }
}

impl Regressor for Forest {
    fn n_features(&self) -> Option<usize> {
        Some(self.n_features)
    }

    fn estimate(&self, x: &[f32]) -> Result<f64> {
        ensure!(self.kind == ForestKind::Regressor, "forest is not a regressor");
        self.mean_value(x)
    }
}
