//! Model artifacts: the two-stage models and the preprocessing transform
//! they were trained behind.

pub mod forest;
#[cfg(feature = "torch")]
pub mod torch;
pub mod transform;

use anyhow::{bail, Context, Result};
use std::{
    fs, io,
    path::{Path, PathBuf},
    thread,
    time::Duration,
};

pub use forest::{Forest, ForestKind};
pub use transform::{StandardScaler, Transform};

/// Stage one. `x` is the transformed feature vector.
pub trait Classifier: Send + Sync {
    /// Expected input width, when the artifact declares one.
    fn n_features(&self) -> Option<usize>;
    /// `true` means spoiled.
    fn classify(&self, x: &[f32]) -> Result<bool>;
}

/// Stage two, only meaningful for items the classifier called fresh.
pub trait Regressor: Send + Sync {
    fn n_features(&self) -> Option<usize>;
    /// Raw days-remaining estimate, unclamped.
    fn estimate(&self, x: &[f32]) -> Result<f64>;
}

const RETRY_DELAY: Duration = Duration::from_millis(200);

/// Read an artifact file, retrying once on a transient I/O error.
pub(crate) fn read_artifact(path: &Path) -> Result<String> {
    match fs::read_to_string(path) {
        Ok(s) => Ok(s),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            Err(e).with_context(|| format!("artifact not found at {}", path.display()))
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "artifact read failed, retrying once");
            thread::sleep(RETRY_DELAY);
            fs::read_to_string(path)
                .with_context(|| format!("failed to read artifact at {}", path.display()))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub classifier: PathBuf,
    pub regressor: PathBuf,
    pub transform: PathBuf,
}

impl ArtifactPaths {
    /// Find `classifier.*`, `regressor.*` and `transform.json` in `dir`.
    /// JSON forests win over TorchScript when both are present; when neither
    /// exists the JSON name is returned so the load error names a real path.
    pub fn discover(dir: &Path) -> Self {
        let pick = |stem: &str| {
            ["json", "pt", "ts"]
                .iter()
                .map(|ext| dir.join(format!("{stem}.{ext}")))
                .find(|p| p.exists())
                .unwrap_or_else(|| dir.join(format!("{stem}.json")))
        };
        Self {
            classifier: pick("classifier"),
            regressor: pick("regressor"),
            transform: dir.join("transform.json"),
        }
    }
}

enum Backend {
    Forest,
    TorchScript,
}

fn backend_for(path: &Path) -> Result<Backend> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => Ok(Backend::Forest),
        Some("pt") | Some("ts") => Ok(Backend::TorchScript),
        _ => bail!("unrecognised model artifact {}", path.display()),
    }
}

#[cfg(feature = "torch")]
fn load_torch(path: &Path, in_dim: usize) -> Result<torch::TorchModel> {
    torch::TorchModel::load(path, in_dim)
}

#[cfg(not(feature = "torch"))]
fn load_torch(path: &Path, _in_dim: usize) -> Result<std::convert::Infallible> {
    bail!(
        "{} is a TorchScript model but this build lacks the `torch` feature",
        path.display()
    )
}

fn load_classifier(path: &Path, in_dim: usize) -> Result<Box<dyn Classifier>> {
    let model: Box<dyn Classifier> = match backend_for(path)? {
        Backend::Forest => Box::new(Forest::load(path, ForestKind::Classifier)?),
        #[cfg(feature = "torch")]
        Backend::TorchScript => Box::new(load_torch(path, in_dim)?),
        #[cfg(not(feature = "torch"))]
        Backend::TorchScript => match load_torch(path, in_dim)? {},
    };
    Ok(model)
}

fn load_regressor(path: &Path, in_dim: usize) -> Result<Box<dyn Regressor>> {
    let model: Box<dyn Regressor> = match backend_for(path)? {
        Backend::Forest => Box::new(Forest::load(path, ForestKind::Regressor)?),
        #[cfg(feature = "torch")]
        Backend::TorchScript => Box::new(load_torch(path, in_dim)?),
        #[cfg(not(feature = "torch"))]
        Backend::TorchScript => match load_torch(path, in_dim)? {},
    };
    Ok(model)
}

/// Everything a prediction reads. Built once at startup, never mutated.
pub struct ModelSet {
    classifier: Box<dyn Classifier>,
    regressor: Box<dyn Regressor>,
    transform: Transform,
}

impl ModelSet {
    /// Assemble a set from already-built parts, checking that both models
    /// accept the transform's output width.
    pub fn new(
        classifier: Box<dyn Classifier>,
        regressor: Box<dyn Regressor>,
        transform: Transform,
    ) -> Result<Self> {
        let in_dim = transform.output_dim();
        for (role, n) in [
            ("classifier", classifier.n_features()),
            ("regressor", regressor.n_features()),
        ] {
            if let Some(n) = n {
                if n != in_dim {
                    bail!("{role} expects {n} features but the transform produces {in_dim}");
                }
            }
        }
        Ok(Self {
            classifier,
            regressor,
            transform,
        })
    }

    pub fn load(paths: &ArtifactPaths) -> Result<Self> {
        let transform = Transform::load(&paths.transform)?;
        let in_dim = transform.output_dim();
        let classifier = load_classifier(&paths.classifier, in_dim)
            .with_context(|| format!("classifier {}", paths.classifier.display()))?;
        let regressor = load_regressor(&paths.regressor, in_dim)
            .with_context(|| format!("regressor {}", paths.regressor.display()))?;

        let set = Self::new(classifier, regressor, transform)?;
        set.warmup()?;
        tracing::info!(
            in_dim,
            encodes_food_type = set.transform.encodes_food_type(),
            scaled = set.transform.scaler.is_some(),
            "loaded model artifacts"
        );
        Ok(set)
    }

    /// Run both stages once on a probe vector so a broken artifact fails at
    /// startup instead of on the first request.
    pub fn warmup(&self) -> Result<()> {
        let x = self.transform.apply(&self.transform.probe());
        self.classifier.classify(&x).context("classifier warmup failed")?;
        self.regressor.estimate(&x).context("regressor warmup failed")?;
        tracing::debug!("warmup forward ok");
        Ok(())
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    pub fn classifier(&self) -> &dyn Classifier {
        self.classifier.as_ref()
    }

    pub fn regressor(&self) -> &dyn Regressor {
        self.regressor.as_ref()
    }
}
