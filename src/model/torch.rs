use anyhow::{bail, Context, Result};
use std::path::Path;
use tch::{kind::Kind, CModule, Device, Tensor};

use super::{Classifier, Regressor};

/// TorchScript module run on CPU with a `[1, in_dim]` input.
pub struct TorchModel {
    model: CModule,
    device: Device,
    in_dim: usize,
    out_len: i64,
}

impl TorchModel {
    pub fn load(path: &Path, in_dim: usize) -> Result<Self> {
        let device = Device::Cpu;
        let model = CModule::load_on_device(path, device)
            .with_context(|| format!("failed to load TorchScript {}", path.display()))?;

        // Probe output shape with a dummy forward
        let dummy = Tensor::zeros([1, in_dim as i64], (Kind::Float, device));
        let t = model
            .forward_ts(&[dummy])
            .with_context(|| format!("probe forward failed for {}", path.display()))?;
        let out_len = t.numel() as i64;
        if out_len == 0 {
            bail!("{} produced an empty output", path.display());
        }

        Ok(Self {
            model,
            device,
            in_dim,
            out_len,
        })
    }

    fn forward(&self, x: &[f32]) -> Result<Tensor> {
        if x.len() != self.in_dim {
            bail!(
                "feature length mismatch: got {}, expected {}",
                x.len(),
                self.in_dim
            );
        }
        let input = Tensor::from_slice(x)
            .reshape([1, self.in_dim as i64])
            .to_device(self.device);
        let out = self.model.forward_ts(&[input])?;
        Ok(out.to_kind(Kind::Double).flatten(0, -1))
    }
}

impl Classifier for TorchModel {
    fn n_features(&self) -> Option<usize> {
        Some(self.in_dim)
    }

    /// A single output is read as P(spoiled); anything wider is treated as
    /// per-class scores and argmaxed.
    fn classify(&self, x: &[f32]) -> Result<bool> {
        let out = self.forward(x)?;
        if self.out_len == 1 {
            return Ok(out.double_value(&[0]) > 0.5);
        }
        let idx = out.argmax(0, false).int64_value(&[]);
        Ok(idx == 1)
    }
}

impl Regressor for TorchModel {
    fn n_features(&self) -> Option<usize> {
        Some(self.in_dim)
    }

    fn estimate(&self, x: &[f32]) -> Result<f64> {
        let out = self.forward(x)?;
        Ok(out.double_value(&[0]))
    }
}
