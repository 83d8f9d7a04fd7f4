//! JSON checkpoint format for [`MlpPolicy`].
//!
//! A checkpoint stores explicit layer dimensions next to the weight data so
//! loading can reject files whose arrays do not chain together, instead of
//! panicking somewhere inside a forward pass.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::mlp::{Dense, MlpPolicy};
use crate::{Policy, PolicyError};

pub const CHECKPOINT_VERSION: u32 = 1;

fn default_version() -> u32 {
    CHECKPOINT_VERSION
}

/// Weights of one dense layer, row-major `[out, in]`.
#[derive(Serialize, Deserialize, Clone)]
pub struct LayerWeights {
    pub w: Vec<f32>,
    pub b: Vec<f32>,
}

/// On-disk policy description.
#[derive(Serialize, Deserialize, Clone)]
pub struct Checkpoint {
    #[serde(default = "default_version")]
    pub version: u32,
    pub obs_dim: usize,
    pub action_dim: usize,
    /// Hidden layer widths, outermost first. May be empty.
    #[serde(default)]
    pub hidden: Vec<usize>,
    #[serde(default)]
    pub trunk: Vec<LayerWeights>,
    pub action_head: LayerWeights,
    pub value_head: LayerWeights,
}

impl Checkpoint {
    /// Reads and parses a checkpoint file. Does not validate shapes yet;
    /// that happens in [`Checkpoint::into_policy`].
    pub fn load(path: &Path) -> Result<Self, PolicyError> {
        let text = fs::read_to_string(path).map_err(|source| PolicyError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| PolicyError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Writes the checkpoint as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<(), PolicyError> {
        let text = serde_json::to_string_pretty(self).map_err(|source| PolicyError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, text).map_err(|source| PolicyError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Snapshot of a live policy, for tests and artifact tooling.
    #[must_use]
    pub fn from_policy(policy: &MlpPolicy) -> Self {
        let trunk: Vec<LayerWeights> = policy
            .trunk_layers()
            .iter()
            .map(|l| LayerWeights {
                w: l.w.clone(),
                b: l.b.clone(),
            })
            .collect();
        let hidden = policy.trunk_layers().iter().map(|l| l.out_dim).collect();
        let (action_head, value_head) = policy.heads();
        Self {
            version: CHECKPOINT_VERSION,
            obs_dim: policy.obs_size(),
            action_dim: policy.action_count(),
            hidden,
            trunk,
            action_head: LayerWeights {
                w: action_head.w.clone(),
                b: action_head.b.clone(),
            },
            value_head: LayerWeights {
                w: value_head.w.clone(),
                b: value_head.b.clone(),
            },
        }
    }

    /// Validates every layer shape and builds the policy.
    pub fn into_policy(self) -> Result<MlpPolicy, PolicyError> {
        if self.version != CHECKPOINT_VERSION {
            return Err(PolicyError::Version(self.version));
        }
        // Zero-width heads satisfy every product check below but leave
        // argmax with nothing to pick from.
        if self.obs_dim == 0 || self.action_dim == 0 {
            return Err(PolicyError::Shape(format!(
                "obs_dim {} and action_dim {} must both be nonzero",
                self.obs_dim, self.action_dim
            )));
        }
        if self.hidden.len() != self.trunk.len() {
            return Err(PolicyError::Shape(format!(
                "{} hidden widths but {} trunk layers",
                self.hidden.len(),
                self.trunk.len()
            )));
        }

        let mut trunk = Vec::with_capacity(self.trunk.len());
        let mut in_dim = self.obs_dim;
        for (i, (layer, &out_dim)) in self.trunk.iter().zip(&self.hidden).enumerate() {
            trunk.push(build_layer(layer, in_dim, out_dim, &format!("trunk[{i}]"))?);
            in_dim = out_dim;
        }
        let action_head = build_layer(&self.action_head, in_dim, self.action_dim, "action_head")?;
        let value_head = build_layer(&self.value_head, in_dim, 1, "value_head")?;
        Ok(MlpPolicy::from_layers(trunk, action_head, value_head))
    }
}

fn build_layer(
    layer: &LayerWeights,
    in_dim: usize,
    out_dim: usize,
    name: &str,
) -> Result<Dense, PolicyError> {
    if layer.w.len() != in_dim * out_dim {
        return Err(PolicyError::Shape(format!(
            "{name}: expected {in_dim}x{out_dim} = {} weights, found {}",
            in_dim * out_dim,
            layer.w.len()
        )));
    }
    if layer.b.len() != out_dim {
        return Err(PolicyError::Shape(format!(
            "{name}: expected {out_dim} biases, found {}",
            layer.b.len()
        )));
    }
    Ok(Dense::new(layer.w.clone(), layer.b.clone(), in_dim, out_dim))
}

impl MlpPolicy {
    /// Loads a policy checkpoint from disk.
    pub fn load(path: &Path) -> Result<Self, PolicyError> {
        Checkpoint::load(path)?.into_policy()
    }
}
