#![deny(clippy::all, clippy::pedantic)]
#![allow(
    clippy::cast_precision_loss,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::similar_names
)]
//! Inference-only policy networks for the lander service.
//!
//! A [`Policy`] maps an observation vector to a discrete action, a value
//! estimate, and a per-action probability vector. The only shipped
//! implementation is [`MlpPolicy`], a small fully connected network loaded
//! from a JSON checkpoint written at training time. Training itself lives
//! outside this workspace; everything here is read-only forward passes.

pub mod checkpoint;
pub mod mlp;

pub use checkpoint::Checkpoint;
pub use mlp::{Dense, MlpPolicy};

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PolicyError {
    #[error("failed to read checkpoint {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("malformed checkpoint {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("checkpoint shape mismatch: {0}")]
    Shape(String),
    #[error("unsupported checkpoint version {0}")]
    Version(u32),
}

/// Decision-making capability consumed by the episode simulator.
///
/// Implementations must be safe to call concurrently with shared references;
/// any randomness comes from the caller-supplied RNG so the policy itself
/// never mutates.
pub trait Policy: Send + Sync {
    /// Length of the observation vector the policy expects.
    fn obs_size(&self) -> usize;

    /// Number of discrete actions the policy chooses between.
    fn action_count(&self) -> usize;

    /// Select an action for the observation.
    ///
    /// `deterministic` picks the highest-probability action; otherwise the
    /// action is sampled from the policy distribution using `rng`.
    fn predict(&self, obs: &[f32], deterministic: bool, rng: &mut fastrand::Rng) -> usize;

    /// State-value estimate for the observation.
    fn estimate_value(&self, obs: &[f32]) -> f32;

    /// Per-action probabilities for the observation. Sums to 1.
    fn action_distribution(&self, obs: &[f32]) -> Vec<f32>;
}
