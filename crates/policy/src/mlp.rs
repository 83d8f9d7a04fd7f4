//! Fully connected inference network with an action head and a value head.

use crate::Policy;

/// A fully connected layer. Weights are row-major `[out_dim, in_dim]`.
#[derive(Clone, Debug)]
pub struct Dense {
    pub w: Vec<f32>,
    pub b: Vec<f32>,
    pub in_dim: usize,
    pub out_dim: usize,
}

impl Dense {
    /// Creates a layer from explicit weights and biases.
    #[must_use]
    pub fn new(weights: Vec<f32>, bias: Vec<f32>, in_dim: usize, out_dim: usize) -> Self {
        assert_eq!(weights.len(), in_dim * out_dim);
        assert_eq!(bias.len(), out_dim);
        Self {
            w: weights,
            b: bias,
            in_dim,
            out_dim,
        }
    }

    /// Glorot-initialized layer, for tests and synthetic checkpoints.
    #[must_use]
    pub fn random(in_dim: usize, out_dim: usize, rng: &mut fastrand::Rng) -> Self {
        let limit = (6.0 / (in_dim + out_dim) as f32).sqrt();
        let weights = (0..in_dim * out_dim)
            .map(|_| rng.f32() * 2.0 * limit - limit)
            .collect();
        let bias = vec![0.0; out_dim];
        Self::new(weights, bias, in_dim, out_dim)
    }

    /// `y = W x + b`.
    #[must_use]
    pub fn forward(&self, x: &[f32]) -> Vec<f32> {
        assert_eq!(x.len(), self.in_dim);
        let mut out = self.b.clone();
        for (row, out_v) in out.iter_mut().enumerate() {
            let w_row = &self.w[row * self.in_dim..(row + 1) * self.in_dim];
            let mut acc = 0.0f32;
            for (w, x_v) in w_row.iter().zip(x) {
                acc += w * x_v;
            }
            *out_v += acc;
        }
        out
    }
}

/// Multi-layer perceptron policy: tanh trunk, softmax action head, scalar
/// value head. Immutable after construction.
#[derive(Debug)]
pub struct MlpPolicy {
    trunk: Vec<Dense>,
    action_head: Dense,
    value_head: Dense,
    obs_dim: usize,
    act_dim: usize,
}

impl MlpPolicy {
    /// Assembles a policy from already-validated layers.
    ///
    /// [`crate::Checkpoint::into_policy`] is the usual entry point; this
    /// constructor trusts that the layer dimensions chain correctly.
    #[must_use]
    pub fn from_layers(trunk: Vec<Dense>, action_head: Dense, value_head: Dense) -> Self {
        let obs_dim = trunk.first().map_or(action_head.in_dim, |l| l.in_dim);
        let act_dim = action_head.out_dim;
        assert_eq!(value_head.out_dim, 1);
        Self {
            trunk,
            action_head,
            value_head,
            obs_dim,
            act_dim,
        }
    }

    /// Randomly initialized policy for tests and local experimentation.
    #[must_use]
    pub fn random(obs_dim: usize, hidden: &[usize], act_dim: usize, seed: u64) -> Self {
        let mut rng = fastrand::Rng::with_seed(seed);
        let mut trunk = Vec::with_capacity(hidden.len());
        let mut in_dim = obs_dim;
        for &h in hidden {
            trunk.push(Dense::random(in_dim, h, &mut rng));
            in_dim = h;
        }
        let action_head = Dense::random(in_dim, act_dim, &mut rng);
        let value_head = Dense::random(in_dim, 1, &mut rng);
        Self::from_layers(trunk, action_head, value_head)
    }

    fn hidden(&self, obs: &[f32]) -> Vec<f32> {
        let mut x = obs.to_vec();
        for layer in &self.trunk {
            x = layer.forward(&x);
            for v in &mut x {
                *v = v.tanh();
            }
        }
        x
    }

    fn logits(&self, obs: &[f32]) -> Vec<f32> {
        self.action_head.forward(&self.hidden(obs))
    }

    pub(crate) fn trunk_layers(&self) -> &[Dense] {
        &self.trunk
    }

    pub(crate) fn heads(&self) -> (&Dense, &Dense) {
        (&self.action_head, &self.value_head)
    }
}

/// Numerically stable softmax.
fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|l| (l - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.iter().map(|e| e / sum).collect()
}

fn argmax(values: &[f32]) -> usize {
    let mut best = 0;
    for (i, v) in values.iter().enumerate() {
        if *v > values[best] {
            best = i;
        }
    }
    best
}

impl Policy for MlpPolicy {
    fn obs_size(&self) -> usize {
        self.obs_dim
    }

    fn action_count(&self) -> usize {
        self.act_dim
    }

    fn predict(&self, obs: &[f32], deterministic: bool, rng: &mut fastrand::Rng) -> usize {
        let logits = self.logits(obs);
        if deterministic {
            return argmax(&logits);
        }
        let probs = softmax(&logits);
        let draw = rng.f32();
        let mut cumulative = 0.0f32;
        for (i, p) in probs.iter().enumerate() {
            cumulative += p;
            if draw < cumulative {
                return i;
            }
        }
        // Float round-off can leave the cumulative sum a hair below 1.
        probs.len() - 1
    }

    fn estimate_value(&self, obs: &[f32]) -> f32 {
        self.value_head.forward(&self.hidden(obs))[0]
    }

    fn action_distribution(&self, obs: &[f32]) -> Vec<f32> {
        softmax(&self.logits(obs))
    }
}
