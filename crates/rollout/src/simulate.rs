//! Bounded episode execution.

use policy::Policy;

use crate::reconstruct::reconstruct;
use crate::{Environment, Frame, Observation, SimError};

/// Knobs for a single episode.
#[derive(Clone, Copy, Debug)]
pub struct RolloutOptions {
    /// Seeds both the environment reset and the action-sampling RNG.
    pub seed: u64,
    /// Greedy action selection when true, sampled from the action
    /// distribution when false.
    pub deterministic: bool,
    /// Hard cap on simulated steps. An episode that reaches the cap stops
    /// without being marked terminal.
    pub max_steps: u32,
    /// Collect a rendered frame after every step, plus one immediately
    /// after a state override so the capture opens on the requested state.
    pub capture_frames: bool,
    /// Start from this state instead of the seeded reset state. The value
    /// is clamped and installed via [`Environment::override_state`].
    pub initial_observation: Option<Observation>,
}

impl Default for RolloutOptions {
    fn default() -> Self {
        Self {
            seed: 42,
            deterministic: true,
            max_steps: 600,
            capture_frames: false,
            initial_observation: None,
        }
    }
}

/// What one episode produced.
#[derive(Clone, Debug)]
pub struct EpisodeResult {
    /// Sum of per-step rewards, accumulated in f64 so long episodes do not
    /// lose low-order bits.
    pub total_reward: f64,
    pub steps: u32,
    /// Captured frames, empty unless requested. Holds one frame per executed
    /// step, preceded by the injection frame when a state override ran.
    pub frames: Vec<Frame>,
    /// True when the environment ended the episode, false when the step cap
    /// cut it short.
    pub terminal: bool,
    /// Action chosen at the first step, if any step ran.
    pub first_action: Option<usize>,
}

/// Runs one episode of `policy` against `env`.
///
/// The environment is consumed and closed on every exit path, including
/// step failures and override failures, so callers never hold a
/// half-released simulation.
pub fn run<P, E>(policy: &P, mut env: E, options: &RolloutOptions) -> Result<EpisodeResult, SimError>
where
    P: Policy + ?Sized,
    E: Environment,
{
    let result = episode_loop(policy, &mut env, options);
    env.close();
    result
}

fn episode_loop<P, E>(
    policy: &P,
    env: &mut E,
    options: &RolloutOptions,
) -> Result<EpisodeResult, SimError>
where
    P: Policy + ?Sized,
    E: Environment,
{
    let mut rng = fastrand::Rng::with_seed(options.seed);
    let mut observation = env.reset(options.seed);
    let mut frames = Vec::new();

    if let Some(requested) = &options.initial_observation {
        let state = reconstruct(requested, &env.constants());
        env.override_state(&state.physical)?;
        observation = state.clamped;
        // The first delivered frame must show the injected state, not the
        // outcome of the first action.
        if options.capture_frames {
            if let Some(frame) = env.render() {
                frames.push(frame);
            }
        }
    }

    let mut total_reward = 0.0f64;
    let mut steps = 0u32;
    let mut terminal = false;
    let mut first_action = None;

    while steps < options.max_steps {
        let action = policy.predict(&observation.to_array(), options.deterministic, &mut rng);
        if first_action.is_none() {
            first_action = Some(action);
        }

        let outcome = env.step(action)?;
        total_reward += f64::from(outcome.reward);
        steps += 1;
        observation = outcome.observation;

        if options.capture_frames {
            if let Some(frame) = env.render() {
                frames.push(frame);
            }
        }

        if outcome.terminated || outcome.truncated {
            terminal = true;
            break;
        }
    }

    tracing::debug!(steps, terminal, total_reward, "episode finished");

    Ok(EpisodeResult {
        total_reward,
        steps,
        frames,
        terminal,
        first_action,
    })
}
