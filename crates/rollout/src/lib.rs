#![deny(clippy::all, clippy::pedantic)]
#![allow(
    clippy::cast_possible_truncation,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::similar_names
)]
//! # Episode engine
//!
//! Drives a [`policy::Policy`] against an [`Environment`] for one bounded
//! episode. The pieces fit together like this:
//!
//! -   [`Environment`] is the capability surface a simulator must expose:
//!     seeded reset, discrete stepping, optional frame rendering, explicit
//!     close, and a physical-state override hook.
//! -   [`reconstruct`] maps a normalized 8-value observation back into the
//!     environment's internal physical state so an episode can start from an
//!     arbitrary caller-chosen point.
//! -   [`run`] is the step loop: reset, optional override, then
//!     act/step/accumulate until the environment ends the episode or the
//!     step cap is hit. The environment is closed on every exit path.
//! -   [`frames`] downsamples captured frame sequences to bounded-size
//!     outputs for transport.

pub mod frames;
pub mod reconstruct;
pub mod simulate;

pub use frames::{sample_sequence, snapshots, FrameSnapshots};
pub use reconstruct::{reconstruct, BodyState, LegState, PhysicalState, ReconstructedState};
pub use simulate::{run, EpisodeResult, RolloutOptions};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimError {
    #[error("observation must contain exactly {expected} values, found {0}", expected = LANDER_OBS_LEN)]
    ObservationLength(usize),
    #[error("lander body not initialized; reset the environment first")]
    BodyNotInitialized,
    #[error("action {action} out of range for {count} available actions")]
    InvalidAction { action: usize, count: usize },
    #[error("environment failure: {0}")]
    Env(String),
}

/// Length of the lander observation vector.
pub const LANDER_OBS_LEN: usize = 8;

/// Normalized lander observation, in the environment's fixed element order.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Observation {
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub angle: f32,
    pub angular_velocity: f32,
    pub left_leg_contact: f32,
    pub right_leg_contact: f32,
}

impl Observation {
    /// Builds an observation from a caller-supplied vector.
    ///
    /// The only validation is the length; out-of-range values are accepted
    /// here and clamped later by [`reconstruct`].
    pub fn from_slice(values: &[f32]) -> Result<Self, SimError> {
        if values.len() != LANDER_OBS_LEN {
            return Err(SimError::ObservationLength(values.len()));
        }
        Ok(Self {
            x: values[0],
            y: values[1],
            vx: values[2],
            vy: values[3],
            angle: values[4],
            angular_velocity: values[5],
            left_leg_contact: values[6],
            right_leg_contact: values[7],
        })
    }

    #[must_use]
    pub fn to_array(&self) -> [f32; LANDER_OBS_LEN] {
        [
            self.x,
            self.y,
            self.vx,
            self.vy,
            self.angle,
            self.angular_velocity,
            self.left_leg_contact,
            self.right_leg_contact,
        ]
    }
}

/// One rendered RGB raster. `data` is row-major, three bytes per pixel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl Frame {
    #[must_use]
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Self {
        assert_eq!(data.len(), width as usize * height as usize * 3);
        Self {
            width,
            height,
            data,
        }
    }
}

/// Result of advancing the environment by one action.
#[derive(Clone, Copy, Debug)]
pub struct StepOutcome {
    pub observation: Observation,
    pub reward: f32,
    /// The episode reached a terminal state (landed, crashed).
    pub terminated: bool,
    /// The episode was cut short by the environment itself.
    pub truncated: bool,
}

/// Fixed conversion constants between normalized observations and world
/// coordinates. Obtained from the environment instance after reset, so
/// reconstruction stays a pure function of (observation, constants).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EnvConstants {
    /// Half the viewport width in world units.
    pub half_width: f32,
    /// Half the viewport height in world units.
    pub half_height: f32,
    /// Ground reference height: helipad height plus leg extension.
    pub ground_ref: f32,
    /// Simulation steps per second.
    pub fps: f32,
    /// Horizontal leg attachment offset from the hull center, world units.
    pub leg_away: f32,
}

/// A stateful physics simulation exposing the surface the episode engine
/// needs. Any simulator implementing this is substitutable.
pub trait Environment {
    /// Reset to a fresh initial state, deterministically per seed.
    fn reset(&mut self, seed: u64) -> Observation;

    /// Advance one step with a discrete action index.
    fn step(&mut self, action: usize) -> Result<StepOutcome, SimError>;

    /// Render the current state, if the environment supports rendering.
    fn render(&mut self) -> Option<Frame>;

    /// Release simulation and render resources. Idempotent.
    fn close(&mut self);

    /// Conversion constants for [`reconstruct`].
    fn constants(&self) -> EnvConstants;

    /// Overwrite the internal physical state with a reconstructed one.
    ///
    /// Fails with [`SimError::BodyNotInitialized`] when called before the
    /// first reset has created the physical bodies.
    fn override_state(&mut self, state: &PhysicalState) -> Result<(), SimError>;
}
