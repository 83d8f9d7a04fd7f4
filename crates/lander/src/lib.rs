#![deny(clippy::all, clippy::pedantic)]
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss,
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::similar_names,
    clippy::too_many_lines
)]
//! Planar lunar lander simulation
//!
//! A self-contained rigid-body environment: a hull with two landing legs
//! descends toward a flat helipad under gravity, steered by a main engine
//! and two attitude thrusters. The crate implements [`rollout::Environment`]
//! so the episode engine can drive it, and ships a software rasterizer so
//! episodes can be rendered without a display.

pub mod env;
pub mod raster;

pub use env::{LanderEnv, ACTION_COUNT, FPS, SCALE, VIEWPORT_H, VIEWPORT_W};
