//! Observation-to-physical-state reconstruction.
//!
//! Normalized observations describe the lander relative to the viewport and
//! frame rate. To start an episode from a caller-chosen observation the
//! environment's internal bodies must be placed in world coordinates, which
//! is the inverse of the normalization the environment applies when
//! producing observations. Contact flags are intentionally not honored:
//! placing a leg in guaranteed collision with the ground is not expressible
//! from the observation alone, so both legs always start airborne.

use crate::{EnvConstants, Observation};

/// World-space pose and velocity for one rigid body.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BodyState {
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub angle: f32,
    pub angular_velocity: f32,
}

/// One leg body plus the ground-contact flag to install.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LegState {
    pub body: BodyState,
    pub contact: bool,
}

/// Full physical state of the lander: hull plus both legs.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PhysicalState {
    pub hull: BodyState,
    /// Leg attached on the negative-x side of the hull.
    pub left_leg: LegState,
    /// Leg attached on the positive-x side of the hull.
    pub right_leg: LegState,
}

/// Reconstruction output: the state to install plus the clamped observation
/// that faithfully describes it. Callers echo the clamped observation back
/// instead of the raw request so downstream consumers see what was actually
/// simulated.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ReconstructedState {
    pub physical: PhysicalState,
    pub clamped: Observation,
}

/// Maps a normalized observation to world-space body states.
///
/// Each component is clamped to the physically reachable range before
/// denormalization, so a hostile or out-of-range request still produces a
/// state the simulation can integrate from.
#[must_use]
pub fn reconstruct(observation: &Observation, constants: &EnvConstants) -> ReconstructedState {
    let x = observation.x.clamp(-0.95, 0.95);
    let y = observation.y.clamp(-0.95, 1.25);
    let vx = observation.vx.clamp(-2.0, 2.0);
    let vy = observation.vy.clamp(-2.0, 2.0);
    let angle = observation.angle.clamp(-1.0, 1.0);
    let angular_velocity = observation.angular_velocity.clamp(-2.0, 2.0);

    let world_x = x * constants.half_width + constants.half_width;
    let world_y = y * constants.half_height + constants.ground_ref;
    let world_vx = vx * constants.fps / constants.half_width;
    let world_vy = vy * constants.fps / constants.half_height;
    let world_angular_velocity = angular_velocity * constants.fps / 20.0;

    let hull = BodyState {
        x: world_x,
        y: world_y,
        vx: world_vx,
        vy: world_vy,
        angle,
        angular_velocity: world_angular_velocity,
    };

    // Legs ride along with the hull: mirrored horizontal offsets, shared
    // velocity, a small outward splay. Contact is always false because the
    // reconstructed pose floats the legs at hull height.
    let leg = |side: f32| LegState {
        body: BodyState {
            x: world_x + side * constants.leg_away,
            y: world_y,
            vx: world_vx,
            vy: world_vy,
            angle: angle - side * 0.05,
            angular_velocity: world_angular_velocity,
        },
        contact: false,
    };

    let clamped = Observation {
        x,
        y,
        vx,
        vy,
        angle,
        angular_velocity,
        left_leg_contact: 0.0,
        right_leg_contact: 0.0,
    };

    ReconstructedState {
        physical: PhysicalState {
            hull,
            left_leg: leg(-1.0),
            right_leg: leg(1.0),
        },
        clamped,
    }
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;

    fn constants() -> EnvConstants {
        EnvConstants {
            half_width: 10.0,
            half_height: 6.666_667,
            ground_ref: 4.0,
            fps: 50.0,
            leg_away: 0.666_667,
        }
    }

    #[test]
    fn zero_observation_sits_at_pad_center() {
        let obs = Observation::from_slice(&[0.0; 8]).unwrap();
        let state = reconstruct(&obs, &constants());

        let hull = state.physical.hull;
        assert!((hull.x - 10.0).abs() < 1e-6);
        assert!((hull.y - 4.0).abs() < 1e-6);
        assert_eq!(hull.vx, 0.0);
        assert_eq!(hull.vy, 0.0);
        assert_eq!(hull.angle, 0.0);
        assert_eq!(hull.angular_velocity, 0.0);
    }

    #[test]
    fn components_are_clamped_before_denormalization() {
        let obs = Observation::from_slice(&[5.0, -5.0, 9.0, -9.0, 3.0, -7.0, 0.0, 0.0]).unwrap();
        let state = reconstruct(&obs, &constants());

        assert_eq!(state.clamped.x, 0.95);
        assert_eq!(state.clamped.y, -0.95);
        assert_eq!(state.clamped.vx, 2.0);
        assert_eq!(state.clamped.vy, -2.0);
        assert_eq!(state.clamped.angle, 1.0);
        assert_eq!(state.clamped.angular_velocity, -2.0);

        let hull = state.physical.hull;
        assert!((hull.x - (0.95 * 10.0 + 10.0)).abs() < 1e-5);
        assert!((hull.vx - (2.0 * 50.0 / 10.0)).abs() < 1e-5);
    }

    #[test]
    fn in_range_components_pass_through_unchanged() {
        let obs =
            Observation::from_slice(&[0.25, 0.5, -1.0, 0.75, -0.5, 1.5, 0.0, 0.0]).unwrap();
        let state = reconstruct(&obs, &constants());

        assert_eq!(state.clamped.x, 0.25);
        assert_eq!(state.clamped.y, 0.5);
        assert_eq!(state.clamped.vx, -1.0);
        assert_eq!(state.clamped.vy, 0.75);
        assert_eq!(state.clamped.angle, -0.5);
        assert_eq!(state.clamped.angular_velocity, 1.5);
    }

    #[test]
    fn legs_mirror_around_the_hull() {
        let obs = Observation::from_slice(&[0.5, 0.5, 0.0, 0.0, 0.2, 0.0, 0.0, 0.0]).unwrap();
        let c = constants();
        let state = reconstruct(&obs, &c);

        let hull = state.physical.hull;
        let left = state.physical.left_leg;
        let right = state.physical.right_leg;

        assert!((left.body.x - (hull.x - c.leg_away)).abs() < 1e-6);
        assert!((right.body.x - (hull.x + c.leg_away)).abs() < 1e-6);
        assert_eq!(left.body.y, hull.y);
        assert_eq!(right.body.y, hull.y);
        assert!((left.body.angle - (hull.angle + 0.05)).abs() < 1e-6);
        assert!((right.body.angle - (hull.angle - 0.05)).abs() < 1e-6);
        assert_eq!(left.body.vx, hull.vx);
        assert_eq!(right.body.vy, hull.vy);
    }

    #[test]
    fn contact_flags_are_always_cleared() {
        let obs = Observation::from_slice(&[0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0]).unwrap();
        let state = reconstruct(&obs, &constants());

        assert!(!state.physical.left_leg.contact);
        assert!(!state.physical.right_leg.contact);
        assert_eq!(state.clamped.left_leg_contact, 0.0);
        assert_eq!(state.clamped.right_leg_contact, 0.0);
    }
}
