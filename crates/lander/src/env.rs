//! Lander dynamics and the environment surface.
//!
//! World coordinates are in meters with the origin at the bottom-left of
//! the viewport and y pointing up. One simulation step integrates gravity
//! and engine forces with semi-implicit Euler at a fixed timestep, then
//! resolves ground contact against the flat helipad line.

use rollout::{
    BodyState, EnvConstants, Environment, Frame, LegState, Observation, PhysicalState, SimError,
    StepOutcome,
};

use crate::raster;

/// Viewport width in pixels.
pub const VIEWPORT_W: u32 = 600;
/// Viewport height in pixels.
pub const VIEWPORT_H: u32 = 400;
/// Pixels per world meter.
pub const SCALE: f32 = 30.0;
/// Simulation steps per second.
pub const FPS: f32 = 50.0;
/// Discrete actions: nop, left thruster, main engine, right thruster.
pub const ACTION_COUNT: usize = 4;

pub(crate) const WORLD_W: f32 = VIEWPORT_W as f32 / SCALE;
pub(crate) const WORLD_H: f32 = VIEWPORT_H as f32 / SCALE;
/// Helipad surface height.
pub(crate) const HELIPAD_Y: f32 = WORLD_H / 4.0;
/// Horizontal leg offset from the hull center.
pub(crate) const LEG_AWAY: f32 = 20.0 / SCALE;
/// Foot drop below the leg pivot.
pub(crate) const LEG_DOWN: f32 = 18.0 / SCALE;
/// Hull collision radius.
pub(crate) const LANDER_RADIUS: f32 = 17.0 / SCALE;

const HALF_W: f32 = WORLD_W / 2.0;
const HALF_H: f32 = WORLD_H / 2.0;
/// Height of the hull center when resting level on both legs.
const GROUND_REF: f32 = HELIPAD_Y + LEG_DOWN;

const DT: f32 = 1.0 / FPS;
const GRAVITY: f32 = -10.0;
const MAIN_ENGINE_POWER: f32 = 13.0;
const SIDE_ENGINE_POWER: f32 = 0.6;
/// Thruster mount height above the center of mass.
const SIDE_ENGINE_HEIGHT: f32 = 14.0 / SCALE;
const HULL_INERTIA: f32 = 0.25;
/// Magnitude of the random velocity kick applied at reset.
const INITIAL_KICK: f32 = 0.8;

const MAIN_FUEL_COST: f32 = 0.30;
const SIDE_FUEL_COST: f32 = 0.03;
const CRASH_REWARD: f32 = -100.0;
const LANDED_REWARD: f32 = 100.0;
const LEG_CONTACT_SHAPING: f32 = 10.0;

/// Touchdown faster than this crushes the gear.
const IMPACT_SPEED_LIMIT: f32 = 3.0;
/// Per-step velocity retention while a foot is grounded.
const GROUND_FRICTION: f32 = 0.6;
const SETTLE_STIFFNESS: f32 = 6.0;
const SETTLE_DAMPING: f32 = 4.0;
const REST_LINEAR_EPS: f32 = 0.05;
const REST_ANGULAR_EPS: f32 = 0.05;
/// Consecutive quiet steps on both legs before the episode counts as landed.
const REST_STEPS: u32 = 5;

/// The lander environment. Holds no state until the first reset.
pub struct LanderEnv {
    state: Option<PhysicalState>,
    prev_shaping: Option<f32>,
    rest_steps: u32,
    game_over: bool,
    last_action: usize,
    closed: bool,
}

impl LanderEnv {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: None,
            prev_shaping: None,
            rest_steps: 0,
            game_over: false,
            last_action: 0,
            closed: false,
        }
    }

    /// Places the legs relative to the hull pose. Legs are kinematic
    /// followers with a fixed outward splay, so only the hull integrates.
    fn assemble(hull: BodyState, left_contact: bool, right_contact: bool) -> PhysicalState {
        let (sin, cos) = hull.angle.sin_cos();
        let leg = |side: f32, contact: bool| LegState {
            body: BodyState {
                x: hull.x + side * LEG_AWAY * cos,
                y: hull.y + side * LEG_AWAY * sin,
                vx: hull.vx,
                vy: hull.vy,
                angle: hull.angle - side * 0.05,
                angular_velocity: hull.angular_velocity,
            },
            contact,
        };
        PhysicalState {
            hull,
            left_leg: leg(-1.0, left_contact),
            right_leg: leg(1.0, right_contact),
        }
    }

    fn foot_height(leg: &LegState) -> f32 {
        leg.body.y - LEG_DOWN * leg.body.angle.cos()
    }

    fn normalize(state: &PhysicalState) -> Observation {
        let hull = state.hull;
        Observation {
            x: (hull.x - HALF_W) / HALF_W,
            y: (hull.y - GROUND_REF) / HALF_H,
            vx: hull.vx * HALF_W / FPS,
            vy: hull.vy * HALF_H / FPS,
            angle: hull.angle,
            angular_velocity: hull.angular_velocity * 20.0 / FPS,
            left_leg_contact: if state.left_leg.contact { 1.0 } else { 0.0 },
            right_leg_contact: if state.right_leg.contact { 1.0 } else { 0.0 },
        }
    }

    fn shaping(observation: &Observation) -> f32 {
        -100.0 * (observation.x.powi(2) + observation.y.powi(2)).sqrt()
            - 100.0 * (observation.vx.powi(2) + observation.vy.powi(2)).sqrt()
            - 100.0 * observation.angle.abs()
            + LEG_CONTACT_SHAPING * observation.left_leg_contact
            + LEG_CONTACT_SHAPING * observation.right_leg_contact
    }
}

impl Default for LanderEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment for LanderEnv {
    fn reset(&mut self, seed: u64) -> Observation {
        let mut rng = fastrand::Rng::with_seed(seed);
        let mut kick = || (rng.f32() * 2.0 - 1.0) * INITIAL_KICK;
        let hull = BodyState {
            x: HALF_W,
            y: WORLD_H - 1.0,
            vx: kick(),
            vy: kick(),
            angle: 0.0,
            angular_velocity: 0.0,
        };
        let state = Self::assemble(hull, false, false);
        self.state = Some(state);
        self.prev_shaping = None;
        self.rest_steps = 0;
        self.game_over = false;
        self.last_action = 0;
        self.closed = false;

        // One free-drift step applies the kick and primes the shaping
        // baseline, so the first reward delta is meaningful.
        match self.step(0) {
            Ok(outcome) => outcome.observation,
            Err(_) => Self::normalize(&state),
        }
    }

    fn step(&mut self, action: usize) -> Result<StepOutcome, SimError> {
        if action >= ACTION_COUNT {
            return Err(SimError::InvalidAction {
                action,
                count: ACTION_COUNT,
            });
        }
        if self.closed {
            return Err(SimError::Env("environment is closed".into()));
        }
        let Some(current) = self.state else {
            return Err(SimError::BodyNotInitialized);
        };
        let mut hull = current.hull;

        let (sin, cos) = hull.angle.sin_cos();
        let mut ax = 0.0;
        let mut ay = GRAVITY;
        let mut angular_accel = 0.0;
        match action {
            // Left thruster pushes along +body-x; mounted above the center
            // of mass, it also torques the hull clockwise.
            1 => {
                ax += SIDE_ENGINE_POWER * cos;
                ay += SIDE_ENGINE_POWER * sin;
                angular_accel -= SIDE_ENGINE_POWER * SIDE_ENGINE_HEIGHT / HULL_INERTIA;
            }
            2 => {
                ax -= MAIN_ENGINE_POWER * sin;
                ay += MAIN_ENGINE_POWER * cos;
            }
            3 => {
                ax -= SIDE_ENGINE_POWER * cos;
                ay -= SIDE_ENGINE_POWER * sin;
                angular_accel += SIDE_ENGINE_POWER * SIDE_ENGINE_HEIGHT / HULL_INERTIA;
            }
            _ => {}
        }

        hull.vx += ax * DT;
        hull.vy += ay * DT;
        hull.angular_velocity += angular_accel * DT;
        hull.x += hull.vx * DT;
        hull.y += hull.vy * DT;
        hull.angle += hull.angular_velocity * DT;

        let trial = Self::assemble(hull, false, false);
        let left_pen = HELIPAD_Y - Self::foot_height(&trial.left_leg);
        let right_pen = HELIPAD_Y - Self::foot_height(&trial.right_leg);
        let left_contact = left_pen >= 0.0;
        let right_contact = right_pen >= 0.0;
        let touching = left_contact || right_contact;

        if touching && hull.vy < -IMPACT_SPEED_LIMIT {
            self.game_over = true;
        }

        if touching && !self.game_over {
            hull.y += left_pen.max(right_pen).max(0.0);
            if hull.vy < 0.0 {
                hull.vy = 0.0;
            }
            hull.vx *= GROUND_FRICTION;
            hull.angular_velocity *= GROUND_FRICTION;
            // Grounded gear settles the hull toward level.
            hull.angular_velocity +=
                (-hull.angle * SETTLE_STIFFNESS - hull.angular_velocity * SETTLE_DAMPING) * DT;
        }

        if hull.y - LANDER_RADIUS <= HELIPAD_Y {
            self.game_over = true;
        }
        if hull.x <= 0.0 || hull.x >= WORLD_W {
            self.game_over = true;
        }

        let landed = if !self.game_over && left_contact && right_contact {
            let quiet = hull.vx.abs() < REST_LINEAR_EPS
                && hull.vy.abs() < REST_LINEAR_EPS
                && hull.angular_velocity.abs() < REST_ANGULAR_EPS;
            if quiet {
                self.rest_steps += 1;
            } else {
                self.rest_steps = 0;
            }
            self.rest_steps >= REST_STEPS
        } else {
            self.rest_steps = 0;
            false
        };

        let state = Self::assemble(hull, left_contact, right_contact);
        let observation = Self::normalize(&state);

        let shaping = Self::shaping(&observation);
        let mut reward = match self.prev_shaping {
            Some(prev) => shaping - prev,
            None => 0.0,
        };
        self.prev_shaping = Some(shaping);
        match action {
            2 => reward -= MAIN_FUEL_COST,
            1 | 3 => reward -= SIDE_FUEL_COST,
            _ => {}
        }

        let mut terminated = false;
        if self.game_over {
            terminated = true;
            reward = CRASH_REWARD;
        } else if landed {
            terminated = true;
            reward = LANDED_REWARD;
        }

        self.state = Some(state);
        self.last_action = action;

        Ok(StepOutcome {
            observation,
            reward,
            terminated,
            truncated: false,
        })
    }

    fn render(&mut self) -> Option<Frame> {
        if self.closed {
            return None;
        }
        let state = self.state.as_ref()?;
        Some(raster::draw(state, self.last_action))
    }

    fn close(&mut self) {
        self.closed = true;
        self.state = None;
    }

    fn constants(&self) -> EnvConstants {
        EnvConstants {
            half_width: HALF_W,
            half_height: HALF_H,
            ground_ref: GROUND_REF,
            fps: FPS,
            leg_away: LEG_AWAY,
        }
    }

    fn override_state(&mut self, state: &PhysicalState) -> Result<(), SimError> {
        if self.closed || self.state.is_none() {
            return Err(SimError::BodyNotInitialized);
        }
        self.state = Some(*state);
        self.rest_steps = 0;
        self.game_over = false;
        self.last_action = 0;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use rollout::reconstruct;

    use super::*;

    #[test]
    fn step_before_reset_is_rejected() {
        let mut env = LanderEnv::new();
        assert!(matches!(env.step(0), Err(SimError::BodyNotInitialized)));
    }

    #[test]
    fn override_before_reset_is_rejected() {
        let mut env = LanderEnv::new();
        let obs = Observation::from_slice(&[0.0; 8]).unwrap();
        let state = reconstruct(&obs, &env.constants());
        assert!(matches!(
            env.override_state(&state.physical),
            Err(SimError::BodyNotInitialized)
        ));
    }

    #[test]
    fn out_of_range_action_is_rejected() {
        let mut env = LanderEnv::new();
        env.reset(1);
        match env.step(9) {
            Err(SimError::InvalidAction { action, count }) => {
                assert_eq!(action, 9);
                assert_eq!(count, ACTION_COUNT);
            }
            other => panic!("expected InvalidAction, got {other:?}"),
        }
    }

    #[test]
    fn close_is_idempotent_and_stops_rendering() {
        let mut env = LanderEnv::new();
        env.reset(1);
        assert!(env.render().is_some());
        env.close();
        env.close();
        assert!(env.render().is_none());
        assert!(env.step(0).is_err());
    }

    #[test]
    fn reset_revives_a_closed_environment() {
        let mut env = LanderEnv::new();
        env.reset(1);
        env.close();
        env.reset(2);
        assert!(env.render().is_some());
        assert!(env.step(0).is_ok());
    }

    #[test]
    fn reset_is_deterministic_per_seed() {
        let mut a = LanderEnv::new();
        let mut b = LanderEnv::new();
        let first_a = a.reset(7);
        let first_b = b.reset(7);
        assert_eq!(first_a.to_array(), first_b.to_array());

        for step in 0..20 {
            let action = step % ACTION_COUNT;
            let oa = a.step(action).unwrap();
            let ob = b.step(action).unwrap();
            assert_eq!(oa.observation.to_array(), ob.observation.to_array());
            assert_eq!(oa.reward, ob.reward);
        }
    }

    #[test]
    fn different_seeds_diverge() {
        let mut a = LanderEnv::new();
        let mut b = LanderEnv::new();
        let first_a = a.reset(1);
        let first_b = b.reset(2);
        assert_ne!(first_a.to_array(), first_b.to_array());
    }

    #[test]
    fn override_places_the_hull_where_requested() {
        let mut env = LanderEnv::new();
        env.reset(3);

        let requested =
            Observation::from_slice(&[0.4, 0.5, 0.0, 0.0, 0.1, 0.0, 0.0, 0.0]).unwrap();
        let state = reconstruct(&requested, &env.constants());
        env.override_state(&state.physical).unwrap();

        // One drift step only adds a single tick of gravity, so the next
        // observation stays close to the requested one.
        let outcome = env.step(0).unwrap();
        let obs = outcome.observation;
        assert!((obs.x - 0.4).abs() < 0.01, "x drifted to {}", obs.x);
        assert!((obs.y - 0.5).abs() < 0.01, "y drifted to {}", obs.y);
        assert!((obs.angle - 0.1).abs() < 0.01);
        assert_eq!(obs.left_leg_contact, 0.0);
        assert_eq!(obs.right_leg_contact, 0.0);
    }

    #[test]
    fn observation_stays_in_documented_layout() {
        let mut env = LanderEnv::new();
        let obs = env.reset(11);
        let array = obs.to_array();
        // Spawn is above the pad near the horizontal center.
        assert!(array[0].abs() < 0.1);
        assert!(array[1] > 0.5);
        assert_eq!(array[6], 0.0);
        assert_eq!(array[7], 0.0);
    }
}
