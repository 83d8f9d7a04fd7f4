use lander::{LanderEnv, ACTION_COUNT};
use rollout::{reconstruct, Environment, Observation, StepOutcome};

fn hover(env: &mut LanderEnv, values: [f32; 8]) {
    let requested = Observation::from_slice(&values).unwrap();
    let state = reconstruct(&requested, &env.constants());
    env.override_state(&state.physical).unwrap();
}

fn step_repeated(env: &mut LanderEnv, action: usize, steps: u32) -> StepOutcome {
    let mut last = None;
    for _ in 0..steps {
        let outcome = env.step(action).unwrap();
        assert!(!outcome.terminated, "unexpected terminal state");
        last = Some(outcome);
    }
    last.expect("no steps executed")
}

#[test]
fn main_engine_overcomes_gravity() {
    let mut env = LanderEnv::new();
    env.reset(1);
    hover(&mut env, [0.0, 0.5, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);

    // Thrust-to-weight is above one, so a second of burn gains altitude.
    let last = step_repeated(&mut env, 2, 50);
    assert!(last.observation.vy > 0.1, "vy {}", last.observation.vy);
    assert!(last.observation.y > 0.5, "y {}", last.observation.y);
    assert!(last.observation.angle.abs() < 1e-3);
}

#[test]
fn left_thruster_torques_clockwise_and_pushes_right() {
    let mut env = LanderEnv::new();
    env.reset(2);
    hover(&mut env, [0.0, 0.5, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);

    let last = step_repeated(&mut env, 1, 30);
    assert!(last.observation.angle < -0.05);
    assert!(last.observation.angular_velocity < -0.05);
    assert!(last.observation.vx > 0.005);
}

#[test]
fn right_thruster_mirrors_the_left() {
    let mut env = LanderEnv::new();
    env.reset(2);
    hover(&mut env, [0.0, 0.5, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);

    let last = step_repeated(&mut env, 3, 30);
    assert!(last.observation.angle > 0.05);
    assert!(last.observation.angular_velocity > 0.05);
    assert!(last.observation.vx < -0.005);
}

#[test]
fn all_documented_actions_are_accepted() {
    let mut env = LanderEnv::new();
    env.reset(6);
    for action in 0..ACTION_COUNT {
        env.step(action).unwrap();
    }
}

#[test]
fn rendered_flight_produces_frames_every_step() {
    let mut env = LanderEnv::new();
    env.reset(8);
    for _ in 0..10 {
        env.step(2).unwrap();
        let frame = env.render().expect("render after step");
        assert_eq!(frame.width, lander::VIEWPORT_W);
        assert_eq!(frame.height, lander::VIEWPORT_H);
    }
}
