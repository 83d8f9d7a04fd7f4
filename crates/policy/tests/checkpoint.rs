use policy::{Checkpoint, MlpPolicy, Policy, PolicyError};
use std::path::Path;

#[test]
fn load_fixture_checkpoint() {
    let policy = MlpPolicy::load(Path::new("tests/data/tiny_policy.json")).unwrap();
    assert_eq!(policy.obs_size(), 8);
    assert_eq!(policy.action_count(), 4);

    let obs = [0.0f32; 8];
    let probs = policy.action_distribution(&obs);
    assert_eq!(probs.len(), 4);
    let sum: f32 = probs.iter().sum();
    assert!((sum - 1.0).abs() < 1e-5);
    assert!(policy.estimate_value(&obs).is_finite());
}

#[test]
fn missing_file_is_io_error() {
    let err = MlpPolicy::load(Path::new("tests/data/does_not_exist.json")).unwrap_err();
    assert!(matches!(err, PolicyError::Io { .. }), "got {err:?}");
}

#[test]
fn wrong_weight_count_is_rejected() {
    let mut ckpt = Checkpoint::load(Path::new("tests/data/tiny_policy.json")).unwrap();
    ckpt.action_head.w.pop();
    let err = ckpt.into_policy().unwrap_err();
    match err {
        PolicyError::Shape(msg) => assert!(msg.contains("action_head"), "message: {msg}"),
        other => panic!("expected shape error, got {other:?}"),
    }
}

#[test]
fn hidden_and_trunk_must_agree() {
    let mut ckpt = Checkpoint::load(Path::new("tests/data/tiny_policy.json")).unwrap();
    ckpt.hidden.push(16);
    assert!(matches!(
        ckpt.into_policy(),
        Err(PolicyError::Shape(_))
    ));
}

#[test]
fn zero_width_dimensions_are_rejected() {
    // A zero action_dim with emptied head arrays satisfies the product
    // checks, so the dimension guard has to catch it before predict can
    // index into an empty distribution.
    let mut ckpt = Checkpoint::load(Path::new("tests/data/tiny_policy.json")).unwrap();
    ckpt.action_dim = 0;
    ckpt.action_head.w.clear();
    ckpt.action_head.b.clear();
    match ckpt.into_policy().unwrap_err() {
        PolicyError::Shape(msg) => assert!(msg.contains("nonzero"), "message: {msg}"),
        other => panic!("expected shape error, got {other:?}"),
    }

    let mut ckpt = Checkpoint::load(Path::new("tests/data/tiny_policy.json")).unwrap();
    ckpt.obs_dim = 0;
    assert!(matches!(ckpt.into_policy(), Err(PolicyError::Shape(_))));
}

#[test]
fn future_version_is_rejected() {
    let mut ckpt = Checkpoint::load(Path::new("tests/data/tiny_policy.json")).unwrap();
    ckpt.version = 99;
    assert!(matches!(ckpt.into_policy(), Err(PolicyError::Version(99))));
}

#[test]
fn save_load_round_trip_reproduces_outputs() {
    let original = MlpPolicy::random(8, &[16, 16], 4, 1234);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("policy.json");
    Checkpoint::from_policy(&original).save(&path).unwrap();

    let restored = MlpPolicy::load(&path).unwrap();
    let obs: Vec<f32> = (0..8).map(|i| (i as f32) * 0.1 - 0.4).collect();
    assert_eq!(
        original.action_distribution(&obs),
        restored.action_distribution(&obs)
    );
    assert_eq!(original.estimate_value(&obs), restored.estimate_value(&obs));

    let mut rng_a = fastrand::Rng::with_seed(5);
    let mut rng_b = fastrand::Rng::with_seed(5);
    assert_eq!(
        original.predict(&obs, false, &mut rng_a),
        restored.predict(&obs, false, &mut rng_b)
    );
}
