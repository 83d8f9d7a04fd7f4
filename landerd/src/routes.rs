//! HTTP surface of the service.
//!
//! Three route families share one [`AppState`]: `/api` for raw inference,
//! `/interface` for single-episode runs with rendered frames, and
//! `/dashboard` plus `/rocket` for evaluation telemetry. Episode
//! simulation and archive parsing are synchronous, so those handlers hop
//! onto the blocking pool.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{HeaderValue, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use lander::LanderEnv;
use policy::Policy;
use rollout::{Frame, Observation, RolloutOptions, SimError};
use serde::{Deserialize, Serialize};
use telemetry::{AggregateOptions, EvaluationRecord, TelemetryError};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::artifacts::{ArtifactError, RunArtifactStore};
use crate::encode;
use crate::settings::Settings;

#[derive(Clone)]
pub struct AppState {
    store: Arc<RunArtifactStore>,
}

impl AppState {
    #[must_use]
    pub fn new(settings: &Settings) -> Self {
        Self {
            store: Arc::new(RunArtifactStore::new(
                settings.model_path.clone(),
                settings.runs_dir.clone(),
            )),
        }
    }
}

pub fn create_router(state: AppState, cors_origins: &[String]) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/api", get(api_health))
        .route("/api/predict", post(api_predict))
        .route("/api/rollout", post(api_rollout))
        .route("/interface", get(interface_info))
        .route("/interface/run", post(interface_run))
        .route("/interface/launch", post(interface_launch))
        .route("/interface/test-rocket", post(interface_launch))
        .route("/dashboard", get(dashboard_info))
        .route("/dashboard/runs", get(dashboard_runs))
        .route("/dashboard/data", get(dashboard_data))
        .route("/rocket", get(rocket_latest))
        .layer(cors_layer(cors_origins))
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let mut parsed: Vec<HeaderValue> = Vec::new();
    for origin in origins {
        match origin.parse() {
            Ok(value) => parsed.push(value),
            Err(_) => tracing::warn!(%origin, "ignoring malformed CORS origin"),
        }
    }
    if parsed.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(parsed))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

// ---------------------------------------------------------------------------
// Requests and responses. Field names are the wire contract.

fn default_seed() -> Option<u64> {
    Some(42)
}

fn default_fixed_seed() -> u64 {
    42
}

fn default_max_steps() -> u32 {
    600
}

fn default_true() -> bool {
    true
}

#[derive(Deserialize, Debug)]
pub struct PredictRequest {
    #[serde(default)]
    pub run: Option<String>,
    pub observation: Vec<f32>,
}

/// `seed` distinguishes absent (fixed default) from explicit `null`
/// (randomized episode).
#[derive(Deserialize, Debug)]
pub struct RolloutRequest {
    #[serde(default)]
    pub run: Option<String>,
    #[serde(default = "default_seed")]
    pub seed: Option<u64>,
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,
    #[serde(default = "default_true")]
    pub deterministic: bool,
}

#[derive(Deserialize, Debug)]
pub struct EpisodeRequest {
    #[serde(default)]
    pub run: Option<String>,
    #[serde(default = "default_fixed_seed")]
    pub seed: u64,
    #[serde(default = "default_true")]
    pub deterministic: bool,
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,
}

#[derive(Deserialize, Debug)]
pub struct LaunchRequest {
    #[serde(default)]
    pub run: Option<String>,
    /// Normalized start state `[x, y, vx, vy, angle, angular_velocity,
    /// left_leg, right_leg]`.
    pub observation: Vec<f32>,
    #[serde(default = "default_fixed_seed")]
    pub seed: u64,
    #[serde(default = "default_true")]
    pub deterministic: bool,
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,
    #[serde(default)]
    pub include_gif: bool,
}

#[derive(Deserialize, Debug)]
pub struct DashboardQuery {
    pub run: Option<String>,
    pub min_timestep: Option<i64>,
    pub max_timestep: Option<i64>,
    pub max_points: Option<usize>,
    pub smoothing_window: Option<usize>,
    pub success_threshold: Option<f64>,
}

#[derive(Serialize)]
pub struct ServiceInfo {
    pub status: &'static str,
    pub service: &'static str,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub model_path: String,
    pub model_loaded: bool,
    pub error: Option<String>,
}

#[derive(Serialize, Debug)]
pub struct PredictResponse {
    pub action: usize,
    pub value_estimate: f32,
    /// Batch-shaped, one row per observation, mirroring the training-side
    /// export.
    pub probabilities: Vec<Vec<f32>>,
}

#[derive(Serialize, Debug)]
pub struct RolloutResponse {
    pub total_reward: f64,
    pub steps: u32,
}

#[derive(Serialize)]
pub struct PageInfo {
    pub title: &'static str,
    pub description: &'static str,
}

#[derive(Serialize, Debug)]
pub struct FrameTriplet {
    pub start: Option<String>,
    pub middle: Option<String>,
    pub end: Option<String>,
}

#[derive(Serialize)]
pub struct EpisodeResponse {
    pub total_reward: f64,
    pub steps: u32,
    pub frames: FrameTriplet,
}

#[derive(Serialize, Debug)]
pub struct LaunchResponse {
    pub predicted_action: Option<usize>,
    pub total_reward: f64,
    pub steps: u32,
    pub frames: FrameTriplet,
    pub gif_base64: Option<String>,
}

#[derive(Serialize)]
pub struct RunListing {
    pub base_dir: String,
    pub runs: Vec<String>,
}

#[derive(Serialize, Debug)]
pub struct DashboardSeries {
    pub npz_path: String,
    pub run_min_timestep: i64,
    pub run_max_timestep: i64,
    pub timesteps: Vec<i64>,
    pub mean_rewards: Vec<f64>,
    pub std_rewards: Vec<f64>,
    pub success_rate: Vec<f64>,
    pub smoothed_timesteps: Vec<i64>,
    pub smoothed_mean: Vec<f64>,
    pub smoothed_success_rate: Vec<f64>,
    pub smoothing_window: usize,
    pub points: usize,
}

#[derive(Serialize, Debug)]
pub struct LatestSeries {
    pub npz_path: String,
    pub timesteps: Vec<i64>,
    pub mean_rewards: Vec<f64>,
    pub std_rewards: Vec<f64>,
    pub count: usize,
}

// ---------------------------------------------------------------------------
// Handlers.

async fn root() -> Json<ServiceInfo> {
    Json(ServiceInfo {
        status: "ok",
        service: "landerd",
    })
}

async fn api_health(
    State(state): State<AppState>,
) -> Result<Json<HealthResponse>, (StatusCode, String)> {
    let store = state.store.clone();
    let response = tokio::task::spawn_blocking(move || {
        let (model_loaded, error) = match store.load_policy(None) {
            Ok(_) => (true, None),
            Err(err) => (false, Some(err.to_string())),
        };
        HealthResponse {
            status: if model_loaded { "ok" } else { "degraded" },
            model_path: store.model_path().display().to_string(),
            model_loaded,
            error,
        }
    })
    .await
    .map_err(|err| internal_err(format!("health worker join error: {err}")))?;
    Ok(Json(response))
}

async fn api_predict(
    State(state): State<AppState>,
    Json(req): Json<PredictRequest>,
) -> Result<Json<PredictResponse>, (StatusCode, String)> {
    let store = state.store.clone();
    let response = tokio::task::spawn_blocking(move || predict_blocking(&store, &req))
        .await
        .map_err(|err| internal_err(format!("predict worker join error: {err}")))??;
    Ok(Json(response))
}

async fn api_rollout(
    State(state): State<AppState>,
    Json(req): Json<RolloutRequest>,
) -> Result<Json<RolloutResponse>, (StatusCode, String)> {
    validate_max_steps(req.max_steps)?;
    let store = state.store.clone();
    let response = tokio::task::spawn_blocking(move || rollout_blocking(&store, &req))
        .await
        .map_err(|err| internal_err(format!("episode worker join error: {err}")))??;
    Ok(Json(response))
}

async fn interface_info() -> Json<PageInfo> {
    Json(PageInfo {
        title: "Lander Interface",
        description: "Run one episode and inspect start/middle/end frames.",
    })
}

async fn interface_run(
    State(state): State<AppState>,
    Json(req): Json<EpisodeRequest>,
) -> Result<Json<EpisodeResponse>, (StatusCode, String)> {
    validate_max_steps(req.max_steps)?;
    let store = state.store.clone();
    let response = tokio::task::spawn_blocking(move || episode_blocking(&store, &req))
        .await
        .map_err(|err| internal_err(format!("episode worker join error: {err}")))??;
    Ok(Json(response))
}

async fn interface_launch(
    State(state): State<AppState>,
    Json(req): Json<LaunchRequest>,
) -> Result<Json<LaunchResponse>, (StatusCode, String)> {
    validate_max_steps(req.max_steps)?;
    let store = state.store.clone();
    let response = tokio::task::spawn_blocking(move || launch_blocking(&store, &req))
        .await
        .map_err(|err| internal_err(format!("episode worker join error: {err}")))??;
    Ok(Json(response))
}

async fn dashboard_info() -> Json<PageInfo> {
    Json(PageInfo {
        title: "Lander Dashboard",
        description: "Evaluation metrics with filtering and smoothing.",
    })
}

async fn dashboard_runs(
    State(state): State<AppState>,
) -> Result<Json<RunListing>, (StatusCode, String)> {
    let store = state.store.clone();
    let listing = tokio::task::spawn_blocking(move || RunListing {
        base_dir: store.public_path(store.runs_dir()),
        runs: store.list_runs(),
    })
    .await
    .map_err(|err| internal_err(format!("run listing join error: {err}")))?;
    Ok(Json(listing))
}

async fn dashboard_data(
    State(state): State<AppState>,
    Query(query): Query<DashboardQuery>,
) -> Result<Json<DashboardSeries>, (StatusCode, String)> {
    let options = query.aggregate_options()?;
    let store = state.store.clone();
    let response =
        tokio::task::spawn_blocking(move || dashboard_blocking(&store, query.run.as_deref(), &options))
            .await
            .map_err(|err| internal_err(format!("telemetry worker join error: {err}")))??;
    Ok(Json(response))
}

async fn rocket_latest(
    State(state): State<AppState>,
) -> Result<Json<LatestSeries>, (StatusCode, String)> {
    let store = state.store.clone();
    let response = tokio::task::spawn_blocking(move || rocket_blocking(&store))
        .await
        .map_err(|err| internal_err(format!("telemetry worker join error: {err}")))??;
    Ok(Json(response))
}

// ---------------------------------------------------------------------------
// Blocking workers.

fn predict_blocking(
    store: &RunArtifactStore,
    req: &PredictRequest,
) -> Result<PredictResponse, (StatusCode, String)> {
    let policy = store.load_policy(req.run.as_deref()).map_err(artifact_err)?;
    if req.observation.len() != policy.obs_size() {
        return Err(unprocessable_err(format!(
            "observation must contain exactly {} values, found {}",
            policy.obs_size(),
            req.observation.len()
        )));
    }
    // Deterministic lookup; the RNG is never consulted.
    let mut rng = fastrand::Rng::with_seed(0);
    let action = policy.predict(&req.observation, true, &mut rng);
    Ok(PredictResponse {
        action,
        value_estimate: policy.estimate_value(&req.observation),
        probabilities: vec![policy.action_distribution(&req.observation)],
    })
}

fn rollout_blocking(
    store: &RunArtifactStore,
    req: &RolloutRequest,
) -> Result<RolloutResponse, (StatusCode, String)> {
    let policy = store.load_policy(req.run.as_deref()).map_err(artifact_err)?;
    let options = RolloutOptions {
        seed: req.seed.unwrap_or_else(|| fastrand::u64(..)),
        deterministic: req.deterministic,
        max_steps: req.max_steps,
        ..RolloutOptions::default()
    };
    let episode =
        rollout::run(policy.as_ref(), LanderEnv::new(), &options).map_err(sim_err)?;
    Ok(RolloutResponse {
        total_reward: episode.total_reward,
        steps: episode.steps,
    })
}

fn episode_blocking(
    store: &RunArtifactStore,
    req: &EpisodeRequest,
) -> Result<EpisodeResponse, (StatusCode, String)> {
    let policy = store.load_policy(req.run.as_deref()).map_err(artifact_err)?;
    let options = RolloutOptions {
        seed: req.seed,
        deterministic: req.deterministic,
        max_steps: req.max_steps,
        capture_frames: true,
        initial_observation: None,
    };
    let episode =
        rollout::run(policy.as_ref(), LanderEnv::new(), &options).map_err(sim_err)?;
    let frames = encode_triplet(&episode.frames)?;
    Ok(EpisodeResponse {
        total_reward: episode.total_reward,
        steps: episode.steps,
        frames,
    })
}

fn launch_blocking(
    store: &RunArtifactStore,
    req: &LaunchRequest,
) -> Result<LaunchResponse, (StatusCode, String)> {
    let policy = store.load_policy(req.run.as_deref()).map_err(artifact_err)?;
    let observation = Observation::from_slice(&req.observation).map_err(sim_err)?;
    let options = RolloutOptions {
        seed: req.seed,
        deterministic: req.deterministic,
        max_steps: req.max_steps,
        capture_frames: true,
        initial_observation: Some(observation),
    };
    let episode =
        rollout::run(policy.as_ref(), LanderEnv::new(), &options).map_err(sim_err)?;
    let frames = encode_triplet(&episode.frames)?;
    let gif_base64 = if req.include_gif {
        match rollout::sample_sequence(&episode.frames, encode::GIF_MAX_FRAMES) {
            Some(sampled) => {
                encode::gif_base64(&sampled).map_err(|err| internal_err(err.to_string()))?
            }
            None => None,
        }
    } else {
        None
    };
    Ok(LaunchResponse {
        predicted_action: episode.first_action,
        total_reward: episode.total_reward,
        steps: episode.steps,
        frames,
        gif_base64,
    })
}

fn dashboard_blocking(
    store: &RunArtifactStore,
    run: Option<&str>,
    options: &AggregateOptions,
) -> Result<DashboardSeries, (StatusCode, String)> {
    let npz_path = store.evaluations_for_run(run).map_err(artifact_err)?;
    let record = EvaluationRecord::load(&npz_path).map_err(telemetry_err)?;
    let series = telemetry::aggregate(&record, options).map_err(telemetry_err)?;
    Ok(DashboardSeries {
        npz_path: store.public_path(&npz_path),
        run_min_timestep: series.run_min_timestep,
        run_max_timestep: series.run_max_timestep,
        points: series.timesteps.len(),
        timesteps: series.timesteps,
        mean_rewards: series.mean_rewards,
        std_rewards: series.std_rewards,
        success_rate: series.success_rate,
        smoothed_timesteps: series.smoothed_timesteps,
        smoothed_mean: series.smoothed_mean,
        smoothed_success_rate: series.smoothed_success_rate,
        smoothing_window: series.smoothing_window,
    })
}

fn rocket_blocking(store: &RunArtifactStore) -> Result<LatestSeries, (StatusCode, String)> {
    let Some(npz_path) = store.latest_evaluations() else {
        return Err(service_unavailable_err(format!(
            "No evaluations.npz found in {}",
            store.runs_dir().display()
        )));
    };
    let record = EvaluationRecord::load(&npz_path).map_err(telemetry_err)?;
    // An archive with zero checkpoints still answers with empty series.
    let (timesteps, mean_rewards, std_rewards) =
        match telemetry::aggregate(&record, &AggregateOptions::default()) {
            Ok(series) => (series.timesteps, series.mean_rewards, series.std_rewards),
            Err(TelemetryError::NoData) => (Vec::new(), Vec::new(), Vec::new()),
            Err(other) => return Err(telemetry_err(other)),
        };
    let count = mean_rewards.len();
    Ok(LatestSeries {
        npz_path: store.public_path(&npz_path),
        timesteps,
        mean_rewards,
        std_rewards,
        count,
    })
}

fn encode_triplet(frames: &[Frame]) -> Result<FrameTriplet, (StatusCode, String)> {
    let snaps = rollout::snapshots(frames);
    let encode_one = |frame: Option<&Frame>| {
        frame
            .map(encode::png_base64)
            .transpose()
            .map_err(|err| internal_err(err.to_string()))
    };
    Ok(FrameTriplet {
        start: encode_one(snaps.start)?,
        middle: encode_one(snaps.middle)?,
        end: encode_one(snaps.end)?,
    })
}

// ---------------------------------------------------------------------------
// Validation and error mapping.

impl DashboardQuery {
    fn aggregate_options(&self) -> Result<AggregateOptions, (StatusCode, String)> {
        if let Some(points) = self.max_points {
            if !(3..=30).contains(&points) {
                return Err(unprocessable_err(format!(
                    "max_points must be between 3 and 30, got {points}"
                )));
            }
        }
        let smoothing_window = self.smoothing_window.unwrap_or(5);
        if !(1..=15).contains(&smoothing_window) {
            return Err(unprocessable_err(format!(
                "smoothing_window must be between 1 and 15, got {smoothing_window}"
            )));
        }
        Ok(AggregateOptions {
            min_timestep: self.min_timestep,
            max_timestep: self.max_timestep,
            max_points: self.max_points.unwrap_or(0),
            smoothing_window,
            success_threshold: self.success_threshold.unwrap_or(200.0),
        })
    }
}

fn validate_max_steps(max_steps: u32) -> Result<(), (StatusCode, String)> {
    if (100..=1000).contains(&max_steps) {
        Ok(())
    } else {
        Err(unprocessable_err(format!(
            "max_steps must be between 100 and 1000, got {max_steps}"
        )))
    }
}

fn internal_err(message: String) -> (StatusCode, String) {
    (StatusCode::INTERNAL_SERVER_ERROR, message)
}

fn not_found_err(message: String) -> (StatusCode, String) {
    (StatusCode::NOT_FOUND, message)
}

fn unprocessable_err(message: String) -> (StatusCode, String) {
    (StatusCode::UNPROCESSABLE_ENTITY, message)
}

fn service_unavailable_err(message: String) -> (StatusCode, String) {
    (StatusCode::SERVICE_UNAVAILABLE, message)
}

// Absent artifacts are retryable once training provisions them, so they
// all surface as 503 rather than 404.
fn artifact_err(err: ArtifactError) -> (StatusCode, String) {
    match &err {
        ArtifactError::ModelMissing(_)
        | ArtifactError::NoRuns(_)
        | ArtifactError::RunEvaluationsMissing(_) => service_unavailable_err(err.to_string()),
        ArtifactError::Model(_) => internal_err(err.to_string()),
    }
}

fn sim_err(err: SimError) -> (StatusCode, String) {
    match &err {
        SimError::ObservationLength(_) | SimError::InvalidAction { .. } => {
            unprocessable_err(err.to_string())
        }
        SimError::BodyNotInitialized | SimError::Env(_) => internal_err(err.to_string()),
    }
}

fn telemetry_err(err: TelemetryError) -> (StatusCode, String) {
    match err {
        TelemetryError::NoData => not_found_err("No evaluation timesteps found".to_string()),
        TelemetryError::EmptyRange => {
            not_found_err("No data points after filtering".to_string())
        }
        other => internal_err(other.to_string()),
    }
}
