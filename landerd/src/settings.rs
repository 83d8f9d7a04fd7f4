//! Process configuration, from flags or environment.

use std::path::PathBuf;

use clap::Parser;

/// Serve lander policy inference and evaluation telemetry over HTTP.
#[derive(Parser, Debug, Clone)]
#[command(name = "landerd", version, about)]
pub struct Settings {
    /// Default policy checkpoint served when a request names no run.
    #[arg(
        long,
        env = "LANDERD_MODEL_PATH",
        default_value = "runs/lander_baseline/policy.json"
    )]
    pub model_path: PathBuf,

    /// Directory holding per-run subdirectories with checkpoints and
    /// evaluation archives.
    #[arg(
        long,
        env = "LANDERD_RUNS_DIR",
        default_value = "runs/lander_baseline"
    )]
    pub runs_dir: PathBuf,

    /// Socket address to listen on.
    #[arg(long, env = "LANDERD_BIND", default_value = "0.0.0.0:8200")]
    pub bind: String,

    /// Allowed CORS origin, repeatable or comma-separated. No value allows
    /// any origin.
    #[arg(long = "cors-origin", env = "LANDERD_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Vec<String>,
}
