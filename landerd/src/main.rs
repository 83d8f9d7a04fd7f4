//! # landerd
//!
//! HTTP service around a trained lander policy: single-step inference,
//! full episode rollouts with rendered frames, and dashboards over the
//! evaluation archives a training run leaves behind.

mod artifacts;
mod encode;
mod routes;
mod settings;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::routes::AppState;
use crate::settings::Settings;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .compact()
        .init();

    let settings = Settings::parse();
    info!(
        model_path = %settings.model_path.display(),
        runs_dir = %settings.runs_dir.display(),
        "starting landerd"
    );

    let state = AppState::new(&settings);
    let app = routes::create_router(state, &settings.cors_origins);

    let listener = tokio::net::TcpListener::bind(&settings.bind).await?;
    info!("landerd listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
