//! Typed view over an evaluation archive.

use std::path::Path;

use crate::npz::NpzArchive;
use crate::TelemetryError;

/// Periodic evaluation results for one training run: at each recorded
/// timestep, the rewards of every evaluation episode run at that point.
#[derive(Clone, Debug, PartialEq)]
pub struct EvaluationRecord {
    pub timesteps: Vec<i64>,
    /// One row per checkpoint, one column per evaluation episode.
    pub results: Vec<Vec<f64>>,
}

impl EvaluationRecord {
    pub fn load(path: &Path) -> Result<Self, TelemetryError> {
        let archive = NpzArchive::read(path)?;
        let timesteps = archive
            .get("timesteps")
            .ok_or_else(|| TelemetryError::MissingArray {
                path: path.to_path_buf(),
                name: "timesteps",
            })?;
        let results = archive
            .get("results")
            .ok_or_else(|| TelemetryError::MissingArray {
                path: path.to_path_buf(),
                name: "results",
            })?;

        let timesteps = timesteps.to_i64();
        let values = results.to_f64();
        let rows: Vec<Vec<f64>> = match results.shape.as_slice() {
            // A run evaluated with a single episode per checkpoint may
            // store a flat vector.
            [_] => values.into_iter().map(|v| vec![v]).collect(),
            [rows, 0] => vec![Vec::new(); *rows],
            [_, cols] => values.chunks(*cols).map(<[f64]>::to_vec).collect(),
            other => {
                return Err(TelemetryError::Archive {
                    path: path.to_path_buf(),
                    detail: format!("results array has unsupported rank {}", other.len()),
                })
            }
        };

        if rows.len() != timesteps.len() {
            return Err(TelemetryError::Archive {
                path: path.to_path_buf(),
                detail: format!(
                    "{} timesteps but {} result rows",
                    timesteps.len(),
                    rows.len()
                ),
            });
        }

        Ok(Self { timesteps, results: rows })
    }
}
