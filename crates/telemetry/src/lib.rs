#![deny(clippy::all, clippy::pedantic)]
#![allow(
    clippy::cast_lossless,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::must_use_candidate
)]
//! # Training telemetry
//!
//! Reads the periodic evaluation archives a training run leaves behind and
//! condenses them into dashboard-ready series. An archive is an
//! uncompressed NPZ file holding a `timesteps` vector and a matrix of
//! per-checkpoint evaluation `results`; [`npz`] parses that container
//! directly, [`record`] lifts it into a typed record, and [`aggregate`]
//! filters, downsamples, and smooths it.

pub mod aggregate;
pub mod npz;
pub mod record;

pub use aggregate::{aggregate, AggregateOptions, TelemetrySeries};
pub use npz::{NpyArray, NpyData, NpzArchive};
pub use record::EvaluationRecord;

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("malformed archive {}: {detail}", .path.display())]
    Archive { path: PathBuf, detail: String },
    #[error("archive {} has no `{name}` array", .path.display())]
    MissingArray { path: PathBuf, name: &'static str },
    #[error("evaluation record holds no checkpoints")]
    NoData,
    #[error("no checkpoints fall inside the requested timestep range")]
    EmptyRange,
}
