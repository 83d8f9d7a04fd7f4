//! Filesystem discovery and caching of run artifacts.
//!
//! A "run" is a subdirectory of the runs base holding a policy checkpoint
//! and the `evaluations.npz` archive written during training. Checkpoints
//! are loaded once per distinct path and shared between requests; archives
//! are re-read per request so a dashboard refresh sees new checkpoints
//! without a restart.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::SystemTime;

use policy::{MlpPolicy, PolicyError};
use thiserror::Error;

/// Checkpoint written at the end of training.
pub const MODEL_FILE: &str = "policy.json";
/// Checkpoint of the best evaluation seen during training.
pub const BEST_MODEL_FILE: &str = "best_policy.json";
/// Evaluation archive written alongside the checkpoints.
pub const EVALUATIONS_FILE: &str = "evaluations.npz";

/// Error message text doubles as the HTTP detail string, so the
/// missing-artifact variants keep the sentence casing the frontend
/// displays verbatim.
#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("Model file not found at {}. Please train or copy it before running the API.", .0.display())]
    ModelMissing(PathBuf),
    #[error(transparent)]
    Model(#[from] PolicyError),
    #[error("No run directories found in {}", .0.display())]
    NoRuns(PathBuf),
    #[error("No evaluations.npz found in run '{0}'")]
    RunEvaluationsMissing(String),
}

pub struct RunArtifactStore {
    model_path: PathBuf,
    runs_dir: PathBuf,
    policies: RwLock<HashMap<PathBuf, Arc<MlpPolicy>>>,
}

impl RunArtifactStore {
    #[must_use]
    pub fn new(model_path: PathBuf, runs_dir: PathBuf) -> Self {
        Self {
            model_path,
            runs_dir,
            policies: RwLock::new(HashMap::new()),
        }
    }

    /// Configured default checkpoint path, as given (possibly relative).
    #[must_use]
    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    #[must_use]
    pub fn runs_dir(&self) -> &Path {
        &self.runs_dir
    }

    /// Checkpoint path for a request. A named run prefers its own final
    /// checkpoint, then the best-evaluation one; when neither exists the
    /// first candidate is returned so the caller reports that path.
    fn resolve_model_path(&self, run: Option<&str>) -> PathBuf {
        let Some(run) = run.filter(|name| !name.is_empty()) else {
            return self.model_path.clone();
        };
        let run_dir = self.runs_dir.join(run);
        let final_ckpt = run_dir.join(MODEL_FILE);
        if final_ckpt.exists() {
            return final_ckpt;
        }
        let best_ckpt = run_dir.join(BEST_MODEL_FILE);
        if best_ckpt.exists() {
            return best_ckpt;
        }
        final_ckpt
    }

    /// Loads the policy for a run, memoized per resolved path.
    pub fn load_policy(&self, run: Option<&str>) -> Result<Arc<MlpPolicy>, ArtifactError> {
        let path = self.resolve_model_path(run);
        if let Ok(cache) = self.policies.read() {
            if let Some(loaded) = cache.get(&path) {
                return Ok(loaded.clone());
            }
        }
        if !path.exists() {
            return Err(ArtifactError::ModelMissing(path));
        }
        let loaded = Arc::new(MlpPolicy::load(&path)?);
        if let Ok(mut cache) = self.policies.write() {
            cache.insert(path, loaded.clone());
        }
        Ok(loaded)
    }

    /// Run directory names under the base, sorted. Missing base reads as
    /// an empty listing, not an error.
    pub fn list_runs(&self) -> Vec<String> {
        let Ok(entries) = fs::read_dir(&self.runs_dir) else {
            return Vec::new();
        };
        let mut runs: Vec<String> = entries
            .filter_map(Result::ok)
            .filter(|entry| entry.path().is_dir())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect();
        runs.sort();
        runs
    }

    /// Evaluation archive for a run, falling back to the first listed run
    /// when the requested name is absent or unknown.
    pub fn evaluations_for_run(&self, run: Option<&str>) -> Result<PathBuf, ArtifactError> {
        let runs = self.list_runs();
        if runs.is_empty() {
            return Err(ArtifactError::NoRuns(self.runs_dir.clone()));
        }
        let selected = match run {
            Some(name) if runs.iter().any(|r| r == name) => name.to_string(),
            _ => runs[0].clone(),
        };
        let path = self.runs_dir.join(&selected).join(EVALUATIONS_FILE);
        if !path.is_file() {
            return Err(ArtifactError::RunEvaluationsMissing(selected));
        }
        Ok(path)
    }

    /// Most recent evaluation archive: one directly under the base wins,
    /// otherwise the newest by modification time across run directories.
    pub fn latest_evaluations(&self) -> Option<PathBuf> {
        let direct = self.runs_dir.join(EVALUATIONS_FILE);
        if direct.is_file() {
            return Some(direct);
        }
        let entries = fs::read_dir(&self.runs_dir).ok()?;
        let mut newest: Option<(SystemTime, PathBuf)> = None;
        for entry in entries.filter_map(Result::ok) {
            let candidate = entry.path().join(EVALUATIONS_FILE);
            let Ok(meta) = fs::metadata(&candidate) else {
                continue;
            };
            if !meta.is_file() {
                continue;
            }
            let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            let newer = match &newest {
                None => true,
                Some((best, _)) => modified > *best,
            };
            if newer {
                newest = Some((modified, candidate));
            }
        }
        newest.map(|(_, path)| path)
    }

    /// Frontend-facing form of an internal path: everything from the last
    /// `runs/` component down, rooted at `./runs/`.
    pub fn public_path(&self, path: &Path) -> String {
        let raw = path.to_string_lossy().replace('\\', "/");
        if let Some(idx) = raw.find("/runs/") {
            let suffix = raw[idx + "/runs/".len()..].trim_start_matches('/');
            return format!("./runs/{suffix}");
        }
        if let Some(suffix) = raw.strip_prefix("runs/") {
            return format!("./runs/{}", suffix.trim_start_matches('/'));
        }
        match path.file_name() {
            Some(name) => format!("./{}", name.to_string_lossy()),
            None => format!("./{raw}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use policy::{Checkpoint, Policy};

    use super::*;

    fn write_checkpoint(path: &Path, seed: u64) {
        Checkpoint::from_policy(&MlpPolicy::random(8, &[8], 4, seed))
            .save(path)
            .unwrap();
    }

    fn store_in(dir: &Path) -> RunArtifactStore {
        RunArtifactStore::new(dir.join(MODEL_FILE), dir.to_path_buf())
    }

    #[test]
    fn default_policy_is_memoized() {
        let tmp = tempfile::tempdir().unwrap();
        write_checkpoint(&tmp.path().join(MODEL_FILE), 1);
        let store = store_in(tmp.path());

        let first = store.load_policy(None).unwrap();
        let second = store.load_policy(None).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.obs_size(), 8);
    }

    #[test]
    fn missing_model_names_the_path() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(tmp.path());
        let err = store.load_policy(None).unwrap_err();
        assert!(matches!(err, ArtifactError::ModelMissing(_)));
        // The sentence is client-facing and matched verbatim.
        assert_eq!(
            err.to_string(),
            format!(
                "Model file not found at {}. Please train or copy it before running the API.",
                tmp.path().join(MODEL_FILE).display()
            )
        );
    }

    #[test]
    fn run_checkpoint_fallback_order() {
        let tmp = tempfile::tempdir().unwrap();
        let run_dir = tmp.path().join("run_a");
        fs::create_dir_all(&run_dir).unwrap();
        let store = store_in(tmp.path());

        // Nothing on disk yet: the final checkpoint path is still reported.
        assert_eq!(
            store.resolve_model_path(Some("run_a")),
            run_dir.join(MODEL_FILE)
        );

        write_checkpoint(&run_dir.join(BEST_MODEL_FILE), 2);
        assert_eq!(
            store.resolve_model_path(Some("run_a")),
            run_dir.join(BEST_MODEL_FILE)
        );

        write_checkpoint(&run_dir.join(MODEL_FILE), 3);
        assert_eq!(
            store.resolve_model_path(Some("run_a")),
            run_dir.join(MODEL_FILE)
        );
    }

    #[test]
    fn empty_run_name_means_the_default_model() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(tmp.path());
        assert_eq!(store.resolve_model_path(Some("")), store.model_path());
        assert_eq!(store.resolve_model_path(None), store.model_path());
    }

    #[test]
    fn runs_are_listed_sorted() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("b_run")).unwrap();
        fs::create_dir_all(tmp.path().join("a_run")).unwrap();
        fs::write(tmp.path().join("stray.txt"), "x").unwrap();
        let store = store_in(tmp.path());
        assert_eq!(store.list_runs(), vec!["a_run", "b_run"]);
    }

    #[test]
    fn missing_base_reads_as_no_runs() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(&tmp.path().join("nowhere"));
        assert!(store.list_runs().is_empty());
        assert!(store.latest_evaluations().is_none());
        let err = store.evaluations_for_run(None).unwrap_err();
        assert!(err.to_string().contains("No run directories found"));
    }

    #[test]
    fn unknown_run_falls_back_to_first_sorted_run() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("b_run")).unwrap();
        fs::create_dir_all(tmp.path().join("a_run")).unwrap();
        fs::write(tmp.path().join("a_run").join(EVALUATIONS_FILE), "x").unwrap();
        let store = store_in(tmp.path());

        let path = store.evaluations_for_run(Some("missing")).unwrap();
        assert_eq!(path, tmp.path().join("a_run").join(EVALUATIONS_FILE));
    }

    #[test]
    fn run_without_archive_is_reported_by_name() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("run_a")).unwrap();
        let store = store_in(tmp.path());
        let err = store.evaluations_for_run(Some("run_a")).unwrap_err();
        assert_eq!(err.to_string(), "No evaluations.npz found in run 'run_a'");
    }

    #[test]
    fn direct_archive_beats_run_archives() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("run_a")).unwrap();
        fs::write(tmp.path().join("run_a").join(EVALUATIONS_FILE), "x").unwrap();
        fs::write(tmp.path().join(EVALUATIONS_FILE), "y").unwrap();
        let store = store_in(tmp.path());
        assert_eq!(
            store.latest_evaluations().unwrap(),
            tmp.path().join(EVALUATIONS_FILE)
        );
    }

    #[test]
    fn latest_archive_is_newest_by_mtime() {
        let tmp = tempfile::tempdir().unwrap();
        let old = tmp.path().join("run_old").join(EVALUATIONS_FILE);
        let new = tmp.path().join("run_new").join(EVALUATIONS_FILE);
        for (path, secs) in [(&old, 1_000u64), (&new, 2_000u64)] {
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, "x").unwrap();
            let file = fs::File::options().write(true).open(path).unwrap();
            file.set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(secs))
                .unwrap();
        }
        let store = store_in(tmp.path());
        assert_eq!(store.latest_evaluations().unwrap(), new);
    }

    #[test]
    fn public_paths_are_rooted_at_runs() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(tmp.path());
        assert_eq!(
            store.public_path(Path::new("/srv/app/runs/base/run_a/evaluations.npz")),
            "./runs/base/run_a/evaluations.npz"
        );
        assert_eq!(
            store.public_path(Path::new("runs/base/run_a/evaluations.npz")),
            "./runs/base/run_a/evaluations.npz"
        );
        assert_eq!(
            store.public_path(Path::new("/elsewhere/evaluations.npz")),
            "./evaluations.npz"
        );
    }
}
