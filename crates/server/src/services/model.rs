//! The served prediction model.
//!
//! [`ModelHandle`] owns the currently loaded [`Forecaster`]. Readers take a
//! cheap `Arc` clone; reload and retrain build a new forecaster off the async
//! runtime and swap it in, so in-flight predictions finish on the old one.

use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use thiserror::Error;
use tokio::sync::Mutex;

use solarcast_forecast::{Artifacts, ForecastError, Forecaster, TrainingConfig, TrainingReport, fit};

/// Errors from loading or training the served model.
#[derive(Debug, Error)]
pub enum ModelError {
    /// Loading, fitting or saving failed.
    #[error("forecast error: {0}")]
    Forecast(#[from] ForecastError),

    /// The blocking task panicked or was cancelled.
    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// A training run is already in progress.
    #[error("training already in progress")]
    Busy,
}

/// Shared slot holding the model being served.
///
/// Starts empty when no artifacts are present; prediction routes report the
/// model as not trained until a reload or training run fills it.
pub struct ModelHandle {
    dir: PathBuf,
    current: RwLock<Option<Arc<Forecaster>>>,
    training: Mutex<()>,
}

impl ModelHandle {
    /// An empty handle backed by `dir`.
    #[must_use]
    pub fn empty(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            current: RwLock::new(None),
            training: Mutex::new(()),
        }
    }

    /// A handle already serving `forecaster`.
    #[must_use]
    pub fn with_forecaster(dir: impl Into<PathBuf>, forecaster: Forecaster) -> Self {
        Self {
            dir: dir.into(),
            current: RwLock::new(Some(Arc::new(forecaster))),
            training: Mutex::new(()),
        }
    }

    /// Load artifacts from `dir` at startup.
    ///
    /// Missing or unreadable artifacts leave the handle empty so the server
    /// can still start and serve the account routes. Only unreadable
    /// artifacts are warned about.
    #[must_use]
    pub fn load_or_empty(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        if !Artifacts::exist_in(&dir) {
            tracing::info!(
                dir = %dir.display(),
                "No model artifacts yet, prediction routes disabled until trained"
            );
            return Self::empty(dir);
        }

        match Forecaster::load(&dir) {
            Ok(forecaster) => Self::with_forecaster(dir, forecaster),
            Err(e) => {
                tracing::warn!(
                    dir = %dir.display(),
                    error = %e,
                    "Model artifacts not loaded, prediction routes disabled until trained"
                );
                Self::empty(dir)
            }
        }
    }

    /// Directory artifacts are read from and written to.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The model currently being served, if any.
    ///
    /// The slot only ever holds a whole `Arc`, so a poisoned lock still
    /// guards a usable value and is read through.
    #[must_use]
    pub fn get(&self) -> Option<Arc<Forecaster>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Whether a model is loaded.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.get().is_some()
    }

    /// Swap in a new model. A poisoned lock is overwritten like a healthy one.
    pub fn replace(&self, forecaster: Forecaster) -> Arc<Forecaster> {
        let forecaster = Arc::new(forecaster);
        *self.current.write().unwrap_or_else(PoisonError::into_inner) =
            Some(Arc::clone(&forecaster));
        forecaster
    }

    /// Re-read artifacts from disk and swap them in.
    ///
    /// On failure the previous model keeps serving.
    ///
    /// # Errors
    ///
    /// Returns an error if the artifacts cannot be loaded.
    pub async fn reload(&self) -> Result<Arc<Forecaster>, ModelError> {
        let dir = self.dir.clone();
        let forecaster = tokio::task::spawn_blocking(move || Forecaster::load(&dir)).await??;
        let forecaster = self.replace(forecaster);
        tracing::info!(dir = %self.dir.display(), "Model reloaded");
        Ok(forecaster)
    }

    /// Hold the training slot, as a running job would.
    #[cfg(test)]
    pub(crate) fn hold_training(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.training.try_lock().unwrap_or_else(|_| panic!("training slot already held"))
    }

    /// Train on `data_path`, persist to the model directory and swap in.
    ///
    /// Only one run happens at a time.
    ///
    /// # Errors
    ///
    /// Returns `ModelError::Busy` if another run is in progress, or an error
    /// if training or saving fails.
    pub async fn train(&self, data_path: &Path) -> Result<TrainingReport, ModelError> {
        let _guard = self.training.try_lock().map_err(|_| ModelError::Busy)?;

        let config = TrainingConfig::new(data_path, &self.dir);
        tracing::info!(data = %data_path.display(), "Training started");

        let (report, artifacts) = tokio::task::spawn_blocking(move || {
            let (report, artifacts) = fit(&config)?;
            artifacts.save(&config.model_dir)?;
            Ok::<_, ForecastError>((report, artifacts))
        })
        .await??;

        self.replace(Forecaster::new(artifacts));
        tracing::info!(r2 = report.r2, daily_rows = report.daily_rows, "Training finished, model swapped in");
        Ok(report)
    }
}
