//! On-disk model artifacts.
//!
//! A model directory holds three files:
//!
//! | File | Contents |
//! |---|---|
//! | `model.json` | fitted [`RandomForest`] |
//! | `scaler.json` | fitted [`StandardScaler`] |
//! | `feature_columns.csv` | one header row naming the features in matrix order |

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{ForecastError, Result};
use crate::forest::RandomForest;
use crate::scaler::StandardScaler;

pub const MODEL_FILE: &str = "model.json";
pub const SCALER_FILE: &str = "scaler.json";
pub const FEATURE_COLUMNS_FILE: &str = "feature_columns.csv";

/// A fitted model with the scaler and feature order it was trained with.
#[derive(Debug, Clone)]
pub struct Artifacts {
    pub model: RandomForest,
    pub scaler: StandardScaler,
    pub feature_columns: Vec<String>,
}

impl Artifacts {
    /// Bundle fitted parts, checking they agree on the feature count.
    ///
    /// # Errors
    ///
    /// Returns `ForecastError::Validation` if the parts disagree.
    pub fn new(
        model: RandomForest,
        scaler: StandardScaler,
        feature_columns: Vec<String>,
    ) -> Result<Self> {
        let artifacts = Self {
            model,
            scaler,
            feature_columns,
        };
        artifacts.check_alignment()?;
        Ok(artifacts)
    }

    fn check_alignment(&self) -> Result<()> {
        let n = self.feature_columns.len();
        let scaler_n = self.scaler.n_features().ok_or(ForecastError::NotFitted)?;
        let model_n = self.model.n_features();

        if n == 0 || scaler_n != n || model_n != n {
            return Err(ForecastError::Validation(format!(
                "artifact mismatch: {n} feature columns, scaler expects {scaler_n}, model expects {model_n}"
            )));
        }
        Ok(())
    }

    /// Write all three files into `dir`, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or any file cannot be written.
    pub fn save(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir).map_err(|e| ForecastError::io(dir, e))?;

        write_json(&dir.join(MODEL_FILE), &self.model)?;
        write_json(&dir.join(SCALER_FILE), &self.scaler)?;

        let columns_path = dir.join(FEATURE_COLUMNS_FILE);
        let file = File::create(&columns_path).map_err(|e| ForecastError::io(&columns_path, e))?;
        let mut writer = csv::Writer::from_writer(BufWriter::new(file));
        writer.write_record(&self.feature_columns)?;
        writer.flush().map_err(|e| ForecastError::io(&columns_path, e))?;

        tracing::info!(dir = %dir.display(), "Model artifacts saved");
        Ok(())
    }

    /// Read all three files from `dir`.
    ///
    /// # Errors
    ///
    /// Returns `ForecastError::ArtifactMissing` naming the first absent
    /// file, or a parse or alignment error.
    pub fn load(dir: &Path) -> Result<Self> {
        let model_path = require(dir, MODEL_FILE)?;
        let scaler_path = require(dir, SCALER_FILE)?;
        let columns_path = require(dir, FEATURE_COLUMNS_FILE)?;

        let model: RandomForest = read_json(&model_path)?;
        let scaler: StandardScaler = read_json(&scaler_path)?;

        let file = File::open(&columns_path).map_err(|e| ForecastError::io(&columns_path, e))?;
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .trim(csv::Trim::All)
            .from_reader(BufReader::new(file));
        let feature_columns = match reader.records().next() {
            Some(record) => record?.iter().map(String::from).collect(),
            None => Vec::new(),
        };

        let artifacts = Self::new(model, scaler, feature_columns)?;
        tracing::info!(
            dir = %dir.display(),
            features = artifacts.feature_columns.len(),
            trees = artifacts.model.n_trees(),
            "Model artifacts loaded"
        );
        Ok(artifacts)
    }

    /// Feature names paired with the forest's importances, largest first.
    ///
    /// Empty if the forest was never fitted.
    #[must_use]
    pub fn feature_importances(&self) -> Vec<(String, f64)> {
        let Some(importances) = self.model.feature_importances() else {
            return Vec::new();
        };
        let mut ranked: Vec<(String, f64)> = self
            .feature_columns
            .iter()
            .cloned()
            .zip(importances.iter().copied())
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked
    }

    /// Whether all three files exist in `dir`.
    #[must_use]
    pub fn exist_in(dir: &Path) -> bool {
        [MODEL_FILE, SCALER_FILE, FEATURE_COLUMNS_FILE]
            .iter()
            .all(|f| dir.join(f).is_file())
    }
}

fn require(dir: &Path, name: &str) -> Result<PathBuf> {
    let path = dir.join(name);
    if path.is_file() {
        Ok(path)
    } else {
        Err(ForecastError::ArtifactMissing(path))
    }
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let file = File::create(path).map_err(|e| ForecastError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, value)?;
    writer.flush().map_err(|e| ForecastError::io(path, e))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path).map_err(|e| ForecastError::io(path, e))?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}
