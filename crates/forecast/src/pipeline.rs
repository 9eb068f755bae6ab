//! End-to-end training: raw CSV to persisted artifacts.

use std::fmt;
use std::path::{Path, PathBuf};

use ndarray::Array1;
use serde::Serialize;
use solarcast_core::features::{FEATURE_COLUMNS, POWER_GENERATED};

use crate::aggregate::{DailyRecord, aggregate_daily, to_matrix};
use crate::artifacts::Artifacts;
use crate::dataset::{clean, load_csv};
use crate::error::{ForecastError, Result};
use crate::forecaster::Forecaster;
use crate::forest::{DEFAULT_ESTIMATORS, DEFAULT_RANDOM_STATE, RandomForest};
use crate::impute::{DEFAULT_NEIGHBORS, KnnImputer};
use crate::metrics::{RegressionScores, round_to};
use crate::scaler::StandardScaler;
use crate::split::train_test_split;

/// Raw readings are in W; the model works in kW.
const WATTS_PER_KILOWATT: f64 = 1000.0;

/// Default fraction of daily rows held out for evaluation.
pub const DEFAULT_TEST_SIZE: f64 = 0.2;

/// Inputs to a training run.
#[derive(Debug, Clone)]
pub struct TrainingConfig {
    pub data_path: PathBuf,
    pub model_dir: PathBuf,
    pub n_estimators: usize,
    pub random_state: u64,
    pub n_neighbors: usize,
    pub test_size: f64,
}

impl TrainingConfig {
    /// Defaults for everything but the paths.
    #[must_use]
    pub fn new(data_path: impl Into<PathBuf>, model_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_path: data_path.into(),
            model_dir: model_dir.into(),
            n_estimators: DEFAULT_ESTIMATORS,
            random_state: DEFAULT_RANDOM_STATE,
            n_neighbors: DEFAULT_NEIGHBORS,
            test_size: DEFAULT_TEST_SIZE,
        }
    }
}

/// Held-out scores, row counts and feature ranking of a training run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingReport {
    pub r2: f64,
    pub mae: f64,
    pub rmse: f64,
    pub feature_count: usize,
    pub train_rows: usize,
    pub test_rows: usize,
    pub daily_rows: usize,
    /// Importances of the final model, largest first.
    pub feature_importances: Vec<(String, f64)>,
}

impl fmt::Display for TrainingReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "R2 Score:      {:.4}", round_to(self.r2, 4))?;
        writeln!(f, "MAE:           {:.4}", round_to(self.mae, 4))?;
        writeln!(f, "RMSE:          {:.4}", round_to(self.rmse, 4))?;
        writeln!(f, "Features:      {}", self.feature_count)?;
        writeln!(f, "Daily rows:    {}", self.daily_rows)?;
        write!(f, "Train / test:  {} / {}", self.train_rows, self.test_rows)?;
        if !self.feature_importances.is_empty() {
            write!(f, "\nFeature importances:")?;
            for (name, importance) in &self.feature_importances {
                write!(f, "\n  {name:<40} {:.4}", round_to(*importance, 4))?;
            }
        }
        Ok(())
    }
}

/// Load, clean, impute, convert to kW and roll up to days.
///
/// # Errors
///
/// Returns an error if the file cannot be read or a required column is
/// missing.
pub fn prepare_daily(data_path: &Path, n_neighbors: usize) -> Result<Vec<DailyRecord>> {
    let raw = load_csv(data_path)?;
    let dataset = clean(&raw)?;

    let missing = dataset.missing_count();
    let imputed = KnnImputer::new(n_neighbors).fit_transform(dataset.values())?;
    let mut dataset = dataset.with_values(imputed)?;
    tracing::info!(imputed = missing, neighbors = n_neighbors, "Missing values imputed");

    dataset.scale_column(POWER_GENERATED, 1.0 / WATTS_PER_KILOWATT)?;

    aggregate_daily(&dataset)
}

/// Fit scaler and forest, score them on a held-out split, then refit on all
/// daily rows. Nothing is written to disk.
///
/// # Errors
///
/// Returns an error if preparation fails or there are fewer than two days.
pub fn fit(config: &TrainingConfig) -> Result<(TrainingReport, Artifacts)> {
    let records = prepare_daily(&config.data_path, config.n_neighbors)?;
    fit_records(&records, config)
}

/// [`fit`] over already-aggregated records.
///
/// # Errors
///
/// Returns an error if there are fewer than two records.
pub fn fit_records(
    records: &[DailyRecord],
    config: &TrainingConfig,
) -> Result<(TrainingReport, Artifacts)> {
    if records.len() < 2 {
        return Err(ForecastError::Validation(format!(
            "need at least 2 daily rows to train, got {}",
            records.len()
        )));
    }

    let (x, y) = to_matrix(records);
    let split = train_test_split(&x, &y, config.test_size, config.random_state)?;

    let mut scaler = StandardScaler::new();
    let x_train = scaler.fit_transform(&split.x_train)?;
    let x_test = scaler.transform(&split.x_test)?;

    let mut model = forest(config);
    model.fit(&x_train, &split.y_train)?;
    let scores = RegressionScores::compute(&split.y_test, &model.predict(&x_test)?)?;

    tracing::info!(
        r2 = round_to(scores.r2, 4),
        mae = round_to(scores.mae, 4),
        rmse = round_to(scores.rmse, 4),
        "Held-out evaluation"
    );

    let mut full_scaler = StandardScaler::new();
    let x_full = full_scaler.fit_transform(&x)?;
    let mut full_model = forest(config);
    full_model.fit(&x_full, &y)?;

    let feature_columns = FEATURE_COLUMNS.iter().map(|c| (*c).to_owned()).collect();
    let artifacts = Artifacts::new(full_model, full_scaler, feature_columns)?;

    let report = TrainingReport {
        r2: scores.r2,
        mae: scores.mae,
        rmse: scores.rmse,
        feature_count: FEATURE_COLUMNS.len(),
        train_rows: split.x_train.nrows(),
        test_rows: split.x_test.nrows(),
        daily_rows: records.len(),
        feature_importances: artifacts.feature_importances(),
    };

    Ok((report, artifacts))
}

/// Run the whole pipeline and persist artifacts to `config.model_dir`.
///
/// # Errors
///
/// Returns an error if training fails or the artifacts cannot be written.
pub fn train(config: &TrainingConfig) -> Result<TrainingReport> {
    let (report, artifacts) = fit(config)?;
    artifacts.save(&config.model_dir)?;
    Ok(report)
}

/// Score a loaded model against the daily aggregates of a dataset.
///
/// # Errors
///
/// Returns an error if the dataset cannot be prepared or the model's
/// feature columns are not available in the aggregates.
pub fn evaluate(
    forecaster: &Forecaster,
    data_path: &Path,
    n_neighbors: usize,
) -> Result<RegressionScores> {
    let records = prepare_daily(data_path, n_neighbors)?;

    let rows = records
        .iter()
        .map(|r| {
            forecaster
                .feature_columns()
                .iter()
                .map(|c| r.value(c).ok_or_else(|| ForecastError::MissingColumn(c.clone())))
                .collect::<Result<Vec<f64>>>()
        })
        .collect::<Result<Vec<_>>>()?;

    let predictions = forecaster.predict_ordered(&rows)?;
    let actual: Vec<f64> = records.iter().map(|r| r.power_kwh).collect();

    RegressionScores::compute(&Array1::from(actual), &Array1::from(predictions))
}

fn forest(config: &TrainingConfig) -> RandomForest {
    RandomForest::new(config.n_estimators).with_random_state(config.random_state)
}
