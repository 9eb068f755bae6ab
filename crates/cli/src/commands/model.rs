//! Model commands: train, evaluate and predict.
//!
//! # Usage
//!
//! ```bash
//! # Fit on the raw dataset and write artifacts
//! solarcast train --data Solar_Power_Prediction.csv --out artifacts
//!
//! # Score stored artifacts against a dataset
//! solarcast evaluate --data Solar_Power_Prediction.csv --model artifacts
//!
//! # Predict for a JSON object or array of objects
//! solarcast predict --model artifacts --input days.json
//! ```

use std::path::{Path, PathBuf};

use serde_json::{Map, Value, json};
use thiserror::Error;

use solarcast_forecast::metrics::round_to;
use solarcast_forecast::{FeatureRow, ForecastError, Forecaster, TrainingConfig};

/// Errors from model commands.
#[derive(Debug, Error)]
pub enum ModelCommandError {
    /// Pipeline or artifact failure.
    #[error(transparent)]
    Forecast(#[from] ForecastError),

    /// Input file could not be read.
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Input file is not JSON.
    #[error("Invalid JSON input: {0}")]
    Json(#[from] serde_json::Error),

    /// Input JSON has the wrong shape or values.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Run the training pipeline and write artifacts.
///
/// # Errors
///
/// Returns an error if the dataset cannot be prepared or artifacts cannot be
/// written.
pub fn train(config: &TrainingConfig) -> Result<(), ModelCommandError> {
    tracing::info!(
        data = %config.data_path.display(),
        out = %config.model_dir.display(),
        trees = config.n_estimators,
        "Training model"
    );

    let report = solarcast_forecast::train(config)?;

    #[allow(clippy::print_stdout)]
    {
        println!("{report}");
        println!("Artifacts written to {}", config.model_dir.display());
    }
    Ok(())
}

/// Score stored artifacts on a dataset's daily aggregates.
///
/// # Errors
///
/// Returns an error if the artifacts or dataset cannot be loaded.
pub fn evaluate(data: &Path, model_dir: &Path, neighbors: usize) -> Result<(), ModelCommandError> {
    let forecaster = Forecaster::load(model_dir)?;
    let scores = solarcast_forecast::evaluate(&forecaster, data, neighbors)?;

    #[allow(clippy::print_stdout)]
    {
        println!("R2 Score:  {:.4}", round_to(scores.r2, 4));
        println!("MAE:       {:.4}", round_to(scores.mae, 4));
        println!("RMSE:      {:.4}", round_to(scores.rmse, 4));
    }
    Ok(())
}

/// Predict for every row in a JSON file and print the results as JSON.
///
/// # Errors
///
/// Returns an error if the model or input cannot be loaded, or a row lacks
/// a feature column.
pub fn predict(model_dir: &Path, input: &Path) -> Result<(), ModelCommandError> {
    let forecaster = Forecaster::load(model_dir)?;

    let text = std::fs::read_to_string(input).map_err(|source| ModelCommandError::Io {
        path: input.to_path_buf(),
        source,
    })?;
    let entries = parse_entries(serde_json::from_str(&text)?)?;
    let rows = entries
        .iter()
        .map(feature_row)
        .collect::<Result<Vec<_>, _>>()?;

    let predictions = forecaster.predict_many(&rows)?;
    let output: Vec<Value> = entries
        .into_iter()
        .zip(predictions)
        .map(|(input, predicted)| {
            json!({ "input": input, "predicted_power_kW": round_to(predicted, 3) })
        })
        .collect();

    #[allow(clippy::print_stdout)]
    {
        println!("{}", serde_json::to_string_pretty(&json!({ "predictions": output }))?);
    }
    Ok(())
}

/// A single object or a non-empty array of objects.
fn parse_entries(value: Value) -> Result<Vec<Map<String, Value>>, ModelCommandError> {
    let entries = match value {
        Value::Object(object) => vec![Value::Object(object)],
        Value::Array(entries) if !entries.is_empty() => entries,
        _ => {
            return Err(ModelCommandError::InvalidInput(
                "expected an object or a non-empty array of objects".to_string(),
            ));
        }
    };

    entries
        .into_iter()
        .enumerate()
        .map(|(i, entry)| match entry {
            Value::Object(object) => Ok(object),
            _ => Err(ModelCommandError::InvalidInput(format!(
                "entry {i} is not an object"
            ))),
        })
        .collect()
}

/// Numeric fields become features; everything else is left for the model
/// to report as missing.
fn feature_row(object: &Map<String, Value>) -> Result<FeatureRow, ModelCommandError> {
    object
        .iter()
        .filter(|(_, value)| !value.is_null())
        .map(|(key, value)| {
            let number = match value {
                Value::Number(n) => n.as_f64(),
                Value::Bool(b) => Some(f64::from(u8::from(*b))),
                Value::String(s) => s.trim().parse().ok(),
                _ => None,
            };
            number
                .map(|n| (key.clone(), n))
                .ok_or_else(|| ModelCommandError::InvalidInput(format!("{key} is not numeric")))
        })
        .collect()
}
