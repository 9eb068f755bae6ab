//! Prediction route handlers.
//!
//! Bodies are read as raw JSON so that shape errors produce the documented
//! `{"error": ...}` messages instead of extractor rejections.

use axum::{Json, body::Bytes, extract::State};
use serde::Serialize;
use serde_json::{Map, Value};

use solarcast_core::FEATURE_COLUMNS;
use solarcast_forecast::{FeatureRow, Forecaster};
use solarcast_forecast::metrics::round_to;

use crate::error::PredictError;
use crate::state::AppState;

/// Predictions are reported in kW to three decimals.
const PREDICTION_PLACES: i32 = 3;

/// Response for a single prediction.
#[derive(Debug, Serialize)]
pub struct PredictionResponse {
    #[serde(rename = "predicted_power_kW")]
    pub predicted_power_kw: f64,
    pub input_used: Value,
}

/// One entry of a multi-day forecast.
#[derive(Debug, Serialize)]
pub struct ForecastEntry {
    pub input: Value,
    #[serde(rename = "predicted_power_kW")]
    pub predicted_power_kw: f64,
}

/// Response for a multi-day forecast.
#[derive(Debug, Serialize)]
pub struct ForecastResponse {
    pub predictions: Vec<ForecastEntry>,
}

/// Legacy single prediction.
///
/// Requires the ten standard feature fields, then orders them by the model's
/// feature columns, filling any column the model knows but the standard set
/// lacks with 0.
pub async fn predict_legacy(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<PredictionResponse>, PredictError> {
    let forecaster = state.model().get().ok_or(PredictError::ModelNotLoaded)?;

    let input = parse_body(&body);
    let object = input.as_object().ok_or(PredictError::NoJson)?;

    let row = extract_features(object, FEATURE_COLUMNS.iter().copied())?;
    let ordered = forecaster.reindex(&row);
    let predicted = single(forecaster.predict_ordered(&[ordered])?)?;

    Ok(Json(PredictionResponse {
        predicted_power_kw: round_to(predicted, PREDICTION_PLACES),
        input_used: input,
    }))
}

/// Single-day prediction over the model's own feature columns.
pub async fn predict_single_day(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<PredictionResponse>, PredictError> {
    let forecaster = state.model().get().ok_or(PredictError::ModelNotTrained)?;

    let input = parse_body(&body);
    let object = input
        .as_object()
        .filter(|o| !o.is_empty())
        .ok_or(PredictError::NoJson)?;

    let predicted = predict_object(&forecaster, object)?;

    Ok(Json(PredictionResponse {
        predicted_power_kw: round_to(predicted, PREDICTION_PLACES),
        input_used: input,
    }))
}

/// Multi-day forecast. Entries are answered in request order.
pub async fn predict_multiple_days(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<ForecastResponse>, PredictError> {
    let forecaster = state.model().get().ok_or(PredictError::ModelNotTrained)?;

    let Value::Array(entries) = parse_body(&body) else {
        return Err(PredictError::NotAnArray);
    };
    if entries.is_empty() {
        return Err(PredictError::NotAnArray);
    }

    let empty = Map::new();
    let rows = entries
        .iter()
        .map(|entry| {
            let object = entry.as_object().unwrap_or(&empty);
            extract_features(object, forecaster.feature_columns().iter().map(String::as_str))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let predictions = forecaster.predict_many(&rows)?;

    let predictions = entries
        .into_iter()
        .zip(predictions)
        .map(|(input, predicted)| ForecastEntry {
            input,
            predicted_power_kw: round_to(predicted, PREDICTION_PLACES),
        })
        .collect();

    Ok(Json(ForecastResponse { predictions }))
}

fn predict_object(forecaster: &Forecaster, object: &Map<String, Value>) -> Result<f64, PredictError> {
    let row = extract_features(object, forecaster.feature_columns().iter().map(String::as_str))?;
    Ok(forecaster.predict_one(&row)?)
}

fn single(predictions: Vec<f64>) -> Result<f64, PredictError> {
    predictions
        .into_iter()
        .next()
        .ok_or(PredictError::Failed(solarcast_forecast::ForecastError::EmptyDataset))
}

/// Invalid or empty bodies read as `null`.
fn parse_body(body: &Bytes) -> Value {
    serde_json::from_slice(body).unwrap_or(Value::Null)
}

/// Pull `columns` out of `object` as numbers.
///
/// Every absent column is reported at once, in column order. Keys that are not
/// feature columns are ignored.
fn extract_features<'c>(
    object: &Map<String, Value>,
    columns: impl Iterator<Item = &'c str> + Clone,
) -> Result<FeatureRow, PredictError> {
    let missing: Vec<String> = columns
        .clone()
        .filter(|c| !object.contains_key(*c))
        .map(String::from)
        .collect();
    if !missing.is_empty() {
        return Err(PredictError::MissingFields(missing));
    }

    columns
        .map(|column| {
            let value = object
                .get(column)
                .and_then(numeric_value)
                .ok_or_else(|| PredictError::InvalidValue(column.to_string()))?;
            Ok((column.to_string(), value))
        })
        .collect()
}

/// Numbers, booleans and numeric strings; anything else is rejected.
fn numeric_value(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64()?,
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    number.is_finite().then_some(number)
}
