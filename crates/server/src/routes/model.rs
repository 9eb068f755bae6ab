//! Model management route handlers.

use axum::{Json, extract::State};
use serde::Serialize;

use solarcast_forecast::metrics::round_to;

use crate::error::{PredictError, add_breadcrumb};
use crate::state::AppState;

/// Response after reloading artifacts.
#[derive(Debug, Serialize)]
pub struct ReloadResponse {
    pub message: &'static str,
    pub feature_columns: Vec<String>,
}

/// Response after a training run.
#[derive(Debug, Serialize)]
pub struct TrainResponse {
    pub message: &'static str,
    #[serde(rename = "R2 Score")]
    pub r2: f64,
    #[serde(rename = "MAE")]
    pub mae: f64,
    #[serde(rename = "RMSE")]
    pub rmse: f64,
    pub feature_count: usize,
}

/// `POST /api/model/reload`
pub async fn reload(State(state): State<AppState>) -> Result<Json<ReloadResponse>, PredictError> {
    add_breadcrumb("model", "Reload requested");

    let forecaster = state.model().reload().await.map_err(PredictError::Reload)?;

    Ok(Json(ReloadResponse {
        message: "Model reloaded successfully!",
        feature_columns: forecaster.feature_columns().to_vec(),
    }))
}

/// `POST /api/model/train`
///
/// Trains on the configured dataset and serves the result immediately.
pub async fn train(State(state): State<AppState>) -> Result<Json<TrainResponse>, PredictError> {
    add_breadcrumb("model", "Training requested");

    let report = state
        .model()
        .train(&state.config().dataset_path)
        .await
        .map_err(PredictError::Training)?;

    Ok(Json(TrainResponse {
        message: "Model trained successfully!",
        r2: round_to(report.r2, 4),
        mae: round_to(report.mae, 4),
        rmse: round_to(report.rmse, 4),
        feature_count: report.feature_count,
    }))
}
