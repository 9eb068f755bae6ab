//! Unified error handling with Sentry integration.
//!
//! Two response shapes are in use:
//!
//! - [`AppError`] for account routes, rendered as `{"message": "..."}`
//! - [`PredictError`] for prediction and model routes, rendered as `{"error": "..."}`
//!
//! Both capture server errors to Sentry before responding and never expose
//! internal details to the client.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use solarcast_forecast::ForecastError;

use crate::services::auth::AuthError;
use crate::services::model::ModelError;

/// Error type for account routes.
#[derive(Debug, Error)]
pub enum AppError {
    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::Auth(err) => (err.status(), err.client_message()),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
        };

        if status.is_server_error() {
            capture(&self);
        }

        (status, Json(json!({ "message": message }))).into_response()
    }
}

/// Error type for prediction and model routes.
#[derive(Debug, Error)]
pub enum PredictError {
    /// Legacy route called with no model loaded.
    #[error("model not loaded")]
    ModelNotLoaded,

    /// Versioned route called with no model loaded.
    #[error("model not trained")]
    ModelNotTrained,

    /// Body missing, not JSON, or not an object.
    #[error("no JSON data received")]
    NoJson,

    /// Multi-day body is not a non-empty array.
    #[error("body is not a non-empty array")]
    NotAnArray,

    /// Feature columns absent from the input.
    #[error("missing fields: {}", .0.join(", "))]
    MissingFields(Vec<String>),

    /// A feature value could not be read as a number.
    #[error("invalid value for field: {0}")]
    InvalidValue(String),

    /// The model failed on a well-formed input.
    #[error("prediction failed: {0}")]
    Failed(#[source] ForecastError),

    /// Artifacts could not be reloaded.
    #[error("reload failed: {0}")]
    Reload(#[source] ModelError),

    /// Training failed.
    #[error("training failed: {0}")]
    Training(#[source] ModelError),
}

impl PredictError {
    const fn status(&self) -> StatusCode {
        match self {
            Self::ModelNotTrained
            | Self::NoJson
            | Self::NotAnArray
            | Self::MissingFields(_)
            | Self::InvalidValue(_) => StatusCode::BAD_REQUEST,
            Self::Training(ModelError::Busy) => StatusCode::CONFLICT,
            Self::ModelNotLoaded | Self::Failed(_) | Self::Reload(_) | Self::Training(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn client_message(&self) -> String {
        match self {
            Self::ModelNotLoaded => "Model not loaded".to_string(),
            Self::ModelNotTrained => {
                "Model not trained yet. Please run the train command first.".to_string()
            }
            Self::NoJson => "No JSON data received".to_string(),
            Self::NotAnArray => "Request body must be a non-empty JSON array".to_string(),
            Self::MissingFields(fields) => format!("Missing fields: {}", fields.join(", ")),
            Self::InvalidValue(field) => format!("Invalid value for field: {field}"),
            Self::Failed(_) => "Prediction failed".to_string(),
            Self::Reload(_) => "Failed to reload model".to_string(),
            Self::Training(ModelError::Busy) => "Training already in progress".to_string(),
            Self::Training(_) => "Training failed".to_string(),
        }
    }
}

impl From<ForecastError> for PredictError {
    fn from(err: ForecastError) -> Self {
        match err {
            ForecastError::MissingFeatures(fields) => Self::MissingFields(fields),
            ForecastError::NonFinite(field) => Self::InvalidValue(field),
            other => Self::Failed(other),
        }
    }
}

impl IntoResponse for PredictError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            capture(&self);
        }

        (status, Json(json!({ "error": self.client_message() }))).into_response()
    }
}

fn capture(err: &(dyn std::error::Error + 'static)) {
    let event_id = sentry::capture_error(err);
    tracing::error!(
        error = %err,
        sentry_event_id = %event_id,
        "Request error"
    );
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Add a breadcrumb for an operator action.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of actions
/// leading up to an error.
pub fn add_breadcrumb(category: &str, message: &str) {
    sentry::add_breadcrumb(sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    });
}
