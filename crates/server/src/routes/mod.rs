//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET    /                                  - Banner
//! GET    /health                            - Liveness
//! GET    /health/ready                      - Readiness (database)
//!
//! # Prediction
//! POST   /predict                           - Legacy single prediction
//! POST   /api/predict/solarpower            - Single-day prediction
//! POST   /api/predict/solarpowerforecast    - Multi-day forecast
//!
//! # Model
//! POST   /api/model/reload                  - Re-read artifacts from disk
//! POST   /api/model/train                   - Train on the configured dataset
//!
//! # Accounts
//! POST   /api/signup                        - Register, email a code
//! GET    /api/signup/resend-otp/{id}        - Email a fresh code
//! POST   /api/signup/verify/{id}            - Confirm the code
//! POST   /api/signin                        - Log in
//! DELETE /api/signin/emailnotverified       - Drop an unverified account
//! POST   /api/signin/forgotpassword/auth    - Email a reset code
//! POST   /api/signin/forgotpassword/verify  - Check a reset code
//! PATCH  /api/signin/forgotpassword/reset   - Set a new password
//! ```

pub mod auth;
pub mod health;
pub mod model;
pub mod predict;

#[cfg(test)]
mod tests;

use axum::{
    Router,
    routing::{delete, get, patch, post},
};

use crate::middleware::rate_limit::{RateLimiterLayer, api_rate_limiter, auth_rate_limiter};
use crate::state::AppState;

/// Create the account routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/api/signup", post(auth::signup))
        .route("/api/signup/resend-otp/{id}", get(auth::resend_otp))
        .route("/api/signup/verify/{id}", post(auth::verify))
        .route("/api/signin", post(auth::signin))
        .route("/api/signin/emailnotverified", delete(auth::delete_unverified))
        .route("/api/signin/forgotpassword/auth", post(auth::forgot_password))
        .route(
            "/api/signin/forgotpassword/verify",
            post(auth::verify_reset_code),
        )
        .route("/api/signin/forgotpassword/reset", patch(auth::reset_password))
}

/// Create the prediction and model routes router.
pub fn prediction_routes() -> Router<AppState> {
    Router::new()
        .route("/predict", post(predict::predict_legacy))
        .route("/api/predict/solarpower", post(predict::predict_single_day))
        .route(
            "/api/predict/solarpowerforecast",
            post(predict::predict_multiple_days),
        )
        .route("/api/model/reload", post(model::reload))
        .route("/api/model/train", post(model::train))
}

/// Create all routes without rate limiting.
pub fn routes() -> Router<AppState> {
    build(None)
}

/// Create all routes with per-IP rate limits on the account and prediction groups.
///
/// Requires the server to be run with connect info so the peer address is
/// available when no proxy header is present.
pub fn rate_limited_routes() -> Router<AppState> {
    build(Some((auth_rate_limiter(), api_rate_limiter())))
}

fn build(limits: Option<(RateLimiterLayer, RateLimiterLayer)>) -> Router<AppState> {
    let (mut accounts, mut prediction) = (auth_routes(), prediction_routes());
    if let Some((auth_limit, api_limit)) = limits {
        accounts = accounts.layer(auth_limit);
        prediction = prediction.layer(api_limit);
    }

    Router::new()
        .route("/", get(health::home))
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .merge(accounts)
        .merge(prediction)
}
