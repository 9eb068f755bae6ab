//! Router tests driven through `tower::ServiceExt::oneshot`.
//!
//! The pool points at a closed port, so anything that reaches the database
//! fails fast; every test here exercises behavior decided before that.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::fmt::Write as _;
use std::path::Path;
use std::time::Duration;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode, header};
use ndarray::{Array1, Array2};
use serde_json::{Value, json};
use sqlx::postgres::PgPoolOptions;
use tower::ServiceExt;

use solarcast_core::FEATURE_COLUMNS;
use solarcast_forecast::forest::RandomForest;
use solarcast_forecast::scaler::StandardScaler;
use solarcast_forecast::{Artifacts, Forecaster};

use crate::config::ServerConfig;
use crate::middleware::REQUEST_ID_HEADER;
use crate::services::{EmailService, ModelHandle};
use crate::state::AppState;

const UNREACHABLE_DB: &str = "postgres://solarcast@127.0.0.1:1/solarcast";

fn artifacts() -> Artifacts {
    let n = 40;
    let x = Array2::from_shape_fn((n, FEATURE_COLUMNS.len()), |(i, j)| {
        ((i * (j + 3)) % 17) as f64
    });
    let y = Array1::from_shape_fn(n, |i| (i % 10) as f64 * 2.5);

    let mut scaler = StandardScaler::new();
    let xs = scaler.fit_transform(&x).unwrap();
    let mut model = RandomForest::new(5);
    model.fit(&xs, &y).unwrap();

    let columns = FEATURE_COLUMNS.iter().map(|c| (*c).to_owned()).collect();
    Artifacts::new(model, scaler, columns).unwrap()
}

fn forecaster() -> Forecaster {
    Forecaster::new(artifacts())
}

fn state(model: ModelHandle, dataset: &Path) -> AppState {
    let dataset = dataset.display().to_string();
    let config = ServerConfig::from_lookup(&|key| match key {
        "DATABASE_URL" => Some(UNREACHABLE_DB.to_string()),
        "SOLARCAST_DATASET_PATH" => Some(dataset.clone()),
        _ => None,
    })
    .unwrap();

    let pool = PgPoolOptions::new()
        .acquire_timeout(Duration::from_millis(250))
        .connect_lazy(UNREACHABLE_DB)
        .unwrap();

    AppState::new(config, pool, EmailService::log_only(), model)
}

fn app(model: ModelHandle) -> Router {
    crate::app(state(model, Path::new("absent.csv")), super::routes())
}

/// Thirty days of three-hourly readings; clearer skies produce more power.
fn write_dataset(dir: &Path) -> std::path::PathBuf {
    let mut csv = String::from(
        "Day of Year,Year,Month,Day,First Hour of Period,Is Daylight,\
Distance to Solar Noon,Average Temperature (Day),Average Wind Direction (Day),\
Average Wind Speed (Day),Sky Cover,Visibility,Relative Humidity,\
Average Wind Speed (Period),Average Barometric Pressure (Period),Power Generated\n",
    );
    for d in 0..30u32 {
        let sky = d % 5;
        let temp = 60 + d % 12;
        for reading in 0..8u32 {
            let daylight = (2..6).contains(&reading);
            let power = if daylight { (5 - sky) * 1500 + temp * 10 } else { 0 };
            writeln!(
                csv,
                "{doy},2008,6,{day},{hour},{flag},0.5,{temp},28,7.5,{sky},10,70,8,29.82,{power}",
                doy = 153 + d,
                day = d + 1,
                hour = reading * 3 + 1,
                flag = if daylight { "True" } else { "False" },
            )
            .unwrap();
        }
    }
    let path = dir.join("solar.csv");
    std::fs::write(&path, csv).unwrap();
    path
}

fn trained_app() -> (Router, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let handle = ModelHandle::with_forecaster(dir.path(), forecaster());
    (app(handle), dir)
}

fn untrained_app() -> (Router, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    (app(ModelHandle::empty(dir.path())), dir)
}

async fn send(app: Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let response = app.oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
    (status, value)
}

fn full_day() -> Value {
    json!({
        "Is Daylight": 1,
        "Average Temperature (Day)": 69,
        "Average Wind Direction (Day)": 28,
        "Average Wind Speed (Day)": 7.5,
        "Sky Cover": 0,
        "Visibility": "10",
        "Relative Humidity": 75,
        "Average Barometric Pressure (Period)": 29.82,
        "Month": 6,
        "Day": 21,
    })
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_home_banner() {
    let (app, _dir) = untrained_app();
    let (status, body) = send(app, Method::GET, "/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "SolarPower-ML API (Auth + ML) is running!");
}

#[tokio::test]
async fn test_health_is_ok() {
    let (app, _dir) = untrained_app();
    let (status, body) = send(app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String("ok".to_string()));
}

#[tokio::test]
async fn test_readiness_without_database() {
    let (app, _dir) = untrained_app();
    let (status, _) = send(app, Method::GET, "/health/ready", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_request_id_and_security_headers() {
    let (app, _dir) = untrained_app();
    let request = Request::builder()
        .uri("/health")
        .header(REQUEST_ID_HEADER, "req-123")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let headers = response.headers();
    assert_eq!(headers[REQUEST_ID_HEADER], "req-123");
    assert_eq!(headers[header::X_FRAME_OPTIONS], "DENY");
    assert_eq!(headers[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
}

#[tokio::test]
async fn test_request_id_generated_when_absent() {
    let (app, _dir) = untrained_app();
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();

    let response = app.oneshot(request).await.unwrap();
    let id = response.headers()[REQUEST_ID_HEADER].to_str().unwrap();
    assert!(uuid::Uuid::parse_str(id).is_ok());
}

// =============================================================================
// Prediction
// =============================================================================

#[tokio::test]
async fn test_legacy_predict_without_model() {
    let (app, _dir) = untrained_app();
    let (status, body) = send(app, Method::POST, "/predict", Some(full_day())).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Model not loaded");
}

#[tokio::test]
async fn test_single_day_without_model() {
    let (app, _dir) = untrained_app();
    let (status, body) = send(app, Method::POST, "/api/predict/solarpower", Some(full_day())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["error"],
        "Model not trained yet. Please run the train command first."
    );
}

#[tokio::test]
async fn test_legacy_predict_echoes_input() {
    let (app, _dir) = trained_app();
    let (status, body) = send(app, Method::POST, "/predict", Some(full_day())).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["predicted_power_kW"].is_f64());
    assert_eq!(body["input_used"], full_day());
}

#[tokio::test]
async fn test_legacy_predict_lists_missing_fields() {
    let (app, _dir) = trained_app();
    let mut input = full_day();
    input.as_object_mut().unwrap().remove("Sky Cover");
    input.as_object_mut().unwrap().remove("Day");

    let (status, body) = send(app, Method::POST, "/predict", Some(input)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Missing fields: Day, Sky Cover");
}

#[tokio::test]
async fn test_single_day_prediction_is_rounded() {
    let (app, _dir) = trained_app();
    let (status, body) = send(app, Method::POST, "/api/predict/solarpower", Some(full_day())).await;
    assert_eq!(status, StatusCode::OK);

    let predicted = body["predicted_power_kW"].as_f64().unwrap();
    assert!(((predicted * 1000.0).round() - predicted * 1000.0).abs() < 1e-6);
}

#[tokio::test]
async fn test_single_day_rejects_empty_body() {
    let (app, _dir) = trained_app();
    let (status, body) = send(app, Method::POST, "/api/predict/solarpower", Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No JSON data received");
}

#[tokio::test]
async fn test_single_day_rejects_text_value() {
    let (app, _dir) = trained_app();
    let mut input = full_day();
    input["Sky Cover"] = json!("overcast");

    let (status, body) = send(app, Method::POST, "/api/predict/solarpower", Some(input)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid value for field: Sky Cover");
}

#[tokio::test]
async fn test_forecast_requires_non_empty_array() {
    let (app, _dir) = trained_app();
    let (status, body) = send(
        app.clone(),
        Method::POST,
        "/api/predict/solarpowerforecast",
        Some(full_day()),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Request body must be a non-empty JSON array");

    let (status, _) = send(app, Method::POST, "/api/predict/solarpowerforecast", Some(json!([]))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_forecast_answers_in_order() {
    let (app, _dir) = trained_app();
    let mut second = full_day();
    second["Day"] = json!(22);

    let (status, body) = send(
        app,
        Method::POST,
        "/api/predict/solarpowerforecast",
        Some(json!([full_day(), second])),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let predictions = body["predictions"].as_array().unwrap();
    assert_eq!(predictions.len(), 2);
    assert_eq!(predictions[0]["input"]["Day"], 21);
    assert_eq!(predictions[1]["input"]["Day"], 22);
    assert!(predictions[1]["predicted_power_kW"].is_f64());
}

#[tokio::test]
async fn test_forecast_rejects_incomplete_entry() {
    let (app, _dir) = trained_app();
    let (status, body) = send(
        app,
        Method::POST,
        "/api/predict/solarpowerforecast",
        Some(json!([full_day(), {"Month": 6}])),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().starts_with("Missing fields: Day, Is Daylight"));
}

// =============================================================================
// Model
// =============================================================================

#[tokio::test]
async fn test_reload_without_artifacts_fails() {
    let (app, _dir) = untrained_app();
    let (status, body) = send(app, Method::POST, "/api/model/reload", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Failed to reload model");
}

#[tokio::test]
async fn test_reload_picks_up_saved_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    artifacts().save(dir.path()).unwrap();
    let app = app(ModelHandle::empty(dir.path()));

    let (status, body) = send(app.clone(), Method::POST, "/api/model/reload", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["feature_columns"].as_array().unwrap().len(), FEATURE_COLUMNS.len());

    let (status, _) = send(app, Method::POST, "/api/predict/solarpower", Some(full_day())).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_train_serves_new_model() {
    let dir = tempfile::tempdir().unwrap();
    let dataset = write_dataset(dir.path());
    let model_dir = dir.path().join("model");
    let app = crate::app(
        state(ModelHandle::empty(&model_dir), &dataset),
        super::routes(),
    );

    let (status, _) = send(app.clone(), Method::POST, "/api/predict/solarpower", Some(full_day())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(app.clone(), Method::POST, "/api/model/train", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Model trained successfully!");
    assert_eq!(body["feature_count"], FEATURE_COLUMNS.len());
    for metric in ["R2 Score", "MAE", "RMSE"] {
        assert!(body[metric].is_f64(), "{metric} missing from {body}");
    }
    assert!(Artifacts::exist_in(&model_dir));

    let (status, body) = send(app, Method::POST, "/api/predict/solarpower", Some(full_day())).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["predicted_power_kW"].is_f64());
}

#[tokio::test]
async fn test_train_missing_dataset_fails() {
    let (app, _dir) = untrained_app();
    let (status, body) = send(app, Method::POST, "/api/model/train", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Training failed");
}

#[tokio::test]
async fn test_train_while_running_conflicts() {
    let dir = tempfile::tempdir().unwrap();
    let dataset = write_dataset(dir.path());
    let state = state(ModelHandle::empty(dir.path().join("model")), &dataset);
    let app = crate::app(state.clone(), super::routes());

    let _running = state.model().hold_training();
    let (status, body) = send(app, Method::POST, "/api/model/train", None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Training already in progress");
}

// =============================================================================
// Accounts (validation decided before the database is touched)
// =============================================================================

#[tokio::test]
async fn test_signup_requires_fields() {
    let (app, _dir) = untrained_app();
    let (status, body) = send(
        app,
        Method::POST,
        "/api/signup",
        Some(json!({"fullname": "Ada", "email": "  "})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Please fill all required fields");
}

#[tokio::test]
async fn test_signup_rejects_invalid_email() {
    let (app, _dir) = untrained_app();
    let (status, body) = send(
        app,
        Method::POST,
        "/api/signup",
        Some(json!({"fullname": "Ada", "email": "ada-at-example", "password": "longenough"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid email address");
}

#[tokio::test]
async fn test_signup_rejects_short_password() {
    let (app, _dir) = untrained_app();
    let (status, body) = send(
        app,
        Method::POST,
        "/api/signup",
        Some(json!({"fullname": "Ada", "email": "ada@example.com", "password": "short"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Password must be at least 8 characters");
}

#[tokio::test]
async fn test_signup_rejects_malformed_json() {
    let (app, _dir) = untrained_app();
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/signup")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"fullname\":"))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_resend_otp_rejects_bad_id() {
    let (app, _dir) = untrained_app();
    let (status, body) = send(app, Method::GET, "/api/signup/resend-otp/not-a-uuid", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid user ID");
}

#[tokio::test]
async fn test_verify_requires_otp_before_id() {
    let (app, _dir) = untrained_app();
    let (status, body) = send(
        app,
        Method::POST,
        "/api/signup/verify/not-a-uuid",
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "OTP is required");
}

#[tokio::test]
async fn test_signin_requires_fields() {
    let (app, _dir) = untrained_app();
    let (status, body) = send(app, Method::POST, "/api/signin", Some(json!({"email": "a@b.co"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Please enter all required fields");
}

#[tokio::test]
async fn test_signin_database_failure_is_generic() {
    let (app, _dir) = untrained_app();
    let (status, body) = send(
        app,
        Method::POST,
        "/api/signin",
        Some(json!({"email": "ada@example.com", "password": "longenough"})),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["message"], "Server error");
}

#[tokio::test]
async fn test_delete_unverified_requires_email() {
    let (app, _dir) = untrained_app();
    let (status, body) = send(app, Method::DELETE, "/api/signin/emailnotverified", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Email is required");
}

#[tokio::test]
async fn test_forgot_password_requires_email() {
    let (app, _dir) = untrained_app();
    let (status, body) = send(
        app,
        Method::POST,
        "/api/signin/forgotpassword/auth",
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Email is required");
}

#[tokio::test]
async fn test_reset_requires_email_and_otp() {
    let (app, _dir) = untrained_app();
    let (status, body) = send(
        app.clone(),
        Method::POST,
        "/api/signin/forgotpassword/verify",
        Some(json!({"email": "ada@example.com"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Email and OTP are required");

    let (status, body) = send(
        app,
        Method::PATCH,
        "/api/signin/forgotpassword/reset",
        Some(json!({"otp": "123456", "password": "longenough"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Email and OTP are required");
}
