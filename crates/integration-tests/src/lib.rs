//! Integration tests for SolarCast.
//!
//! These drive a running server over HTTP and are `#[ignore]`d by default.
//!
//! # Running Tests
//!
//! ```bash
//! cargo run -p solarcast-cli -- migrate
//! cargo run -p solarcast-cli -- train
//! cargo run -p solarcast-server &
//! cargo test -p solarcast-integration-tests -- --ignored
//! ```
//!
//! # Environment Variables
//!
//! - `SOLARCAST_BASE_URL` - server under test (default `http://localhost:8000`)
//! - `DATABASE_URL` - same database as the server; account tests read
//!   issued codes from it because email delivery is out of band

#![cfg_attr(not(test), forbid(unsafe_code))]

use reqwest::{Client, Method, Response};
use serde_json::{Value, json};
use sqlx::PgPool;
use uuid::Uuid;

use solarcast_core::FEATURE_COLUMNS;

/// Base URL of the server under test.
#[must_use]
pub fn base_url() -> String {
    std::env::var("SOLARCAST_BASE_URL").unwrap_or_else(|_| "http://localhost:8000".to_string())
}

/// A unique address so parallel tests never share an account.
#[must_use]
pub fn unique_email() -> String {
    format!("it-{}@example.com", Uuid::new_v4().simple())
}

/// HTTP client for the server under test.
pub struct TestClient {
    client: Client,
    base_url: String,
}

impl TestClient {
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be built.
    #[must_use]
    pub fn new() -> Self {
        Self {
            client: Client::builder()
                .build()
                .expect("Failed to create HTTP client"),
            base_url: base_url(),
        }
    }

    /// Send a request with an optional JSON body.
    ///
    /// Each request claims a fresh forwarded address so account flows stay
    /// under the per-client rate limit.
    ///
    /// # Panics
    ///
    /// Panics if the server cannot be reached.
    pub async fn send(&self, method: Method, path: &str, body: Option<&Value>) -> Response {
        let mut request = self
            .client
            .request(method, format!("{}{path}", self.base_url))
            .header("x-forwarded-for", forwarded_ip());
        if let Some(body) = body {
            request = request.json(body);
        }
        request.send().await.expect("Failed to reach server")
    }

    /// Send a request and decode the JSON response.
    ///
    /// # Panics
    ///
    /// Panics if the server cannot be reached or the body is not JSON.
    pub async fn send_json(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> (reqwest::StatusCode, Value) {
        let response = self.send(method, path, body).await;
        let status = response.status();
        let body = response.json().await.expect("Response is not JSON");
        (status, body)
    }
}

impl Default for TestClient {
    fn default() -> Self {
        Self::new()
    }
}

fn forwarded_ip() -> String {
    let bytes = Uuid::new_v4().into_bytes();
    format!("10.{}.{}.{}", bytes[0], bytes[1], bytes[2])
}

/// Connect to the server's database.
///
/// # Panics
///
/// Panics if `DATABASE_URL` is unset or the connection fails.
pub async fn database() -> PgPool {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    PgPool::connect(&url).await.expect("Failed to connect to database")
}

/// The code currently issued to `email`, if any.
///
/// # Panics
///
/// Panics if the query fails.
pub async fn current_otp(pool: &PgPool, email: &str) -> Option<String> {
    sqlx::query_scalar::<_, Option<String>>("SELECT otp FROM users WHERE email = $1")
        .bind(email)
        .fetch_optional(pool)
        .await
        .expect("Failed to query OTP")
        .flatten()
}

/// A complete, plausible summer day.
#[must_use]
pub fn sample_day() -> Value {
    let values = [6.0, 21.0, 1.0, 69.0, 28.0, 7.5, 0.0, 10.0, 75.0, 29.82];
    let object = FEATURE_COLUMNS
        .iter()
        .zip(values)
        .map(|(column, value)| ((*column).to_string(), json!(value)))
        .collect();
    Value::Object(object)
}
