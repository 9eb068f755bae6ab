//! Health and banner endpoints.
//!
//! Requires a running server. Run with: `cargo test -p solarcast-integration-tests -- --ignored`

use reqwest::{Method, StatusCode};

use solarcast_integration_tests::TestClient;

#[tokio::test]
#[ignore = "Requires running server"]
async fn test_home_banner() {
    let client = TestClient::new();
    let (status, body) = client.send_json(Method::GET, "/", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "SolarPower-ML API (Auth + ML) is running!");
}

#[tokio::test]
#[ignore = "Requires running server"]
async fn test_health_and_readiness() {
    let client = TestClient::new();

    let resp = client.send(Method::GET, "/health", None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers().contains_key("x-request-id"));

    let resp = client.send(Method::GET, "/health/ready", None).await;
    assert_eq!(resp.status(), StatusCode::OK);
}
