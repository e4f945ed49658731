//! Health, readiness and metrics endpoint integration tests.

// Test code is allowed to use expect/unwrap for assertions
#![allow(clippy::unwrap_used, clippy::expect_used)]

use anyhow::Result;
use casting_test_utils::{TestCastingServer, TestKeypair};
use serde_json::Value;

#[tokio::test]
async fn test_health_needs_no_credentials() -> Result<()> {
    let server = TestCastingServer::spawn_without_keys().await?;

    let response = reqwest::get(format!("{}/health", server.url())).await?;
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await?, "OK");
    Ok(())
}

#[tokio::test]
async fn test_ready_with_keys_and_database() -> Result<()> {
    let keypair = TestKeypair::new(60, "ready-key");
    let server = TestCastingServer::spawn(&[&keypair]).await?;

    let response = reqwest::get(format!("{}/ready", server.url())).await?;
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await?;
    assert_eq!(body["status"], "ready");
    assert_eq!(body["database"], "healthy");
    assert_eq!(body["signing_keys"], 1);
    assert!(body.get("error").is_none());
    Ok(())
}

#[tokio::test]
async fn test_not_ready_without_keys() -> Result<()> {
    let server = TestCastingServer::spawn_without_keys().await?;

    let response = reqwest::get(format!("{}/ready", server.url())).await?;
    assert_eq!(response.status(), 503);

    let body: Value = response.json().await?;
    assert_eq!(body["status"], "not_ready");
    assert_eq!(body["signing_keys"], 0);
    Ok(())
}

#[tokio::test]
async fn test_not_ready_when_database_down() -> Result<()> {
    let keypair = TestKeypair::new(61, "db-key");
    let server = TestCastingServer::spawn(&[&keypair]).await?;
    server.repository().set_available(false);

    let response = reqwest::get(format!("{}/ready", server.url())).await?;
    assert_eq!(response.status(), 503);

    let body: Value = response.json().await?;
    assert_eq!(body["database"], "unhealthy");
    // No infrastructure detail in the body
    assert_eq!(body["error"], "Service dependencies unavailable");

    server.repository().set_available(true);
    let response = reqwest::get(format!("{}/ready", server.url())).await?;
    assert_eq!(response.status(), 200);
    Ok(())
}

#[tokio::test]
async fn test_ready_reflects_key_replacement() -> Result<()> {
    let keypair = TestKeypair::new(62, "swap-key");
    let server = TestCastingServer::spawn_without_keys().await?;

    server.trust_only(&[&keypair]);

    let response = reqwest::get(format!("{}/ready", server.url())).await?;
    assert_eq!(response.status(), 200);
    Ok(())
}

#[tokio::test]
async fn test_metrics_exposes_request_and_authorization_series() -> Result<()> {
    let keypair = TestKeypair::new(63, "metrics-key");
    let server = TestCastingServer::spawn(&[&keypair]).await?;

    // One denied request so the authorization series exists.
    let denied = reqwest::get(format!("{}/works", server.url())).await?;
    assert_eq!(denied.status(), 401);

    let response = reqwest::get(format!("{}/metrics", server.url())).await?;
    assert_eq!(response.status(), 200);

    let text = response.text().await?;
    assert!(text.contains("casting_http_requests_total"));
    assert!(text.contains("casting_authorization_total"));
    // Subjects and tokens never become labels
    assert!(!text.contains("auth0|"));
    Ok(())
}
