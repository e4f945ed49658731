//! Authorization integration tests.
//!
//! Exercises the full gate (header extraction, signature verification,
//! claim validation, permission enforcement) through the real router.

// Test code is allowed to use expect/unwrap for assertions
#![allow(clippy::unwrap_used, clippy::expect_used)]

use anyhow::Result;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use casting_service::models::NewPerformer;
use casting_service::repositories::CatalogRepository;
use casting_test_utils::{MockJwksServer, TestCastingServer, TestKeypair};
use serde_json::{json, Value};

async fn get(server: &TestCastingServer, path: &str, authorization: Option<&str>) -> reqwest::Response {
    let mut request = reqwest::Client::new().get(format!("{}{}", server.url(), path));
    if let Some(value) = authorization {
        request = request.header("Authorization", value);
    }
    request.send().await.expect("request should reach the test server")
}

async fn error_code(response: reqwest::Response) -> String {
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);
    body["code"].as_str().unwrap().to_string()
}

async fn seed_performer(server: &TestCastingServer) -> i64 {
    server
        .repository()
        .create_performer(NewPerformer {
            name: "Ada Lovelace".to_string(),
            age: 36,
            gender: "Female".to_string(),
        })
        .await
        .unwrap()
        .id
}

#[tokio::test]
async fn test_valid_token_with_permission_is_allowed() -> Result<()> {
    let keypair = TestKeypair::new(1, "key-1");
    let server = TestCastingServer::spawn(&[&keypair]).await?;
    let id = seed_performer(&server).await;

    let token = keypair.sign(
        &server
            .claims()
            .subject("auth0|alice")
            .permissions(&["read:performers"])
            .build(),
    );

    let response = get(&server, &format!("/performers/{id}"), Some(&format!("Bearer {token}"))).await;
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await?;
    assert_eq!(body["performer"]["name"], "Ada Lovelace");
    Ok(())
}

#[tokio::test]
async fn test_missing_header_is_rejected_with_challenge() -> Result<()> {
    let keypair = TestKeypair::new(2, "key-2");
    let server = TestCastingServer::spawn(&[&keypair]).await?;

    for path in ["/performers", "/performers/1", "/works", "/works/1", "/works/1/cast"] {
        let response = get(&server, path, None).await;
        assert_eq!(response.status(), 401, "{path}");
        let challenge = response
            .headers()
            .get("www-authenticate")
            .unwrap()
            .to_str()?
            .to_string();
        assert!(challenge.starts_with("Bearer"));
        assert_eq!(error_code(response).await, "MISSING_HEADER");
    }
    Ok(())
}

#[tokio::test]
async fn test_malformed_headers() -> Result<()> {
    let keypair = TestKeypair::new(3, "key-3");
    let server = TestCastingServer::spawn(&[&keypair]).await?;
    let token = keypair.sign(&server.claims().permissions(&["read:works"]).build());

    for header in [
        format!("bearer {token}"),
        format!("Token {token}"),
        "Bearer".to_string(),
        format!("Bearer  {token}"),
    ] {
        let response = get(&server, "/works", Some(&header)).await;
        assert_eq!(response.status(), 401);
        assert_eq!(error_code(response).await, "MALFORMED_HEADER");
    }
    Ok(())
}

#[tokio::test]
async fn test_structurally_invalid_token() -> Result<()> {
    let keypair = TestKeypair::new(4, "key-4");
    let server = TestCastingServer::spawn(&[&keypair]).await?;

    for header in ["Bearer abc.def.ghi", "Bearer only.two"] {
        let response = get(&server, "/works", Some(header)).await;
        assert_eq!(response.status(), 401);
        assert_eq!(error_code(response).await, "MALFORMED_TOKEN");
    }
    Ok(())
}

#[tokio::test]
async fn test_expired_token_rejected_even_with_permission() -> Result<()> {
    let keypair = TestKeypair::new(5, "key-5");
    let server = TestCastingServer::spawn(&[&keypair]).await?;

    let token = keypair.sign(
        &server
            .claims()
            .permissions(&["read:works"])
            .expires_in(-60)
            .build(),
    );

    let response = get(&server, "/works", Some(&format!("Bearer {token}"))).await;
    assert_eq!(response.status(), 401);
    assert_eq!(error_code(response).await, "TOKEN_EXPIRED");
    Ok(())
}

#[tokio::test]
async fn test_missing_permission_is_forbidden() -> Result<()> {
    let keypair = TestKeypair::new(6, "key-6");
    let server = TestCastingServer::spawn(&[&keypair]).await?;

    let token = keypair.sign(&server.claims().permissions(&["read:works"]).build());

    let response = get(&server, "/performers", Some(&format!("Bearer {token}"))).await;
    assert_eq!(response.status(), 403);
    assert!(response.headers().get("www-authenticate").is_none());
    assert_eq!(error_code(response).await, "INSUFFICIENT_PERMISSION");
    Ok(())
}

#[tokio::test]
async fn test_any_held_permission_suffices() -> Result<()> {
    let keypair = TestKeypair::new(7, "key-7");
    let server = TestCastingServer::spawn(&[&keypair]).await?;
    seed_performer(&server).await;

    let token = keypair.sign(
        &server
            .claims()
            .permissions(&["read:performers", "read:works"])
            .build(),
    );

    let response = get(&server, "/performers", Some(&format!("Bearer {token}"))).await;
    assert_eq!(response.status(), 200);
    Ok(())
}

#[tokio::test]
async fn test_tampered_payload_fails_signature() -> Result<()> {
    let keypair = TestKeypair::new(8, "key-8");
    let server = TestCastingServer::spawn(&[&keypair]).await?;

    let token = keypair.sign(&server.claims().permissions(&["read:works"]).build());
    let mut parts = token.split('.');
    let (header, _payload, signature) = (
        parts.next().unwrap(),
        parts.next().unwrap(),
        parts.next().unwrap(),
    );

    let escalated = server
        .claims()
        .permissions(&["read:works", "remove:works"])
        .build();
    let forged_payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&escalated)?);
    let forged = format!("{header}.{forged_payload}.{signature}");

    let response = get(&server, "/works", Some(&format!("Bearer {forged}"))).await;
    assert_eq!(response.status(), 401);
    assert_eq!(error_code(response).await, "INVALID_SIGNATURE");
    Ok(())
}

#[tokio::test]
async fn test_unknown_kid_fails_signature() -> Result<()> {
    let trusted = TestKeypair::new(9, "trusted");
    let stranger = TestKeypair::new(10, "stranger");
    let server = TestCastingServer::spawn(&[&trusted]).await?;

    let token = stranger.sign(&server.claims().permissions(&["read:works"]).build());

    let response = get(&server, "/works", Some(&format!("Bearer {token}"))).await;
    assert_eq!(response.status(), 401);
    assert_eq!(error_code(response).await, "INVALID_SIGNATURE");
    Ok(())
}

#[tokio::test]
async fn test_wrong_issuer_and_audience() -> Result<()> {
    let keypair = TestKeypair::new(11, "key-11");
    let server = TestCastingServer::spawn(&[&keypair]).await?;

    let wrong_iss = keypair.sign(
        &server
            .claims()
            .issuer("https://elsewhere.test/")
            .permissions(&["read:works"])
            .build(),
    );
    let response = get(&server, "/works", Some(&format!("Bearer {wrong_iss}"))).await;
    assert_eq!(error_code(response).await, "INVALID_ISSUER");

    let wrong_aud = keypair.sign(
        &server
            .claims()
            .audience(json!(["billing-api"]))
            .permissions(&["read:works"])
            .build(),
    );
    let response = get(&server, "/works", Some(&format!("Bearer {wrong_aud}"))).await;
    assert_eq!(error_code(response).await, "INVALID_AUDIENCE");
    Ok(())
}

#[tokio::test]
async fn test_malformed_permissions_claim_is_bad_request() -> Result<()> {
    let keypair = TestKeypair::new(12, "key-12");
    let server = TestCastingServer::spawn(&[&keypair]).await?;

    let token = keypair.sign(
        &server
            .claims()
            .raw("permissions", json!("read:works"))
            .build(),
    );

    let response = get(&server, "/works", Some(&format!("Bearer {token}"))).await;
    assert_eq!(response.status(), 400);
    assert_eq!(error_code(response).await, "MALFORMED_CLAIMS");
    Ok(())
}

#[tokio::test]
async fn test_verification_is_repeatable() -> Result<()> {
    let keypair = TestKeypair::new(13, "key-13");
    let server = TestCastingServer::spawn(&[&keypair]).await?;
    let id = seed_performer(&server).await;

    let header = format!(
        "Bearer {}",
        keypair.sign(&server.claims().permissions(&["read:performers"]).build())
    );
    let path = format!("/performers/{id}");

    let first: Value = get(&server, &path, Some(&header)).await.json().await?;
    let second: Value = get(&server, &path, Some(&header)).await.json().await?;
    assert_eq!(first, second);
    assert_eq!(first["success"], true);
    Ok(())
}

#[tokio::test]
async fn test_error_body_never_echoes_token() -> Result<()> {
    let keypair = TestKeypair::new(14, "key-14");
    let server = TestCastingServer::spawn(&[&keypair]).await?;

    let token = keypair.sign(&server.claims().expires_in(-10).build());
    let response = get(&server, "/works", Some(&format!("Bearer {token}"))).await;
    let text = response.text().await?;
    assert!(!text.contains(&token));
    Ok(())
}

#[tokio::test]
async fn test_key_rotation_through_reload() -> Result<()> {
    let old_key = TestKeypair::new(15, "2024-key");
    let jwks = MockJwksServer::start(&[&old_key]).await;
    let server = TestCastingServer::spawn_with_jwks(&jwks.url(), &[]).await?;
    seed_performer(&server).await;
    let startup_fetches = jwks.fetch_count().await;
    assert_eq!(startup_fetches, 1);

    let claims = server.claims().permissions(&["read:performers"]).build();
    let old_token = format!("Bearer {}", old_key.sign(&claims));
    assert_eq!(get(&server, "/performers", Some(&old_token)).await.status(), 200);

    let new_key = TestKeypair::new(16, "2025-key");
    let new_token = format!("Bearer {}", new_key.sign(&claims));
    assert_eq!(get(&server, "/performers", Some(&new_token)).await.status(), 401);

    // Request-path misses never fetch.
    assert_eq!(jwks.fetch_count().await, startup_fetches);

    jwks.publish(&[&new_key]).await;
    assert_eq!(server.key_set().reload().await?, 1);

    assert_eq!(get(&server, "/performers", Some(&new_token)).await.status(), 200);
    let response = get(&server, "/performers", Some(&old_token)).await;
    assert_eq!(error_code(response).await, "INVALID_SIGNATURE");
    Ok(())
}

#[tokio::test]
async fn test_failed_reload_keeps_serving_old_keys() -> Result<()> {
    let keypair = TestKeypair::new(17, "stable");
    let jwks = MockJwksServer::start(&[&keypair]).await;
    let server = TestCastingServer::spawn_with_jwks(&jwks.url(), &[]).await?;
    seed_performer(&server).await;

    jwks.fail_with(503).await;
    assert!(server.key_set().reload().await.is_err());

    jwks.publish_raw(json!({"keys": [{"kty": "oct", "kid": "shared", "k": "c2VjcmV0"}]}))
        .await;
    assert!(server.key_set().reload().await.is_err());

    let token = keypair.sign(&server.claims().permissions(&["read:performers"]).build());
    let response = get(&server, "/performers", Some(&format!("Bearer {token}"))).await;
    assert_eq!(response.status(), 200);
    Ok(())
}
