//! Mock JWKS endpoint
//!
//! Wraps a `wiremock` server that publishes a JWKS document at
//! `/.well-known/jwks.json`. Tests rotate keys or simulate an outage by
//! replacing what the endpoint serves.

use crate::crypto_fixtures::{jwks_document, TestKeypair};
use serde_json::Value;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Path the mock publishes keys under.
pub const JWKS_PATH: &str = "/.well-known/jwks.json";

/// A running mock JWKS endpoint.
///
/// # Example
/// ```rust,ignore
/// let old = TestKeypair::new(1, "old");
/// let jwks = MockJwksServer::start(&[&old]).await;
///
/// let new = TestKeypair::new(2, "new");
/// jwks.publish(&[&new]).await;
/// ```
pub struct MockJwksServer {
    server: MockServer,
}

impl MockJwksServer {
    /// Start a server publishing `keys`.
    pub async fn start(keys: &[&TestKeypair]) -> Self {
        let server = MockServer::start().await;
        let this = Self { server };
        this.publish(keys).await;
        this
    }

    /// Full URL of the JWKS document.
    pub fn url(&self) -> String {
        format!("{}{}", self.server.uri(), JWKS_PATH)
    }

    /// Serve a JWKS document for `keys` from now on.
    pub async fn publish(&self, keys: &[&TestKeypair]) {
        self.respond_with(ResponseTemplate::new(200).set_body_json(jwks_document(keys)))
            .await;
    }

    /// Serve an arbitrary JSON body from now on.
    pub async fn publish_raw(&self, body: Value) {
        self.respond_with(ResponseTemplate::new(200).set_body_json(body))
            .await;
    }

    /// Answer every fetch with `status` and an empty body.
    pub async fn fail_with(&self, status: u16) {
        self.respond_with(ResponseTemplate::new(status)).await;
    }

    /// Number of JWKS fetches received since the last publish.
    pub async fn fetch_count(&self) -> usize {
        self.server
            .received_requests()
            .await
            .map(|requests| {
                requests
                    .iter()
                    .filter(|r| r.url.path() == JWKS_PATH)
                    .count()
            })
            .unwrap_or(0)
    }

    async fn respond_with(&self, response: ResponseTemplate) {
        self.server.reset().await;
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(response)
            .mount(&self.server)
            .await;
    }
}
