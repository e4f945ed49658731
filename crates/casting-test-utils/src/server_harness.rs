//! Test server harness for E2E testing
//!
//! Provides `TestCastingServer` for spawning real casting server instances
//! in tests. The server runs the production router over an in-memory
//! catalog, with verification keys taken either from test keypairs or from a
//! (mock) JWKS endpoint.

use crate::crypto_fixtures::TestKeypair;
use crate::token_builders::TestClaimsBuilder;
use casting_service::auth::{AuthorizationGate, KeySet, KeySetCache, SigningKey, TokenVerifier};
use casting_service::config::Config;
use casting_service::observability::metrics::init_metrics_recorder;
use casting_service::repositories::InMemoryCatalogRepository;
use casting_service::routes::{self, AppState};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use tokio::task::JoinHandle;

/// Issuer every test server trusts.
pub const TEST_ISSUER: &str = "https://issuer.casting.test/";

/// Audience every test server accepts.
pub const TEST_AUDIENCE: &str = "casting-api";

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// The global recorder can be installed once per process; later servers
/// share it. If something else installed one first, use a detached handle.
fn metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            init_metrics_recorder()
                .unwrap_or_else(|_| PrometheusBuilder::new().build_recorder().handle())
        })
        .clone()
}

/// Test harness for spawning the casting service in E2E tests.
///
/// # Example
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_health_flow_e2e() -> Result<(), anyhow::Error> {
///     let keypair = TestKeypair::new(1, "key-1");
///     let server = TestCastingServer::spawn(&[&keypair]).await?;
///
///     let response = reqwest::get(format!("{}/health", server.url())).await?;
///
///     assert_eq!(response.status(), 200);
///     Ok(())
/// }
/// ```
pub struct TestCastingServer {
    addr: SocketAddr,
    config: Config,
    repository: Arc<InMemoryCatalogRepository>,
    key_set: Arc<KeySetCache>,
    _handle: JoinHandle<()>,
}

impl TestCastingServer {
    /// Spawn a server that trusts exactly `keys`.
    ///
    /// The server will:
    /// - Bind to a random available port (127.0.0.1:0)
    /// - Start the HTTP server in the background
    pub async fn spawn(keys: &[&TestKeypair]) -> Result<Self, anyhow::Error> {
        let signing_keys = keys
            .iter()
            .map(|k| SigningKey::from_jwk(&k.jwk()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| anyhow::anyhow!("Failed to build signing key: {}", e))?;

        let config = test_config("http://127.0.0.1:9/.well-known/jwks.json", &[])?;
        let key_set = Arc::new(KeySetCache::from_keys(signing_keys));
        Self::start(config, key_set).await
    }

    /// Spawn a server that loads its keys from `jwks_url`, as production
    /// does at startup.
    ///
    /// `extra_vars` override or extend the test environment (e.g.
    /// `PAGE_SIZE`).
    pub async fn spawn_with_jwks(
        jwks_url: &str,
        extra_vars: &[(&str, &str)],
    ) -> Result<Self, anyhow::Error> {
        let config = test_config(jwks_url, extra_vars)?;
        let key_set = Arc::new(KeySetCache::new(
            config.jwks_url.clone(),
            config.jwks_fetch_timeout,
        ));
        key_set
            .reload()
            .await
            .map_err(|e| anyhow::anyhow!("Initial key set load failed: {}", e))?;
        Self::start(config, key_set).await
    }

    /// Spawn a server with no keys at all.
    pub async fn spawn_without_keys() -> Result<Self, anyhow::Error> {
        let config = test_config("http://127.0.0.1:9/.well-known/jwks.json", &[])?;
        Self::start(config, Arc::new(KeySetCache::from_keys(Vec::new()))).await
    }

    async fn start(config: Config, key_set: Arc<KeySetCache>) -> Result<Self, anyhow::Error> {
        let repository = Arc::new(InMemoryCatalogRepository::new());
        let verifier = Arc::new(TokenVerifier::new(
            Arc::clone(&key_set),
            config.verifier_settings(),
        ));

        let state = Arc::new(AppState {
            repository: repository.clone(),
            key_set: Arc::clone(&key_set),
            gate: Arc::new(AuthorizationGate::new(verifier)),
            page_size: config.page_size,
        });

        // Build routes using casting-service's real route builder
        let app = routes::build_routes(state, metrics_handle());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        let handle = tokio::spawn(async move {
            let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
            if let Err(e) = axum::serve(listener, make_service).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            config,
            repository,
            key_set,
            _handle: handle,
        })
    }

    /// Get the base URL of the test server.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The catalog behind the server, for seeding and inspection.
    pub fn repository(&self) -> &Arc<InMemoryCatalogRepository> {
        &self.repository
    }

    /// The live key set, for reload and rotation tests.
    pub fn key_set(&self) -> &Arc<KeySetCache> {
        &self.key_set
    }

    /// Replace the live keys with exactly `keys`.
    pub fn trust_only(&self, keys: &[&TestKeypair]) {
        let document = crate::crypto_fixtures::jwks_document(keys);
        let key_set = KeySet::from_jwks(document).expect("test keys form a valid key set");
        self.key_set.replace(key_set);
    }

    /// Claims this server accepts: right issuer and audience, no permissions.
    pub fn claims(&self) -> TestClaimsBuilder {
        TestClaimsBuilder::new(TEST_ISSUER, TEST_AUDIENCE)
    }
}

impl Drop for TestCastingServer {
    fn drop(&mut self) {
        // Abort the HTTP server task so each test cleans up immediately.
        self._handle.abort();
    }
}

fn test_config(jwks_url: &str, extra_vars: &[(&str, &str)]) -> Result<Config, anyhow::Error> {
    let mut vars = HashMap::from([
        (
            "DATABASE_URL".to_string(),
            "postgresql://test/test".to_string(),
        ),
        ("BIND_ADDRESS".to_string(), "127.0.0.1:0".to_string()),
        ("JWKS_URL".to_string(), jwks_url.to_string()),
        ("JWT_ISSUER".to_string(), TEST_ISSUER.to_string()),
        ("JWT_AUDIENCE".to_string(), TEST_AUDIENCE.to_string()),
        ("JWKS_FETCH_TIMEOUT_SECONDS".to_string(), "2".to_string()),
    ]);
    for (name, value) in extra_vars {
        vars.insert((*name).to_string(), (*value).to_string());
    }

    Config::from_vars(&vars).map_err(|e| anyhow::anyhow!("Failed to create config: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jwks_server::MockJwksServer;

    #[tokio::test]
    async fn test_server_spawns_successfully() -> Result<(), anyhow::Error> {
        let keypair = TestKeypair::new(1, "key-1");
        let server = TestCastingServer::spawn(&[&keypair]).await?;

        assert!(server.url().starts_with("http://127.0.0.1:"));
        assert_eq!(server.key_set().len(), 1);

        let response = reqwest::get(format!("{}/health", server.url())).await?;
        assert_eq!(response.status(), 200);
        assert_eq!(response.text().await?, "OK");

        Ok(())
    }

    #[tokio::test]
    async fn test_server_loads_keys_from_jwks() -> Result<(), anyhow::Error> {
        let keypair = TestKeypair::new(2, "published");
        let jwks = MockJwksServer::start(&[&keypair]).await;

        let server = TestCastingServer::spawn_with_jwks(&jwks.url(), &[("PAGE_SIZE", "3")]).await?;

        assert!(server.key_set().resolve("published").is_ok());
        assert_eq!(server.config().page_size, 3);
        Ok(())
    }

    #[tokio::test]
    async fn test_spawn_with_jwks_fails_when_endpoint_is_down() {
        let jwks = MockJwksServer::start(&[]).await;
        jwks.fail_with(500).await;

        assert!(TestCastingServer::spawn_with_jwks(&jwks.url(), &[])
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_multiple_servers_different_ports() -> Result<(), anyhow::Error> {
        let server1 = TestCastingServer::spawn_without_keys().await?;
        let server2 = TestCastingServer::spawn_without_keys().await?;

        assert_ne!(server1.addr(), server2.addr());
        Ok(())
    }
}
