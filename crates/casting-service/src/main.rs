//! Casting Service
//!
//! Entry point for the casting catalog resource server.

use casting_service::auth::{AuthorizationGate, KeySetCache, TokenVerifier};
use casting_service::config::Config;
use casting_service::observability::metrics::init_metrics_recorder;
use casting_service::repositories::PgCatalogRepository;
use casting_service::routes::{self, AppState};
use casting_service::tasks::{start_key_set_refresh, start_sighup_reload};
use common::secret::ExposeSecret;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    info!("Starting Casting Service");

    // Load configuration
    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        bind_address = %config.bind_address,
        jwks_url = %config.jwks_url,
        jwt_issuer = %config.jwt_issuer,
        jwt_audience = %config.jwt_audience,
        page_size = config.page_size,
        "Configuration loaded successfully"
    );

    let metrics_handle = init_metrics_recorder().map_err(|e| {
        error!("Failed to initialize metrics recorder: {}", e);
        e
    })?;

    // Initialize database connection pool with query timeout
    info!("Connecting to database...");
    let db_url_with_timeout = add_query_timeout(config.database_url.expose_secret(), 5);
    let db_pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(5))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(&db_url_with_timeout)
        .await
        .map_err(|e| {
            error!("Failed to connect to database: {}", e);
            e
        })?;

    sqlx::migrate!("../../migrations")
        .run(&db_pool)
        .await
        .map_err(|e| {
            error!("Failed to run database migrations: {}", e);
            e
        })?;

    info!("Database connection established");

    // The service cannot authorize anything without keys; refuse to start.
    let key_set = Arc::new(KeySetCache::new(
        config.jwks_url.clone(),
        config.jwks_fetch_timeout,
    ));
    let key_count = key_set.reload().await.map_err(|e| {
        error!("Initial key set load failed: {}", e);
        e
    })?;
    info!(key_count, "Verification keys loaded");

    let verifier = Arc::new(TokenVerifier::new(
        Arc::clone(&key_set),
        config.verifier_settings(),
    ));

    let state = Arc::new(AppState {
        repository: Arc::new(PgCatalogRepository::new(db_pool)),
        key_set: Arc::clone(&key_set),
        gate: Arc::new(AuthorizationGate::new(verifier)),
        page_size: config.page_size,
    });

    // Background key set reloads
    let cancel_token = CancellationToken::new();
    tokio::spawn(start_sighup_reload(
        Arc::clone(&key_set),
        cancel_token.clone(),
    ));
    match config.jwks_refresh_interval {
        Some(period) => {
            tokio::spawn(start_key_set_refresh(
                Arc::clone(&key_set),
                period,
                cancel_token.clone(),
            ));
        }
        None => info!("Periodic key set refresh disabled"),
    }

    let app = routes::build_routes(state, metrics_handle);

    let addr: SocketAddr = config.bind_address.parse().map_err(|e| {
        error!("Invalid bind address: {}", e);
        e
    })?;

    info!("Casting Service listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    cancel_token.cancel();

    info!("Casting Service shutdown complete");

    Ok(())
}

/// Text output by default; `LOG_FORMAT=json` switches to JSON lines.
fn init_tracing() {
    let json = std::env::var("LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "casting_service=debug,tower_http=debug".into()),
        )
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(tracing_subscriber::fmt::layer))
        .init();
}

/// Listens for shutdown signals (SIGTERM, SIGINT).
/// Returns when a shutdown signal is received and drain period is complete.
async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, starting graceful shutdown..."),
            Err(e) => error!("Failed to listen for SIGINT: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, starting graceful shutdown...");
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    let drain_secs: u64 = std::env::var("CASTING_DRAIN_SECONDS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(30);

    if drain_secs > 0 {
        warn!("Draining connections for {} seconds...", drain_secs);
        tokio::time::sleep(Duration::from_secs(drain_secs)).await;
        info!("Drain period complete");
    } else {
        info!("Skipping drain period (CASTING_DRAIN_SECONDS=0)");
    }
}

/// Appends a `statement_timeout` so queries cannot hang indefinitely.
fn add_query_timeout(url: &str, timeout_secs: u32) -> String {
    let separator = if url.contains('?') { '&' } else { '?' };
    format!(
        "{}{}options=-c%20statement_timeout%3D{}s",
        url, separator, timeout_secs
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_query_timeout_separator() {
        assert_eq!(
            add_query_timeout("postgres://db/casting", 5),
            "postgres://db/casting?options=-c%20statement_timeout%3D5s"
        );
        assert_eq!(
            add_query_timeout("postgres://db/casting?sslmode=require", 5),
            "postgres://db/casting?sslmode=require&options=-c%20statement_timeout%3D5s"
        );
    }
}
