//! Health check handlers.
//!
//! - `/health`: Liveness probe - returns OK if the process is running
//! - `/ready`: Readiness probe - checks the database and the signing-key set

use crate::routes::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;
use std::sync::Arc;

/// Readiness probe body.
#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    pub status: &'static str,
    pub database: &'static str,
    pub signing_keys: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'static str>,
}

/// Liveness probe handler.
///
/// Does NOT check any dependencies; failure means the process is hung.
pub async fn health_check() -> &'static str {
    "OK"
}

/// Readiness probe handler.
///
/// Returns 200 when the database answers and at least one verification key
/// is loaded, 503 otherwise. Without keys every protected request would be
/// rejected, so the instance should not receive traffic.
#[tracing::instrument(skip_all, name = "casting.health.readiness")]
pub async fn readiness_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let signing_keys = state.key_set.len();

    let database = match state.repository.ping().await {
        Ok(()) => "healthy",
        Err(e) => {
            tracing::warn!(target: "casting.health", error = %e, "Readiness check failed: database error");
            "unhealthy"
        }
    };

    if signing_keys == 0 {
        tracing::warn!(target: "casting.health", "Readiness check failed: no signing keys loaded");
    }

    let ready = database == "healthy" && signing_keys > 0;
    let (status, body) = if ready {
        (
            StatusCode::OK,
            ReadinessResponse {
                status: "ready",
                database,
                signing_keys,
                error: None,
            },
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            ReadinessResponse {
                status: "not_ready",
                database,
                signing_keys,
                // Generic error - don't leak infrastructure details
                error: Some("Service dependencies unavailable"),
            },
        )
    };

    (status, Json(body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health_check_returns_ok() {
        assert_eq!(health_check().await, "OK");
    }

    #[test]
    fn test_readiness_response_omits_empty_error() {
        let body = ReadinessResponse {
            status: "ready",
            database: "healthy",
            signing_keys: 2,
            error: None,
        };
        let json = serde_json::to_value(&body).unwrap_or_default();
        assert_eq!(json["status"], "ready");
        assert!(json.get("error").is_none());
    }
}
