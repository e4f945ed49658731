//! Metrics definitions for the casting service.
//!
//! All metrics follow Prometheus naming conventions:
//! - `casting_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded to prevent cardinality explosion:
//! - `method`: 7 values max (GET, POST, PATCH, DELETE, PUT, HEAD, OPTIONS)
//! - `endpoint`: parameterized paths (ids replaced by `{id}`)
//! - `status`: 3 values (success, error, timeout)
//! - `outcome`: granted, denied
//! - `reason`: `AuthError` codes plus `none`
//! - `stage`: 4 gate stages
//! - `operation`: bounded by repository methods

use crate::auth::gate::GateStage;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize the Prometheus recorder and return the handle used by the
/// `/metrics` endpoint.
///
/// Must be called before any metrics are recorded.
///
/// # Errors
///
/// Returns error if the recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("casting_http_request".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.150, 0.200, 0.300, 0.500, 1.000, 2.000,
            ],
        )
        .map_err(|e| format!("Failed to set HTTP request buckets: {e}"))?
        // Verification is CPU-only; sub-millisecond resolution matters here
        .set_buckets_for_metric(
            Matcher::Prefix("casting_authorization".to_string()),
            &[0.0001, 0.00025, 0.0005, 0.001, 0.0025, 0.005, 0.010, 0.025],
        )
        .map_err(|e| format!("Failed to set authorization buckets: {e}"))?
        .set_buckets_for_metric(
            Matcher::Prefix("casting_jwks_reload".to_string()),
            &[0.010, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000, 10.000],
        )
        .map_err(|e| format!("Failed to set JWKS reload buckets: {e}"))?
        .set_buckets_for_metric(
            Matcher::Prefix("casting_db_query".to_string()),
            &[
                0.001, 0.002, 0.005, 0.010, 0.020, 0.050, 0.100, 0.250, 0.500, 1.000,
            ],
        )
        .map_err(|e| format!("Failed to set DB query buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// HTTP Request Metrics
// ============================================================================

/// Record HTTP request completion
///
/// Metric: `casting_http_requests_total`, `casting_http_request_duration_seconds`
/// Labels: `method`, `endpoint`, `status`
pub fn record_http_request(method: &str, endpoint: &str, status_code: u16, duration: Duration) {
    let normalized_endpoint = normalize_endpoint(endpoint);
    let status = categorize_status_code(status_code);

    histogram!("casting_http_request_duration_seconds",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint.clone(),
        "status" => status.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("casting_http_requests_total",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

/// Categorize HTTP status code into success/error/timeout
fn categorize_status_code(status_code: u16) -> &'static str {
    match status_code {
        200..=299 => "success",
        408 | 504 => "timeout",
        _ => "error",
    }
}

/// Normalize endpoint path to prevent label cardinality explosion.
///
/// Numeric path segments become `{id}`; unknown roots become `/other`.
fn normalize_endpoint(path: &str) -> String {
    match path {
        "/health" | "/ready" | "/metrics" | "/performers" | "/works" => path.to_string(),
        _ => normalize_dynamic_endpoint(path),
    }
}

fn normalize_dynamic_endpoint(path: &str) -> String {
    let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();

    match segments.as_slice() {
        ["performers", _] => "/performers/{id}".to_string(),
        ["works", _] => "/works/{id}".to_string(),
        ["works", _, "cast"] => "/works/{id}/cast".to_string(),
        _ => "/other".to_string(),
    }
}

// ============================================================================
// Authorization Metrics
// ============================================================================

/// Record one pass through the authorization gate.
///
/// Metric: `casting_authorization_total`, `casting_authorization_duration_seconds`
/// Labels: `outcome`, `reason`, `stage`
pub fn record_authorization(outcome: &str, reason: &str, stage: GateStage, duration: Duration) {
    histogram!("casting_authorization_duration_seconds",
        "outcome" => outcome.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("casting_authorization_total",
        "outcome" => outcome.to_string(),
        "reason" => reason.to_string(),
        "stage" => stage.as_str()
    )
    .increment(1);
}

// ============================================================================
// Key Set Metrics
// ============================================================================

/// Record a key set reload attempt.
///
/// Metric: `casting_jwks_reload_total`, `casting_jwks_reload_duration_seconds`
/// Labels: `status`
pub fn record_jwks_reload(status: &str, duration: Duration) {
    histogram!("casting_jwks_reload_duration_seconds").record(duration.as_secs_f64());

    counter!("casting_jwks_reload_total",
        "status" => status.to_string()
    )
    .increment(1);
}

/// Set the number of live verification keys.
///
/// Metric: `casting_jwks_keys`
#[allow(clippy::cast_precision_loss)] // key counts are tiny
pub fn set_jwks_keys(count: usize) {
    gauge!("casting_jwks_keys").set(count as f64);
}

// ============================================================================
// Database Metrics
// ============================================================================

/// Record a repository query.
///
/// Metric: `casting_db_query_duration_seconds`, `casting_db_queries_total`
/// Labels: `operation`, `status`
pub fn record_db_query(operation: &str, status: &str, duration: Duration) {
    histogram!("casting_db_query_duration_seconds",
        "operation" => operation.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("casting_db_queries_total",
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}
