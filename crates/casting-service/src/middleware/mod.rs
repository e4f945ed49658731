//! HTTP middleware for the casting service.

pub mod auth;
pub mod http_metrics;

pub use auth::{authorize, ClaimsExt, RouteGuard};
pub use http_metrics::http_metrics_middleware;
