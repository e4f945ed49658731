//! HTTP routes for the casting service.
//!
//! Defines the Axum router and application state.

use crate::auth::{AuthorizationGate, KeySetCache, Operation};
use crate::handlers;
use crate::middleware::{authorize, http_metrics_middleware, RouteGuard};
use crate::repositories::CatalogRepository;
use axum::{
    http::{header, Method},
    middleware,
    routing::{delete, get, patch, post, MethodRouter},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Catalog storage.
    pub repository: Arc<dyn CatalogRepository>,

    /// Verification keys, shared with the token verifier and reload tasks.
    pub key_set: Arc<KeySetCache>,

    /// Authorization gate used by every protected route.
    pub gate: Arc<AuthorizationGate>,

    /// Rows per listing page.
    pub page_size: u32,
}

/// Wrap `route` so it only runs for callers holding `operation`'s permission.
fn guarded(
    gate: &Arc<AuthorizationGate>,
    operation: Operation,
    route: MethodRouter<Arc<AppState>>,
) -> MethodRouter<Arc<AppState>> {
    route.route_layer(middleware::from_fn_with_state(
        RouteGuard::new(Arc::clone(gate), operation),
        authorize,
    ))
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `/health` - Liveness probe (simple "OK") - public
/// - `/ready` - Readiness probe (database + key set) - public
/// - `/metrics` - Prometheus metrics endpoint - public
/// - `/performers`, `/works` and `/works/:id/cast` - each method guarded by
///   exactly one permission
/// - CORS, TraceLayer, a 30 second request timeout and HTTP metrics
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let gate = Arc::clone(&state.gate);

    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .with_state(state.clone());

    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    let performer_routes = Router::new()
        .route(
            "/performers",
            guarded(
                &gate,
                Operation::ListPerformers,
                get(handlers::list_performers),
            ),
        )
        .route(
            "/performers",
            guarded(
                &gate,
                Operation::CreatePerformer,
                post(handlers::create_performer),
            ),
        )
        .route(
            "/performers/:id",
            guarded(&gate, Operation::GetPerformer, get(handlers::get_performer)),
        )
        .route(
            "/performers/:id",
            guarded(
                &gate,
                Operation::ModifyPerformer,
                patch(handlers::update_performer),
            ),
        )
        .route(
            "/performers/:id",
            guarded(
                &gate,
                Operation::RemovePerformer,
                delete(handlers::delete_performer),
            ),
        );

    let work_routes = Router::new()
        .route(
            "/works",
            guarded(&gate, Operation::ListWorks, get(handlers::list_works)),
        )
        .route(
            "/works",
            guarded(&gate, Operation::CreateWork, post(handlers::create_work)),
        )
        .route(
            "/works/:id",
            guarded(&gate, Operation::GetWork, get(handlers::get_work)),
        )
        .route(
            "/works/:id",
            guarded(&gate, Operation::ModifyWork, patch(handlers::update_work)),
        )
        .route(
            "/works/:id",
            guarded(&gate, Operation::RemoveWork, delete(handlers::delete_work)),
        )
        .route(
            "/works/:id/cast",
            guarded(&gate, Operation::ListCast, get(handlers::list_cast)),
        )
        .route(
            "/works/:id/cast",
            guarded(
                &gate,
                Operation::AddCastMember,
                post(handlers::add_cast_member),
            ),
        );

    let protected_routes = performer_routes.merge(work_routes).with_state(state);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_methods([
            Method::GET,
            Method::PATCH,
            Method::POST,
            Method::DELETE,
            Method::OPTIONS,
        ]);

    // Layer order (bottom-to-top execution):
    // 1. TimeoutLayer - Timeout the request (innermost)
    // 2. TraceLayer - Log request details
    // 3. CorsLayer - Answer preflights before auth runs
    // 4. http_metrics_middleware - Record ALL responses (outermost)
    public_routes
        .merge(metrics_routes)
        .merge(protected_routes)
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(middleware::from_fn(http_metrics_middleware))
}
