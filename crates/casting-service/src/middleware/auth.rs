//! Per-route authorization middleware.
//!
//! Each protected route carries its own [`RouteGuard`] naming the operation
//! it serves. The guard runs the authorization gate with that operation's
//! permission and, on success, stores the verified [`ClaimSet`] in request
//! extensions for the handler.

use crate::auth::{AuthorizationGate, ClaimSet, Operation};
use crate::errors::ApiError;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::instrument;

/// Middleware state binding a route to the permission it requires.
#[derive(Clone)]
pub struct RouteGuard {
    pub gate: Arc<AuthorizationGate>,
    pub operation: Operation,
}

impl RouteGuard {
    pub fn new(gate: Arc<AuthorizationGate>, operation: Operation) -> Self {
        Self { gate, operation }
    }
}

/// Authorize the request for the guard's operation.
///
/// # Response
///
/// - 401 with `WWW-Authenticate` for missing or invalid credentials
/// - 400 for a verified token with malformed claims
/// - 403 when the permission is not granted
/// - Otherwise continues to the handler with claims in extensions
#[instrument(skip_all, name = "casting.middleware.authorize")]
pub async fn authorize(
    State(guard): State<RouteGuard>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let required = guard.operation.required_permission();

    let claims = guard
        .gate
        .authorize_headers(req.headers(), required)
        .map_err(|e| {
            tracing::debug!(
                target: "casting.middleware.auth",
                operation = guard.operation.as_str(),
                reason = e.code(),
                "Authorization failed"
            );
            e
        })?;

    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}

/// Extension trait for reading verified claims from a request.
pub trait ClaimsExt {
    /// `None` if the authorization middleware did not run for this request.
    fn claims(&self) -> Option<&ClaimSet>;
}

impl<B> ClaimsExt for axum::http::Request<B> {
    fn claims(&self) -> Option<&ClaimSet> {
        self.extensions().get::<ClaimSet>()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::auth::jwks::{KeyFamily, KeySetCache, SigningKey};
    use crate::auth::jwt::{TokenVerifier, VerifierSettings};
    use axum::{
        body::Body,
        http::{header, Request as HttpRequest, StatusCode},
        middleware,
        routing::get,
        Extension, Router,
    };
    use casting_test_utils::{TestClaimsBuilder, TestKeypair};
    use jsonwebtoken::{Algorithm, DecodingKey};
    use std::time::Duration;
    use tower::ServiceExt;

    const ISSUER: &str = "https://issuer.casting.test/";
    const AUDIENCE: &str = "casting-api";

    fn gate(keypair: &TestKeypair) -> Arc<AuthorizationGate> {
        let key = SigningKey::new(
            keypair.kid.clone(),
            KeyFamily::Ed25519,
            Some(Algorithm::EdDSA),
            DecodingKey::from_ed_der(&keypair.public_key_bytes),
        );
        let verifier = TokenVerifier::new(
            Arc::new(KeySetCache::from_keys([key])),
            VerifierSettings {
                issuer: ISSUER.to_string(),
                audience: AUDIENCE.to_string(),
                allowed_algorithms: vec![Algorithm::EdDSA],
                clock_skew: Duration::from_secs(300),
            },
        );
        Arc::new(AuthorizationGate::new(Arc::new(verifier)))
    }

    async fn whoami(Extension(claims): Extension<ClaimSet>) -> String {
        claims.sub
    }

    fn app(keypair: &TestKeypair) -> Router {
        Router::new().route(
            "/works",
            get(whoami).route_layer(middleware::from_fn_with_state(
                RouteGuard::new(gate(keypair), Operation::ListWorks),
                authorize,
            )),
        )
    }

    fn request(authorization: Option<String>) -> HttpRequest<Body> {
        let mut builder = HttpRequest::builder().uri("/works");
        if let Some(value) = authorization {
            builder = builder.header(header::AUTHORIZATION, value);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn test_route_guard_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<RouteGuard>();
    }

    #[tokio::test]
    async fn test_authorized_request_reaches_handler_with_claims() {
        let keypair = TestKeypair::new(40, "mw-key");
        let token = keypair.sign(
            &TestClaimsBuilder::new(ISSUER, AUDIENCE)
                .subject("auth0|carol")
                .permissions(&["read:works"])
                .build(),
        );

        let response = app(&keypair)
            .oneshot(request(Some(format!("Bearer {token}"))))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = http_body_util::BodyExt::collect(response.into_body())
            .await
            .unwrap()
            .to_bytes();
        assert_eq!(body.as_ref(), b"auth0|carol");
    }

    #[tokio::test]
    async fn test_missing_header_is_401_with_challenge() {
        let keypair = TestKeypair::new(41, "mw-key");
        let response = app(&keypair).oneshot(request(None)).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().contains_key(header::WWW_AUTHENTICATE));
    }

    #[tokio::test]
    async fn test_wrong_permission_is_403() {
        let keypair = TestKeypair::new(42, "mw-key");
        let token = keypair.sign(
            &TestClaimsBuilder::new(ISSUER, AUDIENCE)
                .permissions(&["read:performers"])
                .build(),
        );

        let response = app(&keypair)
            .oneshot(request(Some(format!("Bearer {token}"))))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    async fn granted(req: Request) -> String {
        req.claims()
            .map(|claims| {
                claims
                    .permissions
                    .iter()
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(",")
            })
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn test_claims_ext_reads_claims_set_by_middleware() {
        let keypair = TestKeypair::new(43, "mw-key");
        let app = Router::new().route(
            "/works",
            get(granted).route_layer(middleware::from_fn_with_state(
                RouteGuard::new(gate(&keypair), Operation::ListWorks),
                authorize,
            )),
        );
        let token = keypair.sign(
            &TestClaimsBuilder::new(ISSUER, AUDIENCE)
                .permissions(&["read:works", "modify:works"])
                .build(),
        );

        let response = app
            .oneshot(request(Some(format!("Bearer {token}"))))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = http_body_util::BodyExt::collect(response.into_body())
            .await
            .unwrap()
            .to_bytes();
        assert_eq!(body.as_ref(), b"modify:works,read:works");
    }

    #[test]
    fn test_claims_ext_without_middleware() {
        let req = HttpRequest::builder().body(()).unwrap();
        assert!(req.claims().is_none());
    }
}
