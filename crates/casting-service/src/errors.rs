//! Casting service error types.
//!
//! `AuthError` is the closed taxonomy produced by the authorization gate.
//! `ApiError` is what handlers return; it wraps `AuthError` and adds the
//! resource-layer failures. Every `ApiError` maps to an HTTP status through
//! its `IntoResponse` impl. Client-facing messages never contain credentials,
//! key material or database details; the real cause is logged server-side.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// `WWW-Authenticate` challenge attached to every 401 response.
const BEARER_CHALLENGE: &str = "Bearer realm=\"casting-api\", error=\"invalid_token\"";

/// Reasons the authorization gate rejects a request.
///
/// Each kind has a stable reason code (`code()`) used in response bodies and
/// metric labels, and a fixed HTTP status (`status_code()`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Authorization header is expected")]
    MissingHeader,

    #[error("Authorization header must be in the format 'Bearer <token>'")]
    MalformedHeader,

    #[error("Token is malformed")]
    MalformedToken,

    #[error("Token signing algorithm is not accepted")]
    UnsupportedAlgorithm,

    #[error("Token signature could not be verified")]
    InvalidSignature,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Token is not yet valid")]
    TokenNotYetValid,

    #[error("Token issuer is not trusted")]
    InvalidIssuer,

    #[error("Token audience does not include this service")]
    InvalidAudience,

    #[error("Token claims are malformed")]
    MalformedClaims,

    #[error("Permission not granted")]
    InsufficientPermission,
}

impl AuthError {
    /// Stable machine-readable reason code.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::MissingHeader => "MISSING_HEADER",
            AuthError::MalformedHeader => "MALFORMED_HEADER",
            AuthError::MalformedToken => "MALFORMED_TOKEN",
            AuthError::UnsupportedAlgorithm => "UNSUPPORTED_ALGORITHM",
            AuthError::InvalidSignature => "INVALID_SIGNATURE",
            AuthError::TokenExpired => "TOKEN_EXPIRED",
            AuthError::TokenNotYetValid => "TOKEN_NOT_YET_VALID",
            AuthError::InvalidIssuer => "INVALID_ISSUER",
            AuthError::InvalidAudience => "INVALID_AUDIENCE",
            AuthError::MalformedClaims => "MALFORMED_CLAIMS",
            AuthError::InsufficientPermission => "INSUFFICIENT_PERMISSION",
        }
    }

    /// HTTP status for this rejection.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::MalformedClaims => StatusCode::BAD_REQUEST,
            AuthError::InsufficientPermission => StatusCode::FORBIDDEN,
            _ => StatusCode::UNAUTHORIZED,
        }
    }
}

/// Casting service API error type.
///
/// Maps to HTTP status codes:
/// - Auth: per `AuthError::status_code` (400, 401 or 403)
/// - BadRequest: 400
/// - NotFound: 404
/// - Conflict: 409
/// - Unprocessable: 422
/// - Database, Internal: 500
/// - ServiceUnavailable: 503
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unprocessable: {0}")]
    Unprocessable(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error")]
    Internal,

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl ApiError {
    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Auth(err) => err.status_code(),
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Database(_) | ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    error: u16,
    code: &'static str,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let (code, message) = match &self {
            ApiError::Auth(err) => (err.code(), err.to_string()),
            ApiError::BadRequest(reason) => ("BAD_REQUEST", reason.clone()),
            ApiError::NotFound(resource) => ("NOT_FOUND", resource.clone()),
            ApiError::Conflict(reason) => ("CONFLICT", reason.clone()),
            ApiError::Unprocessable(reason) => ("UNPROCESSABLE", reason.clone()),
            ApiError::Database(err) => {
                // Log actual error server-side, return generic message to client
                tracing::error!(target: "casting.database", error = %err, "Database operation failed");
                (
                    "DATABASE_ERROR",
                    "An internal database error occurred".to_string(),
                )
            }
            ApiError::Internal => ("INTERNAL_ERROR", "An internal error occurred".to_string()),
            ApiError::ServiceUnavailable(reason) => {
                tracing::warn!(target: "casting.availability", reason = %reason, "Service unavailable");
                (
                    "SERVICE_UNAVAILABLE",
                    "Service temporarily unavailable".to_string(),
                )
            }
        };

        let body = ErrorResponse {
            success: false,
            error: status.as_u16(),
            code,
            message,
        };

        let mut response = (status, Json(body)).into_response();

        if status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                HeaderValue::from_static(BEARER_CHALLENGE),
            );
        }

        response
    }
}

/// Convert sqlx errors to `ApiError`.
///
/// Unique and foreign-key violations become client errors; anything else is
/// a database failure.
impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            match db_err.code().as_deref() {
                Some("23505") => {
                    return ApiError::Conflict("Resource already exists".to_string());
                }
                Some("23503") => {
                    return ApiError::NotFound("Referenced resource not found".to_string());
                }
                _ => {}
            }
        }
        ApiError::Database(err.to_string())
    }
}
