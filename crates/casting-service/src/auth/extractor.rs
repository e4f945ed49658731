//! Bearer credential extraction from the `Authorization` header.

use crate::errors::AuthError;
use axum::http::{header::AUTHORIZATION, HeaderMap};

/// Outcome of reading the raw `Authorization` header from a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderValueRead<'a> {
    Absent,
    Text(&'a str),
    /// Present but not visible ASCII.
    Unreadable,
}

/// Read the `Authorization` header as text without interpreting it.
pub fn read_authorization(headers: &HeaderMap) -> HeaderValueRead<'_> {
    match headers.get(AUTHORIZATION) {
        None => HeaderValueRead::Absent,
        Some(value) => match value.to_str() {
            Ok(text) => HeaderValueRead::Text(text),
            Err(_) => HeaderValueRead::Unreadable,
        },
    }
}

/// Extract the bearer credential from an `Authorization` header value.
///
/// The value must be exactly `Bearer <token>`: the scheme is case-sensitive,
/// separated by a single space, and the token is non-empty visible ASCII.
/// The token is returned unmodified.
///
/// # Errors
///
/// - `MissingHeader` - header absent or empty
/// - `MalformedHeader` - any other shape
pub fn extract_bearer_token(header: Option<&str>) -> Result<&str, AuthError> {
    let value = match header {
        None | Some("") => {
            tracing::debug!(target: "casting.auth.extractor", "Missing Authorization header");
            return Err(AuthError::MissingHeader);
        }
        Some(value) => value,
    };

    let mut parts = value.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("Bearer"), Some(token), None)
            if !token.is_empty() && token.bytes().all(|b| b.is_ascii_graphic()) =>
        {
            Ok(token)
        }
        _ => {
            tracing::debug!(target: "casting.auth.extractor", "Invalid Authorization header format");
            Err(AuthError::MalformedHeader)
        }
    }
}
