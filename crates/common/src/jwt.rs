//! JWT structural utilities shared across the casting catalog crates.
//!
//! This module provides the parts of JWT handling that do not depend on
//! key material:
//! - Size limits for DoS prevention
//! - Clock skew constants for iat validation
//! - Compact-serialization decoding (three base64url segments, JSON objects)
//! - iat validation logic
//!
//! Signature verification and claim validation live in the service crate,
//! which owns the key set.
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - Decoding a token does NOT verify it; the signature must still be checked
//!   against a trusted key before any claim is believed
//! - Error values never carry token content
//!
//! # Usage
//!
//! ```rust,ignore
//! use common::jwt::{decode_token, validate_iat_at, DEFAULT_CLOCK_SKEW};
//!
//! let decoded = decode_token(token)?;
//! let alg = decoded.header_str("alg");
//! let kid = decoded.header_str("kid");
//!
//! // After signature verification, validate iat
//! validate_iat_at(iat, DEFAULT_CLOCK_SKEW, now)?;
//! ```

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde_json::{Map, Value};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Maximum allowed JWT size in bytes (8KB).
///
/// JWTs larger than this size are rejected BEFORE any base64 decoding, JSON
/// parsing, or cryptographic operation.
///
/// Typical access tokens are well under 2KB even with a long permission list,
/// so 8KB leaves room for growth while bounding per-request work.
pub const MAX_JWT_SIZE_BYTES: usize = 8192; // 8KB

/// Default JWT clock skew tolerance (5 minutes per NIST SP 800-63B).
///
/// Tokens with `iat` (issued-at) timestamps more than this amount in the
/// future are rejected.
pub const DEFAULT_CLOCK_SKEW: Duration = Duration::from_secs(300);

/// Maximum allowed JWT clock skew tolerance (10 minutes).
///
/// Guards against configuration that would make the iat check meaningless.
pub const MAX_CLOCK_SKEW: Duration = Duration::from_secs(600);

// =============================================================================
// Error Types
// =============================================================================

/// The three parts of a compact JWT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment {
    Header,
    Payload,
    Signature,
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Header => f.write_str("header"),
            Segment::Payload => f.write_str("payload"),
            Segment::Signature => f.write_str("signature"),
        }
    }
}

/// Errors that can occur while decoding or time-checking a JWT.
///
/// Messages describe the structural problem only; they never include the
/// token or any decoded claim value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JwtValidationError {
    /// Token size exceeds maximum allowed.
    #[error("token exceeds the maximum allowed size")]
    TokenTooLarge,

    /// Token does not have exactly three dot-separated segments.
    #[error("token must have 3 segments, found {0}")]
    WrongSegmentCount(usize),

    /// A segment is not valid unpadded base64url.
    #[error("token {0} segment is not valid base64url")]
    InvalidEncoding(Segment),

    /// The header or payload does not decode to a JSON object.
    #[error("token {0} segment is not a JSON object")]
    NotJsonObject(Segment),

    /// Token `iat` claim is too far in the future.
    #[error("token iat is too far in the future")]
    IatTooFarInFuture,
}

// =============================================================================
// Decoded token
// =============================================================================

/// A structurally valid but UNVERIFIED compact JWT.
///
/// Holds the decoded header and payload objects plus borrowed views of the
/// signing input (`header.payload`) and the base64url signature, which is
/// everything a verifier needs.
pub struct DecodedToken<'a> {
    /// Decoded JOSE header.
    pub header: Map<String, Value>,

    /// Decoded claims object.
    pub payload: Map<String, Value>,

    signing_input: &'a str,
    signature: &'a str,
}

impl<'a> DecodedToken<'a> {
    /// The bytes covered by the signature: `base64url(header) "." base64url(payload)`.
    #[must_use]
    pub fn signing_input(&self) -> &'a str {
        self.signing_input
    }

    /// The base64url-encoded signature segment.
    #[must_use]
    pub fn signature(&self) -> &'a str {
        self.signature
    }

    /// Look up a string-valued header parameter.
    #[must_use]
    pub fn header_str(&self, name: &str) -> Option<&str> {
        self.header.get(name).and_then(Value::as_str)
    }
}

/// Only header parameter names and payload claim names are shown; values can
/// carry subject identifiers.
impl fmt::Debug for DecodedToken<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodedToken")
            .field("header", &self.header.keys().collect::<Vec<_>>())
            .field("payload", &self.payload.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Functions
// =============================================================================

/// Decode a compact JWT into its header, payload and signature parts.
///
/// This does NOT verify the signature. The result must only be used to pick
/// a key and algorithm; claims must not be trusted until the signature over
/// [`DecodedToken::signing_input`] has been checked.
///
/// # Errors
///
/// - `TokenTooLarge` - token exceeds [`MAX_JWT_SIZE_BYTES`]
/// - `WrongSegmentCount` - not exactly three dot-separated segments
/// - `InvalidEncoding` - a segment is not valid unpadded base64url
/// - `NotJsonObject` - header or payload is not a JSON object
pub fn decode_token(token: &str) -> Result<DecodedToken<'_>, JwtValidationError> {
    // Check token size first (DoS prevention)
    if token.len() > MAX_JWT_SIZE_BYTES {
        tracing::debug!(
            target: "common.jwt",
            token_size = token.len(),
            max_size = MAX_JWT_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(JwtValidationError::TokenTooLarge);
    }

    let segment_count = token.split('.').count();
    if segment_count != 3 {
        tracing::debug!(
            target: "common.jwt",
            parts = segment_count,
            "Token rejected: invalid JWT format"
        );
        return Err(JwtValidationError::WrongSegmentCount(segment_count));
    }

    let (signing_input, signature) = token
        .rsplit_once('.')
        .ok_or(JwtValidationError::WrongSegmentCount(segment_count))?;
    let (header_b64, payload_b64) = signing_input
        .split_once('.')
        .ok_or(JwtValidationError::WrongSegmentCount(segment_count))?;

    let header = decode_json_object(header_b64, Segment::Header)?;
    let payload = decode_json_object(payload_b64, Segment::Payload)?;

    URL_SAFE_NO_PAD.decode(signature).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to decode JWT signature base64");
        JwtValidationError::InvalidEncoding(Segment::Signature)
    })?;

    Ok(DecodedToken {
        header,
        payload,
        signing_input,
        signature,
    })
}

fn decode_json_object(
    encoded: &str,
    segment: Segment,
) -> Result<Map<String, Value>, JwtValidationError> {
    let bytes = URL_SAFE_NO_PAD.decode(encoded).map_err(|e| {
        tracing::debug!(target: "common.jwt", %segment, error = %e, "Failed to decode JWT segment base64");
        JwtValidationError::InvalidEncoding(segment)
    })?;

    match serde_json::from_slice::<Value>(&bytes) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => {
            tracing::debug!(target: "common.jwt", %segment, "JWT segment is JSON but not an object");
            Err(JwtValidationError::NotJsonObject(segment))
        }
        Err(e) => {
            tracing::debug!(target: "common.jwt", %segment, error = %e, "Failed to parse JWT segment JSON");
            Err(JwtValidationError::NotJsonObject(segment))
        }
    }
}

/// Validate the `iat` (issued-at) claim against `now` with clock skew tolerance.
///
/// Rejects tokens with `iat` too far in the future, which could indicate:
/// - Token pre-generation attack
/// - Clock synchronization issues
/// - Token manipulation
///
/// # Errors
///
/// Returns `JwtValidationError::IatTooFarInFuture` if `iat > now + clock_skew`.
pub fn validate_iat_at(iat: i64, clock_skew: Duration, now: i64) -> Result<(), JwtValidationError> {
    // Safe cast: clock_skew is bounded to MAX_CLOCK_SKEW (600 seconds), well within i64 range
    #[allow(clippy::cast_possible_wrap)]
    let clock_skew_secs = clock_skew.as_secs() as i64;
    let max_iat = now.saturating_add(clock_skew_secs);

    if iat > max_iat {
        tracing::debug!(
            target: "common.jwt",
            iat = iat,
            now = now,
            max_allowed = max_iat,
            clock_skew_secs = clock_skew_secs,
            "Token rejected: iat too far in the future"
        );
        return Err(JwtValidationError::IatTooFarInFuture);
    }

    Ok(())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::cast_possible_wrap)]
mod tests {
    use super::*;

    fn encode(json: &str) -> String {
        URL_SAFE_NO_PAD.encode(json.as_bytes())
    }

    fn token(header: &str, payload: &str, signature: &str) -> String {
        format!("{}.{}.{}", encode(header), encode(payload), signature)
    }

    // -------------------------------------------------------------------------
    // Constants Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_max_jwt_size_is_8kb() {
        assert_eq!(MAX_JWT_SIZE_BYTES, 8192);
    }

    #[test]
    fn test_default_clock_skew_is_5_minutes() {
        assert_eq!(DEFAULT_CLOCK_SKEW, Duration::from_secs(300));
    }

    #[test]
    fn test_max_clock_skew_is_10_minutes() {
        assert_eq!(MAX_CLOCK_SKEW, Duration::from_secs(600));
    }

    // -------------------------------------------------------------------------
    // decode_token Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_decode_token_valid() {
        let raw = token(
            r#"{"alg":"EdDSA","typ":"JWT","kid":"key-01"}"#,
            r#"{"sub":"auth0|abc","permissions":["read:works"]}"#,
            "c2lnbmF0dXJl",
        );

        let decoded = decode_token(&raw).unwrap();

        assert_eq!(decoded.header_str("alg"), Some("EdDSA"));
        assert_eq!(decoded.header_str("kid"), Some("key-01"));
        assert_eq!(
            decoded.payload.get("sub").and_then(Value::as_str),
            Some("auth0|abc")
        );
        assert_eq!(decoded.signature(), "c2lnbmF0dXJl");

        let (expected_input, _) = raw.rsplit_once('.').unwrap();
        assert_eq!(decoded.signing_input(), expected_input);
    }

    #[test]
    fn test_decode_token_allows_empty_signature() {
        // Structure is fine; rejecting unsigned tokens is the verifier's job.
        let raw = token(r#"{"alg":"none"}"#, r#"{"sub":"x"}"#, "");
        let decoded = decode_token(&raw).unwrap();
        assert_eq!(decoded.signature(), "");
    }

    #[test]
    fn test_decode_token_wrong_segment_count() {
        assert_eq!(
            decode_token("only.two").unwrap_err(),
            JwtValidationError::WrongSegmentCount(2)
        );
        assert_eq!(
            decode_token("a.b.c.d").unwrap_err(),
            JwtValidationError::WrongSegmentCount(4)
        );
        assert_eq!(
            decode_token("single").unwrap_err(),
            JwtValidationError::WrongSegmentCount(1)
        );
    }

    #[test]
    fn test_decode_token_empty_string() {
        assert_eq!(
            decode_token("").unwrap_err(),
            JwtValidationError::WrongSegmentCount(1)
        );
    }

    #[test]
    fn test_decode_token_invalid_base64_header() {
        let result = decode_token("!!!invalid!!!.payload.signature");
        assert_eq!(
            result.unwrap_err(),
            JwtValidationError::InvalidEncoding(Segment::Header)
        );
    }

    #[test]
    fn test_decode_token_padded_base64_rejected() {
        // JWTs use unpadded base64url; '=' padding is not valid in a segment.
        let header = format!("{}==", encode(r#"{"alg":"EdDSA"}"#));
        let raw = format!("{}.{}.sig", header, encode("{}"));
        assert!(matches!(
            decode_token(&raw),
            Err(JwtValidationError::InvalidEncoding(Segment::Header))
        ));
    }

    #[test]
    fn test_decode_token_header_not_json() {
        let raw = format!("{}.{}.sig", encode("not-json"), encode("{}"));
        assert_eq!(
            decode_token(&raw).unwrap_err(),
            JwtValidationError::NotJsonObject(Segment::Header)
        );
    }

    #[test]
    fn test_decode_token_payload_json_array() {
        let raw = format!("{}.{}.sig", encode(r#"{"alg":"EdDSA"}"#), encode("[1,2,3]"));
        assert_eq!(
            decode_token(&raw).unwrap_err(),
            JwtValidationError::NotJsonObject(Segment::Payload)
        );
    }

    #[test]
    fn test_decode_token_invalid_signature_encoding() {
        let raw = token(r#"{"alg":"EdDSA"}"#, "{}", "not*base64");
        assert_eq!(
            decode_token(&raw).unwrap_err(),
            JwtValidationError::InvalidEncoding(Segment::Signature)
        );
    }

    #[test]
    fn test_decode_token_garbage_segments() {
        // "abc" and "def" are decodable base64url but not JSON.
        assert!(matches!(
            decode_token("abc.def.ghi"),
            Err(JwtValidationError::NotJsonObject(Segment::Header))
        ));
    }

    #[test]
    fn test_decode_token_oversized_token() {
        let raw = "a".repeat(MAX_JWT_SIZE_BYTES + 1);
        assert_eq!(
            decode_token(&raw).unwrap_err(),
            JwtValidationError::TokenTooLarge
        );
    }

    #[test]
    fn test_decode_token_at_size_limit_reaches_parsing() {
        // Exactly at the limit passes the size check and fails on structure.
        let raw = "a".repeat(MAX_JWT_SIZE_BYTES);
        assert_eq!(
            decode_token(&raw).unwrap_err(),
            JwtValidationError::WrongSegmentCount(1)
        );
    }

    #[test]
    fn test_decoded_token_debug_hides_claim_values() {
        let raw = token(
            r#"{"alg":"EdDSA","kid":"key-01"}"#,
            r#"{"sub":"secret-subject"}"#,
            "c2ln",
        );
        let decoded = decode_token(&raw).unwrap();
        let debug_str = format!("{decoded:?}");

        assert!(debug_str.contains("sub"));
        assert!(!debug_str.contains("secret-subject"));
    }

    // -------------------------------------------------------------------------
    // validate_iat_at Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_validate_iat_current_time() {
        let now = 1_700_000_000;
        assert!(validate_iat_at(now, DEFAULT_CLOCK_SKEW, now).is_ok());
    }

    #[test]
    fn test_validate_iat_past_time() {
        let now = 1_700_000_000;
        assert!(validate_iat_at(now - 3600, DEFAULT_CLOCK_SKEW, now).is_ok());
    }

    #[test]
    fn test_validate_iat_at_skew_boundary() {
        let now = 1_700_000_000;
        let skew = DEFAULT_CLOCK_SKEW.as_secs() as i64;
        assert!(validate_iat_at(now + skew, DEFAULT_CLOCK_SKEW, now).is_ok());
        assert_eq!(
            validate_iat_at(now + skew + 1, DEFAULT_CLOCK_SKEW, now),
            Err(JwtValidationError::IatTooFarInFuture)
        );
    }

    #[test]
    fn test_error_messages_do_not_echo_input() {
        let err = decode_token("!!!secret-token-material!!!.a.b").unwrap_err();
        assert!(!err.to_string().contains("secret-token-material"));
    }
}
