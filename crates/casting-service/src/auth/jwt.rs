//! Access token verification.
//!
//! Verifies compact JWS tokens against the cached key set and validates the
//! standard claims.
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - `none` and HMAC algorithms are never accepted, whatever the configuration
//! - The key is chosen by `kid` and must agree with the header's `alg`
//! - No claim is read before the signature has been verified
//! - Client-facing errors name the failed check, never the token content

use crate::auth::claims::{permission_set, ClaimSet, RawClaims, TimeClaims};
use crate::auth::jwks::{is_asymmetric, KeySetCache};
use crate::errors::AuthError;
use common::jwt::{decode_token, validate_iat_at};
use jsonwebtoken::Algorithm;
use serde::Deserialize;
use serde_json::Value;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

/// Trust settings for token verification.
#[derive(Debug, Clone)]
pub struct VerifierSettings {
    /// Required `iss` value.
    pub issuer: String,

    /// Audience that must appear in `aud`.
    pub audience: String,

    /// Algorithms a token header may name. Symmetric entries are ignored.
    pub allowed_algorithms: Vec<Algorithm>,

    /// Tolerance for `iat` in the future.
    pub clock_skew: Duration,
}

/// Verifies access tokens against the shared key set.
pub struct TokenVerifier {
    key_set: Arc<KeySetCache>,
    settings: VerifierSettings,
}

impl TokenVerifier {
    pub fn new(key_set: Arc<KeySetCache>, settings: VerifierSettings) -> Self {
        Self { key_set, settings }
    }

    /// Verify a token against the current wall clock.
    ///
    /// # Errors
    ///
    /// See [`verify_at`](Self::verify_at).
    pub fn verify(&self, token: &str) -> Result<ClaimSet, AuthError> {
        self.verify_at(token, chrono::Utc::now().timestamp())
    }

    /// Verify a token as of `now` (Unix seconds).
    ///
    /// # Checks, in order
    ///
    /// 1. Structure (size, three base64url segments, JSON objects, string `alg`)
    /// 2. Algorithm is known, asymmetric and allowed
    /// 3. `kid` resolves to a key compatible with the algorithm
    /// 4. Signature over `header.payload`
    /// 5. `exp`, `nbf`, `iat`, `iss`, `aud`, `sub`
    /// 6. `permissions` is an array of strings
    ///
    /// # Errors
    ///
    /// Returns the `AuthError` of the first failed check.
    #[instrument(skip_all, name = "casting.auth.verify")]
    pub fn verify_at(&self, token: &str, now: i64) -> Result<ClaimSet, AuthError> {
        // 1. Structure
        let decoded = decode_token(token).map_err(|e| {
            tracing::debug!(target: "casting.auth.jwt", error = %e, "Token structure rejected");
            AuthError::MalformedToken
        })?;

        let alg_name = decoded.header_str("alg").ok_or_else(|| {
            tracing::debug!(target: "casting.auth.jwt", "Token header has no alg");
            AuthError::MalformedToken
        })?;

        // 2. Algorithm
        let alg = self.accepted_algorithm(alg_name)?;

        // 3. Key
        let kid = decoded
            .header_str("kid")
            .filter(|kid| !kid.is_empty())
            .map(str::to_owned)
            .ok_or_else(|| {
                tracing::debug!(target: "casting.auth.jwt", "Token header has no kid");
                AuthError::InvalidSignature
            })?;

        let key = self.key_set.resolve(&kid).map_err(|_| {
            tracing::debug!(target: "casting.auth.jwt", kid = %kid, "Token kid not in key set");
            AuthError::InvalidSignature
        })?;

        if !key.accepts(alg) {
            tracing::warn!(
                target: "casting.auth.jwt",
                kid = %kid,
                alg = ?alg,
                family = ?key.family(),
                "Token algorithm does not match key"
            );
            return Err(AuthError::InvalidSignature);
        }

        // 4. Signature
        let verified = jsonwebtoken::crypto::verify(
            decoded.signature(),
            decoded.signing_input().as_bytes(),
            key.decoding_key(),
            alg,
        )
        .unwrap_or_else(|e| {
            tracing::debug!(target: "casting.auth.jwt", error = %e, "Signature verification errored");
            false
        });

        if !verified {
            tracing::debug!(target: "casting.auth.jwt", kid = %kid, "Token signature mismatch");
            return Err(AuthError::InvalidSignature);
        }

        // 5. Standard claims, time claims first
        let payload = Value::Object(decoded.payload);
        let times = TimeClaims::deserialize(&payload).map_err(|e| {
            tracing::debug!(target: "casting.auth.jwt", error = %e, "Token time claims are not numbers");
            AuthError::MalformedClaims
        })?;
        self.validate_times(&times, now)?;

        let raw = RawClaims::deserialize(&payload).map_err(|e| {
            tracing::debug!(target: "casting.auth.jwt", error = %e, "Token claims have wrong types");
            AuthError::MalformedClaims
        })?;

        let claims = self.validate_claims(times, raw)?;

        tracing::debug!(target: "casting.auth.jwt", kid = %kid, "Token verified");
        Ok(claims)
    }

    fn accepted_algorithm(&self, alg_name: &str) -> Result<Algorithm, AuthError> {
        let alg = Algorithm::from_str(alg_name).map_err(|_| {
            tracing::debug!(target: "casting.auth.jwt", "Token alg is not a known algorithm");
            AuthError::UnsupportedAlgorithm
        })?;

        if !is_asymmetric(alg) || !self.settings.allowed_algorithms.contains(&alg) {
            tracing::debug!(target: "casting.auth.jwt", alg = ?alg, "Token alg not accepted");
            return Err(AuthError::UnsupportedAlgorithm);
        }

        Ok(alg)
    }

    fn validate_times(&self, times: &TimeClaims, now: i64) -> Result<(), AuthError> {
        match times.exp {
            Some(exp) if exp > now => {}
            _ => {
                tracing::debug!(target: "casting.auth.jwt", exp = ?times.exp, now, "Token expired");
                return Err(AuthError::TokenExpired);
            }
        }

        if let Some(nbf) = times.nbf {
            if nbf > now {
                tracing::debug!(target: "casting.auth.jwt", nbf, now, "Token not yet valid");
                return Err(AuthError::TokenNotYetValid);
            }
        }

        if let Some(iat) = times.iat {
            validate_iat_at(iat, self.settings.clock_skew, now)
                .map_err(|_| AuthError::TokenNotYetValid)?;
        }

        Ok(())
    }

    fn validate_claims(&self, times: TimeClaims, raw: RawClaims) -> Result<ClaimSet, AuthError> {
        let exp = times.exp.ok_or(AuthError::TokenExpired)?;

        let iss = match raw.iss {
            Some(iss) if iss == self.settings.issuer => iss,
            _ => {
                tracing::debug!(target: "casting.auth.jwt", "Token issuer mismatch");
                return Err(AuthError::InvalidIssuer);
            }
        };

        let aud = match raw.aud {
            Some(aud) if aud.contains(&self.settings.audience) => aud,
            _ => {
                tracing::debug!(target: "casting.auth.jwt", "Token audience mismatch");
                return Err(AuthError::InvalidAudience);
            }
        };

        let sub = match raw.sub {
            Some(sub) if !sub.is_empty() => sub,
            _ => {
                tracing::debug!(target: "casting.auth.jwt", "Token has no subject");
                return Err(AuthError::MalformedClaims);
            }
        };

        // 6. Permissions
        let permissions = raw
            .permissions
            .as_ref()
            .and_then(permission_set)
            .ok_or_else(|| {
                tracing::debug!(target: "casting.auth.jwt", "Token permissions claim missing or not a string array");
                AuthError::MalformedClaims
            })?;

        Ok(ClaimSet {
            iss,
            aud,
            exp,
            nbf: times.nbf,
            iat: times.iat,
            sub,
            permissions,
        })
    }
}
