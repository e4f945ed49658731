//! Builder patterns for test claim sets
//!
//! Produces JSON claim objects for [`TestKeypair::sign`](crate::TestKeypair::sign).
//! Defaults describe a valid, unexpired token with no permissions.

use chrono::{Duration, Utc};
use serde_json::{json, Map, Value};

/// Subject used when none is set.
pub const DEFAULT_TEST_SUBJECT: &str = "auth0|test-user";

/// Builder for creating test JWT claims
///
/// # Example
/// ```rust,ignore
/// let claims = TestClaimsBuilder::new("https://issuer.test/", "casting-api")
///     .subject("auth0|alice")
///     .permissions(&["read:works", "read:performers"])
///     .expires_at(now + 60)
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct TestClaimsBuilder {
    claims: Map<String, Value>,
}

impl TestClaimsBuilder {
    /// Claims for `issuer` and `audience`, issued now and valid for an hour.
    pub fn new(issuer: &str, audience: &str) -> Self {
        let now = Utc::now();
        let mut claims = Map::new();
        claims.insert("iss".to_string(), json!(issuer));
        claims.insert("aud".to_string(), json!(audience));
        claims.insert("sub".to_string(), json!(DEFAULT_TEST_SUBJECT));
        claims.insert("iat".to_string(), json!(now.timestamp()));
        claims.insert(
            "exp".to_string(),
            json!((now + Duration::seconds(3600)).timestamp()),
        );
        claims.insert("permissions".to_string(), json!([]));
        Self { claims }
    }

    pub fn subject(self, subject: &str) -> Self {
        self.raw("sub", json!(subject))
    }

    pub fn issuer(self, issuer: &str) -> Self {
        self.raw("iss", json!(issuer))
    }

    /// Set `aud` to any JSON value (string or list).
    pub fn audience(self, audience: Value) -> Self {
        self.raw("aud", audience)
    }

    pub fn permissions(self, permissions: &[&str]) -> Self {
        self.raw("permissions", json!(permissions))
    }

    pub fn expires_at(self, timestamp: i64) -> Self {
        self.raw("exp", json!(timestamp))
    }

    /// Set expiration relative to now (negative for already expired).
    pub fn expires_in(self, seconds: i64) -> Self {
        self.expires_at((Utc::now() + Duration::seconds(seconds)).timestamp())
    }

    pub fn not_before(self, timestamp: i64) -> Self {
        self.raw("nbf", json!(timestamp))
    }

    pub fn issued_at(self, timestamp: i64) -> Self {
        self.raw("iat", json!(timestamp))
    }

    /// Remove a claim entirely.
    pub fn without(mut self, claim: &str) -> Self {
        self.claims.remove(claim);
        self
    }

    /// Set a claim to an arbitrary value, including ill-typed ones.
    pub fn raw(mut self, claim: &str, value: Value) -> Self {
        self.claims.insert(claim.to_string(), value);
        self
    }

    /// Build the claims as a JSON value
    pub fn build(self) -> Value {
        Value::Object(self.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let claims = TestClaimsBuilder::new("iss", "aud").build();
        assert_eq!(claims["iss"], "iss");
        assert_eq!(claims["aud"], "aud");
        assert_eq!(claims["sub"], DEFAULT_TEST_SUBJECT);
        assert_eq!(claims["permissions"], json!([]));
        assert!(claims["exp"].as_i64().unwrap() > claims["iat"].as_i64().unwrap());
    }

    #[test]
    fn test_builder_overrides_and_removal() {
        let claims = TestClaimsBuilder::new("iss", "aud")
            .permissions(&["read:works"])
            .audience(json!(["a", "b"]))
            .without("sub")
            .raw("exp", json!("soon"))
            .build();

        assert_eq!(claims["permissions"], json!(["read:works"]));
        assert_eq!(claims["aud"], json!(["a", "b"]));
        assert!(claims.get("sub").is_none());
        assert_eq!(claims["exp"], "soon");
    }
}
