//! Claims carried by a verified access token.
//!
//! `ClaimSet` is only ever produced by [`crate::auth::jwt::TokenVerifier`]
//! after the signature and the standard claims have been checked. The `sub`
//! field is redacted in Debug output to prevent exposure in logs.

use serde::{Deserialize, Deserializer};
use serde_json::{Number, Value};
use std::collections::BTreeSet;
use std::fmt;

/// The `aud` claim: a single audience or a list of them.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    Single(String),
    Multiple(Vec<String>),
}

impl Audience {
    /// Whether `expected` is one of the token's audiences.
    pub fn contains(&self, expected: &str) -> bool {
        match self {
            Audience::Single(aud) => aud == expected,
            Audience::Multiple(auds) => auds.iter().any(|aud| aud == expected),
        }
    }
}

/// Validated claims of an access token.
#[derive(Clone, PartialEq, Eq)]
pub struct ClaimSet {
    /// Issuer.
    pub iss: String,

    /// Audience(s).
    pub aud: Audience,

    /// Expiration timestamp (Unix epoch seconds).
    pub exp: i64,

    /// Not-before timestamp (Unix epoch seconds).
    pub nbf: Option<i64>,

    /// Issued-at timestamp (Unix epoch seconds).
    pub iat: Option<i64>,

    /// Subject (end-user or client identifier) - redacted in Debug output.
    pub sub: String,

    /// Permissions granted to the bearer.
    pub permissions: BTreeSet<String>,
}

impl ClaimSet {
    /// Exact membership check; no wildcard or hierarchy expansion.
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }
}

impl fmt::Debug for ClaimSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClaimSet")
            .field("iss", &self.iss)
            .field("aud", &self.aud)
            .field("exp", &self.exp)
            .field("nbf", &self.nbf)
            .field("iat", &self.iat)
            .field("sub", &"[REDACTED]")
            .field("permissions", &self.permissions)
            .finish()
    }
}

/// Time claims, decoded ahead of the others so expiry is decided first.
///
/// NumericDate values may carry a fractional part; they are floored to whole
/// seconds. A non-numeric value fails deserialization, absence yields `None`.
#[derive(Deserialize)]
pub(crate) struct TimeClaims {
    #[serde(default, deserialize_with = "numeric_date")]
    pub exp: Option<i64>,
    #[serde(default, deserialize_with = "numeric_date")]
    pub nbf: Option<i64>,
    #[serde(default, deserialize_with = "numeric_date")]
    pub iat: Option<i64>,
}

/// Remaining claim shape as decoded from the payload, before validation.
///
/// Every field is optional so that absence and wrong type can be told apart:
/// a wrong JSON type fails deserialization, absence yields `None`.
/// `permissions` stays untyped until the final validation step.
#[derive(Deserialize)]
pub(crate) struct RawClaims {
    #[serde(default)]
    pub iss: Option<String>,
    #[serde(default)]
    pub aud: Option<Audience>,
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub permissions: Option<Value>,
}

fn numeric_date<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(number) = Option::<Number>::deserialize(deserializer)? else {
        return Ok(None);
    };

    match number.as_i64() {
        Some(seconds) => Ok(Some(seconds)),
        // u64 beyond i64::MAX saturates; JSON numbers are always finite
        None => Ok(number.as_f64().map(|seconds| seconds.floor() as i64)),
    }
}

/// Interpret the `permissions` claim as a set of strings.
///
/// Returns `None` unless the value is an array whose elements are all strings.
pub(crate) fn permission_set(value: &Value) -> Option<BTreeSet<String>> {
    value
        .as_array()?
        .iter()
        .map(|item| item.as_str().map(str::to_string))
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_claims() -> ClaimSet {
        ClaimSet {
            iss: "https://issuer.example/".to_string(),
            aud: Audience::Single("casting".to_string()),
            exp: 1_700_003_600,
            nbf: None,
            iat: Some(1_700_000_000),
            sub: "auth0|secret-user".to_string(),
            permissions: ["read:works".to_string()].into_iter().collect(),
        }
    }

    #[test]
    fn test_claims_debug_redacts_sub() {
        let debug_str = format!("{:?}", sample_claims());

        assert!(
            !debug_str.contains("secret-user"),
            "Debug output should not contain subject"
        );
        assert!(debug_str.contains("[REDACTED]"));
        assert!(debug_str.contains("read:works"));
    }

    #[test]
    fn test_audience_single_and_multiple() {
        let single: Audience = serde_json::from_value(json!("casting")).unwrap();
        assert!(single.contains("casting"));
        assert!(!single.contains("other"));

        let multiple: Audience = serde_json::from_value(json!(["other", "casting"])).unwrap();
        assert!(multiple.contains("casting"));
        assert!(!multiple.contains("missing"));
    }

    #[test]
    fn test_audience_rejects_non_string() {
        assert!(serde_json::from_value::<Audience>(json!(42)).is_err());
        assert!(serde_json::from_value::<Audience>(json!([1, 2])).is_err());
    }

    #[test]
    fn test_has_permission_is_exact() {
        let claims = sample_claims();
        assert!(claims.has_permission("read:works"));
        assert!(!claims.has_permission("read:work"));
        assert!(!claims.has_permission("read:*"));
        assert!(!claims.has_permission("READ:WORKS"));
    }

    #[test]
    fn test_raw_claims_absent_fields_are_none() {
        let raw: RawClaims = serde_json::from_value(json!({})).unwrap();
        assert!(raw.iss.is_none());
        assert!(raw.aud.is_none());
        assert!(raw.sub.is_none());
        assert!(raw.permissions.is_none());

        let times: TimeClaims = serde_json::from_value(json!({})).unwrap();
        assert!(times.exp.is_none());
        assert!(times.nbf.is_none());
        assert!(times.iat.is_none());
    }

    #[test]
    fn test_raw_claims_wrong_type_fails() {
        assert!(serde_json::from_value::<RawClaims>(json!({"sub": 12})).is_err());
        assert!(serde_json::from_value::<RawClaims>(json!({"iss": ["a"]})).is_err());
        assert!(serde_json::from_value::<TimeClaims>(json!({"exp": "soon"})).is_err());
        assert!(serde_json::from_value::<TimeClaims>(json!({"iat": true})).is_err());
    }

    #[test]
    fn test_time_claims_accept_fractional_seconds() {
        let times: TimeClaims = serde_json::from_value(
            json!({"exp": 1_700_003_600.5, "nbf": 1_699_999_999.9, "iat": 1_700_000_000}),
        )
        .unwrap();
        assert_eq!(times.exp, Some(1_700_003_600));
        assert_eq!(times.nbf, Some(1_699_999_999));
        assert_eq!(times.iat, Some(1_700_000_000));

        let null: TimeClaims = serde_json::from_value(json!({"exp": null})).unwrap();
        assert!(null.exp.is_none());
    }

    #[test]
    fn test_time_claims_ignore_other_fields() {
        let times: TimeClaims =
            serde_json::from_value(json!({"exp": 10, "aud": 42, "sub": ["x"]})).unwrap();
        assert_eq!(times.exp, Some(10));
    }

    #[test]
    fn test_raw_claims_ignores_unknown_fields() {
        let raw: RawClaims =
            serde_json::from_value(json!({"sub": "x", "azp": "client", "scope": "openid"}))
                .unwrap();
        assert_eq!(raw.sub.as_deref(), Some("x"));
    }

    #[test]
    fn test_permission_set() {
        let set = permission_set(&json!(["read:works", "read:performers", "read:works"])).unwrap();
        assert_eq!(set.len(), 2);
        assert!(set.contains("read:performers"));

        assert!(permission_set(&json!([])).unwrap().is_empty());
        assert!(permission_set(&json!("read:works")).is_none());
        assert!(permission_set(&json!(["read:works", 5])).is_none());
        assert!(permission_set(&json!(null)).is_none());
    }
}
