//! Signing-key set cache backed by a JWKS endpoint.
//!
//! The cache holds an immutable [`KeySet`] snapshot behind an `ArcSwap`.
//! Request-path lookups ([`KeySetCache::resolve`]) are a lock-free load of
//! the current snapshot and never perform I/O. [`KeySetCache::reload`]
//! fetches the JWKS document, builds a complete replacement snapshot, and
//! swaps it in atomically, so readers observe either the old or the new set
//! and never a partial one.
//!
//! # Security
//!
//! - Only asymmetric keys are accepted (`oct` keys and HMAC algorithms are dropped)
//! - A declared `alg` must agree with the key's family
//! - A failed or empty reload leaves the live snapshot untouched
//! - Key material never appears in Debug output or logs

use crate::observability::metrics;
use arc_swap::ArcSwap;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use jsonwebtoken::{Algorithm, DecodingKey};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::instrument;

/// Key set errors.
#[derive(Debug, Error)]
pub enum KeySetError {
    #[error("signing key not found")]
    KeyNotFound,

    #[error("JWKS fetch failed: {0}")]
    Fetch(String),

    #[error("JWKS document is invalid: {0}")]
    InvalidDocument(String),

    #[error("JWKS document contains no usable signing keys")]
    EmptyKeySet,

    #[error("no JWKS URL configured")]
    NoSource,
}

/// Reasons a single JWK entry is left out of a key set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JwkRejection {
    #[error("entry is not a valid JWK object")]
    NotAJwk,

    #[error("missing kid")]
    MissingKid,

    #[error("key use is not 'sig'")]
    NotForSignatures,

    #[error("unsupported key type '{0}'")]
    UnsupportedKeyType(String),

    #[error("unsupported curve")]
    UnsupportedCurve,

    #[error("missing or invalid key component '{0}'")]
    InvalidComponent(&'static str),

    #[error("declared algorithm is unknown or symmetric")]
    UnsupportedAlgorithm,

    #[error("declared algorithm does not match key type")]
    AlgorithmMismatch,
}

/// Asymmetric key families a signing key can belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyFamily {
    Rsa,
    EcP256,
    EcP384,
    Ed25519,
}

impl KeyFamily {
    /// Whether a token signed with `alg` can be verified by a key of this family.
    pub fn accepts(self, alg: Algorithm) -> bool {
        matches!(
            (self, alg),
            (
                KeyFamily::Rsa,
                Algorithm::RS256
                    | Algorithm::RS384
                    | Algorithm::RS512
                    | Algorithm::PS256
                    | Algorithm::PS384
                    | Algorithm::PS512
            ) | (KeyFamily::EcP256, Algorithm::ES256)
                | (KeyFamily::EcP384, Algorithm::ES384)
                | (KeyFamily::Ed25519, Algorithm::EdDSA)
        )
    }
}

/// Whether `alg` is a public-key algorithm (not HMAC).
pub fn is_asymmetric(alg: Algorithm) -> bool {
    !matches!(alg, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512)
}

/// A public verification key taken from the key set.
#[derive(Clone)]
pub struct SigningKey {
    kid: String,
    family: KeyFamily,
    algorithm: Option<Algorithm>,
    decoding_key: DecodingKey,
}

impl SigningKey {
    /// Build a key from already-decoded parts.
    pub fn new(
        kid: impl Into<String>,
        family: KeyFamily,
        algorithm: Option<Algorithm>,
        decoding_key: DecodingKey,
    ) -> Self {
        Self {
            kid: kid.into(),
            family,
            algorithm,
            decoding_key,
        }
    }

    /// Convert one JWK object into a signing key.
    ///
    /// # Errors
    ///
    /// Returns the reason the entry cannot be used for verification.
    pub fn from_jwk(entry: &Value) -> Result<Self, JwkRejection> {
        let jwk: Jwk = serde_json::from_value(entry.clone()).map_err(|_| JwkRejection::NotAJwk)?;

        let kid = match jwk.kid.as_deref() {
            Some(kid) if !kid.is_empty() => kid.to_string(),
            _ => return Err(JwkRejection::MissingKid),
        };

        if let Some(key_use) = jwk.key_use.as_deref() {
            if key_use != "sig" {
                return Err(JwkRejection::NotForSignatures);
            }
        }

        let (family, decoding_key) = match jwk.kty.as_str() {
            "RSA" => {
                let n = component(jwk.n.as_deref(), "n", None)?;
                let e = component(jwk.e.as_deref(), "e", None)?;
                let key = DecodingKey::from_rsa_components(n, e)
                    .map_err(|_| JwkRejection::InvalidComponent("n"))?;
                (KeyFamily::Rsa, key)
            }
            "EC" => {
                let (family, coordinate_len) = match jwk.crv.as_deref() {
                    Some("P-256") => (KeyFamily::EcP256, 32),
                    Some("P-384") => (KeyFamily::EcP384, 48),
                    _ => return Err(JwkRejection::UnsupportedCurve),
                };
                let x = component(jwk.x.as_deref(), "x", Some(coordinate_len))?;
                let y = component(jwk.y.as_deref(), "y", Some(coordinate_len))?;
                let key = DecodingKey::from_ec_components(x, y)
                    .map_err(|_| JwkRejection::InvalidComponent("x"))?;
                (family, key)
            }
            "OKP" => {
                if jwk.crv.as_deref() != Some("Ed25519") {
                    return Err(JwkRejection::UnsupportedCurve);
                }
                let x = component(jwk.x.as_deref(), "x", Some(32))?;
                let key = DecodingKey::from_ed_components(x)
                    .map_err(|_| JwkRejection::InvalidComponent("x"))?;
                (KeyFamily::Ed25519, key)
            }
            other => return Err(JwkRejection::UnsupportedKeyType(other.to_string())),
        };

        let algorithm = match jwk.alg.as_deref() {
            None => None,
            Some(alg) => {
                let alg =
                    Algorithm::from_str(alg).map_err(|_| JwkRejection::UnsupportedAlgorithm)?;
                if !is_asymmetric(alg) {
                    return Err(JwkRejection::UnsupportedAlgorithm);
                }
                if !family.accepts(alg) {
                    return Err(JwkRejection::AlgorithmMismatch);
                }
                Some(alg)
            }
        };

        Ok(Self {
            kid,
            family,
            algorithm,
            decoding_key,
        })
    }

    pub fn kid(&self) -> &str {
        &self.kid
    }

    pub fn family(&self) -> KeyFamily {
        self.family
    }

    /// Algorithm declared by the JWK, if any.
    pub fn algorithm(&self) -> Option<Algorithm> {
        self.algorithm
    }

    pub fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }

    /// Whether this key may verify a token whose header names `alg`.
    ///
    /// The family must match, and a declared algorithm must match exactly.
    pub fn accepts(&self, alg: Algorithm) -> bool {
        self.family.accepts(alg) && self.algorithm.map_or(true, |declared| declared == alg)
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("kid", &self.kid)
            .field("family", &self.family)
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

/// JSON Web Key fields relevant to verification.
#[derive(Debug, Deserialize)]
struct Jwk {
    kty: String,
    #[serde(default)]
    kid: Option<String>,
    #[serde(default, rename = "use")]
    key_use: Option<String>,
    #[serde(default)]
    alg: Option<String>,
    #[serde(default)]
    crv: Option<String>,
    #[serde(default)]
    x: Option<String>,
    #[serde(default)]
    y: Option<String>,
    #[serde(default)]
    n: Option<String>,
    #[serde(default)]
    e: Option<String>,
}

/// Require a base64url component, optionally of an exact decoded length.
fn component<'a>(
    value: Option<&'a str>,
    name: &'static str,
    expected_len: Option<usize>,
) -> Result<&'a str, JwkRejection> {
    let value = value
        .filter(|v| !v.is_empty())
        .ok_or(JwkRejection::InvalidComponent(name))?;
    let decoded = URL_SAFE_NO_PAD
        .decode(value)
        .map_err(|_| JwkRejection::InvalidComponent(name))?;
    match expected_len {
        Some(len) if decoded.len() != len => Err(JwkRejection::InvalidComponent(name)),
        _ => Ok(value),
    }
}

/// JWKS document envelope. Entries stay untyped so one bad key cannot
/// invalidate the whole document.
#[derive(Debug, Deserialize)]
struct JwksDocument {
    keys: Vec<Value>,
}

/// Immutable mapping from key id to signing key.
#[derive(Debug, Default)]
pub struct KeySet {
    keys: HashMap<String, Arc<SigningKey>>,
}

impl KeySet {
    /// Build a key set. The first key seen for a kid wins.
    pub fn from_keys(keys: impl IntoIterator<Item = SigningKey>) -> Self {
        let mut map: HashMap<String, Arc<SigningKey>> = HashMap::new();
        for key in keys {
            if map.contains_key(key.kid()) {
                tracing::warn!(target: "casting.auth.jwks", kid = %key.kid(), "Duplicate kid in key set, keeping first");
                continue;
            }
            map.insert(key.kid().to_string(), Arc::new(key));
        }
        Self { keys: map }
    }

    /// Build a key set from a JWKS document (`{"keys": [...]}`).
    ///
    /// Unusable entries are skipped with a warning.
    ///
    /// # Errors
    ///
    /// - `InvalidDocument` - not a JSON object with a `keys` array
    /// - `EmptyKeySet` - no entry produced a usable key
    pub fn from_jwks(document: Value) -> Result<Self, KeySetError> {
        let document: JwksDocument = serde_json::from_value(document)
            .map_err(|e| KeySetError::InvalidDocument(e.to_string()))?;

        let keys = document
            .keys
            .iter()
            .filter_map(|entry| match SigningKey::from_jwk(entry) {
                Ok(key) => Some(key),
                Err(reason) => {
                    let kid = entry.get("kid").and_then(Value::as_str).unwrap_or("<none>");
                    tracing::warn!(target: "casting.auth.jwks", kid = %kid, reason = %reason, "Skipping unusable JWK");
                    None
                }
            });

        let key_set = Self::from_keys(keys);
        if key_set.is_empty() {
            return Err(KeySetError::EmptyKeySet);
        }
        Ok(key_set)
    }

    pub fn get(&self, kid: &str) -> Option<Arc<SigningKey>> {
        self.keys.get(kid).cloned()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Key ids in this set, sorted.
    pub fn kids(&self) -> Vec<&str> {
        let mut kids: Vec<&str> = self.keys.keys().map(String::as_str).collect();
        kids.sort_unstable();
        kids
    }
}

/// Where reloads fetch from.
struct JwksSource {
    url: String,
    http_client: reqwest::Client,
}

/// Process-wide cache of the verification key set.
pub struct KeySetCache {
    current: ArcSwap<KeySet>,
    source: Option<JwksSource>,
}

impl KeySetCache {
    /// Create an empty cache that reloads from `jwks_url`.
    ///
    /// The set stays empty (every `resolve` fails) until the first successful
    /// [`reload`](Self::reload).
    pub fn new(jwks_url: impl Into<String>, fetch_timeout: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(fetch_timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(target: "casting.auth.jwks", error = %e, "Failed to build HTTP client with custom config, using defaults");
                reqwest::Client::new()
            });

        Self {
            current: ArcSwap::from_pointee(KeySet::default()),
            source: Some(JwksSource {
                url: jwks_url.into(),
                http_client,
            }),
        }
    }

    /// Create a cache pre-populated with `keys` and no remote source.
    pub fn from_keys(keys: impl IntoIterator<Item = SigningKey>) -> Self {
        Self {
            current: ArcSwap::from_pointee(KeySet::from_keys(keys)),
            source: None,
        }
    }

    /// Look up a key by id in the current snapshot. Never fetches.
    ///
    /// # Errors
    ///
    /// Returns `KeySetError::KeyNotFound` if the kid is not in the snapshot.
    pub fn resolve(&self, kid: &str) -> Result<Arc<SigningKey>, KeySetError> {
        self.current.load().get(kid).ok_or(KeySetError::KeyNotFound)
    }

    /// Swap in a new snapshot.
    pub fn replace(&self, key_set: KeySet) {
        let count = key_set.len();
        self.current.store(Arc::new(key_set));
        metrics::set_jwks_keys(count);
    }

    /// The current snapshot.
    pub fn snapshot(&self) -> Arc<KeySet> {
        self.current.load_full()
    }

    pub fn len(&self) -> usize {
        self.current.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.load().is_empty()
    }

    /// Fetch the JWKS document and replace the snapshot.
    ///
    /// Returns the number of keys now live. On any error the previous
    /// snapshot stays in place.
    ///
    /// # Errors
    ///
    /// - `NoSource` - cache was built without a JWKS URL
    /// - `Fetch` - transport failure or non-success HTTP status
    /// - `InvalidDocument` - body is not a JWKS document
    /// - `EmptyKeySet` - document has no usable keys
    #[instrument(skip_all, name = "casting.auth.jwks.reload")]
    pub async fn reload(&self) -> Result<usize, KeySetError> {
        let start = Instant::now();
        let result = self.fetch_key_set().await;
        let duration = start.elapsed();

        match result {
            Ok(key_set) => {
                let count = key_set.len();
                self.replace(key_set);
                metrics::record_jwks_reload("success", duration);
                tracing::info!(target: "casting.auth.jwks", key_count = count, "Key set reloaded");
                Ok(count)
            }
            Err(e) => {
                metrics::record_jwks_reload("error", duration);
                tracing::error!(
                    target: "casting.auth.jwks",
                    error = %e,
                    live_keys = self.len(),
                    "Key set reload failed, keeping previous keys"
                );
                Err(e)
            }
        }
    }

    async fn fetch_key_set(&self) -> Result<KeySet, KeySetError> {
        let source = self.source.as_ref().ok_or(KeySetError::NoSource)?;

        tracing::debug!(target: "casting.auth.jwks", url = %source.url, "Fetching JWKS");

        let response = source
            .http_client
            .get(&source.url)
            .send()
            .await
            .map_err(|e| KeySetError::Fetch(e.to_string()))?;

        if !response.status().is_success() {
            return Err(KeySetError::Fetch(format!(
                "JWKS endpoint returned {}",
                response.status()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| KeySetError::Fetch(e.to_string()))?;
        let document: Value = serde_json::from_slice(&bytes)
            .map_err(|e| KeySetError::InvalidDocument(e.to_string()))?;

        KeySet::from_jwks(document)
    }
}
