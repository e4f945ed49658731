//! Deterministic cryptographic fixtures for testing
//!
//! Provides reproducible Ed25519 keypairs that sign compact JWS tokens and
//! publish themselves as JWKs. All fixtures are deterministic based on seed
//! values.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use ring::signature::{Ed25519KeyPair, KeyPair};
use serde_json::{json, Value};

/// A deterministic Ed25519 signing key with a key id.
///
/// # Example
/// ```rust,ignore
/// let keypair = TestKeypair::new(1, "key-1");
/// let token = keypair.sign(&json!({"sub": "alice"}));
/// let jwks = json!({ "keys": [keypair.jwk()] });
/// ```
pub struct TestKeypair {
    /// Key id placed in token headers and the JWK.
    pub kid: String,

    /// Raw 32-byte public key.
    pub public_key_bytes: Vec<u8>,

    key_pair: Ed25519KeyPair,
    pkcs8: Vec<u8>,
}

impl TestKeypair {
    /// Same `seed` always produces the same key, whatever the `kid`.
    pub fn new(seed: u8, kid: &str) -> Self {
        let seed_bytes = seed_bytes(seed);
        let key_pair = Ed25519KeyPair::from_seed_unchecked(&seed_bytes)
            .expect("32-byte seed is always a valid Ed25519 seed");

        Self {
            kid: kid.to_string(),
            public_key_bytes: key_pair.public_key().as_ref().to_vec(),
            key_pair,
            pkcs8: build_pkcs8_from_seed(&seed_bytes),
        }
    }

    /// Sign `claims` with a standard `{"alg":"EdDSA","typ":"JWT","kid":..}` header.
    pub fn sign(&self, claims: &Value) -> String {
        let mut header = Header::new(Algorithm::EdDSA);
        header.kid = Some(self.kid.clone());
        jsonwebtoken::encode(&header, claims, &EncodingKey::from_ed_der(&self.pkcs8))
            .expect("Ed25519 signing of test claims should not fail")
    }

    /// Sign `claims` under an arbitrary header, exactly as given.
    ///
    /// Lets tests produce tokens whose header names the wrong algorithm,
    /// omits the kid, or otherwise deviates from a well-formed token while
    /// still carrying a genuine signature from this key.
    pub fn sign_with_header(&self, header: &Value, claims: &Value) -> String {
        let signing_input = format!("{}.{}", encode_segment(header), encode_segment(claims));
        let signature = self.key_pair.sign(signing_input.as_bytes());
        format!(
            "{}.{}",
            signing_input,
            URL_SAFE_NO_PAD.encode(signature.as_ref())
        )
    }

    /// The public key as an `OKP` JWK.
    pub fn jwk(&self) -> Value {
        json!({
            "kty": "OKP",
            "crv": "Ed25519",
            "use": "sig",
            "alg": "EdDSA",
            "kid": self.kid,
            "x": URL_SAFE_NO_PAD.encode(&self.public_key_bytes),
        })
    }
}

/// A JWKS document publishing `keys`.
pub fn jwks_document(keys: &[&TestKeypair]) -> Value {
    json!({ "keys": keys.iter().map(|k| k.jwk()).collect::<Vec<_>>() })
}

/// Base64url (no padding) of the JSON serialization of `value`.
pub fn encode_segment(value: &Value) -> String {
    URL_SAFE_NO_PAD.encode(serde_json::to_vec(value).expect("JSON value always serializes"))
}

fn seed_bytes(seed: u8) -> [u8; 32] {
    let mut seed_bytes = [0u8; 32];
    seed_bytes[0] = seed;
    // Fill rest with deterministic pattern
    for (i, byte) in seed_bytes.iter_mut().enumerate().skip(1) {
        *byte = seed.wrapping_mul(i as u8).wrapping_add(i as u8);
    }
    seed_bytes
}

/// PKCS#8 v1 document (RFC 5208) wrapping an Ed25519 seed.
///
/// Test-only; never derive production keys from a fixed seed.
fn build_pkcs8_from_seed(seed: &[u8; 32]) -> Vec<u8> {
    let mut pkcs8 = Vec::with_capacity(48);

    // SEQUENCE, 46 bytes
    pkcs8.extend_from_slice(&[0x30, 0x2e]);
    // version INTEGER 0
    pkcs8.extend_from_slice(&[0x02, 0x01, 0x00]);
    // AlgorithmIdentifier { OID 1.3.101.112 }
    pkcs8.extend_from_slice(&[0x30, 0x05, 0x06, 0x03, 0x2b, 0x65, 0x70]);
    // privateKey OCTET STRING { OCTET STRING seed }
    pkcs8.extend_from_slice(&[0x04, 0x22, 0x04, 0x20]);
    pkcs8.extend_from_slice(seed);

    pkcs8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keypair_is_deterministic() {
        let a = TestKeypair::new(1, "a");
        let b = TestKeypair::new(1, "b");
        assert_eq!(a.public_key_bytes, b.public_key_bytes);
        assert_ne!(
            TestKeypair::new(2, "a").public_key_bytes,
            a.public_key_bytes
        );
    }

    #[test]
    fn test_sign_and_sign_with_header_agree() {
        let keypair = TestKeypair::new(4, "key-4");
        let claims = json!({"sub": "alice"});

        // Ed25519 is deterministic, so identical input gives identical tokens.
        let header = json!({"typ": "JWT", "alg": "EdDSA", "kid": "key-4"});
        let manual = keypair.sign_with_header(&header, &claims);
        assert_eq!(manual.split('.').count(), 3);

        let standard = keypair.sign(&claims);
        assert_eq!(standard.split('.').count(), 3);
        assert_eq!(
            standard.rsplit('.').next().unwrap().len(),
            manual.rsplit('.').next().unwrap().len()
        );
    }

    #[test]
    fn test_jwk_publishes_public_key() {
        let keypair = TestKeypair::new(9, "key-9");
        let jwk = keypair.jwk();
        assert_eq!(jwk["kid"], "key-9");
        assert_eq!(jwk["kty"], "OKP");
        let x = URL_SAFE_NO_PAD.decode(jwk["x"].as_str().unwrap()).unwrap();
        assert_eq!(x, keypair.public_key_bytes);
    }

    #[test]
    fn test_pkcs8_layout() {
        let pkcs8 = build_pkcs8_from_seed(&[7u8; 32]);
        assert_eq!(pkcs8.len(), 48);
        assert_eq!(&pkcs8[..2], &[0x30, 0x2e]);
    }
}
