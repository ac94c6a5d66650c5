//! Published JSON Web Key Set.
//!
//! The tool's own public verification keys, served at
//! `/.well-known/jwks.json`. Only the RSA public components leave this
//! module; private key material never crosses into the JWKS.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rsa::RsaPublicKey;
use rsa::traits::PublicKeyParts;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A published JSON Web Key (RSA, signature use).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Jwk {
    /// Key type, always `RSA`
    pub kty: String,
    /// Key use, always `sig`
    #[serde(rename = "use")]
    pub key_use: String,
    /// Signing algorithm, always `RS256`
    pub alg: String,
    /// Key id: RFC 7638 thumbprint of the public components
    pub kid: String,
    /// Modulus, base64url without padding
    pub n: String,
    /// Exponent, base64url without padding
    pub e: String,
}

/// A JSON Web Key Set: `{"keys": [...]}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Jwks {
    /// The published keys
    pub keys: Vec<Jwk>,
}

impl Jwk {
    /// Build a JWK from an RSA public key.
    #[must_use]
    pub fn from_rsa_public(key: &RsaPublicKey) -> Self {
        let n = URL_SAFE_NO_PAD.encode(key.n().to_bytes_be());
        let e = URL_SAFE_NO_PAD.encode(key.e().to_bytes_be());
        let kid = thumbprint(&n, &e);
        Self {
            kty: "RSA".to_string(),
            key_use: "sig".to_string(),
            alg: "RS256".to_string(),
            kid,
            n,
            e,
        }
    }
}

impl Jwks {
    /// A key set holding a single key.
    #[must_use]
    pub fn single(key: Jwk) -> Self {
        Self { keys: vec![key] }
    }
}

/// RFC 7638 JWK thumbprint for an RSA key.
///
/// SHA-256 over the canonical JSON `{"e":...,"kty":"RSA","n":...}` with
/// members in lexicographic order, base64url-encoded without padding.
fn thumbprint(n: &str, e: &str) -> String {
    let canonical = format!(r#"{{"e":"{e}","kty":"RSA","n":"{n}"}}"#);
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thumbprint_is_stable_and_url_safe() {
        let t1 = thumbprint("modulus", "AQAB");
        let t2 = thumbprint("modulus", "AQAB");
        assert_eq!(t1, t2);
        assert!(!t1.contains('+'));
        assert!(!t1.contains('/'));
        assert!(!t1.contains('='));
        // SHA-256 -> 32 bytes -> 43 base64url chars
        assert_eq!(t1.len(), 43);
    }

    #[test]
    fn thumbprint_differs_across_keys() {
        assert_ne!(thumbprint("m1", "AQAB"), thumbprint("m2", "AQAB"));
    }

    #[test]
    fn jwks_serializes_with_keys_member() {
        let jwks = Jwks::single(Jwk {
            kty: "RSA".to_string(),
            key_use: "sig".to_string(),
            alg: "RS256".to_string(),
            kid: "k1".to_string(),
            n: "bW9kdWx1cw".to_string(),
            e: "AQAB".to_string(),
        });
        let json = serde_json::to_value(&jwks).unwrap();
        assert!(json.get("keys").unwrap().is_array());
        assert_eq!(json["keys"][0]["use"], "sig");
        assert_eq!(json["keys"][0]["alg"], "RS256");
    }
}
