//! Key management — the tool's own signing key and platform key caching.
//!
//! On first start a 2048-bit RSA key pair is generated and persisted as
//! PKCS#8 PEM in the data directory; subsequent starts reload it, keeping
//! the published `kid` stable. The public half is served as a JWK set at
//! `/.well-known/jwks.json`. The same key signs everything this tool
//! authors: deep-linking response JWTs and client-credential assertions.
//!
//! Verification of *platform* tokens goes through [`PlatformKeyCache`],
//! which the launch validator drives (TTL refresh plus a forced refresh on
//! unknown `kid`).

pub mod cache;
pub mod jwks;

use std::fs;
use std::path::Path;
use std::time::Duration;

use jsonwebtoken::{Algorithm, EncodingKey, Header};
use rsa::RsaPrivateKey;
use rsa::pkcs8::{DecodePrivateKey, EncodePrivateKey, LineEnding};
use serde::Serialize;
use tracing::info;

pub use cache::PlatformKeyCache;
pub use jwks::{Jwk, Jwks};

use crate::{Error, Result};

/// RSA key size for the generated tool key.
const KEY_BITS: usize = 2048;

/// The tool's signing key plus the platform key cache.
pub struct KeyManager {
    encoding_key: EncodingKey,
    kid: String,
    public_jwks: Jwks,
    platform_keys: PlatformKeyCache,
}

impl KeyManager {
    /// Load the persisted key pair from `pem_path`, generating and
    /// persisting a fresh one if none exists.
    pub fn load_or_generate(
        pem_path: &Path,
        http: reqwest::Client,
        jwks_ttl: Duration,
        jwks_max_stale: Duration,
    ) -> Result<Self> {
        let pem = if pem_path.exists() {
            fs::read_to_string(pem_path)?
        } else {
            let pem = generate_key_pem()?;
            fs::write(pem_path, &pem)?;
            restrict_permissions(pem_path);
            info!(path = %pem_path.display(), "Generated tool signing key");
            pem
        };

        let private = RsaPrivateKey::from_pkcs8_pem(&pem)
            .map_err(|e| Error::Config(format!("invalid tool key at {}: {e}", pem_path.display())))?;
        let jwk = Jwk::from_rsa_public(&private.to_public_key());
        let kid = jwk.kid.clone();
        let encoding_key = EncodingKey::from_rsa_pem(pem.as_bytes())?;

        Ok(Self {
            encoding_key,
            kid,
            public_jwks: Jwks::single(jwk),
            platform_keys: PlatformKeyCache::new(http, jwks_ttl, jwks_max_stale),
        })
    }

    /// The stable key id of the tool's signing key.
    #[must_use]
    pub fn kid(&self) -> &str {
        &self.kid
    }

    /// The published public key set.
    #[must_use]
    pub fn public_jwks(&self) -> &Jwks {
        &self.public_jwks
    }

    /// The platform key cache used for id_token verification.
    #[must_use]
    pub fn platform_keys(&self) -> &PlatformKeyCache {
        &self.platform_keys
    }

    /// Sign `claims` as an RS256 JWT carrying this key's `kid`.
    pub fn sign<T: Serialize>(&self, claims: &T) -> Result<String> {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(self.kid.clone());
        Ok(jsonwebtoken::encode(&header, claims, &self.encoding_key)?)
    }
}

fn generate_key_pem() -> Result<String> {
    let mut rng = rand::rngs::OsRng;
    let private = RsaPrivateKey::new(&mut rng, KEY_BITS)
        .map_err(|e| Error::Internal(format!("RSA key generation failed: {e}")))?;
    let pem = private
        .to_pkcs8_pem(LineEnding::LF)
        .map_err(|e| Error::Internal(format!("key encoding failed: {e}")))?;
    Ok(pem.to_string())
}

/// Owner read/write only; key material must not be world-readable.
fn restrict_permissions(path: &Path) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let _ = fs::set_permissions(path, fs::Permissions::from_mode(0o600));
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
}
