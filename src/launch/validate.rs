//! Launch token validation — the core of the launch state machine.
//!
//! # Protocol, in order
//!
//! 1. Atomically consume the `state` (single-use, delete-on-read). This is
//!    the primary CSRF/replay defense and happens before anything else, so
//!    at most one validation can ever be attempted per launch even if the
//!    requester retries mid-flight.
//! 2. Parse the id_token without trusting it; extract `iss` and header `kid`.
//! 3. Resolve the platform registration by issuer.
//! 4. Find the verification key in the cached platform key set; an unknown
//!    `kid` forces exactly one refresh before failing.
//! 5. Verify signature, time window, audience, and nonce.
//! 6. Normalize the LTI claims into a [`LaunchContext`].
//!
//! Validation failures carry their specific reason for server-side logs but
//! must never be echoed to the platform beyond a generic rejection.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::jwk::{AlgorithmParameters, JwkSet};
use jsonwebtoken::{Algorithm, DecodingKey, TokenData, Validation};
use tracing::debug;

use super::context::{IdTokenClaims, LaunchContext};
use super::state::LaunchStateStore;
use crate::keys::KeyManager;
use crate::registry::RegistrationStore;

/// Error variants for launch validation failures.
///
/// All of these render as a generic 401/400 at the HTTP boundary; the
/// variant detail exists for diagnostics only.
#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    /// The `state` is unknown, already consumed, or expired.
    #[error("launch state not found or expired")]
    StateNotFoundOrExpired,

    /// The token's issuer has no platform registration.
    #[error("unknown issuer: {0}")]
    UnknownIssuer(String),

    /// The JWT header carries no `kid`.
    #[error("JWT missing 'kid' header")]
    MissingKeyId,

    /// The `kid` is absent from the platform key set even after a refresh.
    #[error("unknown signing key: {0}")]
    UnknownSigningKey(String),

    /// Signature, time-window, audience, or nonce violation.
    #[error("invalid launch token: {0}")]
    InvalidToken(String),

    /// JWT decode / signature verification failure.
    #[error("JWT verification failed: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    /// Platform key set could not be obtained.
    #[error(transparent)]
    KeySet(#[from] crate::Error),
}

/// Verifies incoming id_tokens and builds launch contexts.
pub struct LaunchValidator {
    registrations: Arc<RegistrationStore>,
    keys: Arc<KeyManager>,
    states: Arc<LaunchStateStore>,
    clock_skew: Duration,
}

impl LaunchValidator {
    /// Create a validator over the shared stores.
    #[must_use]
    pub fn new(
        registrations: Arc<RegistrationStore>,
        keys: Arc<KeyManager>,
        states: Arc<LaunchStateStore>,
        clock_skew: Duration,
    ) -> Self {
        Self {
            registrations,
            keys,
            states,
            clock_skew,
        }
    }

    /// Validate a launch form post and return the normalized context.
    pub async fn validate(&self, id_token: &str, state: &str) -> Result<LaunchContext, LaunchError> {
        // Consume-then-validate: the state is spent before any verification
        // so a replayed or retried launch can never validate twice.
        let launch_state = self
            .states
            .consume(state)
            .ok_or(LaunchError::StateNotFoundOrExpired)?;

        let header = jsonwebtoken::decode_header(id_token)?;
        let kid = header.kid.ok_or(LaunchError::MissingKeyId)?;
        let issuer = extract_unverified_issuer(id_token)?;

        let registration = self
            .registrations
            .platform_by_issuer(&issuer)
            .ok_or_else(|| LaunchError::UnknownIssuer(issuer.clone()))?;

        let decoding_key = self
            .find_decoding_key(&issuer, &registration.jwks_url, &kid)
            .await?;

        let algorithm = match header.alg {
            Algorithm::RS256 | Algorithm::RS384 | Algorithm::RS512 => header.alg,
            other => {
                return Err(LaunchError::InvalidToken(format!(
                    "unsupported algorithm {other:?}"
                )));
            }
        };

        let mut validation = Validation::new(algorithm);
        validation.leeway = self.clock_skew.as_secs();
        // Audience is checked manually below to support both single-string
        // and array forms plus the azp rule.
        validation.validate_aud = false;

        let token_data: TokenData<IdTokenClaims> =
            jsonwebtoken::decode(id_token, &decoding_key, &validation)?;
        let claims = token_data.claims;

        check_audience(&claims.aud, claims.azp.as_deref(), &registration.client_id)?;

        let now = unix_now();
        if claims.iat > now + self.clock_skew.as_secs() {
            return Err(LaunchError::InvalidToken(
                "token issued in the future".to_string(),
            ));
        }

        match claims.nonce.as_deref() {
            Some(nonce) if nonce == launch_state.nonce => {}
            Some(_) => {
                return Err(LaunchError::InvalidToken("nonce mismatch".to_string()));
            }
            None => {
                return Err(LaunchError::InvalidToken("missing nonce".to_string()));
            }
        }

        if claims.message_type.is_none() {
            return Err(LaunchError::InvalidToken(
                "missing message_type claim".to_string(),
            ));
        }
        let Some(ref deployment_id) = claims.deployment_id else {
            return Err(LaunchError::InvalidToken(
                "missing deployment_id claim".to_string(),
            ));
        };
        if !registration.deployment_ids.is_empty()
            && !registration.deployment_ids.contains(deployment_id)
        {
            return Err(LaunchError::InvalidToken(format!(
                "deployment_id {deployment_id} not registered"
            )));
        }

        debug!(issuer = %issuer, user = %claims.sub, "Launch token verified");
        Ok(LaunchContext::from_claims(claims, &registration.client_id))
    }

    /// Find a decoding key by `kid`, forcing one key-set refresh if absent.
    async fn find_decoding_key(
        &self,
        issuer: &str,
        jwks_url: &str,
        kid: &str,
    ) -> Result<DecodingKey, LaunchError> {
        let cache = self.keys.platform_keys();

        let jwks = cache.get(issuer, jwks_url, false).await?;
        if let Some(key) = find_key_in_jwks(&jwks, kid) {
            return Ok(key);
        }

        debug!(kid = %kid, issuer = %issuer, "Key not in cached set, refreshing");
        let jwks = cache.get(issuer, jwks_url, true).await?;
        find_key_in_jwks(&jwks, kid)
            .ok_or_else(|| LaunchError::UnknownSigningKey(kid.to_string()))
    }
}

/// Extract `iss` from a JWT payload without signature verification.
///
/// Used only to pick the registration; nothing else is trusted from here.
fn extract_unverified_issuer(token: &str) -> Result<String, LaunchError> {
    let invalid =
        || jsonwebtoken::errors::Error::from(jsonwebtoken::errors::ErrorKind::InvalidToken);

    let mut parts = token.splitn(3, '.');
    let payload = parts.nth(1).ok_or_else(|| LaunchError::Jwt(invalid()))?;
    let decoded = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|_| LaunchError::Jwt(invalid()))?;
    let value: serde_json::Value =
        serde_json::from_slice(&decoded).map_err(|_| LaunchError::Jwt(invalid()))?;
    value
        .get("iss")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| LaunchError::InvalidToken("missing iss claim".to_string()))
}

/// Find a JWK by `kid` and convert it to a `DecodingKey`.
fn find_key_in_jwks(jwks: &JwkSet, kid: &str) -> Option<DecodingKey> {
    for jwk in &jwks.keys {
        if jwk.common.key_id.as_deref() != Some(kid) {
            continue;
        }
        return match &jwk.algorithm {
            AlgorithmParameters::RSA(rsa) => DecodingKey::from_rsa_components(&rsa.n, &rsa.e).ok(),
            _ => None,
        };
    }
    None
}

/// `aud` must name the registered client, and when the platform sends an
/// `azp` it must be the client as well.
fn check_audience(
    aud: &serde_json::Value,
    azp: Option<&str>,
    client_id: &str,
) -> Result<(), LaunchError> {
    let matches = match aud {
        serde_json::Value::String(s) => s == client_id,
        serde_json::Value::Array(arr) => arr
            .iter()
            .any(|v| v.as_str().is_some_and(|s| s == client_id)),
        _ => false,
    };
    if !matches {
        return Err(LaunchError::InvalidToken("audience mismatch".to_string()));
    }
    if let Some(azp) = azp {
        if azp != client_id {
            return Err(LaunchError::InvalidToken("azp mismatch".to_string()));
        }
    }
    Ok(())
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn audience_accepts_string_match() {
        assert!(check_audience(&json!("c1"), None, "c1").is_ok());
    }

    #[test]
    fn audience_accepts_array_member() {
        assert!(check_audience(&json!(["other", "c1"]), None, "c1").is_ok());
    }

    #[test]
    fn audience_rejects_mismatch() {
        assert!(check_audience(&json!("someone-else"), None, "c1").is_err());
        assert!(check_audience(&json!([]), None, "c1").is_err());
    }

    #[test]
    fn azp_must_match_when_present() {
        assert!(check_audience(&json!(["c1", "c2"]), Some("c1"), "c1").is_ok());
        assert!(check_audience(&json!(["c1", "c2"]), Some("c2"), "c1").is_err());
    }

    #[test]
    fn unverified_issuer_extraction() {
        // header.payload.signature with payload {"iss":"https://p.example"}
        let payload = URL_SAFE_NO_PAD.encode(br#"{"iss":"https://p.example"}"#);
        let token = format!("e30.{payload}.sig");
        assert_eq!(
            extract_unverified_issuer(&token).unwrap(),
            "https://p.example"
        );
    }

    #[test]
    fn malformed_token_is_rejected() {
        assert!(extract_unverified_issuer("not-a-jwt").is_err());
    }
}
