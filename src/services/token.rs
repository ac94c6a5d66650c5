//! Platform access tokens via the client-credentials grant.
//!
//! AGS and NRPS calls authenticate with a short-lived bearer obtained from
//! the platform token endpoint, using a signed JWT client assertion
//! (`iss` = `sub` = client id, `aud` = token endpoint). Tokens are cached
//! per (issuer, scope-set) until expiry minus a safety margin, with
//! single-flight refresh so concurrent requests share one grant instead of
//! stampeding the token endpoint.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use dashmap::DashMap;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::keys::KeyManager;
use crate::registry::PlatformRegistration;
use crate::{Error, Result};

/// RFC 7523 client assertion type.
const CLIENT_ASSERTION_TYPE: &str = "urn:ietf:params:oauth:client-assertion-type:jwt-bearer";

/// Lifetime of a client assertion JWT.
const ASSERTION_TTL: Duration = Duration::from_secs(300);

/// Token endpoint response.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[allow(dead_code)]
    token_type: Option<String>,
    expires_in: Option<u64>,
}

struct CachedToken {
    access_token: String,
    expires_at: u64,
}

/// Access-token cache keyed by (issuer, scope-set).
pub struct AccessTokenCache {
    http: reqwest::Client,
    keys: Arc<KeyManager>,
    tokens: DashMap<String, CachedToken>,
    flights: DashMap<String, Arc<Mutex<()>>>,
    expiry_margin: Duration,
}

impl AccessTokenCache {
    /// Create a cache signing assertions with `keys`.
    #[must_use]
    pub fn new(http: reqwest::Client, keys: Arc<KeyManager>, expiry_margin: Duration) -> Self {
        Self {
            http,
            keys,
            tokens: DashMap::new(),
            flights: DashMap::new(),
            expiry_margin,
        }
    }

    /// A bearer token for `registration` covering `scopes`, from cache or a
    /// fresh grant.
    pub async fn bearer(
        &self,
        registration: &PlatformRegistration,
        scopes: &[String],
    ) -> Result<String> {
        let key = cache_key(&registration.issuer, scopes);

        if let Some(token) = self.fresh(&key) {
            return Ok(token);
        }

        // Single-flight per (issuer, scope-set): waiters pick up the token
        // the in-flight grant produced.
        let flight = self
            .flights
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = flight.lock().await;

        if let Some(token) = self.fresh(&key) {
            return Ok(token);
        }

        let token = self.grant(registration, scopes).await?;
        self.tokens.insert(
            key,
            CachedToken {
                access_token: token.access_token.clone(),
                expires_at: unix_now() + token.expires_in.unwrap_or(3600),
            },
        );
        Ok(token.access_token)
    }

    fn fresh(&self, key: &str) -> Option<String> {
        let cached = self.tokens.get(key)?;
        if unix_now() + self.expiry_margin.as_secs() >= cached.expires_at {
            return None;
        }
        Some(cached.access_token.clone())
    }

    async fn grant(
        &self,
        registration: &PlatformRegistration,
        scopes: &[String],
    ) -> Result<TokenResponse> {
        let now = unix_now();
        let assertion = self.keys.sign(&json!({
            "iss": registration.client_id,
            "sub": registration.client_id,
            "aud": registration.token_endpoint,
            "jti": Uuid::new_v4().to_string(),
            "iat": now,
            "exp": now + ASSERTION_TTL.as_secs(),
        }))?;

        let scope = scopes.join(" ");
        debug!(
            issuer = %registration.issuer,
            scope = %scope,
            "Requesting platform access token"
        );

        let response = self
            .http
            .post(&registration.token_endpoint)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_assertion_type", CLIENT_ASSERTION_TYPE),
                ("client_assertion", assertion.as_str()),
                ("scope", scope.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Error::Upstream {
                status: response.status().as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let token: TokenResponse = response.json().await?;
        info!(issuer = %registration.issuer, "Platform access token obtained");
        Ok(token)
    }
}

/// Stable cache key: issuer plus the sorted scope set.
fn cache_key(issuer: &str, scopes: &[String]) -> String {
    let mut sorted: Vec<&str> = scopes.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    format!("{issuer}|{}", sorted.join(" "))
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs()
}
