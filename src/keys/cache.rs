//! Platform key-set cache.
//!
//! One entry per issuer, refreshed on TTL expiry or on demand when the
//! validator sees an unknown `kid`. Two properties matter here:
//!
//! - **Single-flight**: concurrent cache misses for the same issuer await
//!   one upstream fetch instead of stampeding the platform's JWKS endpoint.
//! - **Serve-stale-on-error**: a failed refresh keeps serving the previous
//!   key set until it exceeds a hard staleness ceiling, at which point the
//!   issuer is treated as misconfigured. Losing verification entirely is
//!   worse than a bounded staleness window during platform key rotation.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use jsonwebtoken::jwk::JwkSet;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::{Error, Result};

/// A fetched key set with its fetch time.
struct CachedKeys {
    set: JwkSet,
    fetched_at: Instant,
}

/// If a forced refresh finds an entry this recent, another caller already
/// refreshed it; don't fetch again.
const REFRESH_DEBOUNCE: Duration = Duration::from_secs(10);

/// Key-set cache, one entry per platform issuer.
pub struct PlatformKeyCache {
    entries: DashMap<String, CachedKeys>,
    flights: DashMap<String, Arc<Mutex<()>>>,
    http: reqwest::Client,
    ttl: Duration,
    max_stale: Duration,
}

impl PlatformKeyCache {
    /// Create a cache using `http` for fetches.
    #[must_use]
    pub fn new(http: reqwest::Client, ttl: Duration, max_stale: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            flights: DashMap::new(),
            http,
            ttl,
            max_stale,
        }
    }

    /// Return the key set for `issuer`, fetching from `jwks_url` on a cache
    /// miss or TTL expiry. `force_refresh` bypasses the TTL (used when a
    /// token carries an unknown `kid`).
    pub async fn get(&self, issuer: &str, jwks_url: &str, force_refresh: bool) -> Result<JwkSet> {
        if !force_refresh {
            if let Some(cached) = self.entries.get(issuer) {
                if cached.fetched_at.elapsed() < self.ttl {
                    return Ok(cached.set.clone());
                }
            }
        }

        // Single-flight: one fetch per issuer at a time; waiters re-check
        // the cache once the in-flight fetch completes.
        let flight = self
            .flights
            .entry(issuer.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = flight.lock().await;

        if let Some(cached) = self.entries.get(issuer) {
            let age = cached.fetched_at.elapsed();
            let fresh_enough = if force_refresh {
                age < REFRESH_DEBOUNCE
            } else {
                age < self.ttl
            };
            if fresh_enough {
                return Ok(cached.set.clone());
            }
        }

        debug!(issuer = %issuer, url = %jwks_url, "Fetching platform key set");
        match self.fetch(jwks_url).await {
            Ok(set) => {
                self.entries.insert(
                    issuer.to_string(),
                    CachedKeys {
                        set: set.clone(),
                        fetched_at: Instant::now(),
                    },
                );
                Ok(set)
            }
            Err(e) => self.serve_stale(issuer, e),
        }
    }

    async fn fetch(&self, jwks_url: &str) -> Result<JwkSet> {
        let response = self.http.get(jwks_url).send().await?;
        if !response.status().is_success() {
            return Err(Error::Upstream {
                status: response.status().as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }
        Ok(response.json().await?)
    }

    /// A failed refresh falls back to the previous entry while it is within
    /// the staleness ceiling; beyond that the issuer escalates to a
    /// configuration error.
    fn serve_stale(&self, issuer: &str, fetch_err: Error) -> Result<JwkSet> {
        match self.entries.get(issuer) {
            Some(cached) if cached.fetched_at.elapsed() < self.max_stale => {
                warn!(issuer = %issuer, error = %fetch_err, "Key set refresh failed, serving stale entry");
                Ok(cached.set.clone())
            }
            Some(_) => {
                warn!(issuer = %issuer, error = %fetch_err, "Key set stale beyond ceiling");
                Err(Error::KeySetStale(issuer.to_string()))
            }
            None => Err(fetch_err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::{Router, extract::State, routing::get};

    /// Serve a minimal JWKS on an ephemeral port, counting fetches.
    async fn jwks_server(counter: Arc<AtomicUsize>) -> String {
        async fn handler(State(counter): State<Arc<AtomicUsize>>) -> axum::Json<serde_json::Value> {
            counter.fetch_add(1, Ordering::SeqCst);
            axum::Json(serde_json::json!({"keys": []}))
        }

        let app = Router::new()
            .route("/jwks", get(handler))
            .with_state(counter);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/jwks")
    }

    fn cache() -> PlatformKeyCache {
        PlatformKeyCache::new(
            reqwest::Client::new(),
            Duration::from_secs(3600),
            Duration::from_secs(86_400),
        )
    }

    #[tokio::test]
    async fn concurrent_misses_trigger_one_fetch() {
        let counter = Arc::new(AtomicUsize::new(0));
        let url = jwks_server(counter.clone()).await;
        let cache = cache();

        let (a, b) = tokio::join!(
            cache.get("https://platform.example", &url, false),
            cache.get("https://platform.example", &url, false),
        );
        assert!(a.is_ok());
        assert!(b.is_ok());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn fresh_entry_is_served_without_fetch() {
        let counter = Arc::new(AtomicUsize::new(0));
        let url = jwks_server(counter.clone()).await;
        let cache = cache();

        cache.get("https://platform.example", &url, false).await.unwrap();
        cache.get("https://platform.example", &url, false).await.unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn forced_refresh_debounces_back_to_back_misses() {
        let counter = Arc::new(AtomicUsize::new(0));
        let url = jwks_server(counter.clone()).await;
        let cache = cache();

        cache.get("https://platform.example", &url, false).await.unwrap();
        // An unknown-kid refresh right after a fetch reuses the fresh entry.
        cache.get("https://platform.example", &url, true).await.unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn refresh_failure_serves_stale_within_ceiling() {
        let counter = Arc::new(AtomicUsize::new(0));
        let url = jwks_server(counter.clone()).await;
        // Zero TTL so the second get always refreshes.
        let cache = PlatformKeyCache::new(
            reqwest::Client::new(),
            Duration::ZERO,
            Duration::from_secs(86_400),
        );

        cache.get("https://platform.example", &url, false).await.unwrap();
        // Point subsequent fetches at a closed port.
        let dead = "http://127.0.0.1:1/jwks";
        let set = cache.get("https://platform.example", dead, false).await;
        assert!(set.is_ok(), "stale entry should be served on fetch failure");
    }

    #[tokio::test]
    async fn miss_with_unreachable_endpoint_fails() {
        let cache = cache();
        let result = cache
            .get("https://platform.example", "http://127.0.0.1:1/jwks", false)
            .await;
        assert!(result.is_err());
    }
}
