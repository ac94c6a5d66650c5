//! Ephemeral launch state.
//!
//! Login initiation and launch validation are separate HTTP round trips
//! correlated only by the `state`/`nonce` pair, so this store is the one
//! shared mutable resource across that gap. Consumption is single-use and
//! atomic: `DashMap::remove` is the consume, so no two validation attempts
//! can both succeed against the same `state` even under concurrency.

use std::time::{Duration, Instant};

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use dashmap::DashMap;
use rand::RngCore;

/// State recorded between login initiation and launch validation.
#[derive(Debug, Clone)]
pub struct LaunchState {
    /// Nonce the id_token must echo.
    pub nonce: String,
    /// Where the launch intends to land, if the platform sent one.
    pub target_link_uri: Option<String>,
    created_at: Instant,
}

/// In-memory launch state store with TTL-bounded entries.
pub struct LaunchStateStore {
    entries: DashMap<String, LaunchState>,
    ttl: Duration,
}

impl LaunchStateStore {
    /// Create a store whose entries expire after `ttl`.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Record state for a fresh login initiation.
    pub fn insert(&self, state: String, nonce: String, target_link_uri: Option<String>) {
        // Expired entries are purged opportunistically; abandoned logins
        // otherwise accumulate forever.
        self.entries
            .retain(|_, s| s.created_at.elapsed() < self.ttl);
        self.entries.insert(
            state,
            LaunchState {
                nonce,
                target_link_uri,
                created_at: Instant::now(),
            },
        );
    }

    /// Atomically consume the state: delete-on-read, exactly once.
    ///
    /// Returns `None` for unknown, already-consumed, or expired states —
    /// indistinguishable by design.
    #[must_use]
    pub fn consume(&self, state: &str) -> Option<LaunchState> {
        let (_, entry) = self.entries.remove(state)?;
        if entry.created_at.elapsed() >= self.ttl {
            return None;
        }
        Some(entry)
    }

    /// Whether a state is currently pending (test hook).
    #[must_use]
    pub fn contains(&self, state: &str) -> bool {
        self.entries.contains_key(state)
    }

    /// Number of pending states.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store has no pending states.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Generate an opaque URL-safe token with 256 bits of entropy.
///
/// Used for `state`, `nonce`, and session tokens.
#[must_use]
pub fn random_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> LaunchStateStore {
        LaunchStateStore::new(Duration::from_secs(600))
    }

    #[test]
    fn consume_is_single_use() {
        let store = store();
        store.insert("s1".to_string(), "n1".to_string(), None);

        let first = store.consume("s1");
        assert_eq!(first.unwrap().nonce, "n1");

        // Second attempt against the same state must fail.
        assert!(store.consume("s1").is_none());
    }

    #[test]
    fn unknown_state_is_none() {
        assert!(store().consume("missing").is_none());
    }

    #[test]
    fn expired_state_is_not_consumable() {
        let store = LaunchStateStore::new(Duration::ZERO);
        store.insert("s1".to_string(), "n1".to_string(), None);
        assert!(store.consume("s1").is_none());
    }

    #[test]
    fn insert_purges_expired_entries() {
        let store = LaunchStateStore::new(Duration::ZERO);
        store.insert("s1".to_string(), "n1".to_string(), None);
        store.insert("s2".to_string(), "n2".to_string(), None);
        // s1 was already expired when s2 arrived.
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn random_token_is_long_unique_and_url_safe() {
        let a = random_token();
        let b = random_token();
        assert_ne!(a, b);
        // 32 bytes -> 43 base64url chars
        assert_eq!(a.len(), 43);
        assert!(!a.contains('+'));
        assert!(!a.contains('/'));
        assert!(!a.contains('='));
    }
}
