//! Launch sessions.
//!
//! A validated launch is bound to an opaque session token handed to the
//! rendered page; AGS/NRPS routes resolve the active launch through it
//! (query param `ltik` or `Authorization: Bearer`). The context behind a
//! token is immutable — sessions are read-only fan-out.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use super::context::LaunchContext;
use super::state::random_token;

struct SessionEntry {
    context: Arc<LaunchContext>,
    created_at: Instant,
}

/// In-memory session store with TTL-bounded entries.
pub struct SessionStore {
    entries: DashMap<String, SessionEntry>,
    ttl: Duration,
}

impl SessionStore {
    /// Create a store whose sessions expire after `ttl`.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Bind a validated launch context to a fresh session token.
    pub fn create(&self, context: LaunchContext) -> String {
        self.entries
            .retain(|_, s| s.created_at.elapsed() < self.ttl);
        let token = random_token();
        self.entries.insert(
            token.clone(),
            SessionEntry {
                context: Arc::new(context),
                created_at: Instant::now(),
            },
        );
        token
    }

    /// Resolve a session token to its launch context.
    #[must_use]
    pub fn resolve(&self, token: &str) -> Option<Arc<LaunchContext>> {
        let entry = self.entries.get(token)?;
        if entry.created_at.elapsed() >= self.ttl {
            drop(entry);
            self.entries.remove(token);
            return None;
        }
        Some(Arc::clone(&entry.context))
    }

    /// Number of live sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no sessions are live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
