//! Platform and tool registrations.
//!
//! A [`PlatformRegistration`] is the trust anchor for everything inbound and
//! outbound: incoming id_tokens are only accepted from registered issuers,
//! and outbound AGS/NRPS grants authenticate against the registered token
//! endpoint. [`ToolRegistration`] records feed the launch-form UI and the
//! admin API; the tool provider itself only reads them.
//!
//! Both collections are held in memory behind `DashMap` and written through
//! to the JSON store on every mutation.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::store::JsonStore;
use crate::{Error, Result};

/// A platform (LMS) trusted by this tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformRegistration {
    /// Platform issuer URL; unique key for the registration.
    pub issuer: String,
    /// Client id this tool was assigned by the platform.
    pub client_id: String,
    /// OIDC authentication endpoint the login initiation redirects to.
    pub auth_endpoint: String,
    /// OAuth2 token endpoint for client-credentials grants.
    pub token_endpoint: String,
    /// Platform JWK set URL for id_token verification.
    pub jwks_url: String,
    /// Deployment ids this registration is limited to. Empty means any.
    #[serde(default)]
    pub deployment_ids: Vec<String>,
}

/// A tool registration created through the admin API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolRegistration {
    /// Record id
    pub id: String,
    /// Display name
    pub name: String,
    /// Client id the platform will use for this tool
    pub client_id: String,
    /// OIDC login initiation URL
    pub login_initiation_url: String,
    /// Launch (target link) URL
    pub target_link_url: String,
    /// The tool's JWK set URL
    pub jwks_url: String,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

/// Fields of a tool registration supplied by the admin API.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewToolRegistration {
    /// Display name
    pub name: String,
    /// Client id
    pub client_id: String,
    /// OIDC login initiation URL
    pub login_initiation_url: String,
    /// Launch (target link) URL
    pub target_link_url: String,
    /// The tool's JWK set URL
    #[serde(default)]
    pub jwks_url: String,
}

/// Outcome of a platform registration upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// No registration existed for the issuer.
    Created,
    /// A byte-identical registration already existed.
    AlreadyRegistered,
    /// An existing registration was replaced with new endpoints/keys.
    Updated,
}

/// Durable registry of platforms and tools.
pub struct RegistrationStore {
    platforms: DashMap<String, PlatformRegistration>,
    tools: DashMap<String, ToolRegistration>,
    store: JsonStore,
}

impl RegistrationStore {
    const PLATFORMS: &'static str = "platforms";
    const TOOLS: &'static str = "tools";

    /// Load persisted registrations from `store`.
    pub fn open(store: JsonStore) -> Result<Self> {
        let platforms = DashMap::new();
        for p in store.load::<PlatformRegistration>(Self::PLATFORMS)? {
            platforms.insert(p.issuer.clone(), p);
        }
        let tools = DashMap::new();
        for t in store.load::<ToolRegistration>(Self::TOOLS)? {
            tools.insert(t.id.clone(), t);
        }
        Ok(Self {
            platforms,
            tools,
            store,
        })
    }

    // ── Platforms ─────────────────────────────────────────────────────────

    /// Resolve a platform registration by issuer.
    #[must_use]
    pub fn platform_by_issuer(&self, issuer: &str) -> Option<PlatformRegistration> {
        self.platforms.get(issuer).map(|e| e.value().clone())
    }

    /// Idempotent platform upsert with an explicit outcome.
    ///
    /// Registration happens at startup from config and through operator
    /// action; either way the outcome is surfaced, never swallowed.
    pub fn upsert_platform(&self, registration: PlatformRegistration) -> Result<UpsertOutcome> {
        let outcome = match self.platforms.get(&registration.issuer) {
            Some(existing) if *existing.value() == registration => UpsertOutcome::AlreadyRegistered,
            Some(_) => UpsertOutcome::Updated,
            None => UpsertOutcome::Created,
        };
        if outcome != UpsertOutcome::AlreadyRegistered {
            info!(
                issuer = %registration.issuer,
                client_id = %registration.client_id,
                outcome = ?outcome,
                "Platform registration upserted"
            );
            self.platforms
                .insert(registration.issuer.clone(), registration);
            self.persist_platforms()?;
        }
        Ok(outcome)
    }

    /// All registered platforms.
    #[must_use]
    pub fn list_platforms(&self) -> Vec<PlatformRegistration> {
        self.platforms.iter().map(|e| e.value().clone()).collect()
    }

    // ── Tools ─────────────────────────────────────────────────────────────

    /// Create a tool registration, assigning its id and timestamp.
    pub fn create_tool(&self, new: NewToolRegistration) -> Result<ToolRegistration> {
        let tool = ToolRegistration {
            id: Uuid::new_v4().to_string(),
            name: new.name,
            client_id: new.client_id,
            login_initiation_url: new.login_initiation_url,
            target_link_url: new.target_link_url,
            jwks_url: new.jwks_url,
            created_at: Utc::now(),
        };
        self.tools.insert(tool.id.clone(), tool.clone());
        self.persist_tools()?;
        Ok(tool)
    }

    /// Look up a tool registration by id.
    pub fn get_tool(&self, id: &str) -> Result<ToolRegistration> {
        self.tools
            .get(id)
            .map(|e| e.value().clone())
            .ok_or_else(|| Error::UnknownTool(id.to_string()))
    }

    /// Delete a tool registration. Returns `true` if it existed.
    pub fn delete_tool(&self, id: &str) -> Result<bool> {
        let removed = self.tools.remove(id).is_some();
        if removed {
            self.persist_tools()?;
        }
        Ok(removed)
    }

    /// All tool registrations, newest first.
    #[must_use]
    pub fn list_tools(&self) -> Vec<ToolRegistration> {
        let mut all: Vec<_> = self.tools.iter().map(|e| e.value().clone()).collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        all
    }

    fn persist_platforms(&self) -> Result<()> {
        let all = self.list_platforms();
        self.store.save(Self::PLATFORMS, &all)
    }

    fn persist_tools(&self) -> Result<()> {
        let all = self.list_tools();
        self.store.save(Self::TOOLS, &all)
    }
}
