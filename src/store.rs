//! JSON-file document store.
//!
//! Persists small collections (registrations, deep-linking selections) as
//! pretty-printed JSON files under the configured data directory, one file
//! per collection. Good enough for a tool provider's registration volume;
//! anything needing real durability can swap this layer for a database
//! without touching the callers.

use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{Error, Result};

/// File-per-collection JSON store.
pub struct JsonStore {
    base_dir: PathBuf,
}

impl JsonStore {
    /// Open (creating if needed) a store rooted at `base_dir`.
    pub fn open(base_dir: PathBuf) -> Result<Self> {
        if !base_dir.exists() {
            fs::create_dir_all(&base_dir)
                .map_err(|e| Error::Config(format!("cannot create data dir: {e}")))?;
        }
        Ok(Self { base_dir })
    }

    fn path(&self, collection: &str) -> PathBuf {
        self.base_dir.join(format!("{collection}.json"))
    }

    /// Load a collection; a missing file is an empty collection.
    pub fn load<T: DeserializeOwned>(&self, collection: &str) -> Result<Vec<T>> {
        let path = self.path(collection);
        if !path.exists() {
            debug!(collection = %collection, "No stored collection, starting empty");
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&path)?;
        match serde_json::from_str(&content) {
            Ok(items) => Ok(items),
            Err(e) => {
                warn!(collection = %collection, error = %e, "Failed to parse stored collection");
                Err(e.into())
            }
        }
    }

    /// Replace a collection on disk.
    pub fn save<T: Serialize>(&self, collection: &str, items: &[T]) -> Result<()> {
        let content = serde_json::to_string_pretty(items)?;
        fs::write(self.path(collection), content)?;
        Ok(())
    }

    /// Path of a raw (non-JSON) file inside the store, e.g. key material.
    #[must_use]
    pub fn raw_path(&self, name: &str) -> PathBuf {
        self.base_dir.join(name)
    }
}

/// A content item chosen by a user during a deep-linking launch.
///
/// `content_item_json` is the submitted content item verbatim, so the record
/// round-trips whatever the picker emitted (including any embedded
/// `lineItem` sub-object).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeepLinkingSelection {
    /// Record id
    pub id: String,
    /// Client id of the tool the selection belongs to
    pub tool_client_id: String,
    /// Item title
    #[serde(default)]
    pub title: String,
    /// Item launch URL
    #[serde(default)]
    pub url: String,
    /// The full content item as submitted
    pub content_item_json: serde_json::Value,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

/// Persistent store of deep-linking selections.
pub struct SelectionStore {
    selections: DashMap<String, DeepLinkingSelection>,
    store: JsonStore,
}

impl SelectionStore {
    const COLLECTION: &'static str = "selections";

    /// Load persisted selections from `store`.
    pub fn open(store: JsonStore) -> Result<Self> {
        let selections = DashMap::new();
        for s in store.load::<DeepLinkingSelection>(Self::COLLECTION)? {
            selections.insert(s.id.clone(), s);
        }
        Ok(Self { selections, store })
    }

    /// Record a selection and persist the collection.
    pub fn insert(&self, selection: DeepLinkingSelection) -> Result<()> {
        self.selections.insert(selection.id.clone(), selection);
        self.persist()
    }

    /// All selections, newest first.
    #[must_use]
    pub fn list(&self) -> Vec<DeepLinkingSelection> {
        let mut all: Vec<_> = self.selections.iter().map(|e| e.value().clone()).collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        all
    }

    /// Delete by id, persisting on success. Returns `true` if it existed.
    pub fn delete(&self, id: &str) -> Result<bool> {
        let removed = self.selections.remove(id).is_some();
        if removed {
            self.persist()?;
        }
        Ok(removed)
    }

    fn persist(&self) -> Result<()> {
        let all = self.list();
        self.store.save(Self::COLLECTION, &all)
    }
}
