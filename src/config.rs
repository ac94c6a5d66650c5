//! Configuration management

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};

use crate::registry::PlatformRegistration;
use crate::{Error, Result};

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,
    /// Storage configuration
    pub storage: StorageConfig,
    /// LTI protocol tunables
    pub lti: LtiConfig,
    /// Platform registrations seeded at startup (idempotent upsert)
    pub platforms: Vec<PlatformRegistration>,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Externally visible base URL (behind a proxy this differs from
    /// host:port). Used for `redirect_uri` and content-item launch URLs.
    pub public_url: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 4000,
            public_url: None,
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory for the JSON store and key material
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
        }
    }
}

/// LTI protocol tunables.
///
/// Defaults: 10-minute launch-state TTL, 5-minute clock-skew tolerance,
/// 1-hour key-set TTL with a 24-hour staleness ceiling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LtiConfig {
    /// Launch state (state/nonce) lifetime in seconds
    pub state_ttl_secs: u64,
    /// Launch session lifetime in seconds
    pub session_ttl_secs: u64,
    /// Accepted clock skew when validating token time claims, in seconds
    pub clock_skew_secs: u64,
    /// Per-call timeout for outbound platform requests, in seconds
    pub http_timeout_secs: u64,
    /// Platform key-set cache TTL in seconds
    pub jwks_ttl_secs: u64,
    /// Hard ceiling on serving a stale platform key set, in seconds
    pub jwks_max_stale_secs: u64,
    /// Refresh access tokens this many seconds before their expiry
    pub token_expiry_margin_secs: u64,
}

impl Default for LtiConfig {
    fn default() -> Self {
        Self {
            state_ttl_secs: 600,
            session_ttl_secs: 86_400,
            clock_skew_secs: 300,
            http_timeout_secs: 10,
            jwks_ttl_secs: 3600,
            jwks_max_stale_secs: 86_400,
            token_expiry_margin_secs: 60,
        }
    }
}

impl LtiConfig {
    /// Launch state TTL as a [`Duration`].
    #[must_use]
    pub fn state_ttl(&self) -> Duration {
        Duration::from_secs(self.state_ttl_secs)
    }

    /// Session TTL as a [`Duration`].
    #[must_use]
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    /// Outbound HTTP timeout as a [`Duration`].
    #[must_use]
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Key-set TTL as a [`Duration`].
    #[must_use]
    pub fn jwks_ttl(&self) -> Duration {
        Duration::from_secs(self.jwks_ttl_secs)
    }

    /// Key-set staleness ceiling as a [`Duration`].
    #[must_use]
    pub fn jwks_max_stale(&self) -> Duration {
        Duration::from_secs(self.jwks_max_stale_secs)
    }
}

impl Config {
    /// Load configuration from an optional YAML file merged with
    /// `LTI_TOOL_`-prefixed environment variables (`__` nests sections,
    /// e.g. `LTI_TOOL_SERVER__PORT=4000`).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::new();

        if let Some(p) = path {
            if !p.exists() {
                return Err(Error::Config(format!(
                    "config file not found: {}",
                    p.display()
                )));
            }
            figment = figment.merge(Yaml::file(p));
        } else if Path::new("lti-tool.yaml").exists() {
            figment = figment.merge(Yaml::file("lti-tool.yaml"));
        }

        figment = figment.merge(Env::prefixed("LTI_TOOL_").split("__"));

        figment
            .extract()
            .map_err(|e| Error::Config(e.to_string()))
    }

    /// The externally visible base URL, without a trailing slash.
    #[must_use]
    pub fn public_base(&self) -> String {
        self.server
            .public_url
            .clone()
            .unwrap_or_else(|| format!("http://{}:{}", self.server.host, self.server.port))
            .trim_end_matches('/')
            .to_string()
    }

    /// This tool's launch endpoint (the OIDC `redirect_uri`).
    #[must_use]
    pub fn launch_url(&self) -> String {
        format!("{}/launch", self.public_base())
    }
}
