//! HTTP server — the service object and router.
//!
//! [`LtiTool`] is constructed once at startup and owns every shared
//! subsystem (registration store, key manager, launch state, sessions,
//! caches, service clients). Handlers receive it through axum state; there
//! is no ambient global.

mod admin_routes;
mod ags_routes;
mod lti_routes;
mod nrps_routes;
mod pages;

use std::sync::Arc;
use std::time::Duration;

use axum::Json;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Router;
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::Config;
use crate::deep_linking::DeepLinkingEngine;
use crate::keys::KeyManager;
use crate::launch::{LaunchContext, LaunchStateStore, LaunchValidator, SessionStore};
use crate::registry::RegistrationStore;
use crate::services::{AccessTokenCache, AgsClient, NrpsClient};
use crate::store::{JsonStore, SelectionStore};
use crate::{Error, Result};

/// The tool provider service object.
///
/// One instance per process, shared by reference into every handler.
pub struct LtiTool {
    /// Loaded configuration
    pub config: Config,
    /// Platform/tool registrations
    pub registrations: Arc<RegistrationStore>,
    /// Persisted deep-linking selections
    pub selections: Arc<SelectionStore>,
    /// Tool signing key + platform key cache
    pub keys: Arc<KeyManager>,
    /// Pending login states
    pub launch_states: Arc<LaunchStateStore>,
    /// Active launch sessions
    pub sessions: Arc<SessionStore>,
    /// Launch token validator
    pub validator: LaunchValidator,
    /// Deep-linking response builder
    pub deep_linking: DeepLinkingEngine,
    /// AGS client
    pub ags: AgsClient,
    /// NRPS client
    pub nrps: NrpsClient,
}

impl LtiTool {
    /// Build the service object, loading persisted state and seeding
    /// platform registrations from config.
    pub fn new(config: Config) -> Result<Arc<Self>> {
        let http = reqwest::Client::builder()
            .timeout(config.lti.http_timeout())
            .build()?;

        let data_dir = config.storage.data_dir.clone();
        let registrations = Arc::new(RegistrationStore::open(JsonStore::open(data_dir.clone())?)?);
        let selections = Arc::new(SelectionStore::open(JsonStore::open(data_dir.clone())?)?);
        let keys = Arc::new(KeyManager::load_or_generate(
            &data_dir.join("keypair.pem"),
            http.clone(),
            config.lti.jwks_ttl(),
            config.lti.jwks_max_stale(),
        )?);

        let launch_states = Arc::new(LaunchStateStore::new(config.lti.state_ttl()));
        let sessions = Arc::new(SessionStore::new(config.lti.session_ttl()));
        let validator = LaunchValidator::new(
            Arc::clone(&registrations),
            Arc::clone(&keys),
            Arc::clone(&launch_states),
            Duration::from_secs(config.lti.clock_skew_secs),
        );
        let deep_linking = DeepLinkingEngine::new(Arc::clone(&keys));
        let tokens = Arc::new(AccessTokenCache::new(
            http.clone(),
            Arc::clone(&keys),
            Duration::from_secs(config.lti.token_expiry_margin_secs),
        ));
        let ags = AgsClient::new(http.clone(), Arc::clone(&tokens), Arc::clone(&registrations));
        let nrps = NrpsClient::new(http, tokens, Arc::clone(&registrations));

        let tool = Arc::new(Self {
            config,
            registrations,
            selections,
            keys,
            launch_states,
            sessions,
            validator,
            deep_linking,
            ags,
            nrps,
        });
        tool.register_configured_platforms();
        Ok(tool)
    }

    /// Seed platform registrations from config. Outcomes are surfaced per
    /// platform; a failure is an operator problem, not a silent no-op.
    fn register_configured_platforms(&self) {
        for platform in &self.config.platforms {
            match self.registrations.upsert_platform(platform.clone()) {
                Ok(outcome) => {
                    info!(issuer = %platform.issuer, outcome = ?outcome, "Configured platform registered");
                }
                Err(e) => {
                    error!(issuer = %platform.issuer, error = %e, "Configured platform registration failed");
                }
            }
        }
    }

    /// Assemble the full router.
    pub fn router(self: &Arc<Self>) -> Router {
        Router::new()
            .merge(lti_routes::routes())
            .merge(ags_routes::routes())
            .merge(nrps_routes::routes())
            .merge(admin_routes::routes())
            .layer(TraceLayer::new_for_http())
            .with_state(Arc::clone(self))
    }

    /// Bind and serve until shutdown.
    pub async fn run(self: Arc<Self>) -> Result<()> {
        let addr = format!("{}:{}", self.config.server.host, self.config.server.port);
        let listener = TcpListener::bind(&addr).await?;
        info!(
            addr = %addr,
            public_url = %self.config.public_base(),
            kid = %self.keys.kid(),
            "LTI tool provider listening"
        );

        let router = self.router();
        axum::serve(listener, router)
            .with_graceful_shutdown(async {
                let _ = tokio::signal::ctrl_c().await;
                info!("Shutdown signal received");
            })
            .await?;
        Ok(())
    }
}

/// JSON error response in the `{error, message}` shape every route uses.
pub(crate) fn error_response(err: &Error) -> Response {
    let status = StatusCode::from_u16(err.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (
        status,
        Json(json!({"error": err.api_code(), "message": err.to_string()})),
    )
        .into_response()
}

/// Resolve the active launch session from the `ltik` query param or an
/// `Authorization: Bearer` header.
///
/// Every session-guarded route fails identically — 401 with
/// `{"error":"noLaunch"}` — when no validated launch backs the request.
pub(crate) fn require_session(
    tool: &LtiTool,
    headers: &HeaderMap,
    ltik: Option<&str>,
) -> std::result::Result<Arc<LaunchContext>, Response> {
    let bearer = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer ").or_else(|| v.strip_prefix("bearer ")));

    ltik.or(bearer)
        .and_then(|token| tool.sessions.resolve(token))
        .ok_or_else(|| {
            (
                StatusCode::UNAUTHORIZED,
                Json(json!({
                    "error": "noLaunch",
                    "message": "Launch session not found. Re-launch the tool."
                })),
            )
                .into_response()
        })
}
