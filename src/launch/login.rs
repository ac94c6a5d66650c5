//! OIDC third-party initiated login.
//!
//! First leg of the LTI launch handshake: the platform hits `/login` with
//! `iss` and `login_hint`, and the tool answers with a redirect to the
//! platform's authentication endpoint carrying a fresh `state`/`nonce`
//! pair. The matching [`LaunchState`](super::state::LaunchState) is the
//! only thing remembered across the redirect gap.

use serde::Deserialize;
use tracing::{debug, info};
use url::Url;

use super::state::{LaunchStateStore, random_token};
use crate::registry::RegistrationStore;
use crate::{Error, Result};

/// Parameters of an OIDC login initiation request.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    /// Platform issuer
    pub iss: String,
    /// Opaque user hint to pass through
    #[serde(default)]
    pub login_hint: Option<String>,
    /// Where the platform wants the launch to land
    #[serde(default)]
    pub target_link_uri: Option<String>,
    /// Opaque message hint to pass through
    #[serde(default)]
    pub lti_message_hint: Option<String>,
    /// Client id, when the platform disambiguates multiple registrations
    #[serde(default)]
    pub client_id: Option<String>,
}

/// Validate the issuer, mint `state`/`nonce`, record the launch state, and
/// build the authorization redirect URL.
pub fn initiate(
    registrations: &RegistrationStore,
    states: &LaunchStateStore,
    launch_url: &str,
    request: &LoginRequest,
) -> Result<String> {
    let registration = registrations
        .platform_by_issuer(&request.iss)
        .ok_or_else(|| Error::UnknownPlatform(request.iss.clone()))?;

    // A client_id sent by the platform must match the registration; a
    // mismatch means the request is for somebody else's registration.
    if let Some(ref client_id) = request.client_id {
        if *client_id != registration.client_id {
            debug!(iss = %request.iss, client_id = %client_id, "client_id does not match registration");
            return Err(Error::UnknownPlatform(request.iss.clone()));
        }
    }

    let state = random_token();
    let nonce = random_token();
    states.insert(state.clone(), nonce.clone(), request.target_link_uri.clone());

    let mut auth_url = Url::parse(&registration.auth_endpoint)
        .map_err(|e| Error::Config(format!("invalid auth endpoint for {}: {e}", request.iss)))?;
    {
        let mut params = auth_url.query_pairs_mut();
        params.append_pair("response_type", "id_token");
        params.append_pair("scope", "openid");
        params.append_pair("client_id", &registration.client_id);
        params.append_pair("redirect_uri", launch_url);
        if let Some(ref hint) = request.login_hint {
            params.append_pair("login_hint", hint);
        }
        if let Some(ref hint) = request.lti_message_hint {
            params.append_pair("lti_message_hint", hint);
        }
        params.append_pair("state", &state);
        params.append_pair("nonce", &nonce);
        params.append_pair("prompt", "none");
        params.append_pair("response_mode", "form_post");
    }

    info!(iss = %request.iss, "Login initiated, redirecting to platform");
    Ok(auth_url.into())
}
