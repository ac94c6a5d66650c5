//! Names & Roles Provisioning Service client.
//!
//! Fetches paginated course membership from the NRPS endpoint the launch
//! advertised. There is deliberately no fallback URL: a launch without the
//! NRPS claim hard-fails, since guessing a roster endpoint risks querying
//! the wrong context.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::token::AccessTokenCache;
use crate::launch::LaunchContext;
use crate::registry::RegistrationStore;
use crate::{Error, Result};

/// NRPS membership scope.
const NRPS_SCOPE: &str =
    "https://purl.imsglobal.org/spec/lti-nrps/scope/contextmembership.readonly";

/// NRPS container media type.
const MEMBERSHIP_CONTAINER_TYPE: &str =
    "application/vnd.ims.lti-nrps.v2.membershipcontainer+json";

/// A roster entry. Unknown platform fields are preserved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Member {
    /// Platform user id
    #[serde(default)]
    pub user_id: Option<String>,
    /// Full display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Given name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,
    /// Family name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family_name: Option<String>,
    /// Role URIs in this context
    #[serde(default)]
    pub roles: Vec<String>,
    /// Any additional platform fields
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// One page of membership, with next-page information surfaced rather than
/// silently truncated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MembershipPage {
    /// Container id as reported by the platform
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Context block as reported by the platform
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
    /// Members on this page
    #[serde(default)]
    pub members: Vec<Member>,
    /// URL of the next page, from the `Link: <...>; rel="next"` header
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
}

/// NRPS client bound to the shared token cache and registration store.
pub struct NrpsClient {
    http: reqwest::Client,
    tokens: Arc<AccessTokenCache>,
    registrations: Arc<RegistrationStore>,
}

impl NrpsClient {
    /// Create a client.
    #[must_use]
    pub fn new(
        http: reqwest::Client,
        tokens: Arc<AccessTokenCache>,
        registrations: Arc<RegistrationStore>,
    ) -> Self {
        Self {
            http,
            tokens,
            registrations,
        }
    }

    /// Fetch one page of course membership.
    ///
    /// Fails [`Error::MembershipsUrlMissing`] when the launch carried no
    /// NRPS claim.
    pub async fn list_members(
        &self,
        context: &LaunchContext,
        limit: Option<u32>,
        offset: Option<u32>,
    ) -> Result<MembershipPage> {
        let memberships_url = context
            .names_roles_url
            .as_deref()
            .ok_or(Error::MembershipsUrlMissing)?;

        let registration = self
            .registrations
            .platform_by_issuer(&context.issuer)
            .ok_or_else(|| Error::UnknownPlatform(context.issuer.clone()))?;
        let bearer = self
            .tokens
            .bearer(&registration, &[NRPS_SCOPE.to_string()])
            .await?;

        let mut request = self
            .http
            .get(memberships_url)
            .bearer_auth(bearer)
            .header(reqwest::header::ACCEPT, MEMBERSHIP_CONTAINER_TYPE);
        if let Some(limit) = limit {
            request = request.query(&[("limit", limit)]);
        }
        if let Some(offset) = offset {
            request = request.query(&[("offset", offset)]);
        }

        debug!(url = %memberships_url, limit = ?limit, offset = ?offset, "Fetching NRPS membership");
        let response = request.send().await?;
        let status = response.status();
        let next = response
            .headers()
            .get(reqwest::header::LINK)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_next_link);
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(Error::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let mut page: MembershipPage = serde_json::from_str(&body)?;
        page.next = next;
        Ok(page)
    }
}

/// Extract the `rel="next"` target from a `Link` header.
fn parse_next_link(header: &str) -> Option<String> {
    for part in header.split(',') {
        let Some((target, params)) = part.trim().split_once(';') else {
            continue;
        };
        if params.contains("rel=\"next\"") || params.contains("rel=next") {
            return Some(
                target
                    .trim()
                    .trim_start_matches('<')
                    .trim_end_matches('>')
                    .to_string(),
            );
        }
    }
    None
}
