//! Launch context — normalized view of a verified id_token.
//!
//! Claim extraction happens exactly once, here, straight off the
//! IMS-namespaced claims in the id_token. Downstream code (deep linking,
//! AGS, NRPS, the session page) reads typed fields with explicit
//! absent-vs-present semantics instead of re-probing the raw token.

use serde::{Deserialize, Serialize};

// LTI claim URIs. These are the canonical claim shape this tool accepts;
// no alternate claim paths are probed.

/// Message type claim URI.
pub const CLAIM_MESSAGE_TYPE: &str = "https://purl.imsglobal.org/spec/lti/claim/message_type";
/// LTI version claim URI.
pub const CLAIM_VERSION: &str = "https://purl.imsglobal.org/spec/lti/claim/version";
/// Deployment id claim URI.
pub const CLAIM_DEPLOYMENT_ID: &str = "https://purl.imsglobal.org/spec/lti/claim/deployment_id";
/// Roles claim URI.
pub const CLAIM_ROLES: &str = "https://purl.imsglobal.org/spec/lti/claim/roles";
/// Course context claim URI.
pub const CLAIM_CONTEXT: &str = "https://purl.imsglobal.org/spec/lti/claim/context";
/// Resource link claim URI.
pub const CLAIM_RESOURCE_LINK: &str = "https://purl.imsglobal.org/spec/lti/claim/resource_link";
/// Target link URI claim URI.
pub const CLAIM_TARGET_LINK_URI: &str =
    "https://purl.imsglobal.org/spec/lti/claim/target_link_uri";
/// AGS endpoint claim URI.
pub const CLAIM_AGS_ENDPOINT: &str = "https://purl.imsglobal.org/spec/lti-ags/claim/endpoint";
/// NRPS service claim URI.
pub const CLAIM_NRPS: &str = "https://purl.imsglobal.org/spec/lti-nrps/claim/namesroleservice";
/// Deep-linking settings claim URI.
pub const CLAIM_DL_SETTINGS: &str =
    "https://purl.imsglobal.org/spec/lti-dl/claim/deep_linking_settings";
/// Deep-linking content items claim URI.
pub const CLAIM_DL_CONTENT_ITEMS: &str =
    "https://purl.imsglobal.org/spec/lti-dl/claim/content_items";
/// Deep-linking data passthrough claim URI.
pub const CLAIM_DL_DATA: &str = "https://purl.imsglobal.org/spec/lti-dl/claim/data";

/// LTI message type of a launch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum MessageType {
    /// `LtiResourceLinkRequest` — a regular content launch.
    ResourceLink,
    /// `LtiDeepLinkingRequest` — a content-selection launch.
    DeepLinking,
    /// Anything else the platform sent.
    Other(String),
}

impl From<&str> for MessageType {
    fn from(value: &str) -> Self {
        match value {
            "LtiResourceLinkRequest" => Self::ResourceLink,
            "LtiDeepLinkingRequest" => Self::DeepLinking,
            other => Self::Other(other.to_string()),
        }
    }
}

/// The launched resource link.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceLink {
    /// Platform-scoped resource link id
    pub id: String,
    /// Display title
    #[serde(default)]
    pub title: Option<String>,
}

/// The course/context the launch happened in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseContext {
    /// Platform-scoped context id
    pub id: String,
    /// Display title
    #[serde(default)]
    pub title: Option<String>,
}

/// AGS endpoint capabilities advertised in the launch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgsEndpoint {
    /// Container URL for line items in this context
    #[serde(default)]
    pub lineitems: Option<String>,
    /// URL of the single line item coupled to this resource link, if any
    #[serde(default)]
    pub lineitem: Option<String>,
    /// Scopes the platform grants for this launch
    #[serde(default)]
    pub scope: Vec<String>,
}

/// NRPS service endpoint advertised in the launch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamesRoleService {
    /// Context memberships URL
    pub context_memberships_url: String,
    /// Supported NRPS versions
    #[serde(default)]
    pub service_versions: Vec<String>,
}

/// Deep-linking settings from an `LtiDeepLinkingRequest`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeepLinkingSettings {
    /// Where the signed content-items response is posted back to
    pub deep_link_return_url: String,
    /// Opaque platform data echoed in the response
    #[serde(default)]
    pub data: Option<String>,
    /// Content item types the platform accepts
    #[serde(default)]
    pub accept_types: Vec<String>,
    /// Whether multiple items may be returned
    #[serde(default)]
    pub accept_multiple: Option<bool>,
}

/// Raw id_token claims as deserialized from the verified JWT.
///
/// This is the only place the namespaced claim URIs appear; everything
/// downstream works off [`LaunchContext`].
#[derive(Debug, Deserialize)]
pub(crate) struct IdTokenClaims {
    pub iss: String,
    pub sub: String,
    #[serde(default)]
    pub aud: serde_json::Value,
    #[serde(default)]
    pub azp: Option<String>,
    #[allow(dead_code)] // validated by jsonwebtoken
    pub exp: u64,
    pub iat: u64,
    #[serde(default)]
    pub nonce: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "https://purl.imsglobal.org/spec/lti/claim/message_type", default)]
    pub message_type: Option<String>,
    #[serde(rename = "https://purl.imsglobal.org/spec/lti/claim/deployment_id", default)]
    pub deployment_id: Option<String>,
    #[serde(rename = "https://purl.imsglobal.org/spec/lti/claim/roles", default)]
    pub roles: Vec<String>,
    #[serde(rename = "https://purl.imsglobal.org/spec/lti/claim/context", default)]
    pub context: Option<CourseContext>,
    #[serde(rename = "https://purl.imsglobal.org/spec/lti/claim/resource_link", default)]
    pub resource_link: Option<ResourceLink>,
    #[serde(rename = "https://purl.imsglobal.org/spec/lti/claim/target_link_uri", default)]
    pub target_link_uri: Option<String>,
    #[serde(rename = "https://purl.imsglobal.org/spec/lti-ags/claim/endpoint", default)]
    pub endpoint: Option<AgsEndpoint>,
    #[serde(
        rename = "https://purl.imsglobal.org/spec/lti-nrps/claim/namesroleservice",
        default
    )]
    pub names_role_service: Option<NamesRoleService>,
    #[serde(
        rename = "https://purl.imsglobal.org/spec/lti-dl/claim/deep_linking_settings",
        default
    )]
    pub deep_linking_settings: Option<DeepLinkingSettings>,
}

/// Normalized, immutable launch context.
///
/// Built once per validated launch and shared read-only with every
/// downstream consumer for the life of the session.
#[derive(Debug, Clone, Serialize)]
pub struct LaunchContext {
    /// Platform issuer
    pub issuer: String,
    /// Client id the launch was addressed to
    pub client_id: String,
    /// Deployment id asserted by the platform
    pub deployment_id: String,
    /// Platform user id (`sub`)
    pub user_id: String,
    /// Display name, if the platform shared one
    pub name: Option<String>,
    /// Role URIs
    pub roles: Vec<String>,
    /// Launch message type
    pub message_type: MessageType,
    /// Intended landing URL
    pub target_link_uri: Option<String>,
    /// Launched resource link
    pub resource_link: Option<ResourceLink>,
    /// Course context
    pub context: Option<CourseContext>,
    /// AGS capabilities
    pub endpoint: Option<AgsEndpoint>,
    /// NRPS memberships URL
    pub names_roles_url: Option<String>,
    /// Deep-linking settings (deep-linking launches only)
    pub deep_linking: Option<DeepLinkingSettings>,
}

impl LaunchContext {
    /// Single claim-normalization step. The caller has already verified
    /// the token and checked the required claims are present.
    pub(crate) fn from_claims(claims: IdTokenClaims, client_id: &str) -> Self {
        Self {
            issuer: claims.iss,
            client_id: client_id.to_string(),
            deployment_id: claims.deployment_id.unwrap_or_default(),
            user_id: claims.sub,
            name: claims.name,
            roles: claims.roles,
            message_type: claims
                .message_type
                .as_deref()
                .map(MessageType::from)
                .unwrap_or(MessageType::Other(String::new())),
            target_link_uri: claims.target_link_uri,
            resource_link: claims.resource_link,
            context: claims.context,
            endpoint: claims.endpoint,
            names_roles_url: claims
                .names_role_service
                .map(|s| s.context_memberships_url),
            deep_linking: claims.deep_linking_settings,
        }
    }

    /// The AGS line-items container URL, if the launch advertised one.
    #[must_use]
    pub fn line_items_url(&self) -> Option<&str> {
        self.endpoint.as_ref()?.lineitems.as_deref()
    }

    /// Scopes granted for AGS calls in this launch.
    #[must_use]
    pub fn ags_scopes(&self) -> &[String] {
        self.endpoint.as_ref().map_or(&[], |e| e.scope.as_slice())
    }

    /// Whether this launch is a deep-linking (content selection) request.
    #[must_use]
    pub fn is_deep_linking(&self) -> bool {
        self.message_type == MessageType::DeepLinking
    }

    /// The resource link id, if present.
    #[must_use]
    pub fn resource_link_id(&self) -> Option<&str> {
        self.resource_link.as_ref().map(|r| r.id.as_str())
    }
}
