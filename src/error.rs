//! Error types for the LTI tool provider.

use std::io;

use thiserror::Error;

/// Result type alias for the LTI tool provider.
pub type Result<T> = std::result::Result<T, Error>;

/// LTI tool provider errors.
///
/// The variants fall into the four buckets the HTTP layer cares about:
/// configuration errors (4xx, never retried), protocol violations (generic
/// 401, details logged server-side only), upstream rejections (surfaced
/// verbatim), and internal faults.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Login initiation for an issuer with no registration
    #[error("Unknown platform: {0}")]
    UnknownPlatform(String),

    /// Tool registration not found
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// No active launch session bound to the request
    #[error("No active launch session")]
    NoActiveLaunch,

    /// The launch carried no AGS line-items endpoint claim
    #[error("Launch context has no line-items endpoint")]
    LineItemsUrlMissing,

    /// The launch carried no NRPS memberships endpoint claim
    #[error("Launch context has no NRPS memberships endpoint")]
    MembershipsUrlMissing,

    /// Rejected before any upstream call: scoreMaximum must be positive
    #[error("Invalid scoreMaximum: {0} (must be > 0)")]
    InvalidScoreMaximum(f64),

    /// Rejected before any upstream call: unknown progress enum value
    #[error("Invalid progress value: {0}")]
    InvalidProgressEnum(String),

    /// Non-2xx from a platform endpoint, body preserved for diagnostics
    #[error("Upstream error: HTTP {status}: {body}")]
    Upstream {
        /// HTTP status returned by the platform
        status: u16,
        /// Response body as received
        body: String,
    },

    /// Platform key set older than the hard staleness ceiling
    #[error("Key set for {0} is stale beyond the allowed maximum")]
    KeySetStale(String),

    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// JWT signing error
    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// The machine-readable error code used in JSON error bodies.
    #[must_use]
    pub fn api_code(&self) -> &'static str {
        match self {
            Self::Config(_) => "configError",
            Self::UnknownPlatform(_) => "unknownPlatform",
            Self::UnknownTool(_) => "unknownTool",
            Self::NoActiveLaunch => "noLaunch",
            Self::LineItemsUrlMissing => "lineItemsUrlMissing",
            Self::MembershipsUrlMissing => "nrpsUrlMissing",
            Self::InvalidScoreMaximum(_) => "invalidScoreMaximum",
            Self::InvalidProgressEnum(_) => "invalidProgress",
            Self::Upstream { .. } => "upstreamError",
            Self::KeySetStale(_) => "keySetStale",
            Self::Http(_) => "upstreamUnreachable",
            _ => "internalError",
        }
    }

    /// The HTTP status an error maps to when it reaches a handler.
    #[must_use]
    pub fn status(&self) -> u16 {
        match self {
            Self::UnknownPlatform(_) | Self::UnknownTool(_) => 404,
            Self::NoActiveLaunch => 401,
            Self::LineItemsUrlMissing
            | Self::MembershipsUrlMissing
            | Self::InvalidScoreMaximum(_)
            | Self::InvalidProgressEnum(_)
            | Self::Config(_)
            | Self::KeySetStale(_) => 400,
            // Platform-side rejections and unreachable endpoints surface as
            // 502 with the body preserved.
            Self::Upstream { .. } | Self::Http(_) => 502,
            _ => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_launch_maps_to_401() {
        assert_eq!(Error::NoActiveLaunch.status(), 401);
        assert_eq!(Error::NoActiveLaunch.api_code(), "noLaunch");
    }

    #[test]
    fn missing_nrps_url_maps_to_400() {
        let e = Error::MembershipsUrlMissing;
        assert_eq!(e.status(), 400);
        assert_eq!(e.api_code(), "nrpsUrlMissing");
    }

    #[test]
    fn upstream_preserves_status_and_body() {
        let e = Error::Upstream {
            status: 403,
            body: "insufficient_scope".to_string(),
        };
        assert_eq!(e.status(), 502);
        assert!(e.to_string().contains("403"));
        assert!(e.to_string().contains("insufficient_scope"));
    }
}
