//! LTI 1.3 Advantage tool provider.
//!
//! Implements the tool side of the LTI 1.3 launch handshake and the
//! Advantage services built on top of it:
//!
//! - **OIDC third-party initiated login** with single-use `state`/`nonce`
//!   anti-replay
//! - **Launch token validation** against cached, rotating platform key sets
//! - **Deep linking** content-selection round trips (signed response JWTs)
//! - **AGS** line-item CRUD and score submission
//! - **NRPS** paginated course membership
//!
//! The tool's own RSA key pair is generated on first start and published at
//! `/.well-known/jwks.json`; everything outbound is authenticated with
//! client-credentials grants using signed JWT assertions.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;
pub mod config;
pub mod deep_linking;
pub mod error;
pub mod keys;
pub mod launch;
pub mod registry;
pub mod server;
pub mod services;
pub mod store;

pub use error::{Error, Result};

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Setup tracing/logging
pub fn setup_tracing(level: &str, format: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    match format {
        Some("json") => {
            subscriber.with(fmt::layer().json()).init();
        }
        _ => {
            subscriber.with(fmt::layer()).init();
        }
    }

    Ok(())
}
