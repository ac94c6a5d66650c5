//! Authenticated service-to-service clients (AGS, NRPS) and the shared
//! access-token cache they draw bearers from.

pub mod ags;
pub mod nrps;
pub mod token;

pub use ags::{ActivityProgress, AgsClient, GradingProgress, LineItem, Score};
pub use nrps::{Member, MembershipPage, NrpsClient};
pub use token::AccessTokenCache;
