//! The LTI launch state machine.
//!
//! Login initiation mints the `state`/`nonce` pair, validation consumes it
//! exactly once and turns the verified id_token into a [`LaunchContext`],
//! and sessions carry that context to the service routes.

pub mod context;
pub mod login;
pub mod session;
pub mod state;
pub mod validate;

pub use context::{LaunchContext, MessageType};
pub use login::{LoginRequest, initiate};
pub use session::SessionStore;
pub use state::{LaunchState, LaunchStateStore};
pub use validate::{LaunchError, LaunchValidator};
