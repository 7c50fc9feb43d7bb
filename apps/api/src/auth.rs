mod bootstrap;
mod session;

pub use bootstrap::bootstrap_handler;
pub use session::{logout_handler, me_handler};

#[cfg(test)]
pub use bootstrap::BootstrapRequest;

/// Session key holding the authenticated [`marketgate_core::ActorIdentity`].
pub const SESSION_ACTOR_KEY: &str = "actor_identity";
/// Absolute session creation timestamp.
pub const SESSION_CREATED_AT_KEY: &str = "session_created_at";
