use serde::{Deserialize, Serialize};

use crate::UserId;

/// Actor information persisted in the authenticated session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorIdentity {
    user_id: UserId,
    display_name: String,
    session_epoch: i64,
}

impl ActorIdentity {
    /// Creates an actor identity from authentication data.
    #[must_use]
    pub fn new(user_id: UserId, display_name: impl Into<String>, session_epoch: i64) -> Self {
        Self {
            user_id,
            display_name: display_name.into(),
            session_epoch,
        }
    }

    /// Returns the acting user.
    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Returns the display name for the acting user.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.display_name.as_str()
    }

    /// Returns the session epoch observed when the session was issued.
    #[must_use]
    pub fn session_epoch(&self) -> i64 {
        self.session_epoch
    }
}
