use marketgate_core::ActorIdentity;
use marketgate_domain::Role;
use serde::Serialize;

/// Health response payload.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub requirement_policy_version: u16,
}

/// API representation of the authenticated actor.
#[derive(Debug, Serialize)]
pub struct ActorResponse {
    pub user_id: String,
    pub display_name: String,
    /// Roles currently honored for authorization.
    pub roles: Vec<String>,
}

impl ActorResponse {
    pub fn new(identity: &ActorIdentity, roles: Vec<Role>) -> Self {
        Self {
            user_id: identity.user_id().to_string(),
            display_name: identity.display_name().to_owned(),
            roles: roles
                .into_iter()
                .map(|role| role.as_str().to_owned())
                .collect(),
        }
    }
}
