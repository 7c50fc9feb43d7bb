use marketgate_core::{ActorIdentity, AppError, AppResult};
use marketgate_domain::{MarketId, Role, RoleAssignment};

use super::{AssignmentInitiator, AssignmentLifecycleService, AssignmentSubject};

/// Highest honored grant an actor holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Authority {
    SuperAdmin,
    MarketManager,
    Member,
}

impl Authority {
    pub(super) fn may_force_activate(self) -> bool {
        self == Self::SuperAdmin
    }
}

/// Roles a user may request for themselves.
fn is_self_service_role(role: Role) -> bool {
    matches!(role, Role::Vendor | Role::MarketManager)
}

impl AssignmentLifecycleService {
    pub(super) async fn authority_of(&self, actor: &ActorIdentity) -> AppResult<Authority> {
        let assignments = self
            .repository
            .list_assignments_for_user(actor.user_id())
            .await?;
        let holds = |role: Role| {
            assignments
                .iter()
                .any(|assignment| assignment.role == role && assignment.status.is_honored())
        };

        Ok(if holds(Role::SuperAdmin) {
            Authority::SuperAdmin
        } else if holds(Role::MarketManager) {
            Authority::MarketManager
        } else {
            Authority::Member
        })
    }

    async fn manages_scope(
        &self,
        actor: &ActorIdentity,
        authority: Authority,
        role: Role,
        market_id: Option<MarketId>,
    ) -> AppResult<bool> {
        match authority {
            Authority::SuperAdmin => Ok(true),
            Authority::MarketManager => match market_id {
                Some(market_id) if role.is_field_role() => {
                    self.markets
                        .is_market_manager(actor.user_id(), market_id)
                        .await
                }
                _ => Ok(false),
            },
            Authority::Member => Ok(false),
        }
    }

    pub(super) async fn require_grant(
        &self,
        initiator: AssignmentInitiator<'_>,
        subject: &AssignmentSubject,
        role: Role,
        market_id: Option<MarketId>,
    ) -> AppResult<()> {
        let actor = match initiator {
            AssignmentInitiator::SelfRegistration => {
                let allowed = matches!(subject, AssignmentSubject::NewAccount { .. })
                    && is_self_service_role(role);
                return if allowed {
                    Ok(())
                } else {
                    Err(AppError::Authorization(format!(
                        "registration cannot request the '{role}' role"
                    )))
                };
            }
            AssignmentInitiator::Actor(actor) => actor,
        };

        let self_service = matches!(subject, AssignmentSubject::Existing(user_id) if *user_id == actor.user_id())
            && is_self_service_role(role);
        if self_service {
            return Ok(());
        }

        let authority = self.authority_of(actor).await?;
        if self.manages_scope(actor, authority, role, market_id).await? {
            return Ok(());
        }

        Err(AppError::Authorization(format!(
            "user '{}' may not grant the '{role}' role in this scope",
            actor.user_id()
        )))
    }

    /// Resolves the actor's authority and checks it covers the assignment.
    pub(super) async fn require_reviewer(
        &self,
        actor: &ActorIdentity,
        assignment: &RoleAssignment,
    ) -> AppResult<Authority> {
        let authority = self.authority_of(actor).await?;
        if self
            .manages_scope(actor, authority, assignment.role, assignment.market_id)
            .await?
        {
            return Ok(authority);
        }

        Err(AppError::Authorization(format!(
            "user '{}' may not review '{}' assignment '{}'",
            actor.user_id(),
            assignment.role,
            assignment.id
        )))
    }
}
