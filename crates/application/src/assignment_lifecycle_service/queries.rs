use marketgate_core::{ActorIdentity, AppError, AppResult, UserId};
use marketgate_domain::{
    AssignmentStatus, Role, RoleAssignment, RoleAssignmentId, RoleRequirements,
    outstanding_evidence,
};

use super::access::Authority;
use super::{AssignmentDetails, AssignmentLifecycleService};

impl AssignmentLifecycleService {
    /// Returns the evidence a role name asks for, before any assignment exists.
    #[must_use]
    pub fn requirements_for_role_name(&self, role_name: &str) -> RoleRequirements {
        self.policy.requirements_for_name(role_name)
    }

    /// Returns an assignment with its documents to its owner or a reviewer.
    pub async fn assignment_details(
        &self,
        actor: &ActorIdentity,
        assignment_id: RoleAssignmentId,
    ) -> AppResult<AssignmentDetails> {
        let assignment = self
            .repository
            .find_assignment(assignment_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("role assignment '{assignment_id}' not found"))
            })?;

        if assignment.user_id != actor.user_id() {
            self.require_reviewer(actor, &assignment).await?;
        }

        let documents = self.repository.list_documents(assignment.id).await?;
        let requirements = self.policy.requirements_for(assignment.role);
        let evidence = self
            .evidence(&assignment, &requirements, &documents)
            .await?;
        let outstanding = outstanding_evidence(&requirements, &evidence);

        Ok(AssignmentDetails {
            assignment,
            documents,
            requirements,
            outstanding,
        })
    }

    /// Lists assignments in one status that the reviewer may act on.
    pub async fn review_queue(
        &self,
        reviewer: &ActorIdentity,
        status: AssignmentStatus,
    ) -> AppResult<Vec<RoleAssignment>> {
        let authority = self.authority_of(reviewer).await?;
        let assignments = self.repository.list_assignments_by_status(status).await?;

        match authority {
            Authority::SuperAdmin => Ok(assignments),
            Authority::MarketManager => {
                let markets = self.markets.markets_managed_by(reviewer.user_id()).await?;
                Ok(assignments
                    .into_iter()
                    .filter(|assignment| {
                        assignment.role.is_field_role()
                            && assignment
                                .market_id
                                .is_some_and(|market_id| markets.contains(&market_id))
                    })
                    .collect())
            }
            Authority::Member => Err(AppError::Authorization(format!(
                "user '{}' has no review queue",
                reviewer.user_id()
            ))),
        }
    }

    /// Returns the roles authorization checks currently honor for a user.
    pub async fn honored_roles(&self, user_id: UserId) -> AppResult<Vec<Role>> {
        let mut roles = self
            .repository
            .list_assignments_for_user(user_id)
            .await?
            .into_iter()
            .filter(|assignment| assignment.status.is_honored())
            .map(|assignment| assignment.role)
            .collect::<Vec<_>>();
        roles.sort();
        Ok(roles)
    }
}
