use chrono::Utc;
use marketgate_core::{ActorIdentity, AppResult, NonEmptyString};
use marketgate_domain::{AssignmentStatus, AuditAction, RoleAssignment, RoleAssignmentId};
use tracing::info;

use super::{AssignmentLifecycleService, status_event, status_notification};
use crate::side_effect_coordinator::SideEffectMode;

impl AssignmentLifecycleService {
    /// Withdraws an assignment. `revoked` is terminal.
    ///
    /// Revoking the last honored elevated role gives the user their vendor
    /// role back.
    pub async fn revoke(
        &self,
        reviewer: &ActorIdentity,
        assignment_id: RoleAssignmentId,
        reason: &str,
    ) -> AppResult<RoleAssignment> {
        let reason = NonEmptyString::new(reason)?;
        let now = Utc::now();

        let mut transaction = self.repository.begin().await?;
        let mut assignment = transaction.lock_assignment(assignment_id).await?;
        self.require_reviewer(reviewer, &assignment).await?;

        if !assignment.status.is_revocable() {
            return Err(assignment.invalid_state(format!(
                "cannot revoke an assignment in '{}'",
                assignment.status
            )));
        }

        let change = assignment.transition_to(AssignmentStatus::Revoked, now);
        assignment.mark_reviewed(reviewer.user_id(), now);
        assignment.append_note(
            &format!(
                "revoked by {}: {} -> revoked; reason: {}",
                reviewer.user_id(),
                change.from,
                reason.as_str()
            ),
            now,
        );
        transaction.update_assignment(&assignment).await?;

        let report = self
            .side_effects
            .apply(
                transaction.as_mut(),
                &assignment,
                change,
                SideEffectMode::Revocation,
                now,
            )
            .await?;
        transaction.commit().await?;

        info!(
            assignment_id = %assignment.id,
            reviewer_id = %reviewer.user_id(),
            from = %change.from,
            restored = report.sibling_changes.len(),
            "role assignment revoked"
        );

        self.complete(
            &report,
            vec![status_event(
                Some(reviewer.user_id()),
                AuditAction::RoleAssignmentRevoked,
                &assignment,
                change,
            )],
            vec![status_notification(&assignment, change)],
            Some(reviewer.user_id()),
        )
        .await;

        Ok(assignment)
    }
}
