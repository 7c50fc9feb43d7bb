use chrono::Utc;
use marketgate_core::{ActorIdentity, AppError, AppResult, NonEmptyString};
use marketgate_domain::{
    AssignmentStatus, AuditAction, Resolution, RoleAssignment, RoleAssignmentId, can_force_active,
    resolve_status,
};
use tracing::{info, warn};

use super::{AssignmentLifecycleService, status_event, status_notification};
use crate::side_effect_coordinator::SideEffectMode;

impl AssignmentLifecycleService {
    /// Recomputes the assignment status from its evidence.
    ///
    /// With `force_active` a super admin may activate regardless of pending
    /// evidence, as long as no required document is rejected.
    pub async fn review_assignment(
        &self,
        reviewer: &ActorIdentity,
        assignment_id: RoleAssignmentId,
        force_active: bool,
    ) -> AppResult<RoleAssignment> {
        let now = Utc::now();
        let mut transaction = self.repository.begin().await?;
        let mut assignment = transaction.lock_assignment(assignment_id).await?;

        let authority = self.require_reviewer(reviewer, &assignment).await?;
        if force_active && !authority.may_force_activate() {
            return Err(AppError::Authorization(format!(
                "user '{}' may not force-activate assignments",
                reviewer.user_id()
            )));
        }

        if !assignment.status.is_reviewable() {
            return Err(assignment.invalid_state(format!(
                "cannot review an assignment in '{}'",
                assignment.status
            )));
        }

        let requirements = self.policy.requirements_for(assignment.role);
        let documents = transaction.list_documents(assignment.id).await?;
        let evidence = self
            .evidence(&assignment, &requirements, &documents)
            .await?;
        let resolution = resolve_status(&requirements, &evidence);

        let target = if force_active {
            if !can_force_active(&requirements, &evidence) {
                return Err(assignment.invalid_state(
                    "cannot force activation while a required document is rejected",
                ));
            }
            AssignmentStatus::Active
        } else {
            resolution.or_current(assignment.status)
        };

        let change = assignment.transition_to(target, now);
        assignment.mark_reviewed(reviewer.user_id(), now);
        let note = if force_active {
            let computed = match resolution {
                Resolution::Status(status) => status.as_str(),
                Resolution::Unchanged => "unchanged",
            };
            format!(
                "FORCE ACTIVATED by {}: {} -> {} (computed {computed})",
                reviewer.user_id(),
                change.from,
                change.to
            )
        } else {
            format!(
                "reviewed by {}: {} -> {}",
                reviewer.user_id(),
                change.from,
                change.to
            )
        };
        assignment.append_note(&note, now);
        transaction.update_assignment(&assignment).await?;

        let report = self
            .side_effects
            .apply(
                transaction.as_mut(),
                &assignment,
                change,
                SideEffectMode::Standard,
                now,
            )
            .await?;
        transaction.commit().await?;

        let action = if force_active {
            warn!(
                assignment_id = %assignment.id,
                reviewer_id = %reviewer.user_id(),
                from = %change.from,
                "role assignment force-activated"
            );
            AuditAction::RoleAssignmentForceActivated
        } else {
            info!(
                assignment_id = %assignment.id,
                reviewer_id = %reviewer.user_id(),
                from = %change.from,
                to = %change.to,
                "role assignment reviewed"
            );
            AuditAction::RoleAssignmentReviewed
        };

        let notifications = if change.is_change() {
            vec![status_notification(&assignment, change)]
        } else {
            Vec::new()
        };
        self.complete(
            &report,
            vec![status_event(
                Some(reviewer.user_id()),
                action,
                &assignment,
                change,
            )],
            notifications,
            Some(reviewer.user_id()),
        )
        .await;

        Ok(assignment)
    }

    /// Invites the applicant to resubmit and moves the assignment back to `pending`.
    pub async fn request_resubmission(
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

        if !assignment.status.is_reviewable() {
            return Err(assignment.invalid_state(format!(
                "cannot request a resubmission for an assignment in '{}'",
                assignment.status
            )));
        }

        let change = assignment.transition_to(AssignmentStatus::Pending, now);
        assignment.mark_reviewed(reviewer.user_id(), now);
        assignment.append_note(
            &format!(
                "resubmission requested by {}: {} -> pending; reason: {}",
                reviewer.user_id(),
                change.from,
                reason.as_str()
            ),
            now,
        );
        assignment.resubmission_reason = Some(reason.into());
        transaction.update_assignment(&assignment).await?;

        let report = self
            .side_effects
            .apply(
                transaction.as_mut(),
                &assignment,
                change,
                SideEffectMode::Standard,
                now,
            )
            .await?;
        transaction.commit().await?;

        info!(
            assignment_id = %assignment.id,
            reviewer_id = %reviewer.user_id(),
            from = %change.from,
            "resubmission requested"
        );

        self.complete(
            &report,
            vec![status_event(
                Some(reviewer.user_id()),
                AuditAction::RoleAssignmentResubmissionRequested,
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
