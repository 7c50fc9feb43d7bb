use std::sync::Arc;

use chrono::{DateTime, Utc};
use marketgate_core::{AppResult, UserId};
use marketgate_domain::{
    AccountStatus, AssignmentStatus, LegacyRole, Role, RoleAssignment, StatusChange,
};
use tracing::{info, warn};

use crate::assignment_ports::{AssignmentTransaction, SessionStore};

/// Direction of the mutation that triggers side effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideEffectMode {
    /// Review, document event, resubmission or resubmission request.
    Standard,
    /// Administrative revocation.
    Revocation,
}

/// Change applied to another assignment of the same user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiblingChange {
    /// The sibling after the change.
    pub assignment: RoleAssignment,
    /// Its status change.
    pub change: StatusChange,
}

/// In-transaction outcome handed to [`SideEffectCoordinator::finish`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SideEffectReport {
    /// Owner of the mutated assignment.
    pub user_id: UserId,
    /// Sibling assignments changed in the same transaction.
    pub sibling_changes: Vec<SiblingChange>,
    /// Whether outstanding sessions must be invalidated after commit.
    pub invalidate_sessions: bool,
}

/// Outcome of the post-commit session step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionInvalidation {
    /// Whether invalidation was attempted.
    pub attempted: bool,
    /// Whether every session call succeeded.
    pub succeeded: bool,
}

/// Applies cross-assignment and user-level consequences of status changes.
///
/// Data effects run inside the caller's transaction while the user row is
/// locked. Session invalidation runs once, after commit.
#[derive(Clone)]
pub struct SideEffectCoordinator {
    session_store: Arc<dyn SessionStore>,
}

impl SideEffectCoordinator {
    /// Creates a coordinator.
    #[must_use]
    pub fn new(session_store: Arc<dyn SessionStore>) -> Self {
        Self { session_store }
    }

    /// Applies sibling and user changes for one committed-to-be status change.
    pub async fn apply(
        &self,
        transaction: &mut dyn AssignmentTransaction,
        assignment: &RoleAssignment,
        change: StatusChange,
        mode: SideEffectMode,
        now: DateTime<Utc>,
    ) -> AppResult<SideEffectReport> {
        let mut report = SideEffectReport {
            user_id: assignment.user_id,
            sibling_changes: Vec::new(),
            invalidate_sessions: change.touches_honored_set()
                || mode == SideEffectMode::Revocation,
        };

        let user = transaction.lock_user(assignment.user_id).await?;

        if mode == SideEffectMode::Revocation && assignment.role.is_elevated() {
            self.restore_vendor(transaction, assignment, now, &mut report)
                .await?;
        }

        if assignment.role.is_elevated() && change.newly_active() {
            self.deactivate_vendor(transaction, assignment, now, &mut report)
                .await?;
        }

        let needs_sync = change.to.is_honored()
            || change.touches_honored_set()
            || mode == SideEffectMode::Revocation
            || !report.sibling_changes.is_empty();
        if needs_sync {
            let assignments = transaction
                .list_assignments_for_user(assignment.user_id)
                .await?;
            let legacy_role = legacy_role_for(&assignments)
                .or(user.legacy_role.map(|_| LegacyRole::Vendor));
            let status = account_status_for(user.status, assignment, change, &assignments);

            if legacy_role != user.legacy_role || status != user.status {
                transaction
                    .update_user_access(user.id, status, legacy_role)
                    .await?;
                info!(
                    user_id = %user.id,
                    status = status.as_str(),
                    legacy_role = legacy_role.map(|role| role.as_str()).unwrap_or("none"),
                    "user access synchronized"
                );
            }
        }

        if report
            .sibling_changes
            .iter()
            .any(|sibling| sibling.change.touches_honored_set())
        {
            report.invalidate_sessions = true;
        }

        Ok(report)
    }

    /// Runs the post-commit session step. Failures are logged and swallowed.
    pub async fn finish(&self, report: &SideEffectReport) -> SessionInvalidation {
        if !report.invalidate_sessions {
            return SessionInvalidation {
                attempted: false,
                succeeded: true,
            };
        }

        let mut succeeded = true;
        if let Err(error) = self.session_store.invalidate_all(report.user_id).await {
            succeeded = false;
            warn!(user_id = %report.user_id, %error, "failed to invalidate user sessions");
        }

        match self.session_store.bump_epoch(report.user_id).await {
            Ok(epoch) => info!(user_id = %report.user_id, epoch, "session epoch bumped"),
            Err(error) => {
                succeeded = false;
                warn!(user_id = %report.user_id, %error, "failed to bump session epoch");
            }
        }

        SessionInvalidation {
            attempted: true,
            succeeded,
        }
    }

    async fn deactivate_vendor(
        &self,
        transaction: &mut dyn AssignmentTransaction,
        elevated: &RoleAssignment,
        now: DateTime<Utc>,
        report: &mut SideEffectReport,
    ) -> AppResult<()> {
        let Some(mut vendor) = transaction
            .find_assignment_for_role(elevated.user_id, Role::Vendor)
            .await?
        else {
            return Ok(());
        };

        if vendor.status != AssignmentStatus::Active {
            return Ok(());
        }

        let change = vendor.transition_to(AssignmentStatus::Inactive, now);
        vendor.append_note(
            &format!("superseded by {} role {}", elevated.role, elevated.id),
            now,
        );
        transaction.update_assignment(&vendor).await?;
        info!(
            assignment_id = %vendor.id,
            superseded_by = %elevated.id,
            "vendor assignment superseded"
        );

        report.sibling_changes.push(SiblingChange {
            assignment: vendor,
            change,
        });
        Ok(())
    }

    async fn restore_vendor(
        &self,
        transaction: &mut dyn AssignmentTransaction,
        revoked: &RoleAssignment,
        now: DateTime<Utc>,
        report: &mut SideEffectReport,
    ) -> AppResult<()> {
        let assignments = transaction
            .list_assignments_for_user(revoked.user_id)
            .await?;
        let other_elevated_honored = assignments.iter().any(|assignment| {
            assignment.id != revoked.id
                && assignment.role.is_elevated()
                && assignment.status.is_honored()
        });
        if other_elevated_honored {
            return Ok(());
        }

        let note = format!("restored after revocation of {} role {}", revoked.role, revoked.id);
        let existing = assignments
            .into_iter()
            .find(|assignment| assignment.role == Role::Vendor);

        let (vendor, change) = match existing {
            Some(mut vendor) if vendor.status == AssignmentStatus::Inactive => {
                let change = vendor.transition_to(AssignmentStatus::Active, now);
                vendor.append_note(&note, now);
                transaction.update_assignment(&vendor).await?;
                (vendor, change)
            }
            Some(_) => return Ok(()),
            None => {
                let mut vendor =
                    RoleAssignment::new_pending(revoked.user_id, Role::Vendor, None, None, now);
                let change = vendor.transition_to(AssignmentStatus::Active, now);
                vendor.append_note(&note, now);
                transaction.insert_assignment(&vendor).await?;
                (vendor, change)
            }
        };

        info!(assignment_id = %vendor.id, user_id = %vendor.user_id, "vendor role restored");
        report.sibling_changes.push(SiblingChange {
            assignment: vendor,
            change,
        });
        Ok(())
    }
}

/// Legacy mirror derived from every honored assignment, `None` when nothing is honored.
fn legacy_role_for(assignments: &[RoleAssignment]) -> Option<LegacyRole> {
    assignments
        .iter()
        .filter(|assignment| assignment.status.is_honored())
        .map(|assignment| assignment.role.legacy_bucket())
        .reduce(|mirror, bucket| {
            if mirror == LegacyRole::Admin || bucket == LegacyRole::Admin {
                LegacyRole::Admin
            } else {
                LegacyRole::Vendor
            }
        })
}

fn account_status_for(
    current: AccountStatus,
    assignment: &RoleAssignment,
    change: StatusChange,
    assignments: &[RoleAssignment],
) -> AccountStatus {
    let elevation_completed =
        assignment.role.is_elevated() && change.to.is_honored() && change.is_change();
    if elevation_completed {
        return AccountStatus::Active;
    }

    let any_honored = assignments
        .iter()
        .any(|assignment| assignment.status.is_honored());
    if any_honored && current == AccountStatus::Inactive {
        AccountStatus::Active
    } else {
        current
    }
}
