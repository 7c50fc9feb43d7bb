use chrono::Utc;
use marketgate_core::{ActorIdentity, AppError, AppResult, NonEmptyString};
use marketgate_domain::{
    AssignmentStatus, AuditAction, DocumentId, Resolution, RoleAssignment, StatusChange,
    VerificationDocument, resolve_status,
};
use tracing::info;

use super::{AssignmentLifecycleService, DocumentReviewOutcome, status_event, status_notification};
use crate::assignment_ports::{
    AuditEvent, Notification, NotificationCategory, NotificationSeverity,
};
use crate::side_effect_coordinator::{SideEffectMode, SideEffectReport};

/// Reviewer decision on one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verdict {
    Approved,
    Rejected,
}

impl AssignmentLifecycleService {
    /// Approves a document and promotes the owning assignment when the evidence allows.
    pub async fn approve_document(
        &self,
        reviewer: &ActorIdentity,
        document_id: DocumentId,
    ) -> AppResult<DocumentReviewOutcome> {
        self.review_document(reviewer, document_id, Verdict::Approved, None)
            .await
    }

    /// Rejects a document and demotes the owning assignment to `rejected` when a
    /// required type is now rejected.
    pub async fn reject_document(
        &self,
        reviewer: &ActorIdentity,
        document_id: DocumentId,
        reason: &str,
    ) -> AppResult<DocumentReviewOutcome> {
        let reason = NonEmptyString::new(reason)?;
        self.review_document(reviewer, document_id, Verdict::Rejected, Some(reason))
            .await
    }

    async fn review_document(
        &self,
        reviewer: &ActorIdentity,
        document_id: DocumentId,
        verdict: Verdict,
        reason: Option<NonEmptyString>,
    ) -> AppResult<DocumentReviewOutcome> {
        let located = self
            .repository
            .find_document(document_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("document '{document_id}' not found")))?;

        let now = Utc::now();
        let mut transaction = self.repository.begin().await?;
        let mut assignment = transaction
            .lock_assignment(located.role_assignment_id)
            .await?;
        self.require_reviewer(reviewer, &assignment).await?;

        if assignment.status == AssignmentStatus::Revoked {
            return Err(assignment.invalid_state("documents of a revoked assignment are frozen"));
        }

        let mut documents = transaction.list_documents(assignment.id).await?;
        let Some(document) = documents
            .iter_mut()
            .find(|document| document.id == document_id)
        else {
            return Err(AppError::NotFound(format!(
                "document '{document_id}' not found"
            )));
        };

        let previous = document.status;
        match (verdict, reason.as_ref()) {
            (Verdict::Rejected, Some(reason)) => {
                document.reject(reviewer.user_id(), reason.as_str(), now);
            }
            _ => document.approve(reviewer.user_id(), now),
        }
        transaction.update_document(document).await?;
        let document = document.clone();

        let requirements = self.policy.requirements_for(assignment.role);
        let evidence = self
            .evidence(&assignment, &requirements, &documents)
            .await?;
        let resolution = resolve_status(&requirements, &evidence);

        let change = match document_event_target(assignment.status, resolution, verdict) {
            Some(target) => {
                let change = assignment.transition_to(target, now);
                if change.from == AssignmentStatus::Pending && change.is_change() {
                    assignment.resubmission_reason = None;
                }
                assignment.append_note(
                    &format!(
                        "{} document {} by {}: {} -> {}",
                        document.doc_type.as_str(),
                        document.status.as_str(),
                        reviewer.user_id(),
                        change.from,
                        change.to
                    ),
                    now,
                );
                transaction.update_assignment(&assignment).await?;
                Some(change)
            }
            None => None,
        };

        let report = match change {
            Some(change) => {
                self.side_effects
                    .apply(
                        transaction.as_mut(),
                        &assignment,
                        change,
                        SideEffectMode::Standard,
                        now,
                    )
                    .await?
            }
            None => SideEffectReport {
                user_id: assignment.user_id,
                sibling_changes: Vec::new(),
                invalidate_sessions: false,
            },
        };
        transaction.commit().await?;

        info!(
            document_id = %document.id,
            assignment_id = %assignment.id,
            from = previous.as_str(),
            to = document.status.as_str(),
            assignment_status = %assignment.status,
            "verification document reviewed"
        );

        let (events, notifications) =
            document_review_events(reviewer, &document, &assignment, change, verdict);
        self.complete(&report, events, notifications, Some(reviewer.user_id()))
            .await;

        Ok(DocumentReviewOutcome {
            document,
            assignment,
            change,
        })
    }
}

/// Status a document event may move the assignment to.
///
/// Approvals only promote. Rejections demote to `rejected` when a required
/// type is rejected, otherwise they too may only promote. `inactive`
/// assignments keep their status.
fn document_event_target(
    current: AssignmentStatus,
    resolution: Resolution,
    verdict: Verdict,
) -> Option<AssignmentStatus> {
    if current == AssignmentStatus::Inactive {
        return None;
    }

    let Resolution::Status(target) = resolution else {
        return None;
    };

    if current.is_promotion_to(target) {
        return Some(target);
    }

    let demotes = verdict == Verdict::Rejected
        && target == AssignmentStatus::Rejected
        && current != AssignmentStatus::Rejected;
    demotes.then_some(target)
}

fn document_review_events(
    reviewer: &ActorIdentity,
    document: &VerificationDocument,
    assignment: &RoleAssignment,
    change: Option<StatusChange>,
    verdict: Verdict,
) -> (Vec<AuditEvent>, Vec<Notification>) {
    let action = match verdict {
        Verdict::Approved => AuditAction::DocumentApproved,
        Verdict::Rejected => AuditAction::DocumentRejected,
    };
    let mut events = vec![AuditEvent {
        actor_id: Some(reviewer.user_id()),
        action,
        entity_type: "verification_document".to_owned(),
        entity_id: document.id.to_string(),
        from_value: None,
        to_value: Some(document.status.as_str().to_owned()),
    }];

    let mut notifications = vec![Notification {
        user_id: assignment.user_id,
        title: format!("{} document {}", document.doc_type.as_str(), document.status.as_str()),
        message: match verdict {
            Verdict::Approved => format!(
                "Your {} document for the {} role was approved.",
                document.doc_type.as_str(),
                assignment.role
            ),
            Verdict::Rejected => format!(
                "Your {} document for the {} role was rejected. Please upload a new one.",
                document.doc_type.as_str(),
                assignment.role
            ),
        },
        severity: match verdict {
            Verdict::Approved => NotificationSeverity::Success,
            Verdict::Rejected => NotificationSeverity::Warning,
        },
        category: NotificationCategory::Document,
    }];

    if let Some(change) = change {
        events.push(status_event(
            Some(reviewer.user_id()),
            AuditAction::RoleAssignmentReviewed,
            assignment,
            change,
        ));
        notifications.push(status_notification(assignment, change));
    }

    (events, notifications)
}
