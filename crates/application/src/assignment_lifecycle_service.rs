use std::sync::Arc;

use marketgate_core::{ActorIdentity, AppResult, UserId};
use marketgate_domain::{
    AssignmentStatus, AuditAction, DocumentStatusMap, DocumentType, MarketId, Role, RoleAssignment,
    RoleRequirementPolicy, RoleRequirements, StatusChange, VerificationDocument, latest_statuses,
    with_identity_fallback,
};
use tracing::warn;

use crate::assignment_ports::{
    AuditEvent, AuditSink, DocumentBlobStore, IdentityDocumentFallback, MarketDirectory,
    Notification, NotificationCategory, NotificationGateway, NotificationSeverity,
    RoleAssignmentRepository, SessionStore,
};
use crate::side_effect_coordinator::{SideEffectCoordinator, SideEffectReport};

mod access;
mod create;
mod documents;
mod queries;
mod resubmit;
mod review;
mod revoke;

#[cfg(test)]
mod tests;

/// Raw upload as received from a caller, validated by the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentUploadInput {
    /// Free-form document type, canonicalized on validation.
    pub doc_type: String,
    /// Declared MIME type.
    pub mime_type: String,
    /// File content.
    pub bytes: Vec<u8>,
}

/// User an assignment is created for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssignmentSubject {
    /// An already registered user.
    Existing(UserId),
    /// A user account created in the same transaction.
    NewAccount {
        /// Name shown to reviewers.
        display_name: String,
        /// Optional contact address.
        email: Option<String>,
    },
}

/// Who is asking for an assignment to be created.
#[derive(Debug, Clone, Copy)]
pub enum AssignmentInitiator<'a> {
    /// Anonymous registration creating its own account.
    SelfRegistration,
    /// An authenticated actor.
    Actor(&'a ActorIdentity),
}

impl AssignmentInitiator<'_> {
    fn actor_id(&self) -> Option<UserId> {
        match self {
            Self::SelfRegistration => None,
            Self::Actor(actor) => Some(actor.user_id()),
        }
    }
}

/// Input payload for creating or re-requesting a role assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateAssignmentInput {
    /// Holder of the role.
    pub subject: AssignmentSubject,
    /// Requested role.
    pub role: Role,
    /// Market scope for field roles.
    pub market_id: Option<MarketId>,
    /// Document attached at creation time.
    pub bootstrap_document: Option<DocumentUploadInput>,
}

/// Result of [`AssignmentLifecycleService::create_assignment`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedAssignment {
    /// The new or reused assignment.
    pub assignment: RoleAssignment,
    /// Whether a user account was created.
    pub created_user: bool,
    /// The bootstrap document, when it was attached.
    pub bootstrap_document: Option<VerificationDocument>,
}

/// Result of a document approval or rejection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentReviewOutcome {
    /// The reviewed document.
    pub document: VerificationDocument,
    /// The owning assignment after recomputation.
    pub assignment: RoleAssignment,
    /// The assignment status change, when there was one.
    pub change: Option<StatusChange>,
}

/// Input payload for resubmitting documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResubmissionInput {
    /// Replacement or additional documents.
    pub documents: Vec<DocumentUploadInput>,
    /// Optional applicant note.
    pub note: Option<String>,
}

/// Assignment with its evidence, for reviewers and owners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignmentDetails {
    /// The assignment.
    pub assignment: RoleAssignment,
    /// Every document of the assignment.
    pub documents: Vec<VerificationDocument>,
    /// Requirements in effect for the role.
    pub requirements: RoleRequirements,
    /// Required types still missing or rejected.
    pub outstanding: Vec<DocumentType>,
}

/// Collaborators of [`AssignmentLifecycleService`].
#[derive(Clone)]
pub struct AssignmentLifecyclePorts {
    /// Transactional store.
    pub repository: Arc<dyn RoleAssignmentRepository>,
    /// Document content store.
    pub blob_store: Arc<dyn DocumentBlobStore>,
    /// User-level identity documents.
    pub identity_documents: Arc<dyn IdentityDocumentFallback>,
    /// Market scope lookups.
    pub markets: Arc<dyn MarketDirectory>,
    /// Session store for forced re-authentication.
    pub sessions: Arc<dyn SessionStore>,
    /// User notifications.
    pub notifications: Arc<dyn NotificationGateway>,
    /// Audit trail.
    pub audit_sink: Arc<dyn AuditSink>,
}

/// Application service owning every role assignment state transition.
#[derive(Clone)]
pub struct AssignmentLifecycleService {
    repository: Arc<dyn RoleAssignmentRepository>,
    blob_store: Arc<dyn DocumentBlobStore>,
    identity_documents: Arc<dyn IdentityDocumentFallback>,
    markets: Arc<dyn MarketDirectory>,
    notifications: Arc<dyn NotificationGateway>,
    audit_sink: Arc<dyn AuditSink>,
    side_effects: SideEffectCoordinator,
    policy: RoleRequirementPolicy,
}

impl AssignmentLifecycleService {
    /// Creates a lifecycle service.
    #[must_use]
    pub fn new(ports: AssignmentLifecyclePorts, policy: RoleRequirementPolicy) -> Self {
        Self {
            repository: ports.repository,
            blob_store: ports.blob_store,
            identity_documents: ports.identity_documents,
            markets: ports.markets,
            notifications: ports.notifications,
            audit_sink: ports.audit_sink,
            side_effects: SideEffectCoordinator::new(ports.sessions),
            policy,
        }
    }

    /// Returns the requirement table in effect.
    #[must_use]
    pub fn policy(&self) -> RoleRequirementPolicy {
        self.policy
    }

    async fn evidence(
        &self,
        assignment: &RoleAssignment,
        requirements: &RoleRequirements,
        documents: &[VerificationDocument],
    ) -> AppResult<DocumentStatusMap> {
        let role_statuses = latest_statuses(documents);
        if !requirements.identity_fallback() {
            return Ok(role_statuses);
        }

        let identity_statuses = self
            .identity_documents
            .latest_by_type(assignment.user_id)
            .await?;
        Ok(with_identity_fallback(
            requirements,
            role_statuses,
            &identity_statuses,
        ))
    }

    /// Post-commit publication. Failures are logged, never propagated.
    async fn publish(&self, events: Vec<AuditEvent>, notifications: Vec<Notification>) {
        for event in events {
            let action = event.action.as_str();
            if let Err(error) = self.audit_sink.record(event).await {
                warn!(action, %error, "failed to record audit event");
            }
        }

        for notification in notifications {
            let user_id = notification.user_id;
            if let Err(error) = self.notifications.notify(notification).await {
                warn!(%user_id, %error, "failed to deliver notification");
            }
        }
    }

    /// Finishes the session step and publishes events for a committed change.
    async fn complete(
        &self,
        report: &SideEffectReport,
        mut events: Vec<AuditEvent>,
        mut notifications: Vec<Notification>,
        actor_id: Option<UserId>,
    ) {
        self.side_effects.finish(report).await;

        for sibling in &report.sibling_changes {
            events.push(status_event(
                actor_id,
                AuditAction::RoleAssignmentSuperseded,
                &sibling.assignment,
                sibling.change,
            ));
            notifications.push(status_notification(&sibling.assignment, sibling.change));
        }

        self.publish(events, notifications).await;
    }
}

fn status_event(
    actor_id: Option<UserId>,
    action: AuditAction,
    assignment: &RoleAssignment,
    change: StatusChange,
) -> AuditEvent {
    AuditEvent {
        actor_id,
        action,
        entity_type: "role_assignment".to_owned(),
        entity_id: assignment.id.to_string(),
        from_value: Some(change.from.as_str().to_owned()),
        to_value: Some(change.to.as_str().to_owned()),
    }
}

fn status_notification(assignment: &RoleAssignment, change: StatusChange) -> Notification {
    let (severity, message) = match change.to {
        AssignmentStatus::Active => (
            NotificationSeverity::Success,
            format!("Your {} role is now active.", assignment.role),
        ),
        AssignmentStatus::ProvisionalActive => (
            NotificationSeverity::Success,
            format!(
                "Your {} role is provisionally active while remaining documents are reviewed.",
                assignment.role
            ),
        ),
        AssignmentStatus::Rejected => (
            NotificationSeverity::Warning,
            format!(
                "Your {} application was rejected. You can resubmit your documents.",
                assignment.role
            ),
        ),
        AssignmentStatus::Revoked => (
            NotificationSeverity::Error,
            format!("Your {} role was revoked.", assignment.role),
        ),
        AssignmentStatus::Inactive => (
            NotificationSeverity::Info,
            format!("Your {} role was deactivated.", assignment.role),
        ),
        AssignmentStatus::Pending => (
            NotificationSeverity::Warning,
            match assignment.resubmission_reason.as_deref() {
                Some(reason) => format!(
                    "Please resubmit documents for your {} application: {reason}",
                    assignment.role
                ),
                None => format!("Your {} application is pending.", assignment.role),
            },
        ),
        AssignmentStatus::UnderReview => (
            NotificationSeverity::Info,
            format!("Your {} application is under review.", assignment.role),
        ),
    };

    Notification {
        user_id: assignment.user_id,
        title: format!("{} role {}", assignment.role, change.to.as_str().replace('_', " ")),
        message,
        severity,
        category: NotificationCategory::RoleAssignment,
    }
}
