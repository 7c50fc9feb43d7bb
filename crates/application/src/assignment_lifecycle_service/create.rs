use chrono::Utc;
use marketgate_core::{AppResult, NonEmptyString, UserId};
use marketgate_domain::{
    AssignmentStatus, AuditAction, DocumentUpload, EmailAddress, RoleAssignment, StatusChange,
    UploadContext, UserAccount, VerificationDocument,
};
use tracing::{info, warn};

use super::{
    AssignmentInitiator, AssignmentLifecycleService, AssignmentSubject, CreateAssignmentInput,
    CreatedAssignment, DocumentUploadInput, status_notification,
};
use crate::assignment_ports::AuditEvent;

impl AssignmentLifecycleService {
    /// Creates the assignment for a `(user, role)` pair, or re-requests an existing one.
    ///
    /// A `pending` or `under_review` row is returned unchanged; a closed row
    /// (`revoked`, `rejected`, `inactive`) is reset to `pending`. The bootstrap
    /// document is attached after the main commit and never fails the call.
    pub async fn create_assignment(
        &self,
        initiator: AssignmentInitiator<'_>,
        input: CreateAssignmentInput,
    ) -> AppResult<CreatedAssignment> {
        let CreateAssignmentInput {
            subject,
            role,
            market_id,
            bootstrap_document,
        } = input;
        self.require_grant(initiator, &subject, role, market_id)
            .await?;

        let actor_id = initiator.actor_id();
        let actor_label = actor_id.map_or_else(|| "self-registration".to_owned(), |id| id.to_string());
        let now = Utc::now();

        let mut transaction = self.repository.begin().await?;
        let (user_id, created_user) = match subject {
            AssignmentSubject::Existing(user_id) => {
                transaction.lock_user(user_id).await?;
                (user_id, false)
            }
            AssignmentSubject::NewAccount {
                display_name,
                email,
            } => {
                let display_name = NonEmptyString::new(display_name)?;
                let email = email.map(EmailAddress::new).transpose()?;
                let user = UserAccount::new_inactive(display_name, email, now);
                transaction.insert_user(&user).await?;
                (user.id, true)
            }
        };

        let existing = if created_user {
            None
        } else {
            transaction.find_assignment_for_role(user_id, role).await?
        };

        let (assignment, outcome) = match existing {
            None => {
                let mut assignment =
                    RoleAssignment::new_pending(user_id, role, market_id, actor_id, now);
                assignment.append_note(&format!("{role} requested by {actor_label}"), now);
                transaction.insert_assignment(&assignment).await?;
                (assignment, Requested::Created)
            }
            Some(assignment)
                if matches!(
                    assignment.status,
                    AssignmentStatus::Pending | AssignmentStatus::UnderReview
                ) =>
            {
                (assignment, Requested::Unchanged)
            }
            Some(assignment) if assignment.status.is_honored() => {
                return Err(assignment.invalid_state(format!(
                    "user already holds the '{role}' role"
                )));
            }
            Some(mut assignment) => {
                let change = assignment.transition_to(AssignmentStatus::Pending, now);
                assignment.assigned_by = actor_id;
                assignment.resubmission_reason = None;
                if market_id.is_some() {
                    assignment.market_id = market_id;
                }
                assignment.append_note(
                    &format!("re-requested by {actor_label}: {} -> pending", change.from),
                    now,
                );
                transaction.update_assignment(&assignment).await?;
                (assignment, Requested::Reopened(change))
            }
        };

        transaction.commit().await?;
        drop(transaction);

        let change = match outcome {
            Requested::Created => Some(StatusChange {
                from: AssignmentStatus::Pending,
                to: AssignmentStatus::Pending,
            }),
            Requested::Reopened(change) => Some(change),
            Requested::Unchanged => None,
        };
        if let Some(change) = change {
            info!(
                assignment_id = %assignment.id,
                user_id = %assignment.user_id,
                role = assignment.role.as_str(),
                created_user,
                "role assignment requested"
            );
            let event = AuditEvent {
                actor_id,
                action: AuditAction::RoleAssignmentCreated,
                entity_type: "role_assignment".to_owned(),
                entity_id: assignment.id.to_string(),
                from_value: match outcome {
                    Requested::Reopened(change) => Some(change.from.as_str().to_owned()),
                    _ => None,
                },
                to_value: Some(AssignmentStatus::Pending.as_str().to_owned()),
            };
            let notification = status_notification(&assignment, change);
            self.publish(vec![event], vec![notification]).await;
        }

        let bootstrap_document = match bootstrap_document {
            Some(document) => self.attach_bootstrap(&assignment, document, actor_id).await,
            None => None,
        };

        Ok(CreatedAssignment {
            assignment,
            created_user,
            bootstrap_document,
        })
    }

    async fn attach_bootstrap(
        &self,
        assignment: &RoleAssignment,
        document: DocumentUploadInput,
        actor_id: Option<UserId>,
    ) -> Option<VerificationDocument> {
        let upload = match DocumentUpload::new(
            &document.doc_type,
            &document.mime_type,
            document.bytes,
            UploadContext::Bootstrap,
        ) {
            Ok(upload) => upload,
            Err(error) => {
                warn!(assignment_id = %assignment.id, %error, "bootstrap document rejected");
                return None;
            }
        };

        match self.store_bootstrap(assignment, &upload).await {
            Ok(document) => {
                info!(
                    assignment_id = %assignment.id,
                    document_id = %document.id,
                    doc_type = document.doc_type.as_str(),
                    "bootstrap document attached"
                );
                self.publish(
                    vec![AuditEvent {
                        actor_id,
                        action: AuditAction::DocumentAttached,
                        entity_type: "verification_document".to_owned(),
                        entity_id: document.id.to_string(),
                        from_value: None,
                        to_value: Some(document.status.as_str().to_owned()),
                    }],
                    Vec::new(),
                )
                .await;
                Some(document)
            }
            Err(error) => {
                warn!(assignment_id = %assignment.id, %error, "failed to attach bootstrap document");
                None
            }
        }
    }

    async fn store_bootstrap(
        &self,
        assignment: &RoleAssignment,
        upload: &DocumentUpload,
    ) -> AppResult<VerificationDocument> {
        let file_reference = self.blob_store.put(assignment.id, upload).await?;

        let mut transaction = self.repository.begin().await?;
        let locked = transaction.lock_assignment(assignment.id).await?;
        let document =
            VerificationDocument::new_pending(locked.id, upload, file_reference, Utc::now());
        transaction.insert_document(&document).await?;
        transaction.commit().await?;

        Ok(document)
    }
}

#[derive(Debug, Clone, Copy)]
enum Requested {
    Created,
    Reopened(StatusChange),
    Unchanged,
}
