use std::collections::BTreeSet;

use chrono::Utc;
use marketgate_core::{ActorIdentity, AppError, AppResult};
use marketgate_domain::{
    AssignmentStatus, AuditAction, DocumentStatus, DocumentUpload, Resolution, RoleAssignment,
    RoleAssignmentId, UploadContext, VerificationDocument, latest_by_type, latest_statuses,
    outstanding_evidence, resolve_status, with_identity_fallback,
};
use tracing::info;

use super::access::Authority;
use super::{AssignmentLifecycleService, ResubmissionInput, status_event, status_notification};
use crate::side_effect_coordinator::SideEffectMode;

impl AssignmentLifecycleService {
    /// Replaces rejected documents or adds missing ones, then recomputes the status.
    ///
    /// Every upload and the resulting evidence are validated before any write.
    pub async fn resubmit(
        &self,
        submitter: &ActorIdentity,
        assignment_id: RoleAssignmentId,
        input: ResubmissionInput,
    ) -> AppResult<RoleAssignment> {
        if input.documents.is_empty() {
            return Err(AppError::Validation(
                "resubmission requires at least one document".to_owned(),
            ));
        }

        let uploads = input
            .documents
            .into_iter()
            .map(|document| {
                DocumentUpload::new(
                    &document.doc_type,
                    &document.mime_type,
                    document.bytes,
                    UploadContext::Resubmission,
                )
            })
            .collect::<AppResult<Vec<_>>>()?;

        let mut seen = BTreeSet::new();
        if let Some(duplicate) = uploads
            .iter()
            .find(|upload| !seen.insert(upload.doc_type()))
        {
            return Err(AppError::Validation(format!(
                "'{}' was uploaded more than once",
                duplicate.doc_type().as_str()
            )));
        }

        let now = Utc::now();
        let mut transaction = self.repository.begin().await?;
        let mut assignment = transaction.lock_assignment(assignment_id).await?;

        if assignment.user_id != submitter.user_id()
            && self.authority_of(submitter).await? != Authority::SuperAdmin
        {
            return Err(AppError::Authorization(format!(
                "user '{}' may not resubmit for assignment '{}'",
                submitter.user_id(),
                assignment.id
            )));
        }

        let documents = transaction.list_documents(assignment.id).await?;
        let governing = latest_by_type(&documents);
        let has_rejected_document = governing
            .values()
            .any(|document| document.status == DocumentStatus::Rejected);
        let eligible = match assignment.status {
            AssignmentStatus::Rejected => true,
            AssignmentStatus::Pending if assignment.resubmission_reason.is_some() => true,
            AssignmentStatus::Revoked | AssignmentStatus::Inactive => false,
            _ => has_rejected_document,
        };
        if !eligible {
            return Err(assignment.invalid_state("assignment is not awaiting a resubmission"));
        }

        if let Some(upload) = uploads.iter().find(|upload| {
            governing
                .get(&upload.doc_type())
                .is_some_and(|document| document.status == DocumentStatus::Approved)
        }) {
            return Err(AppError::Validation(format!(
                "the '{}' document is already approved",
                upload.doc_type().as_str()
            )));
        }

        let requirements = self.policy.requirements_for(assignment.role);
        let mut prospective = latest_statuses(&documents);
        for upload in &uploads {
            prospective.insert(upload.doc_type(), DocumentStatus::Pending);
        }
        let identity_statuses = if requirements.identity_fallback() {
            self.identity_documents
                .latest_by_type(assignment.user_id)
                .await?
        } else {
            Default::default()
        };
        let prospective = with_identity_fallback(&requirements, prospective, &identity_statuses);
        let outstanding = outstanding_evidence(&requirements, &prospective);
        if !outstanding.is_empty() {
            let names = outstanding
                .iter()
                .map(|doc_type| doc_type.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            return Err(AppError::Validation(format!(
                "resubmission leaves required documents missing or rejected: {names}"
            )));
        }

        let mut replaced = Vec::new();
        let mut added = Vec::new();
        for upload in &uploads {
            let file_reference = self.blob_store.put(assignment.id, upload).await?;
            match governing.get(&upload.doc_type()) {
                Some(existing) if existing.status == DocumentStatus::Rejected => {
                    let mut document = (*existing).clone();
                    document.replace_file(upload, file_reference, now);
                    transaction.update_document(&document).await?;
                    replaced.push(document);
                }
                _ => {
                    let document =
                        VerificationDocument::new_pending(assignment.id, upload, file_reference, now);
                    transaction.insert_document(&document).await?;
                    added.push(document);
                }
            }
        }

        let documents = transaction.list_documents(assignment.id).await?;
        let evidence = self
            .evidence(&assignment, &requirements, &documents)
            .await?;
        let target = match resolve_status(&requirements, &evidence) {
            Resolution::Status(status) => status,
            Resolution::Unchanged
                if matches!(
                    assignment.status,
                    AssignmentStatus::Rejected | AssignmentStatus::Pending
                ) =>
            {
                AssignmentStatus::UnderReview
            }
            Resolution::Unchanged => assignment.status,
        };

        let change = assignment.transition_to(target, now);
        assignment.resubmission_reason = None;
        let types = uploads
            .iter()
            .map(|upload| upload.doc_type().as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let mut note = format!(
            "resubmitted by {} ({types}): {} -> {}",
            submitter.user_id(),
            change.from,
            change.to
        );
        if let Some(applicant_note) = input.note.as_deref().map(str::trim)
            && !applicant_note.is_empty()
        {
            note.push_str(&format!("; note: {applicant_note}"));
        }
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

        info!(
            assignment_id = %assignment.id,
            replaced = replaced.len(),
            added = added.len(),
            from = %change.from,
            to = %change.to,
            "documents resubmitted"
        );

        self.complete(
            &report,
            vec![status_event(
                Some(submitter.user_id()),
                AuditAction::RoleAssignmentResubmitted,
                &assignment,
                change,
            )],
            vec![status_notification(&assignment, change)],
            Some(submitter.user_id()),
        )
        .await;

        Ok(assignment)
    }
}
