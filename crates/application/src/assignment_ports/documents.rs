use async_trait::async_trait;
use marketgate_core::{AppResult, UserId};
use marketgate_domain::{DocumentStatusMap, DocumentUpload, FileReference, RoleAssignmentId};

/// Port for storing uploaded document content.
#[async_trait]
pub trait DocumentBlobStore: Send + Sync {
    /// Stores a validated upload and returns its reference.
    async fn put(
        &self,
        assignment_id: RoleAssignmentId,
        upload: &DocumentUpload,
    ) -> AppResult<FileReference>;
}

/// Port for user-level identity documents outside any role assignment.
#[async_trait]
pub trait IdentityDocumentFallback: Send + Sync {
    /// Returns the latest status per document type for a user.
    async fn latest_by_type(&self, user_id: UserId) -> AppResult<DocumentStatusMap>;
}
