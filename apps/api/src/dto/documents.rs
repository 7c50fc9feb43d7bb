use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use marketgate_application::{DocumentReviewOutcome, DocumentUploadInput};
use marketgate_core::AppError;
use marketgate_domain::VerificationDocument;
use serde::{Deserialize, Serialize};

use super::RoleAssignmentResponse;

/// Document upload with base64 encoded content.
#[derive(Debug, Deserialize)]
pub struct DocumentUploadRequest {
    pub doc_type: String,
    pub mime_type: String,
    pub content_base64: String,
}

impl TryFrom<DocumentUploadRequest> for DocumentUploadInput {
    type Error = AppError;

    fn try_from(value: DocumentUploadRequest) -> Result<Self, Self::Error> {
        let bytes = STANDARD
            .decode(value.content_base64.trim())
            .map_err(|error| {
                AppError::Validation(format!(
                    "document '{}' content is not valid base64: {error}",
                    value.doc_type
                ))
            })?;

        Ok(Self {
            doc_type: value.doc_type,
            mime_type: value.mime_type,
            bytes,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct DocumentResponse {
    pub id: String,
    pub role_assignment_id: String,
    pub doc_type: String,
    pub status: String,
    pub file_reference: String,
    pub mime_type: String,
    pub size_bytes: i64,
    pub admin_notes: String,
    pub reviewed_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<VerificationDocument> for DocumentResponse {
    fn from(value: VerificationDocument) -> Self {
        Self {
            id: value.id.to_string(),
            role_assignment_id: value.role_assignment_id.to_string(),
            doc_type: value.doc_type.as_str().to_owned(),
            status: value.status.as_str().to_owned(),
            file_reference: value.file_reference.as_str().to_owned(),
            mime_type: value.mime_type.as_str().to_owned(),
            size_bytes: value.size_bytes,
            admin_notes: value.admin_notes,
            reviewed_by: value.reviewed_by.map(|user_id| user_id.to_string()),
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

/// Reviewed document with the recomputed owning assignment.
#[derive(Debug, Serialize)]
pub struct DocumentReviewResponse {
    pub document: DocumentResponse,
    pub assignment: RoleAssignmentResponse,
    pub previous_status: Option<String>,
}

impl From<DocumentReviewOutcome> for DocumentReviewResponse {
    fn from(value: DocumentReviewOutcome) -> Self {
        Self {
            document: DocumentResponse::from(value.document),
            assignment: RoleAssignmentResponse::from(value.assignment),
            previous_status: value.change.map(|change| change.from.as_str().to_owned()),
        }
    }
}
