use chrono::{DateTime, Utc};
use marketgate_application::{
    AssignmentDetails, AssignmentSubject, CreateAssignmentInput, CreatedAssignment,
    DocumentUploadInput, ResubmissionInput,
};
use marketgate_core::{AppError, AppResult, UserId};
use marketgate_domain::{
    Combinator, DocumentType, MarketId, Role, RoleAssignment, RoleRequirements,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{DocumentResponse, DocumentUploadRequest};

/// Anonymous registration creating an account and its first assignment.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub display_name: String,
    pub email: Option<String>,
    pub role: String,
    pub market_id: Option<Uuid>,
    pub bootstrap_document: Option<DocumentUploadRequest>,
}

impl TryFrom<RegisterRequest> for CreateAssignmentInput {
    type Error = AppError;

    fn try_from(value: RegisterRequest) -> Result<Self, Self::Error> {
        Ok(Self {
            subject: AssignmentSubject::NewAccount {
                display_name: value.display_name,
                email: value.email,
            },
            role: value.role.parse::<Role>()?,
            market_id: value.market_id.map(MarketId::from_uuid),
            bootstrap_document: value
                .bootstrap_document
                .map(DocumentUploadInput::try_from)
                .transpose()?,
        })
    }
}

/// Assignment requested by an authenticated actor, for an existing user or a
/// new account when `user_id` is absent.
#[derive(Debug, Deserialize)]
pub struct CreateRoleAssignmentRequest {
    pub user_id: Option<Uuid>,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub role: String,
    pub market_id: Option<Uuid>,
    pub bootstrap_document: Option<DocumentUploadRequest>,
}

impl CreateRoleAssignmentRequest {
    pub fn subject(&self) -> AppResult<AssignmentSubject> {
        match (self.user_id, self.display_name.as_deref()) {
            (Some(user_id), _) => Ok(AssignmentSubject::Existing(UserId::from_uuid(user_id))),
            (None, Some(display_name)) => Ok(AssignmentSubject::NewAccount {
                display_name: display_name.to_owned(),
                email: self.email.clone(),
            }),
            (None, None) => Err(AppError::Validation(
                "either user_id or display_name is required".to_owned(),
            )),
        }
    }
}

impl TryFrom<CreateRoleAssignmentRequest> for CreateAssignmentInput {
    type Error = AppError;

    fn try_from(value: CreateRoleAssignmentRequest) -> Result<Self, Self::Error> {
        let subject = value.subject()?;

        Ok(Self {
            subject,
            role: value.role.parse::<Role>()?,
            market_id: value.market_id.map(MarketId::from_uuid),
            bootstrap_document: value
                .bootstrap_document
                .map(DocumentUploadInput::try_from)
                .transpose()?,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct RoleAssignmentResponse {
    pub id: String,
    pub user_id: String,
    pub role: String,
    pub market_id: Option<String>,
    pub status: String,
    pub admin_notes: String,
    pub resubmission_reason: Option<String>,
    pub assigned_by: Option<String>,
    pub reviewed_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
}

impl From<RoleAssignment> for RoleAssignmentResponse {
    fn from(value: RoleAssignment) -> Self {
        Self {
            id: value.id.to_string(),
            user_id: value.user_id.to_string(),
            role: value.role.as_str().to_owned(),
            market_id: value.market_id.map(|market_id| market_id.to_string()),
            status: value.status.as_str().to_owned(),
            admin_notes: value.admin_notes,
            resubmission_reason: value.resubmission_reason,
            assigned_by: value.assigned_by.map(|user_id| user_id.to_string()),
            reviewed_by: value.reviewed_by.map(|user_id| user_id.to_string()),
            created_at: value.created_at,
            updated_at: value.updated_at,
            reviewed_at: value.reviewed_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CreatedRoleAssignmentResponse {
    pub assignment: RoleAssignmentResponse,
    pub created_user: bool,
    pub bootstrap_document: Option<DocumentResponse>,
}

impl From<CreatedAssignment> for CreatedRoleAssignmentResponse {
    fn from(value: CreatedAssignment) -> Self {
        Self {
            assignment: RoleAssignmentResponse::from(value.assignment),
            created_user: value.created_user,
            bootstrap_document: value.bootstrap_document.map(DocumentResponse::from),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ReviewRoleAssignmentRequest {
    #[serde(default)]
    pub force_active: bool,
}

/// Body of revoke, reject and resubmission-request calls.
#[derive(Debug, Deserialize)]
pub struct ReasonRequest {
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct ResubmitRequest {
    pub documents: Vec<DocumentUploadRequest>,
    pub note: Option<String>,
}

impl TryFrom<ResubmitRequest> for ResubmissionInput {
    type Error = AppError;

    fn try_from(value: ResubmitRequest) -> Result<Self, Self::Error> {
        Ok(Self {
            documents: value
                .documents
                .into_iter()
                .map(DocumentUploadInput::try_from)
                .collect::<AppResult<Vec<_>>>()?,
            note: value.note,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct ReviewQueueQuery {
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct RequirementsResponse {
    pub required: Vec<String>,
    pub optional: Vec<String>,
    pub combinator: Combinator,
}

impl From<&RoleRequirements> for RequirementsResponse {
    fn from(value: &RoleRequirements) -> Self {
        Self {
            required: document_type_names(value.required()),
            optional: document_type_names(value.optional()),
            combinator: value.combinator(),
        }
    }
}

fn document_type_names(types: &[DocumentType]) -> Vec<String> {
    types
        .iter()
        .map(|doc_type| doc_type.as_str().to_owned())
        .collect()
}

#[derive(Debug, Serialize)]
pub struct AssignmentDetailsResponse {
    pub assignment: RoleAssignmentResponse,
    pub documents: Vec<DocumentResponse>,
    pub requirements: RequirementsResponse,
    /// Required types still missing or rejected.
    pub outstanding: Vec<String>,
}

impl From<AssignmentDetails> for AssignmentDetailsResponse {
    fn from(value: AssignmentDetails) -> Self {
        Self {
            requirements: RequirementsResponse::from(&value.requirements),
            outstanding: document_type_names(&value.outstanding),
            assignment: RoleAssignmentResponse::from(value.assignment),
            documents: value
                .documents
                .into_iter()
                .map(DocumentResponse::from)
                .collect(),
        }
    }
}
