use chrono::{DateTime, Utc};
use marketgate_core::{AppError, AppResult, UserId};
use marketgate_domain::{
    AccountStatus, AssignmentStatus, DocumentId, DocumentMimeType, DocumentStatus, DocumentType,
    EmailAddress, FileReference, LegacyRole, MarketId, Role, RoleAssignment, RoleAssignmentId,
    UserAccount, VerificationDocument,
};
use uuid::Uuid;

#[derive(Debug, sqlx::FromRow)]
pub(super) struct UserRow {
    id: Uuid,
    display_name: String,
    email: Option<String>,
    status: String,
    legacy_role: Option<String>,
    session_epoch: i64,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for UserAccount {
    type Error = AppError;

    fn try_from(row: UserRow) -> AppResult<Self> {
        Ok(Self {
            id: UserId::from_uuid(row.id),
            display_name: row.display_name,
            email: row.email.map(EmailAddress::new).transpose().map_err(corrupt)?,
            status: AccountStatus::parse(&row.status).map_err(corrupt)?,
            legacy_role: row
                .legacy_role
                .as_deref()
                .map(LegacyRole::parse)
                .transpose()
                .map_err(corrupt)?,
            session_epoch: row.session_epoch,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(super) struct AssignmentRow {
    id: Uuid,
    user_id: Uuid,
    role: String,
    market_id: Option<Uuid>,
    status: String,
    admin_notes: String,
    resubmission_reason: Option<String>,
    assigned_by: Option<Uuid>,
    reviewed_by: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    reviewed_at: Option<DateTime<Utc>>,
}

impl TryFrom<AssignmentRow> for RoleAssignment {
    type Error = AppError;

    fn try_from(row: AssignmentRow) -> AppResult<Self> {
        Ok(Self {
            id: RoleAssignmentId::from_uuid(row.id),
            user_id: UserId::from_uuid(row.user_id),
            role: row.role.parse::<Role>().map_err(corrupt)?,
            market_id: row.market_id.map(MarketId::from_uuid),
            status: AssignmentStatus::parse(&row.status).map_err(corrupt)?,
            admin_notes: row.admin_notes,
            resubmission_reason: row.resubmission_reason,
            assigned_by: row.assigned_by.map(UserId::from_uuid),
            reviewed_by: row.reviewed_by.map(UserId::from_uuid),
            created_at: row.created_at,
            updated_at: row.updated_at,
            reviewed_at: row.reviewed_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(super) struct DocumentRow {
    id: Uuid,
    role_assignment_id: Uuid,
    doc_type: String,
    status: String,
    file_reference: String,
    mime_type: String,
    size_bytes: i64,
    admin_notes: String,
    reviewed_by: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<DocumentRow> for VerificationDocument {
    type Error = AppError;

    fn try_from(row: DocumentRow) -> AppResult<Self> {
        Ok(Self {
            id: DocumentId::from_uuid(row.id),
            role_assignment_id: RoleAssignmentId::from_uuid(row.role_assignment_id),
            doc_type: DocumentType::parse(&row.doc_type).map_err(corrupt)?,
            status: DocumentStatus::parse(&row.status).map_err(corrupt)?,
            file_reference: FileReference::new(row.file_reference).map_err(corrupt)?,
            mime_type: DocumentMimeType::parse(&row.mime_type).map_err(corrupt)?,
            size_bytes: row.size_bytes,
            admin_notes: row.admin_notes,
            reviewed_by: row.reviewed_by.map(UserId::from_uuid),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Converts a row list, failing on the first corrupt row.
pub(super) fn convert_all<R, T>(rows: Vec<R>) -> AppResult<Vec<T>>
where
    T: TryFrom<R, Error = AppError>,
{
    rows.into_iter().map(T::try_from).collect()
}

fn corrupt(error: AppError) -> AppError {
    AppError::Persistence(format!("stored row is invalid: {error}"))
}
