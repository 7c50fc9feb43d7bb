//! PostgreSQL-backed role assignment repository.

use async_trait::async_trait;
use sqlx::PgPool;

use marketgate_application::{AssignmentTransaction, RoleAssignmentRepository};
use marketgate_core::{AppError, AppResult, UserId};
use marketgate_domain::{
    AssignmentStatus, DocumentId, RoleAssignment, RoleAssignmentId, UserAccount,
    VerificationDocument,
};

mod rows;
mod transaction;

#[cfg(test)]
mod tests;

use rows::{AssignmentRow, DocumentRow, UserRow, convert_all};
use transaction::PostgresAssignmentTransaction;

const USER_COLUMNS: &str =
    "id, display_name, email, status, legacy_role, session_epoch, created_at";

const ASSIGNMENT_COLUMNS: &str = "id, user_id, role, market_id, status, admin_notes, \
     resubmission_reason, assigned_by, reviewed_by, created_at, updated_at, reviewed_at";

const DOCUMENT_COLUMNS: &str = "id, role_assignment_id, doc_type, status, \
     file_reference, mime_type, size_bytes, admin_notes, reviewed_by, created_at, updated_at";

/// PostgreSQL implementation of the role assignment repository port.
///
/// Transactions take `FOR UPDATE` row locks, user row first.
#[derive(Clone)]
pub struct PostgresRoleAssignmentRepository {
    pool: PgPool,
}

impl PostgresRoleAssignmentRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RoleAssignmentRepository for PostgresRoleAssignmentRepository {
    async fn begin(&self) -> AppResult<Box<dyn AssignmentTransaction>> {
        let transaction = self.pool.begin().await.map_err(|error| {
            AppError::Persistence(format!("failed to begin role assignment transaction: {error}"))
        })?;

        Ok(Box::new(PostgresAssignmentTransaction::new(transaction)))
    }

    async fn find_assignment(
        &self,
        assignment_id: RoleAssignmentId,
    ) -> AppResult<Option<RoleAssignment>> {
        let sql = format!("SELECT {ASSIGNMENT_COLUMNS} FROM role_assignments WHERE id = $1");
        sqlx::query_as::<_, AssignmentRow>(&sql)
            .bind(assignment_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|error| {
                AppError::Persistence(format!(
                    "failed to find role assignment '{assignment_id}': {error}"
                ))
            })?
            .map(RoleAssignment::try_from)
            .transpose()
    }

    async fn list_assignments_for_user(&self, user_id: UserId) -> AppResult<Vec<RoleAssignment>> {
        let sql = format!(
            "SELECT {ASSIGNMENT_COLUMNS} FROM role_assignments \
             WHERE user_id = $1 ORDER BY created_at, id"
        );
        let rows = sqlx::query_as::<_, AssignmentRow>(&sql)
            .bind(user_id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(|error| {
                AppError::Persistence(format!(
                    "failed to list role assignments for user '{user_id}': {error}"
                ))
            })?;

        convert_all(rows)
    }

    async fn list_assignments_by_status(
        &self,
        status: AssignmentStatus,
    ) -> AppResult<Vec<RoleAssignment>> {
        let sql = format!(
            "SELECT {ASSIGNMENT_COLUMNS} FROM role_assignments \
             WHERE status = $1 ORDER BY created_at, id"
        );
        let rows = sqlx::query_as::<_, AssignmentRow>(&sql)
            .bind(status.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(|error| {
                AppError::Persistence(format!(
                    "failed to list role assignments in '{status}': {error}"
                ))
            })?;

        convert_all(rows)
    }

    async fn find_document(
        &self,
        document_id: DocumentId,
    ) -> AppResult<Option<VerificationDocument>> {
        let sql = format!("SELECT {DOCUMENT_COLUMNS} FROM verification_documents WHERE id = $1");
        sqlx::query_as::<_, DocumentRow>(&sql)
            .bind(document_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|error| {
                AppError::Persistence(format!("failed to find document '{document_id}': {error}"))
            })?
            .map(VerificationDocument::try_from)
            .transpose()
    }

    async fn list_documents(
        &self,
        assignment_id: RoleAssignmentId,
    ) -> AppResult<Vec<VerificationDocument>> {
        let sql = format!(
            "SELECT {DOCUMENT_COLUMNS} FROM verification_documents \
             WHERE role_assignment_id = $1 ORDER BY created_at, id"
        );
        let rows = sqlx::query_as::<_, DocumentRow>(&sql)
            .bind(assignment_id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(|error| {
                AppError::Persistence(format!(
                    "failed to list documents for role assignment '{assignment_id}': {error}"
                ))
            })?;

        convert_all(rows)
    }

    async fn find_user(&self, user_id: UserId) -> AppResult<Option<UserAccount>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(user_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|error| {
                AppError::Persistence(format!("failed to find user '{user_id}': {error}"))
            })?
            .map(UserAccount::try_from)
            .transpose()
    }
}
