use async_trait::async_trait;
use sqlx::{PgConnection, Postgres, Transaction};

use marketgate_application::AssignmentTransaction;
use marketgate_core::{AppError, AppResult, UserId};
use marketgate_domain::{
    AccountStatus, LegacyRole, Role, RoleAssignment, RoleAssignmentId, UserAccount,
    VerificationDocument,
};

use super::rows::{AssignmentRow, DocumentRow, UserRow, convert_all};
use super::{ASSIGNMENT_COLUMNS, DOCUMENT_COLUMNS, USER_COLUMNS};

/// Open database transaction. Dropping it before commit rolls back.
pub(super) struct PostgresAssignmentTransaction {
    transaction: Option<Transaction<'static, Postgres>>,
}

impl PostgresAssignmentTransaction {
    pub(super) fn new(transaction: Transaction<'static, Postgres>) -> Self {
        Self {
            transaction: Some(transaction),
        }
    }

    fn connection(&mut self) -> AppResult<&mut PgConnection> {
        self.transaction.as_deref_mut().ok_or_else(|| {
            AppError::Internal("role assignment transaction already committed".to_owned())
        })
    }
}

#[async_trait]
impl AssignmentTransaction for PostgresAssignmentTransaction {
    async fn lock_user(&mut self, user_id: UserId) -> AppResult<UserAccount> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1 FOR UPDATE");
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(user_id.as_uuid())
            .fetch_optional(self.connection()?)
            .await
            .map_err(|error| {
                AppError::Persistence(format!("failed to lock user '{user_id}': {error}"))
            })?
            .ok_or_else(|| AppError::NotFound(format!("user '{user_id}' not found")))
            .and_then(UserAccount::try_from)
    }

    async fn lock_assignment(
        &mut self,
        assignment_id: RoleAssignmentId,
    ) -> AppResult<RoleAssignment> {
        let owner = sqlx::query_scalar::<_, uuid::Uuid>(
            r#"
            SELECT user_id
            FROM role_assignments
            WHERE id = $1
            "#,
        )
        .bind(assignment_id.as_uuid())
        .fetch_optional(self.connection()?)
        .await
        .map_err(|error| {
            AppError::Persistence(format!(
                "failed to find owner of role assignment '{assignment_id}': {error}"
            ))
        })?
        .ok_or_else(|| AppError::NotFound(format!("role assignment '{assignment_id}' not found")))?;

        self.lock_user(UserId::from_uuid(owner)).await?;

        let sql = format!(
            "SELECT {ASSIGNMENT_COLUMNS} FROM role_assignments WHERE id = $1 FOR UPDATE"
        );
        sqlx::query_as::<_, AssignmentRow>(&sql)
            .bind(assignment_id.as_uuid())
            .fetch_optional(self.connection()?)
            .await
            .map_err(|error| {
                AppError::Persistence(format!(
                    "failed to lock role assignment '{assignment_id}': {error}"
                ))
            })?
            .ok_or_else(|| {
                AppError::NotFound(format!("role assignment '{assignment_id}' not found"))
            })
            .and_then(RoleAssignment::try_from)
    }

    async fn insert_user(&mut self, user: &UserAccount) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, display_name, email, status, legacy_role, session_epoch, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(user.id.as_uuid())
        .bind(user.display_name.as_str())
        .bind(user.email.as_ref().map(|email| email.as_str().to_owned()))
        .bind(user.status.as_str())
        .bind(user.legacy_role.map(|role| role.as_str()))
        .bind(user.session_epoch)
        .bind(user.created_at)
        .execute(self.connection()?)
        .await
        .map_err(|error| {
            AppError::Persistence(format!("failed to insert user '{}': {error}", user.id))
        })?;

        Ok(())
    }

    async fn update_user_access(
        &mut self,
        user_id: UserId,
        status: AccountStatus,
        legacy_role: Option<LegacyRole>,
    ) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET status = $2, legacy_role = $3
            WHERE id = $1
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(status.as_str())
        .bind(legacy_role.map(|role| role.as_str()))
        .execute(self.connection()?)
        .await
        .map_err(|error| {
            AppError::Persistence(format!("failed to update access of user '{user_id}': {error}"))
        })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("user '{user_id}' not found")));
        }

        Ok(())
    }

    async fn find_assignment_for_role(
        &mut self,
        user_id: UserId,
        role: Role,
    ) -> AppResult<Option<RoleAssignment>> {
        let sql = format!(
            "SELECT {ASSIGNMENT_COLUMNS} FROM role_assignments WHERE user_id = $1 AND role = $2"
        );
        sqlx::query_as::<_, AssignmentRow>(&sql)
            .bind(user_id.as_uuid())
            .bind(role.as_str())
            .fetch_optional(self.connection()?)
            .await
            .map_err(|error| {
                AppError::Persistence(format!(
                    "failed to find '{role}' assignment of user '{user_id}': {error}"
                ))
            })?
            .map(RoleAssignment::try_from)
            .transpose()
    }

    async fn list_assignments_for_user(
        &mut self,
        user_id: UserId,
    ) -> AppResult<Vec<RoleAssignment>> {
        let sql = format!(
            "SELECT {ASSIGNMENT_COLUMNS} FROM role_assignments \
             WHERE user_id = $1 ORDER BY created_at, id"
        );
        let rows = sqlx::query_as::<_, AssignmentRow>(&sql)
            .bind(user_id.as_uuid())
            .fetch_all(self.connection()?)
            .await
            .map_err(|error| {
                AppError::Persistence(format!(
                    "failed to list role assignments for user '{user_id}': {error}"
                ))
            })?;

        convert_all(rows)
    }

    async fn insert_assignment(&mut self, assignment: &RoleAssignment) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO role_assignments (
                id,
                user_id,
                role,
                market_id,
                status,
                admin_notes,
                resubmission_reason,
                assigned_by,
                reviewed_by,
                created_at,
                updated_at,
                reviewed_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(assignment.id.as_uuid())
        .bind(assignment.user_id.as_uuid())
        .bind(assignment.role.as_str())
        .bind(assignment.market_id.map(|market_id| market_id.as_uuid()))
        .bind(assignment.status.as_str())
        .bind(assignment.admin_notes.as_str())
        .bind(assignment.resubmission_reason.as_deref())
        .bind(assignment.assigned_by.map(|user_id| user_id.as_uuid()))
        .bind(assignment.reviewed_by.map(|user_id| user_id.as_uuid()))
        .bind(assignment.created_at)
        .bind(assignment.updated_at)
        .bind(assignment.reviewed_at)
        .execute(self.connection()?)
        .await
        .map_err(|error| {
            AppError::Persistence(format!(
                "failed to insert '{}' assignment for user '{}': {error}",
                assignment.role, assignment.user_id
            ))
        })?;

        Ok(())
    }

    async fn update_assignment(&mut self, assignment: &RoleAssignment) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE role_assignments
            SET market_id = $2,
                status = $3,
                admin_notes = $4,
                resubmission_reason = $5,
                assigned_by = $6,
                reviewed_by = $7,
                updated_at = $8,
                reviewed_at = $9
            WHERE id = $1
            "#,
        )
        .bind(assignment.id.as_uuid())
        .bind(assignment.market_id.map(|market_id| market_id.as_uuid()))
        .bind(assignment.status.as_str())
        .bind(assignment.admin_notes.as_str())
        .bind(assignment.resubmission_reason.as_deref())
        .bind(assignment.assigned_by.map(|user_id| user_id.as_uuid()))
        .bind(assignment.reviewed_by.map(|user_id| user_id.as_uuid()))
        .bind(assignment.updated_at)
        .bind(assignment.reviewed_at)
        .execute(self.connection()?)
        .await
        .map_err(|error| {
            AppError::Persistence(format!(
                "failed to update role assignment '{}': {error}",
                assignment.id
            ))
        })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "role assignment '{}' not found",
                assignment.id
            )));
        }

        Ok(())
    }

    async fn list_documents(
        &mut self,
        assignment_id: RoleAssignmentId,
    ) -> AppResult<Vec<VerificationDocument>> {
        let sql = format!(
            "SELECT {DOCUMENT_COLUMNS} FROM verification_documents \
             WHERE role_assignment_id = $1 ORDER BY created_at, id"
        );
        let rows = sqlx::query_as::<_, DocumentRow>(&sql)
            .bind(assignment_id.as_uuid())
            .fetch_all(self.connection()?)
            .await
            .map_err(|error| {
                AppError::Persistence(format!(
                    "failed to list documents for role assignment '{assignment_id}': {error}"
                ))
            })?;

        convert_all(rows)
    }

    async fn insert_document(&mut self, document: &VerificationDocument) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO verification_documents (
                id,
                role_assignment_id,
                doc_type,
                status,
                file_reference,
                mime_type,
                size_bytes,
                admin_notes,
                reviewed_by,
                created_at,
                updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(document.id.as_uuid())
        .bind(document.role_assignment_id.as_uuid())
        .bind(document.doc_type.as_str())
        .bind(document.status.as_str())
        .bind(document.file_reference.as_str())
        .bind(document.mime_type.as_str())
        .bind(document.size_bytes)
        .bind(document.admin_notes.as_str())
        .bind(document.reviewed_by.map(|user_id| user_id.as_uuid()))
        .bind(document.created_at)
        .bind(document.updated_at)
        .execute(self.connection()?)
        .await
        .map_err(|error| {
            AppError::Persistence(format!(
                "failed to insert document for role assignment '{}': {error}",
                document.role_assignment_id
            ))
        })?;

        Ok(())
    }

    async fn update_document(&mut self, document: &VerificationDocument) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE verification_documents
            SET status = $2,
                file_reference = $3,
                mime_type = $4,
                size_bytes = $5,
                admin_notes = $6,
                reviewed_by = $7,
                updated_at = $8
            WHERE id = $1
            "#,
        )
        .bind(document.id.as_uuid())
        .bind(document.status.as_str())
        .bind(document.file_reference.as_str())
        .bind(document.mime_type.as_str())
        .bind(document.size_bytes)
        .bind(document.admin_notes.as_str())
        .bind(document.reviewed_by.map(|user_id| user_id.as_uuid()))
        .bind(document.updated_at)
        .execute(self.connection()?)
        .await
        .map_err(|error| {
            AppError::Persistence(format!(
                "failed to update document '{}': {error}",
                document.id
            ))
        })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "document '{}' not found",
                document.id
            )));
        }

        Ok(())
    }

    async fn commit(&mut self) -> AppResult<()> {
        let transaction = self.transaction.take().ok_or_else(|| {
            AppError::Internal("role assignment transaction already committed".to_owned())
        })?;

        transaction.commit().await.map_err(|error| {
            AppError::Persistence(format!(
                "failed to commit role assignment transaction: {error}"
            ))
        })
    }
}
