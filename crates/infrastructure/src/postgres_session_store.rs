use async_trait::async_trait;
use sqlx::PgPool;

use marketgate_application::SessionStore;
use marketgate_core::{AppError, AppResult, UserId};

/// PostgreSQL session registry backing forced re-authentication.
///
/// Live sessions are tracked in `user_sessions` next to the tower-sessions
/// table so all sessions of a user can be deleted at once.
#[derive(Clone)]
pub struct PostgresSessionStore {
    pool: PgPool,
}

impl PostgresSessionStore {
    /// Creates a store with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for PostgresSessionStore {
    async fn register_session(&self, session_id: &str, user_id: UserId) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO user_sessions (session_id, user_id)
            VALUES ($1, $2)
            ON CONFLICT (session_id) DO UPDATE SET user_id = EXCLUDED.user_id
            "#,
        )
        .bind(session_id)
        .bind(user_id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Persistence(format!(
                "failed to register session for user '{user_id}': {error}"
            ))
        })?;

        Ok(())
    }

    async fn invalidate_all(&self, user_id: UserId) -> AppResult<()> {
        let mut transaction = self.pool.begin().await.map_err(|error| {
            AppError::SideEffect(format!("failed to begin session invalidation: {error}"))
        })?;

        sqlx::query(
            r#"
            DELETE FROM tower_sessions.tower_sessions
            WHERE id IN (SELECT session_id FROM user_sessions WHERE user_id = $1)
            "#,
        )
        .bind(user_id.as_uuid())
        .execute(&mut *transaction)
        .await
        .map_err(|error| {
            AppError::SideEffect(format!(
                "failed to delete sessions of user '{user_id}': {error}"
            ))
        })?;

        sqlx::query(
            r#"
            DELETE FROM user_sessions
            WHERE user_id = $1
            "#,
        )
        .bind(user_id.as_uuid())
        .execute(&mut *transaction)
        .await
        .map_err(|error| {
            AppError::SideEffect(format!(
                "failed to clear session registry of user '{user_id}': {error}"
            ))
        })?;

        transaction.commit().await.map_err(|error| {
            AppError::SideEffect(format!("failed to commit session invalidation: {error}"))
        })
    }

    async fn bump_epoch(&self, user_id: UserId) -> AppResult<i64> {
        sqlx::query_scalar::<_, i64>(
            r#"
            UPDATE users
            SET session_epoch = session_epoch + 1
            WHERE id = $1
            RETURNING session_epoch
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::SideEffect(format!(
                "failed to bump session epoch of user '{user_id}': {error}"
            ))
        })?
        .ok_or_else(|| AppError::NotFound(format!("user '{user_id}' not found")))
    }

    async fn current_epoch(&self, user_id: UserId) -> AppResult<i64> {
        sqlx::query_scalar::<_, i64>(
            r#"
            SELECT session_epoch
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Persistence(format!(
                "failed to read session epoch of user '{user_id}': {error}"
            ))
        })?
        .ok_or_else(|| AppError::NotFound(format!("user '{user_id}' not found")))
    }
}
