use async_trait::async_trait;
use sqlx::PgPool;

use marketgate_application::{Notification, NotificationGateway};
use marketgate_core::{AppError, AppResult};

/// PostgreSQL-backed notification inbox.
#[derive(Clone)]
pub struct PostgresNotificationGateway {
    pool: PgPool,
}

impl PostgresNotificationGateway {
    /// Creates a gateway with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationGateway for PostgresNotificationGateway {
    async fn notify(&self, notification: Notification) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO notifications (user_id, title, message, severity, category)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(notification.user_id.as_uuid())
        .bind(notification.title)
        .bind(notification.message)
        .bind(notification.severity.as_str())
        .bind(notification.category.as_str())
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::SideEffect(format!(
                "failed to store notification for user '{}': {error}",
                notification.user_id
            ))
        })?;

        Ok(())
    }
}
