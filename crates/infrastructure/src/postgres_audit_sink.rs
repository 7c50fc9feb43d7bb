use async_trait::async_trait;
use sqlx::PgPool;

use marketgate_application::{AuditEvent, AuditSink};
use marketgate_core::{AppError, AppResult};

/// PostgreSQL-backed append-only audit sink.
#[derive(Clone)]
pub struct PostgresAuditSink {
    pool: PgPool,
}

impl PostgresAuditSink {
    /// Creates a sink with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditSink for PostgresAuditSink {
    async fn record(&self, event: AuditEvent) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO audit_log_entries (
                actor_id,
                action,
                entity_type,
                entity_id,
                from_value,
                to_value
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(event.actor_id.map(|actor_id| actor_id.as_uuid()))
        .bind(event.action.as_str())
        .bind(event.entity_type)
        .bind(event.entity_id)
        .bind(event.from_value)
        .bind(event.to_value)
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::SideEffect(format!("failed to record audit event: {error}")))?;

        Ok(())
    }
}
