use async_trait::async_trait;
use sqlx::PgPool;

use marketgate_application::IdentityDocumentFallback;
use marketgate_core::{AppError, AppResult, UserId};
use marketgate_domain::{DocumentStatus, DocumentStatusMap, DocumentType};

/// Reads user-level identity documents kept outside role assignments.
#[derive(Clone)]
pub struct PostgresIdentityDocumentFallback {
    pool: PgPool,
}

impl PostgresIdentityDocumentFallback {
    /// Creates a reader with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IdentityDocumentFallback for PostgresIdentityDocumentFallback {
    async fn latest_by_type(&self, user_id: UserId) -> AppResult<DocumentStatusMap> {
        let rows = sqlx::query_as::<_, (String, String)>(
            r#"
            SELECT DISTINCT ON (doc_type) doc_type, status
            FROM user_identity_documents
            WHERE user_id = $1
            ORDER BY doc_type, created_at DESC, id DESC
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Persistence(format!(
                "failed to read identity documents of user '{user_id}': {error}"
            ))
        })?;

        rows.into_iter()
            .map(|(doc_type, status)| {
                Ok((DocumentType::parse(&doc_type)?, DocumentStatus::parse(&status)?))
            })
            .collect()
    }
}
