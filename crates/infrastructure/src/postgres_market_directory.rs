use async_trait::async_trait;
use sqlx::PgPool;

use marketgate_application::MarketDirectory;
use marketgate_core::{AppError, AppResult, UserId};
use marketgate_domain::MarketId;

/// Market scope lookups backed by the `markets` table.
#[derive(Clone)]
pub struct PostgresMarketDirectory {
    pool: PgPool,
}

impl PostgresMarketDirectory {
    /// Creates a directory with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MarketDirectory for PostgresMarketDirectory {
    async fn is_market_manager(&self, user_id: UserId, market_id: MarketId) -> AppResult<bool> {
        sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1
                FROM markets
                WHERE id = $1 AND manager_id = $2
            )
            "#,
        )
        .bind(market_id.as_uuid())
        .bind(user_id.as_uuid())
        .fetch_one(&self.pool)
        .await
        .map_err(|error| {
            AppError::Persistence(format!(
                "failed to check manager of market '{market_id}': {error}"
            ))
        })
    }

    async fn markets_managed_by(&self, user_id: UserId) -> AppResult<Vec<MarketId>> {
        let market_ids = sqlx::query_scalar::<_, uuid::Uuid>(
            r#"
            SELECT id
            FROM markets
            WHERE manager_id = $1
            ORDER BY name, id
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Persistence(format!(
                "failed to list markets managed by user '{user_id}': {error}"
            ))
        })?;

        Ok(market_ids.into_iter().map(MarketId::from_uuid).collect())
    }
}
