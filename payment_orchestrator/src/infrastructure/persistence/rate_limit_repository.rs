use async_trait::async_trait;
use sqlx::PgPool;

use crate::domain::error::OrchestratorError;
use crate::domain::rate_limit::RateLimitBucket;
use crate::domain::repository::RateLimitRepository;
use crate::infrastructure::persistence::models::RateLimitBucketModel;

/// Backs C5's token-bucket durability requirement (spec §4.5: "Bucket
/// state persists through a dedicated small table so that restarts do
/// not reset limits beyond the natural refill delay").
pub struct PostgresRateLimitRepository {
    pool: PgPool,
}

impl PostgresRateLimitRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RateLimitRepository for PostgresRateLimitRepository {
    async fn get_or_create(
        &self,
        key: &str,
        capacity: f64,
        refill_rate_per_sec: f64,
    ) -> Result<RateLimitBucket, OrchestratorError> {
        let row = sqlx::query_as::<_, RateLimitBucketModel>(
            r#"
            INSERT INTO rate_limit_buckets (key, tokens, capacity, refill_rate_per_sec, last_refill_at)
            VALUES ($1, $2, $2, $3, now())
            ON CONFLICT (key) DO UPDATE SET key = EXCLUDED.key
            RETURNING *
            "#,
        )
        .bind(key)
        .bind(capacity)
        .bind(refill_rate_per_sec)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn save(&self, bucket: RateLimitBucket) -> Result<(), OrchestratorError> {
        sqlx::query(
            r#"
            UPDATE rate_limit_buckets
            SET tokens = $2, capacity = $3, refill_rate_per_sec = $4, last_refill_at = $5
            WHERE key = $1
            "#,
        )
        .bind(&bucket.key)
        .bind(bucket.tokens)
        .bind(bucket.capacity)
        .bind(bucket.refill_rate_per_sec)
        .bind(bucket.last_refill_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
