use async_trait::async_trait;
use common::MerchantId;
use sqlx::PgPool;

use crate::domain::error::OrchestratorError;
use crate::domain::merchant::Merchant;
use crate::domain::repository::MerchantRepository;
use crate::infrastructure::persistence::models::MerchantModel;

/// Postgres-backed `MerchantRepository` (C1). One statement per method,
/// following `PostgresTransactionRepository`'s shape.
pub struct PostgresMerchantRepository {
    pool: PgPool,
}

impl PostgresMerchantRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MerchantRepository for PostgresMerchantRepository {
    async fn create(&self, merchant: Merchant) -> Result<Merchant, OrchestratorError> {
        let row = sqlx::query_as::<_, MerchantModel>(
            r#"
            INSERT INTO merchants (
                id, slug, customer_number, merchant_number, dba_number, terminal_number,
                mac_secret_path, environment, active, rate_limit_per_second, rate_limit_burst,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING *
            "#,
        )
        .bind(merchant.id.into_uuid())
        .bind(&merchant.slug)
        .bind(&merchant.gateway_identity.customer_number)
        .bind(&merchant.gateway_identity.merchant_number)
        .bind(&merchant.gateway_identity.dba_number)
        .bind(&merchant.gateway_identity.terminal_number)
        .bind(&merchant.mac_secret_path)
        .bind(merchant.environment)
        .bind(merchant.active)
        .bind(merchant.rate_limit_per_second as i32)
        .bind(merchant.rate_limit_burst as i32)
        .bind(merchant.created_at)
        .bind(merchant.updated_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn update(&self, merchant: Merchant) -> Result<Merchant, OrchestratorError> {
        let row = sqlx::query_as::<_, MerchantModel>(
            r#"
            UPDATE merchants SET
                slug = $1, customer_number = $2, merchant_number = $3, dba_number = $4,
                terminal_number = $5, mac_secret_path = $6, environment = $7, active = $8,
                rate_limit_per_second = $9, rate_limit_burst = $10, updated_at = now()
            WHERE id = $11
            RETURNING *
            "#,
        )
        .bind(&merchant.slug)
        .bind(&merchant.gateway_identity.customer_number)
        .bind(&merchant.gateway_identity.merchant_number)
        .bind(&merchant.gateway_identity.dba_number)
        .bind(&merchant.gateway_identity.terminal_number)
        .bind(&merchant.mac_secret_path)
        .bind(merchant.environment)
        .bind(merchant.active)
        .bind(merchant.rate_limit_per_second as i32)
        .bind(merchant.rate_limit_burst as i32)
        .bind(merchant.id.into_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Into::into)
            .ok_or_else(|| OrchestratorError::NotFound(format!("merchant {}", merchant.id)))
    }

    async fn find_by_id(&self, id: MerchantId) -> Result<Option<Merchant>, OrchestratorError> {
        let row = sqlx::query_as::<_, MerchantModel>(r#"SELECT * FROM merchants WHERE id = $1"#)
            .bind(id.into_uuid())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Into::into))
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<Merchant>, OrchestratorError> {
        let row =
            sqlx::query_as::<_, MerchantModel>(r#"SELECT * FROM merchants WHERE slug = $1"#)
                .bind(slug)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(Into::into))
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Merchant>, OrchestratorError> {
        let rows = sqlx::query_as::<_, MerchantModel>(
            r#"SELECT * FROM merchants ORDER BY created_at DESC LIMIT $1 OFFSET $2"#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }
}
