use async_trait::async_trait;
use common::{MerchantId, ServiceId};
use sqlx::PgPool;

use crate::domain::error::OrchestratorError;
use crate::domain::repository::ServiceRepository;
use crate::domain::service::{Service, ServiceMerchantGrant};
use crate::infrastructure::persistence::models::{ServiceMerchantGrantModel, ServiceModel};

pub struct PostgresServiceRepository {
    pool: PgPool,
}

impl PostgresServiceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ServiceRepository for PostgresServiceRepository {
    async fn create(&self, service: Service) -> Result<Service, OrchestratorError> {
        let row = sqlx::query_as::<_, ServiceModel>(
            r#"
            INSERT INTO services (
                id, external_id, public_key_pem, key_fingerprint, environment,
                rate_limit_per_second, rate_limit_burst, active, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(service.id.into_uuid())
        .bind(&service.external_id)
        .bind(&service.public_key_pem)
        .bind(&service.key_fingerprint)
        .bind(service.environment)
        .bind(service.rate_limit_per_second as i32)
        .bind(service.rate_limit_burst as i32)
        .bind(service.active)
        .bind(service.created_at)
        .bind(service.updated_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn update(&self, service: Service) -> Result<Service, OrchestratorError> {
        let row = sqlx::query_as::<_, ServiceModel>(
            r#"
            UPDATE services SET
                public_key_pem = $1, key_fingerprint = $2, environment = $3,
                rate_limit_per_second = $4, rate_limit_burst = $5, active = $6, updated_at = now()
            WHERE id = $7
            RETURNING *
            "#,
        )
        .bind(&service.public_key_pem)
        .bind(&service.key_fingerprint)
        .bind(service.environment)
        .bind(service.rate_limit_per_second as i32)
        .bind(service.rate_limit_burst as i32)
        .bind(service.active)
        .bind(service.id.into_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Into::into)
            .ok_or_else(|| OrchestratorError::NotFound(format!("service {}", service.id)))
    }

    async fn find_by_id(&self, id: ServiceId) -> Result<Option<Service>, OrchestratorError> {
        let row = sqlx::query_as::<_, ServiceModel>(r#"SELECT * FROM services WHERE id = $1"#)
            .bind(id.into_uuid())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Into::into))
    }

    async fn find_by_fingerprint(
        &self,
        fingerprint: &str,
    ) -> Result<Option<Service>, OrchestratorError> {
        let row = sqlx::query_as::<_, ServiceModel>(
            r#"SELECT * FROM services WHERE key_fingerprint = $1"#,
        )
        .bind(fingerprint)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn upsert_grant(
        &self,
        grant: ServiceMerchantGrant,
    ) -> Result<ServiceMerchantGrant, OrchestratorError> {
        let scopes: Vec<_> = grant.scopes.iter().copied().collect();
        let row = sqlx::query_as::<_, ServiceMerchantGrantModel>(
            r#"
            INSERT INTO service_merchants (service_id, merchant_id, scopes, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (service_id, merchant_id)
            DO UPDATE SET scopes = EXCLUDED.scopes, updated_at = now()
            RETURNING *
            "#,
        )
        .bind(grant.service_id.into_uuid())
        .bind(grant.merchant_id.into_uuid())
        .bind(&scopes)
        .bind(grant.created_at)
        .bind(grant.updated_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn revoke_grant(
        &self,
        service_id: ServiceId,
        merchant_id: MerchantId,
    ) -> Result<(), OrchestratorError> {
        sqlx::query(
            r#"DELETE FROM service_merchants WHERE service_id = $1 AND merchant_id = $2"#,
        )
        .bind(service_id.into_uuid())
        .bind(merchant_id.into_uuid())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_grant(
        &self,
        service_id: ServiceId,
        merchant_id: MerchantId,
    ) -> Result<Option<ServiceMerchantGrant>, OrchestratorError> {
        let row = sqlx::query_as::<_, ServiceMerchantGrantModel>(
            r#"SELECT * FROM service_merchants WHERE service_id = $1 AND merchant_id = $2"#,
        )
        .bind(service_id.into_uuid())
        .bind(merchant_id.into_uuid())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }
}
