use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{CustomerId, MerchantId, PaymentMethodId};
use sqlx::PgPool;

use crate::domain::error::OrchestratorError;
use crate::domain::payment_method::PaymentMethod;
use crate::domain::repository::PaymentMethodRepository;
use crate::infrastructure::persistence::models::PaymentMethodModel;

pub struct PostgresPaymentMethodRepository {
    pool: PgPool,
}

impl PostgresPaymentMethodRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PaymentMethodRepository for PostgresPaymentMethodRepository {
    async fn create(&self, method: PaymentMethod) -> Result<PaymentMethod, OrchestratorError> {
        let (card_brand, card_exp_month, card_exp_year) = match &method.card {
            Some(c) => (Some(c.brand.clone()), Some(c.exp_month as i16), Some(c.exp_year as i16)),
            None => (None, None, None),
        };
        let (ach_bank_name, ach_account_type) = match &method.ach {
            Some(a) => (a.bank_name.clone(), Some(a.account_type)),
            None => (None, None),
        };

        let row = sqlx::query_as::<_, PaymentMethodModel>(
            r#"
            INSERT INTO payment_methods (
                id, merchant_id, customer_id, method_type, storage_token, last_four,
                card_brand, card_exp_month, card_exp_year, ach_bank_name, ach_account_type,
                is_default, active, verification_status, verified_at, last_used_at, deleted_at,
                created_at, updated_at
            )
            VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16,$17,$18,$19)
            RETURNING *
            "#,
        )
        .bind(method.id.into_uuid())
        .bind(method.merchant_id.into_uuid())
        .bind(&method.customer_id.0)
        .bind(method.method_type)
        .bind(&method.storage_token)
        .bind(&method.last_four)
        .bind(card_brand)
        .bind(card_exp_month)
        .bind(card_exp_year)
        .bind(ach_bank_name)
        .bind(ach_account_type)
        .bind(method.is_default)
        .bind(method.active)
        .bind(method.verification_status)
        .bind(method.verified_at)
        .bind(method.last_used_at)
        .bind(method.deleted_at)
        .bind(method.created_at)
        .bind(method.updated_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn find_by_id(
        &self,
        id: PaymentMethodId,
    ) -> Result<Option<PaymentMethod>, OrchestratorError> {
        let row = sqlx::query_as::<_, PaymentMethodModel>(
            r#"SELECT * FROM payment_methods WHERE id = $1"#,
        )
        .bind(id.into_uuid())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn list_for_customer(
        &self,
        merchant_id: MerchantId,
        customer_id: &CustomerId,
    ) -> Result<Vec<PaymentMethod>, OrchestratorError> {
        let rows = sqlx::query_as::<_, PaymentMethodModel>(
            r#"
            SELECT * FROM payment_methods
            WHERE merchant_id = $1 AND customer_id = $2 AND deleted_at IS NULL
            ORDER BY created_at DESC
            "#,
        )
        .bind(merchant_id.into_uuid())
        .bind(&customer_id.0)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn soft_delete(&self, id: PaymentMethodId) -> Result<(), OrchestratorError> {
        sqlx::query(
            r#"UPDATE payment_methods SET deleted_at = now(), is_default = false, updated_at = now() WHERE id = $1"#,
        )
        .bind(id.into_uuid())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn touch_last_used(&self, id: PaymentMethodId) -> Result<(), OrchestratorError> {
        sqlx::query(
            r#"UPDATE payment_methods SET last_used_at = now(), updated_at = now() WHERE id = $1"#,
        )
        .bind(id.into_uuid())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_default(
        &self,
        conn: &mut sqlx::PgConnection,
        merchant_id: MerchantId,
        customer_id: &CustomerId,
        id: PaymentMethodId,
    ) -> Result<(), OrchestratorError> {
        sqlx::query(
            r#"
            UPDATE payment_methods SET is_default = false, updated_at = now()
            WHERE merchant_id = $1 AND customer_id = $2 AND is_default = true AND id != $3
            "#,
        )
        .bind(merchant_id.into_uuid())
        .bind(&customer_id.0)
        .bind(id.into_uuid())
        .execute(&mut *conn)
        .await?;

        sqlx::query(
            r#"UPDATE payment_methods SET is_default = true, updated_at = now() WHERE id = $1"#,
        )
        .bind(id.into_uuid())
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    async fn verify_if_pending(
        &self,
        id: PaymentMethodId,
        now: DateTime<Utc>,
    ) -> Result<bool, OrchestratorError> {
        let result = sqlx::query(
            r#"
            UPDATE payment_methods
            SET verification_status = 'verified', active = true, verified_at = $2, updated_at = $2
            WHERE id = $1 AND verification_status = 'pending'
            "#,
        )
        .bind(id.into_uuid())
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn list_pending_ach_older_than(
        &self,
        cutoff: DateTime<Utc>,
        batch_size: i64,
    ) -> Result<Vec<PaymentMethod>, OrchestratorError> {
        let rows = sqlx::query_as::<_, PaymentMethodModel>(
            r#"
            SELECT * FROM payment_methods
            WHERE method_type = 'ach' AND verification_status = 'pending' AND created_at <= $1
            ORDER BY created_at ASC
            LIMIT $2
            "#,
        )
        .bind(cutoff)
        .bind(batch_size)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }
}
