use async_trait::async_trait;
use chrono::NaiveDate;
use common::{CustomerId, MerchantId, SubscriptionId};
use sqlx::PgPool;

use crate::domain::error::OrchestratorError;
use crate::domain::repository::SubscriptionRepository;
use crate::domain::subscription::Subscription;
use crate::infrastructure::persistence::models::SubscriptionModel;

pub struct PostgresSubscriptionRepository {
    pool: PgPool,
}

impl PostgresSubscriptionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SubscriptionRepository for PostgresSubscriptionRepository {
    async fn create(&self, subscription: Subscription) -> Result<Subscription, OrchestratorError> {
        let row = sqlx::query_as::<_, SubscriptionModel>(
            r#"
            INSERT INTO subscriptions (
                id, merchant_id, customer_id, payment_method_id, amount_minor_units, currency,
                interval_value, interval_unit, status, next_billing_date, failure_retry_count,
                max_retries, cancelled_at, metadata, created_at, updated_at
            )
            VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16)
            RETURNING *
            "#,
        )
        .bind(subscription.id.into_uuid())
        .bind(subscription.merchant_id.into_uuid())
        .bind(&subscription.customer_id.0)
        .bind(subscription.payment_method_id.into_uuid())
        .bind(subscription.amount.minor_units)
        .bind(subscription.amount.currency_str())
        .bind(subscription.interval.value as i32)
        .bind(subscription.interval.unit)
        .bind(subscription.status)
        .bind(subscription.next_billing_date)
        .bind(subscription.failure_retry_count as i32)
        .bind(subscription.max_retries as i32)
        .bind(subscription.cancelled_at)
        .bind(&subscription.metadata)
        .bind(subscription.created_at)
        .bind(subscription.updated_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn update(&self, subscription: Subscription) -> Result<Subscription, OrchestratorError> {
        let row = sqlx::query_as::<_, SubscriptionModel>(
            r#"
            UPDATE subscriptions SET
                payment_method_id = $1, amount_minor_units = $2, currency = $3,
                interval_value = $4, interval_unit = $5, status = $6, next_billing_date = $7,
                failure_retry_count = $8, max_retries = $9, cancelled_at = $10, metadata = $11,
                updated_at = now()
            WHERE id = $12
            RETURNING *
            "#,
        )
        .bind(subscription.payment_method_id.into_uuid())
        .bind(subscription.amount.minor_units)
        .bind(subscription.amount.currency_str())
        .bind(subscription.interval.value as i32)
        .bind(subscription.interval.unit)
        .bind(subscription.status)
        .bind(subscription.next_billing_date)
        .bind(subscription.failure_retry_count as i32)
        .bind(subscription.max_retries as i32)
        .bind(subscription.cancelled_at)
        .bind(&subscription.metadata)
        .bind(subscription.id.into_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Into::into)
            .ok_or_else(|| OrchestratorError::NotFound(format!("subscription {}", subscription.id)))
    }

    async fn find_by_id(
        &self,
        id: SubscriptionId,
    ) -> Result<Option<Subscription>, OrchestratorError> {
        let row = sqlx::query_as::<_, SubscriptionModel>(
            r#"SELECT * FROM subscriptions WHERE id = $1"#,
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
    ) -> Result<Vec<Subscription>, OrchestratorError> {
        let rows = sqlx::query_as::<_, SubscriptionModel>(
            r#"
            SELECT * FROM subscriptions WHERE merchant_id = $1 AND customer_id = $2
            ORDER BY created_at DESC
            "#,
        )
        .bind(merchant_id.into_uuid())
        .bind(&customer_id.0)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn list_due(
        &self,
        as_of: NaiveDate,
        batch_size: i64,
    ) -> Result<Vec<Subscription>, OrchestratorError> {
        let rows = sqlx::query_as::<_, SubscriptionModel>(
            r#"
            SELECT * FROM subscriptions
            WHERE status = 'active' AND next_billing_date <= $1
            ORDER BY next_billing_date ASC
            LIMIT $2
            "#,
        )
        .bind(as_of)
        .bind(batch_size)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn lock_for_billing(
        &self,
        conn: &mut sqlx::PgConnection,
        id: SubscriptionId,
    ) -> Result<Option<Subscription>, OrchestratorError> {
        let row = sqlx::query_as::<_, SubscriptionModel>(
            r#"SELECT * FROM subscriptions WHERE id = $1 FOR UPDATE"#,
        )
        .bind(id.into_uuid())
        .fetch_optional(&mut *conn)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn save_in_tx(
        &self,
        conn: &mut sqlx::PgConnection,
        subscription: Subscription,
    ) -> Result<Subscription, OrchestratorError> {
        let row = sqlx::query_as::<_, SubscriptionModel>(
            r#"
            UPDATE subscriptions SET
                status = $1, next_billing_date = $2, failure_retry_count = $3,
                cancelled_at = $4, updated_at = now()
            WHERE id = $5
            RETURNING *
            "#,
        )
        .bind(subscription.status)
        .bind(subscription.next_billing_date)
        .bind(subscription.failure_retry_count as i32)
        .bind(subscription.cancelled_at)
        .bind(subscription.id.into_uuid())
        .fetch_optional(&mut *conn)
        .await?;

        row.map(Into::into)
            .ok_or_else(|| OrchestratorError::NotFound(format!("subscription {}", subscription.id)))
    }
}
