use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{CustomerId, MerchantId, Money};
use sqlx::PgPool;

use crate::domain::error::OrchestratorError;
use crate::domain::repository::TransactionRepository;
use crate::domain::transaction::{CardIndicators, Transaction, TransactionStatus, TransactionType};
use crate::infrastructure::persistence::models::TransactionModel;
use common::TransactionId;

pub struct PostgresTransactionRepository {
    pool: PgPool,
}

impl PostgresTransactionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TransactionRepository for PostgresTransactionRepository {
    async fn find_by_id(&self, id: TransactionId) -> Result<Option<Transaction>, OrchestratorError> {
        let row = sqlx::query_as::<_, TransactionModel>(
            r#"SELECT * FROM transactions WHERE id = $1"#,
        )
        .bind(id.into_uuid())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn find_by_idempotency_key(
        &self,
        merchant_id: MerchantId,
        key: &str,
    ) -> Result<Option<Transaction>, OrchestratorError> {
        let row = sqlx::query_as::<_, TransactionModel>(
            r#"SELECT * FROM transactions WHERE merchant_id = $1 AND idempotency_key = $2"#,
        )
        .bind(merchant_id.into_uuid())
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn find_by_gateway_tran_nbr(
        &self,
        tran_nbr: &str,
    ) -> Result<Option<Transaction>, OrchestratorError> {
        let row = sqlx::query_as::<_, TransactionModel>(
            r#"SELECT * FROM transactions WHERE gateway_tran_nbr = $1"#,
        )
        .bind(tran_nbr)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn list(
        &self,
        merchant_id: MerchantId,
        customer_id: Option<&CustomerId>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Transaction>, OrchestratorError> {
        let rows = sqlx::query_as::<_, TransactionModel>(
            r#"
            SELECT * FROM transactions
            WHERE merchant_id = $1 AND ($2::text IS NULL OR customer_id = $2)
            ORDER BY created_at DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(merchant_id.into_uuid())
        .bind(customer_id.map(|c| c.0.clone()))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// `WITH RECURSIVE` walking both up (ancestors) and down (descendants)
    /// from `id`, unioned and returned in lineage order (spec §4.1, §4.6).
    async fn get_lineage(&self, id: TransactionId) -> Result<Vec<Transaction>, OrchestratorError> {
        let rows = sqlx::query_as::<_, TransactionModel>(
            r#"
            WITH RECURSIVE ancestors AS (
                SELECT * FROM transactions WHERE id = $1
                UNION ALL
                SELECT t.* FROM transactions t
                JOIN ancestors a ON t.id = a.parent_transaction_id
            ),
            descendants AS (
                SELECT * FROM transactions WHERE id = $1
                UNION ALL
                SELECT t.* FROM transactions t
                JOIN descendants d ON t.parent_transaction_id = d.id
            ),
            lineage AS (
                SELECT * FROM ancestors
                UNION
                SELECT * FROM descendants
            )
            SELECT * FROM lineage ORDER BY created_at ASC
            "#,
        )
        .bind(id.into_uuid())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn insert_pending(
        &self,
        conn: &mut sqlx::PgConnection,
        transaction: Transaction,
    ) -> Result<(Transaction, bool), OrchestratorError> {
        if let Some(key) = &transaction.idempotency_key {
            let existing = sqlx::query_as::<_, TransactionModel>(
                r#"SELECT * FROM transactions WHERE merchant_id = $1 AND idempotency_key = $2"#,
            )
            .bind(transaction.merchant_id.into_uuid())
            .bind(key)
            .fetch_optional(&mut *conn)
            .await?;
            if let Some(row) = existing {
                return Ok((row.into(), false));
            }
        }

        let row = sqlx::query_as::<_, TransactionModel>(
            r#"
            INSERT INTO transactions (
                id, parent_transaction_id, merchant_id, customer_id, payment_method_id,
                subscription_id, transaction_type, amount_minor_units, currency, status,
                idempotency_key, metadata, created_at, updated_at
            )
            VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14)
            ON CONFLICT (merchant_id, idempotency_key) WHERE idempotency_key IS NOT NULL
            DO NOTHING
            RETURNING *
            "#,
        )
        .bind(transaction.id.into_uuid())
        .bind(transaction.parent_id.map(|p| p.into_uuid()))
        .bind(transaction.merchant_id.into_uuid())
        .bind(transaction.customer_id.as_ref().map(|c| c.0.clone()))
        .bind(transaction.payment_method_id.map(|p| p.into_uuid()))
        .bind(transaction.subscription_id.map(|s| s.into_uuid()))
        .bind(transaction.transaction_type)
        .bind(transaction.amount.minor_units)
        .bind(transaction.amount.currency_str())
        .bind(transaction.status)
        .bind(&transaction.idempotency_key)
        .bind(&transaction.metadata)
        .bind(transaction.created_at)
        .bind(transaction.updated_at)
        .fetch_optional(&mut *conn)
        .await?;

        match row {
            Some(row) => Ok((row.into(), true)),
            None => {
                // Lost the insert race against a concurrent identical
                // idempotency key: the other attempt's row now exists.
                let key = transaction
                    .idempotency_key
                    .as_deref()
                    .expect("ON CONFLICT only fires when idempotency_key is set");
                let row = sqlx::query_as::<_, TransactionModel>(
                    r#"SELECT * FROM transactions WHERE merchant_id = $1 AND idempotency_key = $2"#,
                )
                .bind(transaction.merchant_id.into_uuid())
                .bind(key)
                .fetch_one(&mut *conn)
                .await?;
                Ok((row.into(), false))
            }
        }
    }

    async fn lock_parent_with_child_sum(
        &self,
        conn: &mut sqlx::PgConnection,
        parent_id: TransactionId,
        child_type: TransactionType,
    ) -> Result<Option<(Transaction, Money)>, OrchestratorError> {
        let parent = sqlx::query_as::<_, TransactionModel>(
            r#"SELECT * FROM transactions WHERE id = $1 FOR UPDATE"#,
        )
        .bind(parent_id.into_uuid())
        .fetch_optional(&mut *conn)
        .await?;

        let Some(parent) = parent else {
            return Ok(None);
        };
        let parent: Transaction = parent.into();

        let sum: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(amount_minor_units), 0) FROM transactions
            WHERE parent_transaction_id = $1 AND transaction_type = $2 AND status = 'approved'
            "#,
        )
        .bind(parent_id.into_uuid())
        .bind(child_type)
        .fetch_one(&mut *conn)
        .await?;

        let total = Money::new(sum, parent.amount.currency_str())
            .map_err(|e| OrchestratorError::Internal(e.to_string()))?;

        Ok(Some((parent, total)))
    }

    async fn finalize(
        &self,
        conn: &mut sqlx::PgConnection,
        id: TransactionId,
        status: TransactionStatus,
        gateway_tran_nbr: Option<String>,
        gateway_token: Option<String>,
        gateway_response_code: Option<String>,
        gateway_response_text: Option<String>,
        card_indicators: CardIndicators,
        processed_at: DateTime<Utc>,
    ) -> Result<bool, OrchestratorError> {
        let result = sqlx::query(
            r#"
            UPDATE transactions SET
                status = $2, gateway_tran_nbr = $3, gateway_token = $4,
                gateway_response_code = $5, gateway_response_text = $6,
                card_brand = $7, avs_result = $8, cvv_result = $9,
                processed_at = $10, updated_at = $10
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(id.into_uuid())
        .bind(status)
        .bind(gateway_tran_nbr)
        .bind(gateway_token)
        .bind(gateway_response_code)
        .bind(gateway_response_text)
        .bind(card_indicators.card_brand)
        .bind(card_indicators.avs_result)
        .bind(card_indicators.cvv_result)
        .bind(processed_at)
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
